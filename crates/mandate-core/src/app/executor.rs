//! Call execution wrapper.
//!
//! Turns a call into either a finished result (sync) or a suspension handle
//! (async). Never blocks on an async operation.

use std::sync::Arc;

use tracing::debug;

use crate::domain::{Call, CallMode, CodeUnit, ContinuationToken, ExecutionError, SuspensionHandle};
use crate::ports::{AsyncInvoker, AsyncOperation, Bindings, Sandbox};

/// What executing a call produced.
#[derive(Debug, Clone, PartialEq)]
pub enum Execution {
    Completed(serde_json::Value),
    Suspended(SuspensionHandle),
}

pub struct CallExecutor {
    sandbox: Arc<dyn Sandbox>,
    invoker: Arc<dyn AsyncInvoker>,
}

impl CallExecutor {
    pub fn new(sandbox: Arc<dyn Sandbox>, invoker: Arc<dyn AsyncInvoker>) -> Self {
        Self { sandbox, invoker }
    }

    /// Execute `call`, whose code unit is `unit`.
    ///
    /// Async calls need the continuation token the resolution will carry.
    pub async fn execute(
        &self,
        call: &Call,
        unit: &CodeUnit,
        bindings: Bindings,
        continuation: Option<&ContinuationToken>,
    ) -> Result<Execution, ExecutionError> {
        if unit.id != call.code_unit {
            return Err(ExecutionError::new(format!(
                "{} is bound to {}, got {}",
                call.id, call.code_unit, unit.id
            )));
        }
        if !unit.verify() {
            return Err(ExecutionError::new(format!("checksum mismatch for {}", unit.id)));
        }

        match call.mode {
            CallMode::Sync => {
                debug!(call = %call.id, routine = %unit.source, "running sync call");
                self.sandbox
                    .execute(&unit.source, bindings)
                    .await
                    .map(Execution::Completed)
            }
            CallMode::Async => {
                let continuation = continuation.ok_or_else(|| {
                    ExecutionError::new(format!("async {} issued without a continuation", call.id))
                })?;
                debug!(call = %call.id, routine = %unit.source, %continuation, "issuing async call");
                let operation = AsyncOperation {
                    function: unit.source.clone(),
                    bindings,
                    continuation: continuation.clone(),
                };
                self.invoker
                    .issue(operation)
                    .await
                    .map(Execution::Suspended)
                    .map_err(|e| ExecutionError::new(e.to_string()))
            }
        }
    }
}
