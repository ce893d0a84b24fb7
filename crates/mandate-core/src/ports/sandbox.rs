//! Sandbox port.
//!
//! A code unit runs as a call to a pre-registered routine. The bindings are
//! everything the routine can see; there is no other shared state.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::{ExecutionError, TaskId};

/// The capability-limited view a routine receives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bindings {
    pub task_id: TaskId,
    pub ordinal: u32,
    /// Arguments fixed on the call.
    pub args: serde_json::Value,
    /// Result of the step just before this one.
    pub previous: Option<serde_json::Value>,
    /// Results of all earlier steps, by ordinal.
    pub results: Vec<serde_json::Value>,
}

#[async_trait]
pub trait Sandbox: Send + Sync {
    async fn execute(
        &self,
        function: &str,
        bindings: Bindings,
    ) -> Result<serde_json::Value, ExecutionError>;
}
