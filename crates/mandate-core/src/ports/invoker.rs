//! AsyncInvoker port.
//!
//! `issue` hands an operation to the host and returns immediately. The host
//! later resolves it by invoking the engine's `resume` with the operation's
//! continuation token and `(success, payload)`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::{ContinuationToken, SuspensionHandle};
use crate::ports::PortError;
use crate::ports::sandbox::Bindings;

/// An operation issued on behalf of an async step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AsyncOperation {
    /// Routine the code unit names.
    pub function: String,
    pub bindings: Bindings,
    /// Callback reference for the resolution.
    pub continuation: ContinuationToken,
}

#[async_trait]
pub trait AsyncInvoker: Send + Sync {
    async fn issue(&self, operation: AsyncOperation) -> Result<SuspensionHandle, PortError>;
}
