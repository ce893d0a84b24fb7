//! InMemoryInvoker - records issued operations for the host to resolve.

use std::collections::VecDeque;

use async_trait::async_trait;
use tokio::sync::Mutex;
use ulid::Ulid;

use crate::domain::SuspensionHandle;
use crate::ports::{AsyncInvoker, AsyncOperation, PortError};

/// An operation waiting for the host to resolve it.
#[derive(Debug, Clone, PartialEq)]
pub struct IssuedOperation {
    pub handle: SuspensionHandle,
    pub operation: AsyncOperation,
}

/// Queue of issued operations. Issuing never blocks and never resolves.
#[derive(Debug, Default)]
pub struct InMemoryInvoker {
    issued: Mutex<VecDeque<IssuedOperation>>,
}

impl InMemoryInvoker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take every operation issued so far, oldest first.
    pub async fn drain(&self) -> Vec<IssuedOperation> {
        self.issued.lock().await.drain(..).collect()
    }

    pub async fn outstanding(&self) -> usize {
        self.issued.lock().await.len()
    }
}

#[async_trait]
impl AsyncInvoker for InMemoryInvoker {
    async fn issue(&self, operation: AsyncOperation) -> Result<SuspensionHandle, PortError> {
        let handle = SuspensionHandle(format!("op-{}", Ulid::new()));
        self.issued.lock().await.push_back(IssuedOperation {
            handle: handle.clone(),
            operation,
        });
        Ok(handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ContinuationToken, TaskId};
    use crate::ports::Bindings;

    fn operation(function: &str) -> AsyncOperation {
        let task_id = TaskId::from_ulid(Ulid::new());
        AsyncOperation {
            function: function.to_string(),
            bindings: Bindings {
                task_id,
                ordinal: 0,
                args: serde_json::json!({}),
                previous: None,
                results: vec![],
            },
            continuation: ContinuationToken::issue(task_id, 0, Ulid::new()),
        }
    }

    #[tokio::test]
    async fn issue_records_and_drain_empties() {
        let invoker = InMemoryInvoker::new();
        let h1 = invoker.issue(operation("a")).await.unwrap();
        let h2 = invoker.issue(operation("b")).await.unwrap();
        assert_ne!(h1, h2);
        assert_eq!(invoker.outstanding().await, 2);

        let drained = invoker.drain().await;
        assert_eq!(drained[0].operation.function, "a");
        assert_eq!(drained[1].handle, h2);
        assert_eq!(invoker.outstanding().await, 0);
    }
}
