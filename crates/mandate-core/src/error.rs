use thiserror::Error;

use crate::domain::{TransitionError, ValidationError};
use crate::ports::{PortError, StoreError};

/// Errors crossing the engine boundary.
///
/// Execution failures never appear here: they are recorded on the step.
/// Duplicate deliveries are not errors either; they come back as a
/// discarded outcome.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("{kind} {id} not found")]
    NotFound { kind: &'static str, id: String },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Port(#[from] PortError),

    /// Persisted state contradicts the step state machine.
    #[error(transparent)]
    Transition(#[from] TransitionError),
}

impl EngineError {
    pub(crate) fn not_found(kind: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            kind,
            id: id.to_string(),
        }
    }
}
