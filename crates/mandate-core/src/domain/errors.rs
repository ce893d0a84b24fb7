//! Error kinds of the execution model.
//!
//! Only [`ValidationError`] is ever returned to a caller as `Err`. Execution
//! and timeout failures are stored on the step as [`StepError`], and
//! duplicate deliveries are reported as a discarded outcome carrying a
//! [`DuplicateFireError`].

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::continuation::ContinuationToken;
use super::ids::{CallId, CodeUnitId, ScheduleId, StepId, TaskId, TemplateId};
use super::step::StepStatus;

/// Malformed code unit, call, task or schedule input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("code unit source is empty")]
    EmptySource,

    #[error("code unit {0} does not exist")]
    UnknownCodeUnit(CodeUnitId),

    #[error("call {0} does not exist")]
    UnknownCall(CallId),

    #[error("template {0} does not exist")]
    UnknownTemplate(TemplateId),

    #[error("step {ordinal} has no bound call")]
    MissingCall { ordinal: u32 },

    #[error("task '{0}' has no steps")]
    EmptyTask(String),

    #[error("task name is empty")]
    EmptyName,

    #[error("step {ordinal} delay of {delay_seconds}s is out of range")]
    DelayOutOfRange { ordinal: u32, delay_seconds: u64 },

    #[error("invalid recurrence expression '{0}'")]
    InvalidRecurrence(String),
}

/// A code unit failed while executing.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("execution failed: {message}")]
pub struct ExecutionError {
    pub message: String,
}

impl ExecutionError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// An async step's operation was not resolved within the configured bound.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("operation did not resolve within {after_secs}s")]
pub struct TimeoutError {
    pub after_secs: u64,
}

/// A resolution or fire that no longer matches persisted state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DuplicateFireError {
    #[error("continuation {0} is not registered")]
    UnknownContinuation(ContinuationToken),

    #[error("continuation {token} is stale for {task_id} step {ordinal} ({status:?})")]
    StaleContinuation {
        token: ContinuationToken,
        task_id: TaskId,
        ordinal: u32,
        status: StepStatus,
    },

    #[error("fire token for {schedule_id} does not match next fire time")]
    StaleScheduleFire { schedule_id: ScheduleId },
}

/// Failure recorded on a step. Persisted, never raised.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StepError {
    /// The sandbox or code unit reported an error.
    #[error(transparent)]
    Execution(ExecutionError),

    /// The async operation resolved with `success = false`.
    #[error("operation rejected: {payload}")]
    Rejected { payload: serde_json::Value },

    /// No resolution arrived in time.
    #[error(transparent)]
    Timeout(TimeoutError),
}

/// An illegal step transition was attempted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("step {step_id} cannot move from {from:?} to {to:?}")]
pub struct TransitionError {
    pub step_id: StepId,
    pub from: StepStatus,
    pub to: StepStatus,
}
