//! Step record and its state machine.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::continuation::ContinuationToken;
use super::errors::{StepError, TransitionError};
use super::ids::{CallId, StepId, TaskId};

/// Longest step delay or recurrence interval accepted (about a century).
pub const MAX_DELAY_SECS: u64 = 100 * 365 * 86_400;

/// `now` plus `seconds`, or `None` past the end of the calendar.
pub fn after_delay(now: DateTime<Utc>, seconds: u64) -> Option<DateTime<Utc>> {
    let seconds = i64::try_from(seconds).ok()?;
    now.checked_add_signed(Duration::try_seconds(seconds)?)
}

/// Step status.
///
/// State transitions:
/// - Pending -> Running -> Completed
/// - Pending -> Running -> Failed
///
/// Nothing ever returns to `Pending`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl StepStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, StepStatus::Completed | StepStatus::Failed)
    }
}

/// Handle returned by the invoker when an async operation is issued.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SuspensionHandle(pub String);

/// Identifier of a registered timer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TimerId(pub String);

/// One attempt to run a call inside a task.
///
/// All state transitions happen through methods on this record, which refuse
/// anything but pending -> running -> terminal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepRecord {
    pub id: StepId,
    pub task_id: TaskId,
    pub call_id: CallId,
    pub ordinal: u32,
    pub status: StepStatus,

    /// Wait before this step may run, counted from when it becomes next.
    pub delay_seconds: u64,

    /// Earliest time this step may start. Set once the previous step is done.
    pub not_before: Option<DateTime<Utc>>,

    pub continuation_token: Option<ContinuationToken>,
    pub suspension: Option<SuspensionHandle>,
    pub timeout_timer: Option<TimerId>,

    pub result: Option<serde_json::Value>,
    pub error: Option<StepError>,

    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl StepRecord {
    pub fn new(
        id: StepId,
        task_id: TaskId,
        call_id: CallId,
        ordinal: u32,
        delay_seconds: u64,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            task_id,
            call_id,
            ordinal,
            status: StepStatus::Pending,
            delay_seconds,
            not_before: None,
            continuation_token: None,
            suspension: None,
            timeout_timer: None,
            result: None,
            error: None,
            created_at,
            started_at: None,
            finished_at: None,
        }
    }

    /// Has the step's wait elapsed at `now`?
    pub fn is_eligible(&self, now: DateTime<Utc>) -> bool {
        self.not_before.is_none_or(|at| now >= at)
    }

    /// Pending -> Running.
    pub fn begin(&mut self, now: DateTime<Utc>) -> Result<(), TransitionError> {
        self.guard(StepStatus::Pending, StepStatus::Running)?;
        self.status = StepStatus::Running;
        self.started_at = Some(now);
        Ok(())
    }

    /// Record the continuation of a running async step.
    pub fn suspend(
        &mut self,
        token: ContinuationToken,
        handle: SuspensionHandle,
        timeout_timer: Option<TimerId>,
    ) {
        self.continuation_token = Some(token);
        self.suspension = Some(handle);
        self.timeout_timer = timeout_timer;
    }

    /// Running -> Completed.
    pub fn complete(
        &mut self,
        result: serde_json::Value,
        now: DateTime<Utc>,
    ) -> Result<(), TransitionError> {
        self.guard(StepStatus::Running, StepStatus::Completed)?;
        self.status = StepStatus::Completed;
        self.result = Some(result);
        self.finished_at = Some(now);
        Ok(())
    }

    /// Running -> Failed.
    pub fn fail(&mut self, error: StepError, now: DateTime<Utc>) -> Result<(), TransitionError> {
        self.guard(StepStatus::Running, StepStatus::Failed)?;
        self.status = StepStatus::Failed;
        self.error = Some(error);
        self.finished_at = Some(now);
        Ok(())
    }

    fn guard(&self, from: StepStatus, to: StepStatus) -> Result<(), TransitionError> {
        if self.status == from {
            Ok(())
        } else {
            Err(TransitionError {
                step_id: self.id,
                from: self.status,
                to,
            })
        }
    }
}
