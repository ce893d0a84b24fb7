//! Task record, status derivation and task templates.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::code_unit::CallMode;
use super::errors::ValidationError;
use super::ids::{CallId, CodeUnitId, ScheduleId, StepId, TaskId, TemplateId};
use super::step::{MAX_DELAY_SECS, StepStatus};

/// Task status, derived from its steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// No step has started.
    Pending,
    /// Some step has started and none failed, but not all completed.
    Running,
    /// Every step completed.
    Completed,
    /// Some step failed.
    Failed,
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }

    /// Derive the task status from its steps' statuses.
    pub fn derive(steps: &[StepStatus]) -> Self {
        if steps.iter().any(|s| *s == StepStatus::Failed) {
            TaskStatus::Failed
        } else if !steps.is_empty() && steps.iter().all(|s| *s == StepStatus::Completed) {
            TaskStatus::Completed
        } else if steps.iter().all(|s| *s == StepStatus::Pending) {
            TaskStatus::Pending
        } else {
            TaskStatus::Running
        }
    }
}

/// One workflow instance: an ordered list of steps.
///
/// `step_ids[n]` is the step with ordinal `n`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRecord {
    pub id: TaskId,
    pub name: String,
    pub step_ids: Vec<StepId>,
    pub status: TaskStatus,

    /// Schedule that instantiated this task, if any.
    pub schedule_id: Option<ScheduleId>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TaskRecord {
    pub fn new(
        id: TaskId,
        name: String,
        step_ids: Vec<StepId>,
        schedule_id: Option<ScheduleId>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            name,
            step_ids,
            status: TaskStatus::Pending,
            schedule_id,
            created_at: now,
            updated_at: now,
        }
    }

    /// Recompute status from step statuses. Returns true when it changed.
    pub fn refresh_status(&mut self, steps: &[StepStatus], now: DateTime<Utc>) -> bool {
        let status = TaskStatus::derive(steps);
        let changed = status != self.status;
        self.status = status;
        self.updated_at = now;
        changed
    }
}

/// A step of a task built from already-bound calls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepSpec {
    pub call: Option<CallId>,
    #[serde(default)]
    pub delay_seconds: u64,
}

impl StepSpec {
    pub fn new(call: CallId) -> Self {
        Self {
            call: Some(call),
            delay_seconds: 0,
        }
    }

    pub fn with_delay(mut self, delay_seconds: u64) -> Self {
        self.delay_seconds = delay_seconds;
        self
    }
}

/// Blueprint of one step: which unit to bind, how, and with what args.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepTemplate {
    pub code_unit: Option<CodeUnitId>,
    pub mode: CallMode,
    #[serde(default)]
    pub args: serde_json::Value,
    #[serde(default)]
    pub delay_seconds: u64,
}

impl StepTemplate {
    pub fn sync(code_unit: CodeUnitId) -> Self {
        Self {
            code_unit: Some(code_unit),
            mode: CallMode::Sync,
            args: serde_json::Value::Null,
            delay_seconds: 0,
        }
    }

    pub fn async_op(code_unit: CodeUnitId) -> Self {
        Self {
            mode: CallMode::Async,
            ..Self::sync(code_unit)
        }
    }

    pub fn with_args(mut self, args: serde_json::Value) -> Self {
        self.args = args;
        self
    }

    pub fn with_delay(mut self, delay_seconds: u64) -> Self {
        self.delay_seconds = delay_seconds;
        self
    }
}

/// Blueprint from which fresh tasks (with fresh calls and steps) are made.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskTemplate {
    pub name: String,
    pub steps: Vec<StepTemplate>,
}

impl TaskTemplate {
    pub fn new(name: impl Into<String>, steps: Vec<StepTemplate>) -> Self {
        Self {
            name: name.into(),
            steps,
        }
    }

    /// Shape checks that do not need the store.
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_shape(&self.name, self.steps.len())?;
        for (ordinal, step) in self.steps.iter().enumerate() {
            if step.code_unit.is_none() {
                return Err(ValidationError::MissingCall {
                    ordinal: ordinal as u32,
                });
            }
            check_delay(ordinal, step.delay_seconds)?;
        }
        Ok(())
    }
}

/// A template as persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateRecord {
    pub id: TemplateId,
    pub template: TaskTemplate,
    pub created_at: DateTime<Utc>,
}

pub(crate) fn validate_shape(name: &str, steps: usize) -> Result<(), ValidationError> {
    if name.trim().is_empty() {
        return Err(ValidationError::EmptyName);
    }
    if steps == 0 {
        return Err(ValidationError::EmptyTask(name.to_string()));
    }
    Ok(())
}

pub(crate) fn check_delay(ordinal: usize, delay_seconds: u64) -> Result<(), ValidationError> {
    if delay_seconds > MAX_DELAY_SECS {
        return Err(ValidationError::DelayOutOfRange {
            ordinal: ordinal as u32,
            delay_seconds,
        });
    }
    Ok(())
}
