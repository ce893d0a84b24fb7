//! Status queries.
//!
//! Always answered from the last durable state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::context::Context;
use crate::domain::{
    CallId, ScheduleId, ScheduleRecord, StepError, StepRecord, StepStatus, TaskId, TaskRecord,
    TaskStatus,
};
use crate::error::EngineError;

/// Snapshot of one step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepView {
    pub ordinal: u32,
    pub call_id: CallId,
    pub status: StepStatus,
    pub result: Option<serde_json::Value>,
    pub error: Option<StepError>,
    pub not_before: Option<DateTime<Utc>>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl From<StepRecord> for StepView {
    fn from(step: StepRecord) -> Self {
        Self {
            ordinal: step.ordinal,
            call_id: step.call_id,
            status: step.status,
            result: step.result,
            error: step.error,
            not_before: step.not_before,
            started_at: step.started_at,
            finished_at: step.finished_at,
        }
    }
}

/// Snapshot of a task and its steps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskStatusView {
    pub task_id: TaskId,
    pub name: String,
    pub status: TaskStatus,
    pub schedule_id: Option<ScheduleId>,
    pub steps: Vec<StepView>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TaskStatusView {
    /// The step that decides what happens next: the first non-terminal one.
    pub fn current_step(&self) -> Option<&StepView> {
        self.steps.iter().find(|s| !s.status.is_terminal())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskCounts {
    pub pending: usize,
    pub running: usize,
    pub completed: usize,
    pub failed: usize,
}

impl TaskCounts {
    pub fn total(&self) -> usize {
        self.pending + self.running + self.completed + self.failed
    }

    fn add(&mut self, status: TaskStatus) {
        match status {
            TaskStatus::Pending => self.pending += 1,
            TaskStatus::Running => self.running += 1,
            TaskStatus::Completed => self.completed += 1,
            TaskStatus::Failed => self.failed += 1,
        }
    }
}

#[derive(Clone)]
pub struct StatusQuery {
    ctx: Context,
}

impl StatusQuery {
    pub(crate) fn new(ctx: Context) -> Self {
        Self { ctx }
    }

    pub async fn get_task_status(&self, task_id: TaskId) -> Result<TaskStatusView, EngineError> {
        let task = self
            .ctx
            .repo
            .task(task_id)
            .await?
            .ok_or_else(|| EngineError::not_found("task", task_id))?;
        let steps = self.ctx.repo.steps_of(&task).await?;
        Ok(view(task, steps))
    }

    pub async fn counts(&self) -> Result<TaskCounts, EngineError> {
        let mut counts = TaskCounts::default();
        for task in self.ctx.repo.tasks().await? {
            counts.add(task.status);
        }
        Ok(counts)
    }

    /// Every schedule, oldest first.
    pub async fn schedules(&self) -> Result<Vec<ScheduleRecord>, EngineError> {
        let mut schedules = self.ctx.repo.schedules().await?;
        schedules.sort_by_key(|s| (s.created_at, s.id));
        Ok(schedules)
    }
}

fn view(task: TaskRecord, steps: Vec<StepRecord>) -> TaskStatusView {
    TaskStatusView {
        task_id: task.id,
        name: task.name,
        status: task.status,
        schedule_id: task.schedule_id,
        steps: steps.into_iter().map(StepView::from).collect(),
        created_at: task.created_at,
        updated_at: task.updated_at,
    }
}
