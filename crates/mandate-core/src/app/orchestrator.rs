//! Orchestrator - advances tasks one step per invocation.
//!
//! `run` starts at most one step. An async step arms its timeout, then
//! persists its running marker and continuation token, and only then issues
//! the operation. The resolution arrives later through `resume` (or `expire`
//! once the timeout bound passes). Nothing survives in memory between
//! invocations.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use super::context::Context;
use super::executor::{CallExecutor, Execution};
use crate::domain::{
    CallMode, ContinuationToken, DuplicateFireError, ExecutionError, StepError, StepRecord,
    StepStatus, TaskId, TaskRecord, TaskStatus, TimeoutError, TimerId, ValidationError, Wakeup,
    after_delay,
};
use crate::error::EngineError;
use crate::ports::{Bindings, PortError};
use crate::store::ContinuationEntry;

/// What a single `run` did.
#[derive(Debug, Clone, PartialEq)]
pub enum Progress {
    /// The task was already completed or failed.
    AlreadyTerminal,
    /// The next step's delay has not elapsed.
    Waiting {
        ordinal: u32,
        not_before: DateTime<Utc>,
    },
    /// The current step is running and waits for its resolution.
    AwaitingResolution { ordinal: u32 },
    Completed { ordinal: u32 },
    Failed { ordinal: u32 },
    /// An async operation was issued.
    Suspended {
        ordinal: u32,
        token: ContinuationToken,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunOutcome {
    pub task_id: TaskId,
    pub status: TaskStatus,
    pub progress: Progress,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ResumeOutcome {
    Applied {
        task_id: TaskId,
        ordinal: u32,
        step_status: StepStatus,
        task_status: TaskStatus,
    },
    /// No state changed. `step` is the stored step, when there is one.
    Discarded {
        reason: DuplicateFireError,
        step: Option<Box<StepRecord>>,
    },
}

enum Resolution {
    Succeeded(serde_json::Value),
    Rejected(serde_json::Value),
    TimedOut,
}

#[derive(Clone)]
pub struct Orchestrator {
    ctx: Context,
    executor: Arc<CallExecutor>,
}

impl Orchestrator {
    pub(crate) fn new(ctx: Context) -> Self {
        let executor = Arc::new(CallExecutor::new(
            ctx.sandbox.clone(),
            ctx.invoker.clone(),
        ));
        Self { ctx, executor }
    }

    /// Advance `task_id` by at most one step.
    ///
    /// Calling it again while the current step is running, waiting or
    /// terminal changes nothing.
    pub async fn run(&self, task_id: TaskId) -> Result<RunOutcome, EngineError> {
        let mut task = self.load_task(task_id).await?;
        if task.status.is_terminal() {
            return Ok(outcome(&task, Progress::AlreadyTerminal));
        }

        let mut steps = self.load_steps(&task).await?;
        let now = self.ctx.clock.now();

        let derived = TaskStatus::derive(&statuses(&steps));
        if derived.is_terminal() {
            task.refresh_status(&statuses(&steps), now);
            self.ctx.repo.put_task(&task).await?;
            return Ok(outcome(&task, Progress::AlreadyTerminal));
        }

        let Some(index) = steps.iter().position(|s| !s.status.is_terminal()) else {
            return Ok(outcome(&task, Progress::AlreadyTerminal));
        };

        let step = &steps[index];
        match step.status {
            StepStatus::Running => {
                debug!(%task_id, ordinal = step.ordinal, "step awaiting resolution");
                return Ok(outcome(
                    &task,
                    Progress::AwaitingResolution {
                        ordinal: step.ordinal,
                    },
                ));
            }
            StepStatus::Pending if !step.is_eligible(now) => {
                let not_before = step.not_before.unwrap_or(now);
                debug!(%task_id, ordinal = step.ordinal, %not_before, "step not yet eligible");
                return Ok(outcome(
                    &task,
                    Progress::Waiting {
                        ordinal: step.ordinal,
                        not_before,
                    },
                ));
            }
            _ => {}
        }

        let progress = self.start_step(&mut steps, index, now).await?;
        if matches!(progress, Progress::Suspended { .. }) {
            task.refresh_status(&statuses(&steps), now);
            self.ctx.repo.put_task(&task).await?;
        } else {
            self.settle(&mut task, &mut steps, index).await?;
        }
        Ok(outcome(&task, progress))
    }

    /// Apply the resolution of an async operation.
    pub async fn resume(
        &self,
        token: &ContinuationToken,
        success: bool,
        payload: serde_json::Value,
    ) -> Result<ResumeOutcome, EngineError> {
        let resolution = if success {
            Resolution::Succeeded(payload)
        } else {
            Resolution::Rejected(payload)
        };
        self.resolve(token, resolution).await
    }

    /// Fail the step holding `token` with a timeout, if still unresolved.
    pub async fn expire(&self, token: &ContinuationToken) -> Result<ResumeOutcome, EngineError> {
        self.resolve(token, Resolution::TimedOut).await
    }

    async fn start_step(
        &self,
        steps: &mut [StepRecord],
        index: usize,
        now: DateTime<Utc>,
    ) -> Result<Progress, EngineError> {
        let call_id = steps[index].call_id;
        let call = self
            .ctx
            .repo
            .call(call_id)
            .await?
            .ok_or(ValidationError::UnknownCall(call_id))?;
        let unit = self
            .ctx
            .repo
            .code_unit(call.code_unit)
            .await?
            .ok_or(ValidationError::UnknownCodeUnit(call.code_unit))?;

        let bindings = bindings_for(steps, index, call.args.clone());
        let step = &mut steps[index];
        step.begin(now)?;

        // Timeout first: a stored running marker always has one.
        let (token, timeout) = match call.mode {
            CallMode::Sync => (None, None),
            CallMode::Async => {
                let token =
                    ContinuationToken::issue(step.task_id, step.ordinal, self.ctx.ids.next_ulid());
                let timeout = self.arm_timeout(&token).await?;
                step.continuation_token = Some(token.clone());
                step.timeout_timer = Some(timeout.clone());
                if let Err(err) = self.persist_running(step, &token).await {
                    self.disarm(&timeout).await;
                    return Err(err);
                }
                (Some(token), Some(timeout))
            }
        };
        info!(task_id = %step.task_id, ordinal = step.ordinal, mode = ?call.mode, "step started");

        let execution = self
            .executor
            .execute(&call, &unit, bindings, token.as_ref())
            .await;
        let now = self.ctx.clock.now();

        if let (Ok(Execution::Suspended(handle)), Some(token)) = (&execution, &token) {
            step.suspend(token.clone(), handle.clone(), timeout);
            self.ctx.repo.put_step(step).await?;
            info!(task_id = %step.task_id, ordinal = step.ordinal, %token, "step suspended");
            return Ok(Progress::Suspended {
                ordinal: step.ordinal,
                token: token.clone(),
            });
        }

        if let Some(timer_id) = &timeout {
            self.disarm(timer_id).await;
        }
        match execution {
            Ok(Execution::Completed(result)) => {
                step.complete(result, now)?;
                Ok(Progress::Completed {
                    ordinal: step.ordinal,
                })
            }
            Ok(Execution::Suspended(_)) => {
                step.fail(
                    StepError::Execution(ExecutionError::new("sync call returned a suspension")),
                    now,
                )?;
                Ok(Progress::Failed {
                    ordinal: step.ordinal,
                })
            }
            Err(err) => {
                warn!(task_id = %step.task_id, ordinal = step.ordinal, error = %err, "step failed");
                step.fail(StepError::Execution(err), now)?;
                Ok(Progress::Failed {
                    ordinal: step.ordinal,
                })
            }
        }
    }

    /// Store the running marker and its continuation entry.
    async fn persist_running(
        &self,
        step: &StepRecord,
        token: &ContinuationToken,
    ) -> Result<(), EngineError> {
        self.ctx.repo.put_step(step).await?;
        self.ctx
            .repo
            .put_continuation(
                token,
                &ContinuationEntry {
                    task_id: step.task_id,
                    step_id: step.id,
                    ordinal: step.ordinal,
                },
            )
            .await?;
        Ok(())
    }

    async fn resolve(
        &self,
        token: &ContinuationToken,
        resolution: Resolution,
    ) -> Result<ResumeOutcome, EngineError> {
        let Some(entry) = self.ctx.repo.continuation(token).await? else {
            return Ok(discard(
                DuplicateFireError::UnknownContinuation(token.clone()),
                None,
            ));
        };

        let mut task = self.load_task(entry.task_id).await?;
        let mut steps = self.load_steps(&task).await?;
        let Some(index) = steps.iter().position(|s| s.id == entry.step_id) else {
            return Err(EngineError::not_found("step", entry.step_id));
        };

        let step = &mut steps[index];
        if step.status != StepStatus::Running || step.continuation_token.as_ref() != Some(token) {
            let reason = DuplicateFireError::StaleContinuation {
                token: token.clone(),
                task_id: step.task_id,
                ordinal: step.ordinal,
                status: step.status,
            };
            return Ok(discard(reason, Some(step.clone())));
        }

        let now = self.ctx.clock.now();
        match resolution {
            Resolution::Succeeded(payload) => step.complete(payload, now)?,
            Resolution::Rejected(payload) => step.fail(StepError::Rejected { payload }, now)?,
            Resolution::TimedOut => {
                let after_secs = self.ctx.config.async_timeout_secs;
                warn!(task_id = %step.task_id, ordinal = step.ordinal, %token, after_secs, "step timed out");
                step.fail(StepError::Timeout(TimeoutError { after_secs }), now)?;
            }
        }
        info!(task_id = %step.task_id, ordinal = step.ordinal, status = ?step.status, "step resolved");

        if let Some(timer_id) = step.timeout_timer.clone() {
            self.disarm(&timer_id).await;
        }

        let ordinal = step.ordinal;
        let step_status = step.status;
        self.settle(&mut task, &mut steps, index).await?;

        Ok(ResumeOutcome::Applied {
            task_id: task.id,
            ordinal,
            step_status,
            task_status: task.status,
        })
    }

    /// Persist a step that just reached a terminal state, arm the next step
    /// and recompute the task status.
    async fn settle(
        &self,
        task: &mut TaskRecord,
        steps: &mut [StepRecord],
        index: usize,
    ) -> Result<(), EngineError> {
        let now = self.ctx.clock.now();
        let next_at = match steps.get(index + 1) {
            Some(next) if steps[index].status == StepStatus::Completed => Some(
                after_delay(now, next.delay_seconds).ok_or(ValidationError::DelayOutOfRange {
                    ordinal: next.ordinal,
                    delay_seconds: next.delay_seconds,
                })?,
            ),
            _ => None,
        };
        self.ctx.repo.put_step(&steps[index]).await?;

        let mut advance_after = None;
        if let Some(not_before) = next_at
            && let Some(next) = steps.get_mut(index + 1)
        {
            next.not_before = Some(not_before);
            self.ctx.repo.put_step(next).await?;
            advance_after = Some(next.delay_seconds);
        }

        let previous = task.status;
        task.refresh_status(&statuses(steps), now);
        self.ctx.repo.put_task(task).await?;
        if task.status != previous {
            info!(task_id = %task.id, from = ?previous, to = ?task.status, "task status changed");
        }

        if let Some(delay) = advance_after
            && self.ctx.config.self_schedule
        {
            let wakeup = Wakeup::Advance { task_id: task.id };
            if let Err(err) = self.ctx.timer.schedule(delay, wakeup).await {
                warn!(task_id = %task.id, error = %err, "could not schedule next advance");
            }
        }
        Ok(())
    }

    async fn arm_timeout(&self, token: &ContinuationToken) -> Result<TimerId, PortError> {
        let wakeup = Wakeup::Timeout {
            token: token.clone(),
        };
        self.ctx
            .timer
            .schedule(self.ctx.config.async_timeout_secs, wakeup)
            .await
            .inspect_err(|err| warn!(%token, error = %err, "could not arm timeout"))
    }

    async fn disarm(&self, timer_id: &TimerId) {
        if let Err(err) = self.ctx.timer.cancel(timer_id).await {
            warn!(timer = %timer_id.0, error = %err, "could not cancel timeout timer");
        }
    }

    async fn load_task(&self, task_id: TaskId) -> Result<TaskRecord, EngineError> {
        self.ctx
            .repo
            .task(task_id)
            .await?
            .ok_or_else(|| EngineError::not_found("task", task_id))
    }

    async fn load_steps(&self, task: &TaskRecord) -> Result<Vec<StepRecord>, EngineError> {
        let mut steps = Vec::with_capacity(task.step_ids.len());
        for step_id in &task.step_ids {
            let step = self
                .ctx
                .repo
                .step(*step_id)
                .await?
                .ok_or_else(|| EngineError::not_found("step", step_id))?;
            steps.push(step);
        }
        Ok(steps)
    }
}

fn statuses(steps: &[StepRecord]) -> Vec<StepStatus> {
    steps.iter().map(|s| s.status).collect()
}

/// What the step at `index` sees: its args plus every earlier result.
fn bindings_for(steps: &[StepRecord], index: usize, args: serde_json::Value) -> Bindings {
    let step = &steps[index];
    let results: Vec<serde_json::Value> = steps[..index]
        .iter()
        .map(|s| s.result.clone().unwrap_or(serde_json::Value::Null))
        .collect();
    Bindings {
        task_id: step.task_id,
        ordinal: step.ordinal,
        args,
        previous: results.last().cloned(),
        results,
    }
}

fn outcome(task: &TaskRecord, progress: Progress) -> RunOutcome {
    RunOutcome {
        task_id: task.id,
        status: task.status,
        progress,
    }
}

fn discard(reason: DuplicateFireError, step: Option<StepRecord>) -> ResumeOutcome {
    warn!(%reason, "discarding resolution");
    ResumeOutcome::Discarded {
        reason,
        step: step.map(Box::new),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::EngineConfig;
    use crate::app::testing::{BrokenInvoker, BrokenTimer, Harness};
    use chrono::Duration;
    use crate::domain::StepSpec;
    use crate::typed::Routine;
    use crate::typed::handler::fixtures::*;
    use serde_json::json;

    #[tokio::test]
    async fn two_sync_steps_complete_with_chained_result() {
        let h = Harness::new();
        let task = h
            .task(vec![
                (Constant::NAME, CallMode::Sync, json!({"value": 1})),
                (Increment::NAME, CallMode::Sync, json!(null)),
            ])
            .await;

        let first = h.orchestrator.run(task).await.unwrap();
        assert_eq!(first.progress, Progress::Completed { ordinal: 0 });
        assert_eq!(first.status, TaskStatus::Running);

        let second = h.orchestrator.run(task).await.unwrap();
        assert_eq!(second.progress, Progress::Completed { ordinal: 1 });
        assert_eq!(second.status, TaskStatus::Completed);

        let steps = h.steps(task).await;
        assert_eq!(steps[0].result, Some(json!(1)));
        assert_eq!(steps[1].result, Some(json!(2)));
    }

    #[tokio::test]
    async fn rejected_async_step_fails_task() {
        let h = Harness::new();
        let task = h
            .task(vec![(Constant::NAME, CallMode::Async, json!({"value": 1}))])
            .await;

        let run = h.orchestrator.run(task).await.unwrap();
        let Progress::Suspended { token, .. } = run.progress else {
            panic!("expected suspension, got {:?}", run.progress);
        };
        assert_eq!(run.status, TaskStatus::Running);
        assert_eq!(h.invoker.outstanding().await, 1);

        let out = h
            .orchestrator
            .resume(&token, false, json!({"reason": "quorum not met"}))
            .await
            .unwrap();
        assert!(matches!(
            out,
            ResumeOutcome::Applied {
                step_status: StepStatus::Failed,
                task_status: TaskStatus::Failed,
                ..
            }
        ));

        let steps = h.steps(task).await;
        assert_eq!(steps[0].status, StepStatus::Failed);
        assert_eq!(
            steps[0].error,
            Some(StepError::Rejected {
                payload: json!({"reason": "quorum not met"})
            })
        );
        assert_eq!(h.status(task).await, TaskStatus::Failed);
    }

    #[tokio::test]
    async fn sync_failure_is_recorded_not_raised() {
        let h = Harness::new();
        let task = h
            .task(vec![
                (Explode::NAME, CallMode::Sync, json!(null)),
                (Constant::NAME, CallMode::Sync, json!({"value": 1})),
            ])
            .await;

        let out = h.orchestrator.run(task).await.unwrap();
        assert_eq!(out.progress, Progress::Failed { ordinal: 0 });
        assert_eq!(out.status, TaskStatus::Failed);

        let steps = h.steps(task).await;
        assert_eq!(
            steps[0].error,
            Some(StepError::Execution(ExecutionError::new("boom")))
        );
        assert_eq!(steps[1].status, StepStatus::Pending);
    }

    #[tokio::test]
    async fn run_on_terminal_task_changes_nothing() {
        let h = Harness::new();
        let task = h
            .task(vec![(Constant::NAME, CallMode::Sync, json!({"value": 3}))])
            .await;
        h.orchestrator.run(task).await.unwrap();

        let before = h.steps(task).await;
        let out = h.orchestrator.run(task).await.unwrap();
        assert_eq!(out.progress, Progress::AlreadyTerminal);
        assert_eq!(out.status, TaskStatus::Completed);
        assert_eq!(h.steps(task).await, before);
    }

    #[tokio::test]
    async fn next_step_waits_while_async_step_runs() {
        let h = Harness::new();
        let task = h
            .task(vec![
                (Constant::NAME, CallMode::Async, json!({"value": 1})),
                (Increment::NAME, CallMode::Sync, json!(null)),
            ])
            .await;

        h.orchestrator.run(task).await.unwrap();
        let before = h.steps(task).await;

        let again = h.orchestrator.run(task).await.unwrap();
        assert_eq!(again.progress, Progress::AwaitingResolution { ordinal: 0 });
        assert_eq!(h.steps(task).await, before);
        assert_eq!(before[1].status, StepStatus::Pending);
        assert_eq!(h.invoker.outstanding().await, 1);
    }

    #[tokio::test]
    async fn resume_twice_applies_once() {
        let h = Harness::new();
        let task = h
            .task(vec![
                (Constant::NAME, CallMode::Async, json!({"value": 1})),
                (Increment::NAME, CallMode::Sync, json!(null)),
            ])
            .await;
        let Progress::Suspended { token, .. } = h.orchestrator.run(task).await.unwrap().progress
        else {
            panic!("expected suspension");
        };

        let first = h.orchestrator.resume(&token, true, json!(10)).await.unwrap();
        assert!(matches!(first, ResumeOutcome::Applied { .. }));
        let after_first = h.steps(task).await;

        let second = h.orchestrator.resume(&token, false, json!("late")).await.unwrap();
        let ResumeOutcome::Discarded { reason, step } = second else {
            panic!("expected discard");
        };
        assert!(matches!(reason, DuplicateFireError::StaleContinuation { .. }));
        assert_eq!(step.map(|s| s.result.clone()), Some(Some(json!(10))));
        assert_eq!(h.steps(task).await, after_first);

        let next = h.orchestrator.run(task).await.unwrap();
        assert_eq!(next.status, TaskStatus::Completed);
        assert_eq!(h.steps(task).await[1].result, Some(json!(11)));
    }

    #[tokio::test]
    async fn unknown_token_is_discarded() {
        let h = Harness::new();
        let out = h
            .orchestrator
            .resume(&ContinuationToken::from("nobody/0/x"), true, json!(null))
            .await
            .unwrap();
        assert!(matches!(
            out,
            ResumeOutcome::Discarded {
                reason: DuplicateFireError::UnknownContinuation(_),
                step: None
            }
        ));
    }

    #[tokio::test]
    async fn unresolved_step_times_out() {
        let h = Harness::with_config(EngineConfig {
            async_timeout_secs: 30,
            ..EngineConfig::default()
        });
        let task = h
            .task(vec![(Constant::NAME, CallMode::Async, json!({"value": 1}))])
            .await;
        h.orchestrator.run(task).await.unwrap();

        assert!(h.timer.take_due().await.is_empty());
        h.clock.advance(Duration::seconds(30));
        let due = h.timer.take_due().await;
        assert_eq!(due.len(), 1);
        let Wakeup::Timeout { token } = &due[0].1 else {
            panic!("expected timeout wakeup");
        };

        let out = h.orchestrator.expire(token).await.unwrap();
        assert!(matches!(
            out,
            ResumeOutcome::Applied {
                task_status: TaskStatus::Failed,
                ..
            }
        ));
        assert_eq!(
            h.steps(task).await[0].error,
            Some(StepError::Timeout(TimeoutError { after_secs: 30 }))
        );

        let late = h.orchestrator.resume(token, true, json!(1)).await.unwrap();
        assert!(matches!(late, ResumeOutcome::Discarded { .. }));
    }

    #[tokio::test]
    async fn resolution_cancels_timeout() {
        let h = Harness::new();
        let task = h
            .task(vec![(Constant::NAME, CallMode::Async, json!({"value": 1}))])
            .await;
        let Progress::Suspended { token, .. } = h.orchestrator.run(task).await.unwrap().progress
        else {
            panic!("expected suspension");
        };
        assert_eq!(h.timer.pending().await.len(), 1);

        h.orchestrator.resume(&token, true, json!(1)).await.unwrap();
        assert!(h.timer.pending().await.is_empty());
    }

    #[tokio::test]
    async fn delayed_step_waits_for_its_delay() {
        let h = Harness::new();
        let unit = h.unit(Constant::NAME).await;
        let first = h
            .catalog
            .bind_call(unit, CallMode::Sync, json!({"value": 1}))
            .await
            .unwrap();
        let second = h
            .catalog
            .bind_call(unit, CallMode::Sync, json!({"value": 2}))
            .await
            .unwrap();
        let task = h
            .catalog
            .create_task(
                "delayed",
                vec![StepSpec::new(first), StepSpec::new(second).with_delay(60)],
            )
            .await
            .unwrap();

        h.orchestrator.run(task).await.unwrap();
        let waiting = h.orchestrator.run(task).await.unwrap();
        assert!(matches!(waiting.progress, Progress::Waiting { ordinal: 1, .. }));
        assert_eq!(h.steps(task).await[1].status, StepStatus::Pending);

        h.clock.advance(Duration::seconds(60));
        let due = h.timer.take_due().await;
        assert!(due.iter().any(|(_, w)| *w == Wakeup::Advance { task_id: task }));

        let done = h.orchestrator.run(task).await.unwrap();
        assert_eq!(done.status, TaskStatus::Completed);
    }

    #[tokio::test]
    async fn sync_completion_schedules_immediate_advance() {
        let h = Harness::new();
        let task = h
            .task(vec![
                (Constant::NAME, CallMode::Sync, json!({"value": 1})),
                (Increment::NAME, CallMode::Sync, json!(null)),
            ])
            .await;
        h.orchestrator.run(task).await.unwrap();

        let due = h.timer.take_due().await;
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].1, Wakeup::Advance { task_id: task });
    }

    #[tokio::test]
    async fn self_schedule_can_be_disabled() {
        let h = Harness::with_config(EngineConfig {
            self_schedule: false,
            ..EngineConfig::default()
        });
        let task = h
            .task(vec![
                (Constant::NAME, CallMode::Sync, json!({"value": 1})),
                (Increment::NAME, CallMode::Sync, json!(null)),
            ])
            .await;
        h.orchestrator.run(task).await.unwrap();
        assert!(h.timer.pending().await.is_empty());
    }

    #[tokio::test]
    async fn later_step_never_starts_before_earlier_is_terminal() {
        let h = Harness::new();
        let task = h
            .task(vec![
                (Constant::NAME, CallMode::Sync, json!({"value": 1})),
                (Constant::NAME, CallMode::Async, json!({"value": 2})),
                (Increment::NAME, CallMode::Sync, json!(null)),
            ])
            .await;

        for _ in 0..5 {
            h.orchestrator.run(task).await.unwrap();
            let steps = h.steps(task).await;
            for pair in steps.windows(2) {
                if pair[1].status != StepStatus::Pending {
                    assert!(pair[0].status.is_terminal());
                }
            }
        }
        assert_eq!(h.steps(task).await[2].status, StepStatus::Pending);
    }

    #[tokio::test]
    async fn unknown_task_is_not_found() {
        let h = Harness::new();
        let err = h
            .orchestrator
            .run(TaskId::from_ulid(ulid::Ulid::new()))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::NotFound { kind: "task", .. }));
    }

    #[tokio::test]
    async fn refused_timeout_leaves_step_pending() {
        let h = Harness::with_ports(EngineConfig::default(), Some(Arc::new(BrokenTimer)), None);
        let task = h
            .task(vec![(Constant::NAME, CallMode::Async, json!({"value": 1}))])
            .await;

        let err = h.orchestrator.run(task).await.unwrap_err();
        assert!(matches!(err, EngineError::Port(_)));

        let steps = h.steps(task).await;
        assert_eq!(steps[0].status, StepStatus::Pending);
        assert_eq!(steps[0].continuation_token, None);
        assert_eq!(steps[0].timeout_timer, None);
        assert_eq!(h.invoker.outstanding().await, 0);
        assert_eq!(h.status(task).await, TaskStatus::Pending);
    }

    #[tokio::test]
    async fn running_marker_carries_its_timeout() {
        let h = Harness::new();
        let task = h
            .task(vec![(Constant::NAME, CallMode::Async, json!({"value": 1}))])
            .await;
        h.orchestrator.run(task).await.unwrap();

        let steps = h.steps(task).await;
        let step = &steps[0];
        assert_eq!(step.status, StepStatus::Running);
        assert!(step.timeout_timer.is_some());
        assert!(step.suspension.is_some());
        let entry = h
            .repo
            .continuation(step.continuation_token.as_ref().unwrap())
            .await
            .unwrap();
        assert_eq!(entry.map(|e| e.step_id), Some(step.id));
    }

    #[tokio::test]
    async fn failed_issue_fails_step_and_disarms_timeout() {
        let h = Harness::with_ports(EngineConfig::default(), None, Some(Arc::new(BrokenInvoker)));
        let task = h
            .task(vec![
                (Constant::NAME, CallMode::Async, json!({"value": 1})),
                (Increment::NAME, CallMode::Sync, json!(null)),
            ])
            .await;

        let out = h.orchestrator.run(task).await.unwrap();
        assert_eq!(out.progress, Progress::Failed { ordinal: 0 });
        assert_eq!(out.status, TaskStatus::Failed);

        let steps = h.steps(task).await;
        assert_eq!(steps[0].status, StepStatus::Failed);
        assert_eq!(
            steps[0].error,
            Some(StepError::Execution(ExecutionError::new(
                "invoker unavailable: offline"
            )))
        );
        assert_eq!(steps[1].status, StepStatus::Pending);
        assert!(h.timer.pending().await.is_empty());
        assert_eq!(h.status(task).await, TaskStatus::Failed);
    }

    #[tokio::test]
    async fn stored_oversized_delay_is_refused_without_panicking() {
        let h = Harness::new();
        let task = h
            .task(vec![
                (Constant::NAME, CallMode::Sync, json!({"value": 1})),
                (Increment::NAME, CallMode::Sync, json!(null)),
            ])
            .await;
        let mut next = h.steps(task).await[1].clone();
        next.delay_seconds = u64::MAX;
        h.repo.put_step(&next).await.unwrap();

        let err = h.orchestrator.run(task).await.unwrap_err();
        assert!(matches!(
            err,
            EngineError::Validation(ValidationError::DelayOutOfRange { ordinal: 1, .. })
        ));
        assert_eq!(h.steps(task).await[1].not_before, None);
    }
}
