//! Scheduler - recurring task instantiation.
//!
//! Each armed fire carries the `next_fire_time` it was registered for. A fire
//! is accepted only while that token still matches the persisted schedule;
//! the advance is persisted before the task is created, so a redelivered
//! fire never produces a second task.

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use super::catalog::Catalog;
use super::context::Context;
use super::orchestrator::Orchestrator;
use crate::domain::{
    DuplicateFireError, Recurrence, ScheduleId, ScheduleRecord, TaskId, TaskStatus, TemplateId,
    ValidationError, Wakeup,
};
use crate::error::EngineError;
use crate::ports::PortError;

#[derive(Debug, Clone, PartialEq)]
pub enum FireOutcome {
    /// A new task was created and advanced once.
    Fired { task_id: TaskId, status: TaskStatus },
    /// The schedule is disabled; nothing was created.
    Disabled,
    /// The fire token is stale; nothing changed.
    Discarded(DuplicateFireError),
}

#[derive(Clone)]
pub struct Scheduler {
    ctx: Context,
    catalog: Catalog,
    orchestrator: Orchestrator,
}

impl Scheduler {
    pub(crate) fn new(ctx: Context, catalog: Catalog, orchestrator: Orchestrator) -> Self {
        Self {
            ctx,
            catalog,
            orchestrator,
        }
    }

    pub async fn create_schedule(
        &self,
        template_id: TemplateId,
        recurrence: &str,
    ) -> Result<ScheduleId, EngineError> {
        let recurrence: Recurrence = recurrence.parse()?;
        if self.ctx.repo.template(template_id).await?.is_none() {
            return Err(ValidationError::UnknownTemplate(template_id).into());
        }

        let now = self.ctx.clock.now();
        let mut schedule =
            ScheduleRecord::new(self.ctx.ids.schedule_id(), template_id, recurrence, now);
        self.arm(&mut schedule, now).await?;
        self.ctx.repo.put_schedule(&schedule).await?;

        info!(
            schedule_id = %schedule.id,
            template = %template_id,
            %recurrence,
            next_fire = %schedule.next_fire_time,
            "schedule created"
        );
        Ok(schedule.id)
    }

    /// Stop creating tasks. Tasks already in flight are untouched.
    pub async fn disable_schedule(&self, schedule_id: ScheduleId) -> Result<(), EngineError> {
        let mut schedule = self.load(schedule_id).await?;
        if !schedule.enabled {
            return Ok(());
        }

        schedule.enabled = false;
        schedule.updated_at = self.ctx.clock.now();
        if let Some(timer_id) = schedule.fire_timer.take()
            && let Err(err) = self.ctx.timer.cancel(&timer_id).await
        {
            warn!(%schedule_id, error = %err, "could not cancel fire timer");
        }
        self.ctx.repo.put_schedule(&schedule).await?;
        info!(%schedule_id, "schedule disabled");
        Ok(())
    }

    /// Resume firing, counting the next fire from now.
    pub async fn enable_schedule(&self, schedule_id: ScheduleId) -> Result<(), EngineError> {
        let mut schedule = self.load(schedule_id).await?;
        if schedule.enabled {
            return Ok(());
        }

        let now = self.ctx.clock.now();
        schedule.enabled = true;
        schedule.next_fire_time = schedule.recurrence.first_after(now);
        schedule.updated_at = now;
        self.arm(&mut schedule, now).await?;
        self.ctx.repo.put_schedule(&schedule).await?;
        info!(%schedule_id, next_fire = %schedule.next_fire_time, "schedule enabled");
        Ok(())
    }

    /// Handle a fire registered for `fire_token`.
    pub async fn fire(
        &self,
        schedule_id: ScheduleId,
        fire_token: DateTime<Utc>,
    ) -> Result<FireOutcome, EngineError> {
        let mut schedule = self.load(schedule_id).await?;
        if !schedule.enabled {
            info!(%schedule_id, "schedule disabled, fire ignored");
            return Ok(FireOutcome::Disabled);
        }
        if !schedule.accepts(fire_token) {
            let reason = DuplicateFireError::StaleScheduleFire { schedule_id };
            warn!(%reason, %fire_token, expected = %schedule.next_fire_time, "discarding fire");
            return Ok(FireOutcome::Discarded(reason));
        }

        let now = self.ctx.clock.now();
        schedule.advance(now, self.ctx.config.max_catch_up);
        schedule.fire_timer = None;
        if schedule.enabled
            && let Err(err) = self.arm(&mut schedule, now).await
        {
            warn!(%schedule_id, error = %err, "could not arm next fire");
        }
        self.ctx.repo.put_schedule(&schedule).await?;

        let task_id = self
            .catalog
            .instantiate(schedule.template_id, Some(schedule_id))
            .await?;
        info!(
            %schedule_id,
            %task_id,
            fired = schedule.fired_count,
            next_fire = %schedule.next_fire_time,
            enabled = schedule.enabled,
            "schedule fired"
        );

        let run = self.orchestrator.run(task_id).await?;
        Ok(FireOutcome::Fired {
            task_id,
            status: run.status,
        })
    }

    pub async fn schedule(&self, schedule_id: ScheduleId) -> Result<ScheduleRecord, EngineError> {
        self.load(schedule_id).await
    }

    async fn load(&self, schedule_id: ScheduleId) -> Result<ScheduleRecord, EngineError> {
        self.ctx
            .repo
            .schedule(schedule_id)
            .await?
            .ok_or_else(|| EngineError::not_found("schedule", schedule_id))
    }

    /// Register the timer for the schedule's next fire.
    async fn arm(&self, schedule: &mut ScheduleRecord, now: DateTime<Utc>) -> Result<(), PortError> {
        let millis = (schedule.next_fire_time - now).num_milliseconds().max(0);
        let delay = ((millis + 999) / 1_000) as u64;
        let wakeup = Wakeup::FireSchedule {
            schedule_id: schedule.id,
            fire_token: schedule.next_fire_time,
        };
        schedule.fire_timer = Some(self.ctx.timer.schedule(delay, wakeup).await?);
        Ok(())
    }
}
