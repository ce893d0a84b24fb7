//! Creation of code units, calls, templates and tasks.
//!
//! Everything here validates fully before the first write, so a
//! `ValidationError` never leaves partial records behind.

use tracing::{debug, info};

use super::context::Context;
use crate::domain::{
    Call, CallId, CallMode, CodeUnit, CodeUnitId, ScheduleId, StepRecord, StepSpec, TaskId,
    TaskRecord, TaskTemplate, TemplateId, TemplateRecord, ValidationError, Wakeup, after_delay,
};
use crate::domain::task::{check_delay, validate_shape};
use crate::error::EngineError;

#[derive(Clone)]
pub struct Catalog {
    ctx: Context,
}

impl Catalog {
    pub(crate) fn new(ctx: Context) -> Self {
        Self { ctx }
    }

    /// Store a code unit; `source` names a registered routine.
    pub async fn create_code_unit(&self, source: &str) -> Result<CodeUnitId, EngineError> {
        let unit = CodeUnit::new(self.ctx.ids.code_unit_id(), source, self.ctx.clock.now())?;
        self.ctx.repo.put_code_unit(&unit).await?;
        info!(unit = %unit.id, source = %unit.source, checksum = %unit.checksum, "code unit created");
        Ok(unit.id)
    }

    pub async fn bind_call(
        &self,
        code_unit: CodeUnitId,
        mode: CallMode,
        args: serde_json::Value,
    ) -> Result<CallId, EngineError> {
        self.require_unit(code_unit).await?;
        let call = Call::new(self.ctx.ids.call_id(), code_unit, mode, args);
        self.ctx.repo.put_call(&call).await?;
        Ok(call.id)
    }

    pub async fn register_template(&self, template: TaskTemplate) -> Result<TemplateId, EngineError> {
        template.validate()?;
        for step in &template.steps {
            if let Some(unit) = step.code_unit {
                self.require_unit(unit).await?;
            }
        }
        let record = TemplateRecord {
            id: self.ctx.ids.template_id(),
            template,
            created_at: self.ctx.clock.now(),
        };
        self.ctx.repo.put_template(&record).await?;
        info!(template = %record.id, name = %record.template.name, "template registered");
        Ok(record.id)
    }

    /// Create a task from already-bound calls.
    pub async fn create_task(&self, name: &str, steps: Vec<StepSpec>) -> Result<TaskId, EngineError> {
        validate_shape(name, steps.len())?;
        let mut calls = Vec::with_capacity(steps.len());
        for (ordinal, spec) in steps.iter().enumerate() {
            let call_id = spec.call.ok_or(ValidationError::MissingCall {
                ordinal: ordinal as u32,
            })?;
            check_delay(ordinal, spec.delay_seconds)?;
            if self.ctx.repo.call(call_id).await?.is_none() {
                return Err(ValidationError::UnknownCall(call_id).into());
            }
            calls.push((call_id, spec.delay_seconds));
        }
        self.persist_task(name, calls, None).await
    }

    /// Create a task from a template, binding fresh calls for every step.
    pub async fn instantiate(
        &self,
        template_id: TemplateId,
        schedule_id: Option<ScheduleId>,
    ) -> Result<TaskId, EngineError> {
        let record = self
            .ctx
            .repo
            .template(template_id)
            .await?
            .ok_or(ValidationError::UnknownTemplate(template_id))?;
        let template = record.template;
        template.validate()?;

        let mut calls = Vec::with_capacity(template.steps.len());
        for (ordinal, step) in template.steps.iter().enumerate() {
            let unit = step.code_unit.ok_or(ValidationError::MissingCall {
                ordinal: ordinal as u32,
            })?;
            self.require_unit(unit).await?;
            let call = Call::new(self.ctx.ids.call_id(), unit, step.mode, step.args.clone());
            calls.push((call, step.delay_seconds));
        }

        let mut bound = Vec::with_capacity(calls.len());
        for (call, delay) in calls {
            self.ctx.repo.put_call(&call).await?;
            bound.push((call.id, delay));
        }
        self.persist_task(&template.name, bound, schedule_id).await
    }

    /// Write the steps and the task. A delayed first step gets its `Advance`
    /// wakeup armed before anything is written.
    async fn persist_task(
        &self,
        name: &str,
        calls: Vec<(CallId, u64)>,
        schedule_id: Option<ScheduleId>,
    ) -> Result<TaskId, EngineError> {
        let now = self.ctx.clock.now();
        let task_id = self.ctx.ids.task_id();

        let mut steps = Vec::with_capacity(calls.len());
        for (ordinal, (call_id, delay)) in calls.into_iter().enumerate() {
            let mut step = StepRecord::new(
                self.ctx.ids.step_id(),
                task_id,
                call_id,
                ordinal as u32,
                delay,
                now,
            );
            if ordinal == 0 {
                let not_before = after_delay(now, delay).ok_or(ValidationError::DelayOutOfRange {
                    ordinal: 0,
                    delay_seconds: delay,
                })?;
                step.not_before = Some(not_before);
            }
            steps.push(step);
        }

        let first_delay = steps.first().map_or(0, |s| s.delay_seconds);
        if first_delay > 0 && self.ctx.config.self_schedule {
            self.ctx
                .timer
                .schedule(first_delay, Wakeup::Advance { task_id })
                .await?;
            debug!(%task_id, delay = first_delay, "first step advance armed");
        }

        for step in &steps {
            self.ctx.repo.put_step(step).await?;
        }
        let task = TaskRecord::new(
            task_id,
            name.to_string(),
            steps.iter().map(|s| s.id).collect(),
            schedule_id,
            now,
        );
        self.ctx.repo.put_task(&task).await?;

        info!(task_id = %task.id, name = %task.name, steps = task.step_ids.len(), "task created");
        Ok(task.id)
    }

    async fn require_unit(&self, id: CodeUnitId) -> Result<(), EngineError> {
        match self.ctx.repo.code_unit(id).await? {
            Some(_) => Ok(()),
            None => Err(ValidationError::UnknownCodeUnit(id).into()),
        }
    }
}
