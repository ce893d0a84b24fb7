//! AppBuilder - wiring and startup validation.
//!
//! Routines are registered up front; `expect_routines` names the ones the
//! host relies on, and `build()` refuses to start when any is missing.

use std::sync::Arc;

use super::catalog::Catalog;
use super::config::EngineConfig;
use super::context::Context;
use super::orchestrator::{Orchestrator, ResumeOutcome, RunOutcome};
use super::scheduler::{FireOutcome, Scheduler};
use super::status::{StatusQuery, TaskCounts, TaskStatusView};
use crate::domain::{
    CallId, CallMode, CodeUnitId, ContinuationToken, ScheduleId, ScheduleRecord, StepSpec, TaskId,
    TaskTemplate, TemplateId, Wakeup,
};
use crate::error::EngineError;
use crate::impls::InMemoryKvStore;
use crate::ports::{AsyncInvoker, Clock, IdGenerator, KvStore, Sandbox, SystemClock, Timer, UlidGenerator};
use crate::store::Repository;
use crate::typed::{Handler, RegistryError, RegistrySandbox, Routine, TypedRegistry};

/// # Example
/// ```ignore
/// let app = AppBuilder::new()
///     .register::<Tally, _>(TallyHandler)?
///     .expect_routines(&[Tally::NAME])
///     .with_timer(timer)
///     .with_invoker(invoker)
///     .build()?;
/// ```
pub struct AppBuilder {
    registry: TypedRegistry,
    expected_routines: Option<Vec<String>>,
    store: Option<Arc<dyn KvStore>>,
    clock: Option<Arc<dyn Clock>>,
    ids: Option<Arc<dyn IdGenerator>>,
    timer: Option<Arc<dyn Timer>>,
    invoker: Option<Arc<dyn AsyncInvoker>>,
    sandbox: Option<Arc<dyn Sandbox>>,
    config: EngineConfig,
}

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("missing routines: {0:?}. These routines were expected but not registered.")]
    MissingRoutines(Vec<String>),

    /// The host must supply this port; there is no default.
    #[error("no {0} configured")]
    MissingPort(&'static str),
}

impl AppBuilder {
    pub fn new() -> Self {
        Self {
            registry: TypedRegistry::new(),
            expected_routines: None,
            store: None,
            clock: None,
            ids: None,
            timer: None,
            invoker: None,
            sandbox: None,
            config: EngineConfig::default(),
        }
    }

    pub fn register<R: Routine, H: Handler<R> + 'static>(
        mut self,
        handler: H,
    ) -> Result<Self, RegistryError> {
        self.registry.register::<R, H>(handler)?;
        Ok(self)
    }

    pub fn expect_routines(mut self, names: &[&str]) -> Self {
        self.expected_routines = Some(names.iter().map(|n| n.to_string()).collect());
        self
    }

    /// Defaults to [`InMemoryKvStore`].
    pub fn with_store(mut self, store: Arc<dyn KvStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Defaults to [`SystemClock`].
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Defaults to a [`UlidGenerator`] on the configured clock.
    pub fn with_ids(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = Some(ids);
        self
    }

    pub fn with_timer(mut self, timer: Arc<dyn Timer>) -> Self {
        self.timer = Some(timer);
        self
    }

    pub fn with_invoker(mut self, invoker: Arc<dyn AsyncInvoker>) -> Self {
        self.invoker = Some(invoker);
        self
    }

    /// Defaults to a [`RegistrySandbox`] over the registered routines.
    pub fn with_sandbox(mut self, sandbox: Arc<dyn Sandbox>) -> Self {
        self.sandbox = Some(sandbox);
        self
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> Result<App, BuildError> {
        if let Some(expected) = &self.expected_routines {
            let missing: Vec<String> = expected
                .iter()
                .filter(|name| !self.registry.contains(name))
                .cloned()
                .collect();
            if !missing.is_empty() {
                return Err(BuildError::MissingRoutines(missing));
            }
        }

        let timer = self.timer.ok_or(BuildError::MissingPort("timer"))?;
        let invoker = self.invoker.ok_or(BuildError::MissingPort("async invoker"))?;
        let clock: Arc<dyn Clock> = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let ids = self
            .ids
            .unwrap_or_else(|| Arc::new(UlidGenerator::new(clock.clone())));
        let store = self
            .store
            .unwrap_or_else(|| Arc::new(InMemoryKvStore::new()));
        let registry = Arc::new(self.registry);
        let sandbox = self
            .sandbox
            .unwrap_or_else(|| Arc::new(RegistrySandbox::new(registry.clone())));

        let ctx = Context {
            repo: Repository::new(store),
            clock,
            ids,
            timer,
            invoker,
            sandbox,
            config: self.config,
        };
        let catalog = Catalog::new(ctx.clone());
        let orchestrator = Orchestrator::new(ctx.clone());
        let scheduler = Scheduler::new(ctx.clone(), catalog.clone(), orchestrator.clone());
        let query = StatusQuery::new(ctx.clone());

        Ok(App {
            registry,
            repo: ctx.repo,
            catalog,
            orchestrator,
            scheduler,
            query,
        })
    }
}

impl Default for AppBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// What delivering a wakeup did.
#[derive(Debug, Clone, PartialEq)]
pub enum WakeupOutcome {
    Advanced(RunOutcome),
    TimedOut(ResumeOutcome),
    Fired(FireOutcome),
}

/// The engine as the host sees it.
///
/// Every method is one invocation: it reads persisted state, applies one
/// transition and returns.
pub struct App {
    registry: Arc<TypedRegistry>,
    pub(crate) repo: Repository,
    pub(crate) catalog: Catalog,
    pub(crate) orchestrator: Orchestrator,
    pub(crate) scheduler: Scheduler,
    pub(crate) query: StatusQuery,
}

impl App {
    pub fn registry(&self) -> &TypedRegistry {
        &self.registry
    }

    pub async fn create_code_unit(&self, source: &str) -> Result<CodeUnitId, EngineError> {
        self.catalog.create_code_unit(source).await
    }

    pub async fn bind_call(
        &self,
        code_unit: CodeUnitId,
        mode: CallMode,
        args: serde_json::Value,
    ) -> Result<CallId, EngineError> {
        self.catalog.bind_call(code_unit, mode, args).await
    }

    pub async fn register_template(
        &self,
        template: TaskTemplate,
    ) -> Result<TemplateId, EngineError> {
        self.catalog.register_template(template).await
    }

    pub async fn create_task(
        &self,
        name: &str,
        steps: Vec<StepSpec>,
    ) -> Result<TaskId, EngineError> {
        self.catalog.create_task(name, steps).await
    }

    pub async fn create_task_from_template(
        &self,
        template_id: TemplateId,
    ) -> Result<TaskId, EngineError> {
        self.catalog.instantiate(template_id, None).await
    }

    pub async fn run_task(&self, task_id: TaskId) -> Result<RunOutcome, EngineError> {
        self.orchestrator.run(task_id).await
    }

    pub async fn resume(
        &self,
        token: &ContinuationToken,
        success: bool,
        payload: serde_json::Value,
    ) -> Result<ResumeOutcome, EngineError> {
        self.orchestrator.resume(token, success, payload).await
    }

    pub async fn get_task_status(&self, task_id: TaskId) -> Result<TaskStatusView, EngineError> {
        self.query.get_task_status(task_id).await
    }

    pub async fn counts(&self) -> Result<TaskCounts, EngineError> {
        self.query.counts().await
    }

    pub async fn schedules(&self) -> Result<Vec<ScheduleRecord>, EngineError> {
        self.query.schedules().await
    }

    pub async fn create_schedule(
        &self,
        template_id: TemplateId,
        recurrence: &str,
    ) -> Result<ScheduleId, EngineError> {
        self.scheduler.create_schedule(template_id, recurrence).await
    }

    pub async fn disable_schedule(&self, schedule_id: ScheduleId) -> Result<(), EngineError> {
        self.scheduler.disable_schedule(schedule_id).await
    }

    pub async fn enable_schedule(&self, schedule_id: ScheduleId) -> Result<(), EngineError> {
        self.scheduler.enable_schedule(schedule_id).await
    }

    pub async fn schedule(&self, schedule_id: ScheduleId) -> Result<ScheduleRecord, EngineError> {
        self.scheduler.schedule(schedule_id).await
    }

    /// Deliver a timer wakeup.
    pub async fn handle_wakeup(&self, wakeup: Wakeup) -> Result<WakeupOutcome, EngineError> {
        match wakeup {
            Wakeup::Advance { task_id } => {
                self.orchestrator.run(task_id).await.map(WakeupOutcome::Advanced)
            }
            Wakeup::Timeout { token } => {
                self.orchestrator.expire(&token).await.map(WakeupOutcome::TimedOut)
            }
            Wakeup::FireSchedule {
                schedule_id,
                fire_token,
            } => self
                .scheduler
                .fire(schedule_id, fire_token)
                .await
                .map(WakeupOutcome::Fired),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::orchestrator::Progress;
    use crate::domain::{StepTemplate, TaskStatus, ValidationError};
    use crate::impls::{InMemoryInvoker, ManualTimer};
    use crate::ports::FixedClock;
    use crate::typed::handler::fixtures::*;
    use chrono::{Duration, Utc};
    use serde_json::json;

    fn builder() -> (AppBuilder, Arc<ManualTimer>, Arc<InMemoryInvoker>, Arc<FixedClock>) {
        let clock = Arc::new(FixedClock::new(Utc::now()));
        let timer = Arc::new(ManualTimer::new(clock.clone()));
        let invoker = Arc::new(InMemoryInvoker::new());
        let builder = AppBuilder::new()
            .with_clock(clock.clone())
            .with_timer(timer.clone())
            .with_invoker(invoker.clone());
        (builder, timer, invoker, clock)
    }

    #[test]
    fn build_succeeds_with_expected_routines() {
        let (builder, ..) = builder();
        let app = builder
            .register::<Constant, _>(ConstantHandler)
            .unwrap()
            .expect_routines(&[Constant::NAME])
            .build()
            .unwrap();
        assert_eq!(app.registry().registered_routines(), vec![Constant::NAME]);
    }

    #[test]
    fn build_fails_on_missing_routines() {
        let (builder, ..) = builder();
        let app = builder
            .register::<Constant, _>(ConstantHandler)
            .unwrap()
            .expect_routines(&[Constant::NAME, Increment::NAME])
            .build();
        assert!(matches!(
            app,
            Err(BuildError::MissingRoutines(missing)) if missing == vec![Increment::NAME.to_string()]
        ));
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let (builder, ..) = builder();
        let err = builder
            .register::<Constant, _>(ConstantHandler)
            .unwrap()
            .register::<Constant, _>(ConstantHandler)
            .err()
            .unwrap();
        assert!(matches!(err, RegistryError::AlreadyRegistered(name) if name == Constant::NAME));
    }

    #[test]
    fn timer_is_required() {
        let app = AppBuilder::new()
            .with_invoker(Arc::new(InMemoryInvoker::new()))
            .build();
        assert!(matches!(app, Err(BuildError::MissingPort("timer"))));
    }

    #[tokio::test]
    async fn wakeups_drive_a_template_to_completion() {
        let (builder, timer, invoker, clock) = builder();
        let app = builder
            .register::<Constant, _>(ConstantHandler)
            .unwrap()
            .register::<Increment, _>(IncrementHandler)
            .unwrap()
            .build()
            .unwrap();

        let constant = app.create_code_unit(Constant::NAME).await.unwrap();
        let increment = app.create_code_unit(Increment::NAME).await.unwrap();
        let template = app
            .register_template(TaskTemplate::new(
                "quarterly grant",
                vec![
                    StepTemplate::async_op(constant).with_args(json!({"value": 1})),
                    StepTemplate::sync(increment).with_delay(30),
                ],
            ))
            .await
            .unwrap();
        let task = app.create_task_from_template(template).await.unwrap();

        let run = app.run_task(task).await.unwrap();
        assert!(matches!(run.progress, Progress::Suspended { ordinal: 0, .. }));

        let op = invoker.drain().await.remove(0);
        app.resume(&op.operation.continuation, true, json!(41))
            .await
            .unwrap();

        clock.advance(Duration::seconds(30));
        for (_, wakeup) in timer.take_due().await {
            app.handle_wakeup(wakeup).await.unwrap();
        }

        let view = app.get_task_status(task).await.unwrap();
        assert_eq!(view.status, TaskStatus::Completed);
        assert_eq!(view.steps[1].result, Some(json!(42)));
        assert_eq!(app.counts().await.unwrap().completed, 1);
    }

    #[tokio::test]
    async fn step_without_call_is_rejected() {
        let (builder, ..) = builder();
        let app = builder.build().unwrap();
        let err = app
            .create_task("payout", vec![StepSpec { call: None, delay_seconds: 0 }])
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::Validation(ValidationError::MissingCall { ordinal: 0 })
        ));
        assert_eq!(app.counts().await.unwrap().total(), 0);
    }

    #[tokio::test]
    async fn unknown_code_unit_cannot_be_bound() {
        let (builder, ..) = builder();
        let app = builder.build().unwrap();
        let err = app
            .bind_call(
                CodeUnitId::from_ulid(ulid::Ulid::new()),
                CallMode::Sync,
                json!(null),
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::Validation(ValidationError::UnknownCodeUnit(_))
        ));
    }
}
