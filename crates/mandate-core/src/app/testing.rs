//! Engine wired to in-memory ports with a pinned clock, plus shortcuts for
//! building tasks in tests.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};

use super::builder::AppBuilder;
use super::catalog::Catalog;
use super::config::EngineConfig;
use super::orchestrator::Orchestrator;
use super::scheduler::Scheduler;
use super::status::{StatusQuery, TaskCounts};
use crate::domain::{
    CallMode, CodeUnitId, StepRecord, StepSpec, SuspensionHandle, TaskId, TaskStatus, TimerId,
    Wakeup,
};
use crate::impls::{InMemoryInvoker, ManualTimer};
use crate::ports::{AsyncInvoker, AsyncOperation, FixedClock, PortError, Timer};
use crate::store::Repository;
use crate::typed::handler::fixtures::*;

pub(crate) struct Harness {
    pub clock: Arc<FixedClock>,
    pub timer: Arc<ManualTimer>,
    pub invoker: Arc<InMemoryInvoker>,
    pub repo: Repository,
    pub catalog: Catalog,
    pub orchestrator: Orchestrator,
    pub scheduler: Scheduler,
    pub query: StatusQuery,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        Self::with_ports(config, None, None)
    }

    /// Like `with_config`, but the engine talks to `timer` / `invoker` when
    /// given instead of the harness's manual ones.
    pub fn with_ports(
        config: EngineConfig,
        timer_port: Option<Arc<dyn Timer>>,
        invoker_port: Option<Arc<dyn AsyncInvoker>>,
    ) -> Self {
        let start = Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap();
        let clock = Arc::new(FixedClock::new(start));
        let timer = Arc::new(ManualTimer::new(clock.clone()));
        let invoker = Arc::new(InMemoryInvoker::new());

        let app = AppBuilder::new()
            .register::<Constant, _>(ConstantHandler)
            .unwrap()
            .register::<Increment, _>(IncrementHandler)
            .unwrap()
            .register::<Explode, _>(ExplodeHandler)
            .unwrap()
            .with_clock(clock.clone())
            .with_timer(timer_port.unwrap_or_else(|| timer.clone() as Arc<dyn Timer>))
            .with_invoker(invoker_port.unwrap_or_else(|| invoker.clone() as Arc<dyn AsyncInvoker>))
            .with_config(config)
            .build()
            .unwrap();

        Self {
            clock,
            timer,
            invoker,
            repo: app.repo,
            catalog: app.catalog,
            orchestrator: app.orchestrator,
            scheduler: app.scheduler,
            query: app.query,
        }
    }

    pub async fn unit(&self, routine: &str) -> CodeUnitId {
        self.catalog.create_code_unit(routine).await.unwrap()
    }

    /// Create a task with one fresh unit and call per `(routine, mode, args)`.
    pub async fn task(&self, steps: Vec<(&str, CallMode, serde_json::Value)>) -> TaskId {
        let mut specs = Vec::with_capacity(steps.len());
        for (routine, mode, args) in steps {
            let unit = self.unit(routine).await;
            let call = self.catalog.bind_call(unit, mode, args).await.unwrap();
            specs.push(StepSpec::new(call));
        }
        self.catalog.create_task("test task", specs).await.unwrap()
    }

    pub async fn steps(&self, task_id: TaskId) -> Vec<StepRecord> {
        let task = self.repo.task(task_id).await.unwrap().unwrap();
        self.repo.steps_of(&task).await.unwrap()
    }

    pub async fn status(&self, task_id: TaskId) -> TaskStatus {
        self.repo.task(task_id).await.unwrap().unwrap().status
    }

    pub async fn counts(&self) -> TaskCounts {
        self.query.counts().await.unwrap()
    }
}

/// Timer that refuses every request.
pub(crate) struct BrokenTimer;

#[async_trait]
impl Timer for BrokenTimer {
    async fn schedule(&self, _: u64, _: Wakeup) -> Result<TimerId, PortError> {
        Err(PortError::new("timer", "unreachable"))
    }

    async fn cancel(&self, _: &TimerId) -> Result<(), PortError> {
        Ok(())
    }
}

/// Invoker whose host is offline.
pub(crate) struct BrokenInvoker;

#[async_trait]
impl AsyncInvoker for BrokenInvoker {
    async fn issue(&self, _: AsyncOperation) -> Result<SuspensionHandle, PortError> {
        Err(PortError::new("invoker", "offline"))
    }
}
