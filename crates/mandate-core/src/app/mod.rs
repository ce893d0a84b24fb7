//! App - the engine's operations over the ports.
//!
//! - **Catalog**: code units, calls, templates, task creation
//! - **Orchestrator**: `run` / `resume` / `expire`, one transition per call
//! - **Scheduler**: recurring instantiation with fire tokens
//! - **StatusQuery**: task snapshots and counts
//! - **AppBuilder** / **App**: wiring and the host-facing surface

pub mod builder;
pub mod catalog;
pub mod config;
mod context;
pub mod executor;
pub mod orchestrator;
pub mod scheduler;
pub mod status;

#[cfg(test)]
pub(crate) mod testing;

pub use self::builder::{App, AppBuilder, BuildError, WakeupOutcome};
pub use self::catalog::Catalog;
pub use self::config::EngineConfig;
pub use self::executor::{CallExecutor, Execution};
pub use self::orchestrator::{Orchestrator, Progress, ResumeOutcome, RunOutcome};
pub use self::scheduler::{FireOutcome, Scheduler};
pub use self::status::{StatusQuery, StepView, TaskCounts, TaskStatusView};
