//! Domain model: code units, calls, steps, tasks, schedules.
//!
//! Records are plain serializable data. Every state transition is a method on
//! the record it changes; nothing here touches the store or the host.

pub mod code_unit;
pub mod continuation;
pub mod errors;
pub mod ids;
pub mod schedule;
pub mod step;
pub mod task;

pub use code_unit::{Call, CallMode, CodeUnit};
pub use continuation::{ContinuationToken, Wakeup};
pub use errors::{
    DuplicateFireError, ExecutionError, StepError, TimeoutError, TransitionError, ValidationError,
};
pub use ids::{CallId, CodeUnitId, ScheduleId, StepId, TaskId, TemplateId};
pub use schedule::{Recurrence, ScheduleRecord};
pub use step::{MAX_DELAY_SECS, StepRecord, StepStatus, SuspensionHandle, TimerId, after_delay};
pub use task::{StepSpec, StepTemplate, TaskRecord, TaskStatus, TaskTemplate, TemplateRecord};
