//! IdGenerator port.
//!
//! IDs are ULIDs whose timestamp comes from the [`Clock`], so a pinned clock
//! pins the time component while the random part keeps IDs unique.

use ulid::Ulid;

use crate::domain::ids::{CallId, CodeUnitId, ScheduleId, StepId, TaskId, TemplateId};
use crate::ports::Clock;

pub trait IdGenerator: Send + Sync {
    fn next_ulid(&self) -> Ulid;

    fn code_unit_id(&self) -> CodeUnitId {
        self.next_ulid().into()
    }

    fn call_id(&self) -> CallId {
        self.next_ulid().into()
    }

    fn step_id(&self) -> StepId {
        self.next_ulid().into()
    }

    fn task_id(&self) -> TaskId {
        self.next_ulid().into()
    }

    fn template_id(&self) -> TemplateId {
        self.next_ulid().into()
    }

    fn schedule_id(&self) -> ScheduleId {
        self.next_ulid().into()
    }
}

/// ULID generator driven by a clock.
pub struct UlidGenerator<C> {
    clock: C,
}

impl<C: Clock> UlidGenerator<C> {
    pub fn new(clock: C) -> Self {
        Self { clock }
    }
}

impl<C: Clock> IdGenerator for UlidGenerator<C> {
    fn next_ulid(&self) -> Ulid {
        let timestamp_ms = self.clock.now().timestamp_millis() as u64;
        Ulid::from_parts(timestamp_ms, rand::random())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::{FixedClock, SystemClock};
    use chrono::{TimeZone, Utc};

    #[test]
    fn ulid_generator_generates_unique_ids() {
        let id_gen = UlidGenerator::new(SystemClock);

        let id1 = id_gen.task_id();
        let id2 = id_gen.task_id();
        assert_ne!(id1, id2);
    }

    #[test]
    fn fixed_clock_pins_timestamp() {
        let fixed_time = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let id_gen = UlidGenerator::new(FixedClock::new(fixed_time));

        let id1 = id_gen.step_id();
        let id2 = id_gen.step_id();
        assert_ne!(id1, id2);
        assert_eq!(id1.as_ulid().timestamp_ms(), fixed_time.timestamp_millis() as u64);
        assert_eq!(id2.as_ulid().timestamp_ms(), fixed_time.timestamp_millis() as u64);
    }

    #[test]
    fn prefixes_follow_entity() {
        let id_gen = UlidGenerator::new(SystemClock);
        assert!(id_gen.code_unit_id().to_string().starts_with("unit-"));
        assert!(id_gen.call_id().to_string().starts_with("call-"));
        assert!(id_gen.schedule_id().to_string().starts_with("sched-"));
    }
}
