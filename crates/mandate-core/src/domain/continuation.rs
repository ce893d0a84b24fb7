//! Continuation tokens and host wakeups.

use std::fmt;

use serde::{Deserialize, Serialize};
use ulid::Ulid;

use super::ids::{ScheduleId, TaskId};

/// Opaque value correlating an issued async operation with the step awaiting
/// its resolution.
///
/// The token embeds the task and ordinal for diagnostics, plus a fresh nonce
/// so two issues for the same step never share a token.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContinuationToken(String);

impl ContinuationToken {
    pub fn issue(task_id: TaskId, ordinal: u32, nonce: Ulid) -> Self {
        Self(format!("{task_id}/{ordinal}/{nonce}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for ContinuationToken {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ContinuationToken {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl fmt::Display for ContinuationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Callback reference handed to the timer port.
///
/// When the timer fires, the host delivers the wakeup back to the engine as a
/// fresh invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "wakeup", rename_all = "snake_case")]
pub enum Wakeup {
    /// Advance the task by one step.
    Advance { task_id: TaskId },

    /// Fail the step holding `token` if it is still unresolved.
    Timeout { token: ContinuationToken },

    /// Fire the schedule; `fire_token` is the fire time this wakeup was
    /// registered for.
    FireSchedule {
        schedule_id: ScheduleId,
        fire_token: chrono::DateTime<chrono::Utc>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens_for_same_step_differ() {
        let task = TaskId::from_ulid(Ulid::new());
        let a = ContinuationToken::issue(task, 0, Ulid::new());
        let b = ContinuationToken::issue(task, 0, Ulid::new());
        assert_ne!(a, b);
        assert!(a.as_str().starts_with(&format!("{task}/0/")));
    }

    #[test]
    fn wakeup_is_tagged() {
        let task_id = TaskId::from_ulid(Ulid::new());
        let v = serde_json::to_value(Wakeup::Advance { task_id }).unwrap();
        assert_eq!(v["wakeup"], "advance");
    }
}
