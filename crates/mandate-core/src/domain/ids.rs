//! Domain identifiers (strongly-typed IDs).
//!
//! Every persisted entity is keyed by a ULID wrapped in `Id<T>`, where `T` is
//! a zero-sized marker. ULIDs sort by creation time, so iterating a key prefix
//! yields entities in creation order, and the marker keeps a `StepId` from
//! being passed where a `TaskId` is expected.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::marker::PhantomData;
use std::str::FromStr;
use ulid::Ulid;

/// Marker trait for each ID kind.
///
/// The prefix is used by `Display` and by store keys.
pub trait IdMarker: Send + Sync + 'static {
    fn prefix() -> &'static str;
}

/// Generic ULID-backed identifier.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Id<T: IdMarker> {
    ulid: Ulid,
    #[serde(skip)]
    _marker: PhantomData<T>,
}

impl<T: IdMarker> Id<T> {
    pub fn from_ulid(ulid: Ulid) -> Self {
        Self {
            ulid,
            _marker: PhantomData,
        }
    }

    pub fn as_ulid(&self) -> Ulid {
        self.ulid
    }
}

impl<T: IdMarker> From<Ulid> for Id<T> {
    fn from(ulid: Ulid) -> Self {
        Self::from_ulid(ulid)
    }
}

impl<T: IdMarker> fmt::Display for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", T::prefix(), self.ulid)
    }
}

/// Error returned when a string is not a well-formed prefixed ULID.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("malformed id '{0}'")]
pub struct ParseIdError(pub String);

impl<T: IdMarker> FromStr for Id<T> {
    type Err = ParseIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s
            .strip_prefix(T::prefix())
            .ok_or_else(|| ParseIdError(s.to_string()))?;
        let ulid = Ulid::from_string(raw).map_err(|_| ParseIdError(s.to_string()))?;
        Ok(Self::from_ulid(ulid))
    }
}

macro_rules! id_marker {
    ($(#[$doc:meta])* $marker:ident, $prefix:literal) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum $marker {}

        impl IdMarker for $marker {
            fn prefix() -> &'static str {
                $prefix
            }
        }
    };
}

id_marker!(
    /// Marker for code units.
    CodeUnit,
    "unit-"
);
id_marker!(
    /// Marker for calls.
    Call,
    "call-"
);
id_marker!(
    /// Marker for steps.
    Step,
    "step-"
);
id_marker!(
    /// Marker for tasks.
    Task,
    "task-"
);
id_marker!(
    /// Marker for task templates.
    Template,
    "tmpl-"
);
id_marker!(
    /// Marker for schedules.
    Schedule,
    "sched-"
);

/// Identifier of an executable unit.
pub type CodeUnitId = Id<CodeUnit>;

/// Identifier of a call (code unit + mode + args).
pub type CallId = Id<Call>;

/// Identifier of one step of a task.
pub type StepId = Id<Step>;

/// Identifier of a workflow instance.
pub type TaskId = Id<Task>;

/// Identifier of a task template.
pub type TemplateId = Id<Template>;

/// Identifier of a recurrence rule.
pub type ScheduleId = Id<Schedule>;
