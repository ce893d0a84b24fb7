//! Key layout.
//!
//! One namespace per record kind. IDs are ULIDs, so a prefix scan returns
//! records in creation order.

use std::fmt::Display;

use crate::domain::ContinuationToken;

pub(crate) const CODE_UNITS: &str = "units/";
pub(crate) const CALLS: &str = "calls/";
pub(crate) const STEPS: &str = "steps/";
pub(crate) const TASKS: &str = "tasks/";
pub(crate) const TEMPLATES: &str = "templates/";
pub(crate) const SCHEDULES: &str = "schedules/";
pub(crate) const CONTINUATIONS: &str = "continuations/";

pub(crate) fn key(namespace: &str, id: impl Display) -> String {
    format!("{namespace}{id}")
}

pub(crate) fn continuation(token: &ContinuationToken) -> String {
    key(CONTINUATIONS, token)
}
