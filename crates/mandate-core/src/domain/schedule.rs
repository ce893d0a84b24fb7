//! Schedules and recurrence rules.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::errors::ValidationError;
use super::ids::{ScheduleId, TemplateId};
use super::step::{MAX_DELAY_SECS, TimerId, after_delay};

/// Recurrence rule.
///
/// Expressions:
/// - `@every <n><s|m|h|d>` (e.g. `@every 90s`, `@every 5m`)
/// - `@hourly`, `@daily`, `@weekly`
/// - `@once`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Recurrence {
    Every { seconds: u64 },
    Once,
}

impl Recurrence {
    /// The fire after `previous`, or `None` when the rule does not repeat
    /// (or the next fire would fall past the end of the calendar).
    pub fn next_after(&self, previous: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            Recurrence::Every { seconds } => after_delay(previous, *seconds),
            Recurrence::Once => None,
        }
    }

    /// First fire for a schedule created at `now`.
    pub fn first_after(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        self.next_after(now).unwrap_or(now)
    }
}

impl FromStr for Recurrence {
    type Err = ValidationError;

    fn from_str(expr: &str) -> Result<Self, Self::Err> {
        let invalid = || ValidationError::InvalidRecurrence(expr.to_string());
        match expr.trim() {
            "@once" => Ok(Recurrence::Once),
            "@hourly" => Ok(Recurrence::Every { seconds: 3_600 }),
            "@daily" => Ok(Recurrence::Every { seconds: 86_400 }),
            "@weekly" => Ok(Recurrence::Every { seconds: 604_800 }),
            other => {
                let body = other.strip_prefix("@every").ok_or_else(invalid)?.trim();
                if body.len() < 2 || !body.is_char_boundary(body.len() - 1) {
                    return Err(invalid());
                }
                let (count, unit) = body.split_at(body.len() - 1);
                let count: u64 = count.trim().parse().map_err(|_| invalid())?;
                let scale = match unit {
                    "s" => 1,
                    "m" => 60,
                    "h" => 3_600,
                    "d" => 86_400,
                    _ => return Err(invalid()),
                };
                let seconds = count.checked_mul(scale).ok_or_else(invalid)?;
                if seconds == 0 || seconds > MAX_DELAY_SECS {
                    return Err(invalid());
                }
                Ok(Recurrence::Every { seconds })
            }
        }
    }
}

impl TryFrom<String> for Recurrence {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Recurrence> for String {
    fn from(value: Recurrence) -> Self {
        value.to_string()
    }
}

impl fmt::Display for Recurrence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Recurrence::Once => write!(f, "@once"),
            Recurrence::Every { seconds } => write!(f, "@every {seconds}s"),
        }
    }
}

/// A recurrence rule that instantiates tasks from a template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleRecord {
    pub id: ScheduleId,
    pub template_id: TemplateId,
    pub recurrence: Recurrence,

    /// The only fire time currently accepted. Also the fire token.
    pub next_fire_time: DateTime<Utc>,
    pub enabled: bool,

    pub fire_timer: Option<TimerId>,
    pub fired_count: u64,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ScheduleRecord {
    pub fn new(
        id: ScheduleId,
        template_id: TemplateId,
        recurrence: Recurrence,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            template_id,
            recurrence,
            next_fire_time: recurrence.first_after(now),
            enabled: true,
            fire_timer: None,
            fired_count: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Does `fire_token` match the persisted next fire time?
    pub fn accepts(&self, fire_token: DateTime<Utc>) -> bool {
        self.next_fire_time == fire_token
    }

    /// Move past the accepted fire.
    ///
    /// Skips fires already behind `now` (at most `max_catch_up` of them).
    /// A rule with no next fire disables the schedule.
    pub fn advance(&mut self, now: DateTime<Utc>, max_catch_up: u32) {
        self.fired_count += 1;
        self.updated_at = now;

        let mut next = self.recurrence.next_after(self.next_fire_time);
        let mut skipped = 0;
        while let Some(at) = next
            && at <= now
            && skipped < max_catch_up
        {
            next = self.recurrence.next_after(at);
            skipped += 1;
        }

        match next {
            Some(at) => self.next_fire_time = at,
            None => self.enabled = false,
        }
    }
}
