//! ManualTimer - a due-time table drained by the host loop.
//!
//! Nothing fires on its own. The host calls [`ManualTimer::take_due`] on each
//! tick and delivers the returned wakeups as new invocations.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use ulid::Ulid;

use crate::domain::{TimerId, Wakeup, after_delay};
use crate::ports::{Clock, PortError, Timer};

#[derive(Debug, Clone)]
struct PendingTimer {
    due_at: DateTime<Utc>,
    wakeup: Wakeup,
}

pub struct ManualTimer {
    clock: Arc<dyn Clock>,
    pending: Mutex<BTreeMap<TimerId, PendingTimer>>,
}

impl ManualTimer {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            pending: Mutex::new(BTreeMap::new()),
        }
    }

    /// Remove and return every timer due at the current clock time, earliest
    /// first.
    pub async fn take_due(&self) -> Vec<(TimerId, Wakeup)> {
        let now = self.clock.now();
        let mut pending = self.pending.lock().await;

        let due_ids: Vec<TimerId> = pending
            .iter()
            .filter(|(_, t)| t.due_at <= now)
            .map(|(id, _)| id.clone())
            .collect();

        let mut due: Vec<(TimerId, PendingTimer)> = due_ids
            .into_iter()
            .filter_map(|id| pending.remove(&id).map(|t| (id, t)))
            .collect();
        due.sort_by_key(|(id, t)| (t.due_at, id.clone()));
        due.into_iter().map(|(id, t)| (id, t.wakeup)).collect()
    }

    /// Earliest pending due time.
    pub async fn next_due(&self) -> Option<DateTime<Utc>> {
        self.pending.lock().await.values().map(|t| t.due_at).min()
    }

    pub async fn pending(&self) -> Vec<Wakeup> {
        self.pending
            .lock()
            .await
            .values()
            .map(|t| t.wakeup.clone())
            .collect()
    }
}

#[async_trait]
impl Timer for ManualTimer {
    async fn schedule(&self, delay_seconds: u64, wakeup: Wakeup) -> Result<TimerId, PortError> {
        let due_at = after_delay(self.clock.now(), delay_seconds)
            .ok_or_else(|| PortError::new("timer", format!("delay {delay_seconds}s out of range")))?;
        let id = TimerId(format!("timer-{}", Ulid::new()));
        self.pending
            .lock()
            .await
            .insert(id.clone(), PendingTimer { due_at, wakeup });
        Ok(id)
    }

    async fn cancel(&self, timer_id: &TimerId) -> Result<(), PortError> {
        self.pending.lock().await.remove(timer_id);
        Ok(())
    }
}
