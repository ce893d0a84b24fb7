//! Timer port.
//!
//! The host owns real time. The engine only asks to be woken with a
//! [`Wakeup`] after a delay, and may cancel that request later.

use async_trait::async_trait;

use crate::domain::{TimerId, Wakeup};
use crate::ports::PortError;

#[async_trait]
pub trait Timer: Send + Sync {
    async fn schedule(&self, delay_seconds: u64, wakeup: Wakeup) -> Result<TimerId, PortError>;

    /// Cancelling an unknown or already fired timer is not an error.
    async fn cancel(&self, timer_id: &TimerId) -> Result<(), PortError>;
}
