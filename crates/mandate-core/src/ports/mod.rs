//! Ports: the host capabilities the engine consumes.
//!
//! Each trait is a seam to the embedding environment. The engine never holds
//! in-process state across invocations; everything it needs later goes
//! through [`KvStore`], and everything that happens later arrives through a
//! [`Timer`] wakeup or an [`AsyncInvoker`] resolution.

pub mod clock;
pub mod id_generator;
pub mod invoker;
pub mod kv_store;
pub mod sandbox;
pub mod timer;

pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::id_generator::{IdGenerator, UlidGenerator};
pub use self::invoker::{AsyncInvoker, AsyncOperation};
pub use self::kv_store::{KvStore, StoreError};
pub use self::sandbox::{Bindings, Sandbox};
pub use self::timer::Timer;

/// Failure of a host capability other than the store.
#[derive(Debug, thiserror::Error)]
#[error("{port} unavailable: {message}")]
pub struct PortError {
    pub port: &'static str,
    pub message: String,
}

impl PortError {
    pub fn new(port: &'static str, message: impl Into<String>) -> Self {
        Self {
            port,
            message: message.into(),
        }
    }
}
