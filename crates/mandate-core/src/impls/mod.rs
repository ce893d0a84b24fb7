//! Impls - in-memory port implementations.
//!
//! Used by tests and by the demo host. A real deployment supplies its own
//! durable store, timer and invoker.
//!
//! - **InMemoryKvStore**: ordered map behind a lock
//! - **ManualTimer**: due-time table the host drains each tick
//! - **InMemoryInvoker**: queue of issued operations awaiting resolution

pub mod inmem_invoker;
pub mod inmem_store;
pub mod manual_timer;

pub use self::inmem_invoker::{InMemoryInvoker, IssuedOperation};
pub use self::inmem_store::InMemoryKvStore;
pub use self::manual_timer::ManualTimer;
