//! mandate-core
//!
//! Resumable multi-step task engine. A task is an ordered list of steps; each
//! step runs one call to a registered routine. The engine advances a task by
//! one step per invocation and keeps everything it needs between invocations
//! in the key-value store.
//!
//! # Modules
//! - **domain**: records and their state machines (code unit, call, step, task, schedule)
//! - **ports**: host capabilities (KvStore, Timer, AsyncInvoker, Sandbox, Clock, IdGenerator)
//! - **store**: typed repository over the KvStore
//! - **app**: catalog, orchestrator, scheduler, status, builder
//! - **typed**: typed routine API and the registry-backed sandbox
//! - **impls**: in-memory port implementations

pub mod app;
pub mod domain;
pub mod error;
pub mod impls;
pub mod ports;
pub mod store;
pub mod typed;

pub use app::{App, AppBuilder, EngineConfig};
pub use error::EngineError;
