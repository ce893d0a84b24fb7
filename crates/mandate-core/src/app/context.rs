//! Shared wiring handed to every app component.

use std::sync::Arc;

use super::config::EngineConfig;
use crate::ports::{AsyncInvoker, Clock, IdGenerator, Sandbox, Timer};
use crate::store::Repository;

/// Ports plus configuration. Cloning is cheap; it is all `Arc`s.
#[derive(Clone)]
pub(crate) struct Context {
    pub repo: Repository,
    pub clock: Arc<dyn Clock>,
    pub ids: Arc<dyn IdGenerator>,
    pub timer: Arc<dyn Timer>,
    pub invoker: Arc<dyn AsyncInvoker>,
    pub sandbox: Arc<dyn Sandbox>,
    pub config: EngineConfig,
}
