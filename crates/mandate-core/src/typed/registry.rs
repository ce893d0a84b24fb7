//! TypedRegistry - routine name to handler.
//!
//! Built once during initialization, read-only afterwards.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use super::handler::{DynHandler, Handler, TypedHandler};
use super::routine::Routine;
use crate::domain::ExecutionError;
use crate::ports::{Bindings, Sandbox};

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("routine '{0}' is already registered")]
    AlreadyRegistered(String),
}

#[derive(Default)]
pub struct TypedRegistry {
    handlers: HashMap<String, Arc<dyn DynHandler>>,
}

impl TypedRegistry {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    pub fn register<R: Routine, H: Handler<R> + 'static>(
        &mut self,
        handler: H,
    ) -> Result<(), RegistryError> {
        let name = R::NAME.to_string();
        if self.handlers.contains_key(&name) {
            return Err(RegistryError::AlreadyRegistered(name));
        }
        self.handlers
            .insert(name, Arc::new(TypedHandler::<R, H>::new(handler)));
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn DynHandler>> {
        self.handlers.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    pub fn registered_routines(&self) -> Vec<String> {
        let mut names: Vec<String> = self.handlers.keys().cloned().collect();
        names.sort();
        names
    }
}

/// [`Sandbox`] backed by a registry: a code unit's source is a routine name.
pub struct RegistrySandbox {
    registry: Arc<TypedRegistry>,
}

impl RegistrySandbox {
    pub fn new(registry: Arc<TypedRegistry>) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl Sandbox for RegistrySandbox {
    async fn execute(
        &self,
        function: &str,
        bindings: Bindings,
    ) -> Result<serde_json::Value, ExecutionError> {
        let handler = self
            .registry
            .get(function)
            .ok_or_else(|| ExecutionError::new(format!("routine '{function}' is not registered")))?;
        handler.handle_dyn(bindings).await
    }
}
