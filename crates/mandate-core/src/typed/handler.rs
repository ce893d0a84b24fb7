//! Handler traits.
//!
//! `Handler<R>` is the typed surface; `DynHandler` is the object-safe form the
//! registry stores. `TypedHandler` erases one into the other and owns the
//! JSON conversion at the boundary.

use std::marker::PhantomData;

use async_trait::async_trait;

use super::routine::Routine;
use crate::domain::ExecutionError;
use crate::ports::Bindings;

#[async_trait]
pub trait Handler<R: Routine>: Send + Sync {
    async fn handle(&self, args: R, bindings: &Bindings) -> Result<R::Output, ExecutionError>;
}

#[async_trait]
pub trait DynHandler: Send + Sync {
    async fn handle_dyn(&self, bindings: Bindings) -> Result<serde_json::Value, ExecutionError>;
    fn routine(&self) -> &'static str;
}

pub struct TypedHandler<R: Routine, H: Handler<R>> {
    handler: H,
    _marker: PhantomData<fn() -> R>,
}

impl<R: Routine, H: Handler<R>> TypedHandler<R, H> {
    pub fn new(handler: H) -> Self {
        Self {
            handler,
            _marker: PhantomData,
        }
    }
}

#[async_trait]
impl<R: Routine, H: Handler<R>> DynHandler for TypedHandler<R, H> {
    async fn handle_dyn(&self, bindings: Bindings) -> Result<serde_json::Value, ExecutionError> {
        let args: R = serde_json::from_value(bindings.args.clone())
            .map_err(|e| ExecutionError::new(format!("{}: bad args: {e}", R::NAME)))?;
        let output = self.handler.handle(args, &bindings).await?;
        serde_json::to_value(output)
            .map_err(|e| ExecutionError::new(format!("{}: bad output: {e}", R::NAME)))
    }

    fn routine(&self) -> &'static str {
        R::NAME
    }
}
