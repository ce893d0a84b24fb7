//! Typed routine API.
//!
//! Routine names are bound to argument types at compile time, so a code unit
//! can only reach code that was registered up front.
//!
//! - **Surface (typed)**: [`Routine`], [`Handler<R>`]
//! - **Inside (dyn)**: [`DynHandler`], stored by [`TypedRegistry`]

pub mod handler;
pub mod registry;
pub mod routine;

pub use self::handler::{DynHandler, Handler, TypedHandler};
pub use self::registry::{RegistryError, RegistrySandbox, TypedRegistry};
pub use self::routine::Routine;
