//! Typed persistence over the [`KvStore`](crate::ports::KvStore) port.

mod keys;
mod repository;

pub use repository::{ContinuationEntry, Repository};
