//! KvStore port: the durable store all engine state lives in.
//!
//! Values are opaque bytes; the repository layer owns the encoding. State
//! written here must survive process restarts in a real deployment.

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store backend failure: {0}")]
    Backend(String),

    #[error("corrupt value at '{key}': {source}")]
    Corrupt {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("value for '{key}' could not be encoded: {source}")]
    Encode {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

#[async_trait]
pub trait KvStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;

    async fn put(&self, key: &str, value: Vec<u8>) -> Result<(), StoreError>;

    /// All entries whose key starts with `prefix`, ordered by key.
    async fn iterate(&self, prefix: &str) -> Result<Vec<(String, Vec<u8>)>, StoreError>;
}
