//! Engine configuration.

use serde::{Deserialize, Serialize};

/// Tunables of the orchestrator and scheduler. Every field has a default, so
/// `{}` is a valid config document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Bound after which an unresolved async step is failed.
    pub async_timeout_secs: u64,

    /// Register an `Advance` wakeup for the next step after each completion.
    pub self_schedule: bool,

    /// Most missed fires a schedule skips in one advance.
    pub max_catch_up: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            async_timeout_secs: 300,
            self_schedule: true,
            max_catch_up: 1_000,
        }
    }
}

impl EngineConfig {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
