//! Code units and calls.
//!
//! A code unit's `source` names a routine registered with the sandbox; it is
//! never interpreted as free-form text. The checksum pins the exact name the
//! unit was created with.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::errors::ValidationError;
use super::ids::{CallId, CodeUnitId};

/// An identified executable unit plus its integrity checksum.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeUnit {
    pub id: CodeUnitId,
    pub source: String,
    pub checksum: String,
    pub created_at: DateTime<Utc>,
}

impl CodeUnit {
    pub fn new(
        id: CodeUnitId,
        source: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Result<Self, ValidationError> {
        let source = source.into();
        if source.trim().is_empty() {
            return Err(ValidationError::EmptySource);
        }
        let checksum = checksum_of(&source);
        Ok(Self {
            id,
            source,
            checksum,
            created_at,
        })
    }

    /// Recompute the checksum and compare it with the stored one.
    pub fn verify(&self) -> bool {
        checksum_of(&self.source) == self.checksum
    }
}

/// Hex-encoded SHA-256 of the source.
pub fn checksum_of(source: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(source.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// How a call runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallMode {
    /// Completes within the current invocation.
    Sync,
    /// Issues an operation and suspends until it is resolved.
    Async,
}

/// A code unit bound to an execution mode and an argument payload.
///
/// Immutable once created; each task instance gets its own calls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Call {
    pub id: CallId,
    pub code_unit: CodeUnitId,
    pub mode: CallMode,
    #[serde(default)]
    pub args: serde_json::Value,
}

impl Call {
    pub fn new(id: CallId, code_unit: CodeUnitId, mode: CallMode, args: serde_json::Value) -> Self {
        Self {
            id,
            code_unit,
            mode,
            args,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ulid::Ulid;

    fn unit_id() -> CodeUnitId {
        CodeUnitId::from_ulid(Ulid::new())
    }

    #[test]
    fn new_computes_checksum() {
        let unit = CodeUnit::new(unit_id(), "governance.tally.v1", Utc::now()).unwrap();
        assert_eq!(unit.checksum.len(), 64);
        assert_eq!(unit.checksum, checksum_of("governance.tally.v1"));
        assert!(unit.verify());
    }

    #[test]
    fn blank_source_is_rejected() {
        let err = CodeUnit::new(unit_id(), "  \n", Utc::now()).unwrap_err();
        assert_eq!(err, ValidationError::EmptySource);
    }

    #[test]
    fn tampered_source_fails_verification() {
        let mut unit = CodeUnit::new(unit_id(), "governance.tally.v1", Utc::now()).unwrap();
        unit.source = "governance.drain_treasury.v1".to_string();
        assert!(!unit.verify());
    }

    #[test]
    fn call_mode_serializes_snake_case() {
        assert_eq!(serde_json::to_string(&CallMode::Async).unwrap(), "\"async\"");
    }
}
