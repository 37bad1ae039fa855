//! Error types for MLTSP operations

use crate::Collection;
use thiserror::Error;

/// Storage layer errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("Record not found: {collection} with key {key}")]
    NotFound { collection: Collection, key: String },

    #[error("Record already exists: {collection} with key {key}")]
    AlreadyExists { collection: Collection, key: String },

    #[error("Record rejected by {collection}: {reason}")]
    Rejected { collection: Collection, reason: String },

    /// A stored document no longer decodes as its record type.
    #[error("Corrupt record in {collection}: {reason}")]
    Corrupt { collection: Collection, reason: String },

    #[error("Serialization failed for {collection}: {reason}")]
    Serialization { collection: Collection, reason: String },

    #[error("Storage backend failure: {reason}")]
    Backend { reason: String },

    #[error("Storage lock poisoned")]
    LockPoisoned,
}

/// Input validation errors. Raised before anything is written.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Required field missing: {field}")]
    RequiredFieldMissing { field: String },

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Payload for {expected} does not match job kind {kind}")]
    PayloadMismatch { kind: String, expected: String },

    #[error("Unknown resource kind: {value}")]
    UnknownKind { value: String },
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required configuration field: {field}")]
    MissingRequired { field: String },

    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Liveness probe errors. Never surfaced to callers: a failed probe
/// reads as "not running".
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProbeError {
    #[error("Malformed process id: {value}")]
    Malformed { value: String },

    #[error("Process id out of range: {pid}")]
    OutOfRange { pid: i64 },

    #[error("Liveness probe failed for pid {pid}: {reason}")]
    Os { pid: i64, reason: String },

    #[error("Liveness probe unsupported on this platform")]
    Unsupported,
}

/// Master error type for all MLTSP errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MltspError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Probe error: {0}")]
    Probe(#[from] ProbeError),
}

impl MltspError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, MltspError::Storage(StorageError::NotFound { .. }))
    }
}

/// Result type alias for MLTSP operations.
pub type MltspResult<T> = Result<T, MltspError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_error_display_not_found() {
        let err = StorageError::NotFound {
            collection: Collection::Features,
            key: "abc123".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("Record not found"));
        assert!(msg.contains("features"));
        assert!(msg.contains("abc123"));
    }

    #[test]
    fn test_validation_error_display_payload_mismatch() {
        let err = ValidationError::PayloadMismatch {
            kind: "model".to_string(),
            expected: "prediction".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("model"));
        assert!(msg.contains("prediction"));
    }

    #[test]
    fn test_config_error_display_invalid_value() {
        let err = ConfigError::InvalidValue {
            field: "MLTSP_STORE_BACKEND".to_string(),
            value: "redis".to_string(),
            reason: "expected memory or lmdb".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("MLTSP_STORE_BACKEND"));
        assert!(msg.contains("redis"));
    }

    #[test]
    fn test_mltsp_error_from_variants() {
        let storage = MltspError::from(StorageError::LockPoisoned);
        assert!(matches!(storage, MltspError::Storage(_)));

        let validation = MltspError::from(ValidationError::RequiredFieldMissing {
            field: "name".to_string(),
        });
        assert!(matches!(validation, MltspError::Validation(_)));

        let probe = MltspError::from(ProbeError::Unsupported);
        assert!(matches!(probe, MltspError::Probe(_)));
    }

    #[test]
    fn test_is_not_found() {
        let err = MltspError::from(StorageError::NotFound {
            collection: Collection::Models,
            key: "k".to_string(),
        });
        assert!(err.is_not_found());
        assert!(!MltspError::from(StorageError::LockPoisoned).is_not_found());
    }
}
