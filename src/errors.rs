//! Error taxonomy for oakdb
//!
//! Every public operation returns [`OakResult`]. Expected absence (a missing key on
//! get/delete) is not an error; it is reported through the response envelope.
//!
//! Codes:
//! - OAK_KEY_CONFLICT
//! - OAK_NOT_FOUND
//! - OAK_MALFORMED_FILTER
//! - OAK_INDEX_NOT_ENABLED
//! - OAK_EMBEDDING_FAILURE
//! - OAK_STORAGE_FAILURE
//! - OAK_INVALID_ARGUMENT
//! - OAK_CONFIG_INVALID

use thiserror::Error;

use crate::index::IndexKind;
use crate::storage::StorageError;

/// Result type for oakdb operations
pub type OakResult<T> = Result<T, OakError>;

/// Errors surfaced by Oak, Base and query operations
#[derive(Debug, Error)]
pub enum OakError {
    /// Add without override on a key that already exists
    #[error("Item with key '{key}' already exists")]
    KeyConflict { key: String },

    /// Absent key. Only used for envelope codes, never raised by get/delete.
    #[error("Key '{key}' not found")]
    NotFound { key: String },

    /// Unparseable field reference, operator or operand shape
    #[error("Malformed filter on '{field}': {reason}")]
    MalformedFilter { field: String, reason: String },

    /// Search or similar invoked without the prerequisite enable call
    #[error("{index} index is not enabled for base '{base}'")]
    IndexNotEnabled { base: String, index: IndexKind },

    /// Provider error, missing provider or unusable vectors
    #[error("Embedding failed: {0}")]
    EmbeddingFailure(String),

    /// Underlying storage engine error
    #[error(transparent)]
    StorageFailure(#[from] StorageError),

    /// Caller supplied an argument outside the accepted vocabulary
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Configuration could not be read or failed validation
    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl OakError {
    pub fn malformed(field: impl Into<String>, reason: impl Into<String>) -> Self {
        OakError::MalformedFilter {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn invalid(reason: impl Into<String>) -> Self {
        OakError::InvalidArgument(reason.into())
    }

    pub fn embedding(reason: impl Into<String>) -> Self {
        OakError::EmbeddingFailure(reason.into())
    }

    /// Returns the stable string code for this error
    pub fn code(&self) -> &'static str {
        match self {
            OakError::KeyConflict { .. } => "OAK_KEY_CONFLICT",
            OakError::NotFound { .. } => "OAK_NOT_FOUND",
            OakError::MalformedFilter { .. } => "OAK_MALFORMED_FILTER",
            OakError::IndexNotEnabled { .. } => "OAK_INDEX_NOT_ENABLED",
            OakError::EmbeddingFailure(_) => "OAK_EMBEDDING_FAILURE",
            OakError::StorageFailure(_) => "OAK_STORAGE_FAILURE",
            OakError::InvalidArgument(_) => "OAK_INVALID_ARGUMENT",
            OakError::Config(_) => "OAK_CONFIG_INVALID",
        }
    }

    /// Returns true if the instance must not be used after this error
    pub fn is_fatal(&self) -> bool {
        matches!(self, OakError::StorageFailure(e) if e.is_fatal())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_stable() {
        assert_eq!(
            OakError::KeyConflict { key: "a".into() }.code(),
            "OAK_KEY_CONFLICT"
        );
        assert_eq!(OakError::malformed("age", "bad").code(), "OAK_MALFORMED_FILTER");
        assert_eq!(OakError::invalid("x").code(), "OAK_INVALID_ARGUMENT");
        assert_eq!(
            OakError::IndexNotEnabled {
                base: "b".into(),
                index: IndexKind::Vector
            }
            .code(),
            "OAK_INDEX_NOT_ENABLED"
        );
    }

    #[test]
    fn test_malformed_names_field() {
        let err = OakError::malformed("user.age", "unknown operator 'near'");
        let msg = err.to_string();
        assert!(msg.contains("user.age"));
        assert!(msg.contains("near"));
    }

    #[test]
    fn test_corruption_is_fatal() {
        let err: OakError = StorageError::corruption_at_offset(12, "checksum mismatch").into();
        assert!(err.is_fatal());
        assert_eq!(err.code(), "OAK_STORAGE_FAILURE");

        let err = OakError::embedding("provider down");
        assert!(!err.is_fatal());
    }
}
