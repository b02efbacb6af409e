//! Domain error types for policy operations.

use thiserror::Error;
use veilsync_storage::StorageError;

/// Domain-specific errors for policy operations.
#[derive(Debug, Error)]
pub enum DomainError {
    /// JSON encoding or decoding failed.
    #[error("codec error: {message}")]
    Codec { message: String },

    /// Underlying key-value store failed.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

impl From<serde_json::Error> for DomainError {
    fn from(err: serde_json::Error) -> Self {
        DomainError::Codec {
            message: err.to_string(),
        }
    }
}

/// Result type for domain operations.
pub type DomainResult<T> = Result<T, DomainError>;
