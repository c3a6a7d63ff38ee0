//! Store-layer error types.

use thiserror::Error;

use crate::engine::StorageError;
use crate::path::PathError;

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Store failures, as seen by protocol-level callers.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// Unknown document key
    #[error("not found: {0}")]
    NotFound(String),

    /// Input document or path could not be decoded
    #[error("decode error: {0}")]
    Decode(String),

    /// Backing engine failure, cause preserved
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl From<PathError> for StoreError {
    fn from(err: PathError) -> Self {
        Self::Decode(err.to_string())
    }
}
