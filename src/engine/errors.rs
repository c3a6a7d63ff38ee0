//! Backing-engine error types.

use thiserror::Error;

/// Result type for engine operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Engine failures. The cause is preserved opaquely; callers treat every
/// variant as a storage-layer fault.
#[derive(Debug, Clone, Error)]
pub enum StorageError {
    /// Backend failure (connection, lock, constraint)
    #[error("storage backend error: {0}")]
    Backend(String),

    /// The engine rejected a malformed request
    #[error("invalid storage request: {0}")]
    InvalidRequest(String),
}

impl StorageError {
    pub fn backend(msg: impl Into<String>) -> Self {
        Self::Backend(msg.into())
    }
}
