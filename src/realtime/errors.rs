//! Realtime error types.

use thiserror::Error;

use crate::store::StoreError;

/// Result type for realtime operations
pub type RealtimeResult<T> = Result<T, RealtimeError>;

/// Realtime failures. Connection-scoped errors terminate at most one
/// connection; they never cross into other connections or pending waits.
#[derive(Debug, Error)]
pub enum RealtimeError {
    /// Unknown connection id
    #[error("connection not found: {0}")]
    ConnectionNotFound(String),

    /// Publish with no registered waiter
    #[error("channel not found: {0}")]
    ChannelNotFound(String),

    /// A bounded wait elapsed without a payload
    #[error("timed out waiting on channel {0}")]
    WaitTimeout(String),

    /// The channel's delivery slot closed mid-wait
    #[error("channel closed: {0}")]
    ChannelClosed(String),

    /// Undecodable client frame
    #[error("invalid message: {0}")]
    InvalidMessage(String),

    /// Transport-level failure
    #[error("connection error: {0}")]
    ConnectionError(String),

    /// Handshake credential rejected
    #[error("unauthorized")]
    Unauthorized,

    /// Store failure surfaced through an operation
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Internal error
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<crate::engine::StorageError> for RealtimeError {
    fn from(err: crate::engine::StorageError) -> Self {
        Self::Store(StoreError::Storage(err))
    }
}
