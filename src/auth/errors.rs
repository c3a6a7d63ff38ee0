//! Credential validation errors.

use thiserror::Error;

/// Result type for credential validation
pub type AuthResult<T> = Result<T, AuthError>;

/// Credential validation failures. Terminal for the presenting connection,
/// never a process-level fault.
#[derive(Debug, Clone, Error)]
pub enum AuthError {
    /// Credential did not match
    #[error("unauthorized")]
    Unauthorized,

    /// Token was structurally invalid, expired, or mis-issued
    #[error("invalid token: {0}")]
    InvalidToken(String),
}
