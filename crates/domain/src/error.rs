//! Domain error types

use thiserror::Error;

/// Domain-level errors that can occur during validation or processing.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// The HTTP method is not supported.
    #[error("unsupported HTTP method: {0}")]
    UnsupportedMethod(String),

    /// An identifier is invalid or empty.
    #[error("invalid identifier: {0}")]
    InvalidIdentifier(String),

    /// A token lifetime does not yield a representable expiry instant.
    #[error("invalid token lifetime: {0} seconds")]
    InvalidExpiry(i64),
}

/// Result type alias for domain operations.
pub type DomainResult<T> = Result<T, DomainError>;
