//! Application error types
//!
//! Recoverable outcomes (network failures, rejected credentials, unusable
//! integrations) are returned as typed errors. Each error family maps to
//! one user-visible behavior: a network error is shown to the caller, a
//! refresh failure forces a logout, an integration error asks the user to
//! reconnect that integration only.

use thiserror::Error;

use crate::ports::StorageError;

/// Why a credential refresh cycle failed.
///
/// Cloneable so a single failure can be fanned out to every waiting caller.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RefreshError {
    /// The refresh endpoint rejected the refresh token.
    #[error("refresh token rejected: {0}")]
    Rejected(String),

    /// The refresh call failed at the transport level.
    #[error("network error during refresh: {0}")]
    Network(String),

    /// The refresh call did not complete in time.
    #[error("refresh timed out after {timeout_ms} ms")]
    Timeout {
        /// Configured timeout.
        timeout_ms: u64,
    },

    /// No credential (or an empty refresh token) was stored.
    #[error("no refresh token available")]
    MissingRefreshToken,

    /// The refreshed credential could not be persisted.
    #[error("credential storage failed: {0}")]
    Storage(String),

    /// The refresh task ended without resolving its waiters.
    #[error("refresh task aborted")]
    Aborted,
}

/// Errors surfaced to callers of the authenticated client.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ClientError {
    /// Transient transport failure. Never retried automatically.
    #[error("network error: {0}")]
    Network(String),

    /// The server rejected the credential and no recovery is possible
    /// for this request (replay already attempted, or nothing to refresh).
    #[error("authentication failed with status {status}")]
    AuthenticationFailed {
        /// Status code returned by the server.
        status: u16,
    },

    /// Credential recovery failed; the session has been logged out.
    #[error("session refresh failed: {0}")]
    RefreshFailed(#[from] RefreshError),

    /// Credential persistence failed.
    #[error("storage error: {0}")]
    Storage(String),

    /// A typed call received a non-success status.
    #[error("request failed with status {status}: {message}")]
    UnexpectedStatus {
        /// Status code returned by the server.
        status: u16,
        /// Server message, or the raw body.
        message: String,
    },

    /// A response could not be decoded.
    #[error("invalid response: {0}")]
    Decode(String),
}

impl ClientError {
    /// True when the error ended the user's session.
    #[must_use]
    pub const fn is_session_terminal(&self) -> bool {
        matches!(self, Self::RefreshFailed(_))
    }
}

impl From<StorageError> for ClientError {
    fn from(error: StorageError) -> Self {
        Self::Storage(error.to_string())
    }
}

/// A third-party OAuth connection cannot be used.
///
/// Terminal for that connection only; the user's own session is unaffected.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IntegrationAuthError {
    /// No connection is stored for the key.
    #[error("no {provider} connection for {key}")]
    NotConnected {
        /// Connection key (`tenant/user/provider`).
        key: String,
        /// Provider name.
        provider: String,
    },

    /// The grant was revoked or cannot be refreshed; the connection was
    /// removed and the OAuth consent flow must run again.
    #[error("{provider} connection {key} must be reconnected: {reason}")]
    ReconsentRequired {
        /// Connection key.
        key: String,
        /// Provider name.
        provider: String,
        /// Provider-reported reason.
        reason: String,
    },

    /// The provider could not refresh right now; the connection is kept.
    #[error("{provider} is temporarily unavailable: {reason}")]
    Unavailable {
        /// Provider name.
        provider: String,
        /// Provider-reported reason.
        reason: String,
    },

    /// No token endpoint is configured for the provider.
    #[error("unsupported OAuth provider: {0}")]
    UnsupportedProvider(String),

    /// The connection store failed.
    #[error("connection storage error: {0}")]
    Storage(String),
}

impl IntegrationAuthError {
    /// True when the user must re-run the consent flow ("reconnect required").
    #[must_use]
    pub const fn requires_reconsent(&self) -> bool {
        matches!(self, Self::ReconsentRequired { .. } | Self::NotConnected { .. })
    }
}

impl From<StorageError> for IntegrationAuthError {
    fn from(error: StorageError) -> Self {
        Self::Storage(error.to_string())
    }
}

/// Result type alias for client operations.
pub type ClientResult<T> = Result<T, ClientError>;
