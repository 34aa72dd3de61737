//! Session endpoints of the CRM backend.

use async_trait::async_trait;
use neocrm_domain::AuthResponse;

/// Errors returned by the session endpoints.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthApiError {
    /// The server refused the request (bad password, invalid or expired
    /// refresh token).
    #[error("rejected with status {status}: {message}")]
    Rejected {
        /// HTTP status code.
        status: u16,
        /// Server message.
        message: String,
    },

    /// Transport failure.
    #[error("network error: {0}")]
    Network(String),

    /// The response body could not be understood.
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

/// Login, refresh and logout calls.
#[async_trait]
pub trait AuthApi: Send + Sync {
    /// Exchanges e-mail and password for a credential.
    async fn login(&self, email: &str, password: &str) -> Result<AuthResponse, AuthApiError>;

    /// Exchanges a refresh token for a new credential.
    async fn refresh(&self, refresh_token: &str) -> Result<AuthResponse, AuthApiError>;

    /// Revokes a refresh token on the server.
    async fn logout(&self, refresh_token: &str) -> Result<(), AuthApiError>;
}
