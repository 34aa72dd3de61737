//! Provider token endpoint port

use async_trait::async_trait;
use neocrm_domain::ProviderToken;

/// Outcome classes of a failed provider refresh grant.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProviderRefreshError {
    /// The grant is revoked or expired; re-consent is required.
    #[error("refresh token revoked: {reason}")]
    Revoked {
        /// Provider-reported reason (e.g. `invalid_grant`).
        reason: String,
    },

    /// The provider could not answer now (rate limit, outage, transport).
    #[error("provider unavailable: {reason}")]
    RetryLater {
        /// Failure description.
        reason: String,
    },

    /// No token endpoint is configured for this provider.
    #[error("unknown provider: {0}")]
    UnknownProvider(String),
}

/// Calls a provider's OAuth2 token endpoint with a refresh grant.
#[async_trait]
pub trait ProviderTokenClient: Send + Sync {
    /// Exchanges `refresh_token` for a new access token at `provider`.
    async fn refresh(
        &self,
        provider: &str,
        refresh_token: &str,
    ) -> Result<ProviderToken, ProviderRefreshError>;
}
