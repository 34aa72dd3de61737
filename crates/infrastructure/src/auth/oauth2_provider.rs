//! `OAuth2` refresh grant against third-party token endpoints.
//!
//! Each provider is configured with its token URL and client credentials.
//! Failures are classified for the refresher: a dead grant is `Revoked`
//! and must never be retried, everything else is `RetryLater`.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use neocrm_application::ports::{ProviderRefreshError, ProviderTokenClient};
use neocrm_domain::ProviderToken;
use serde::Deserialize;
use tracing::debug;

/// Content-Type for form-urlencoded data.
const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Error codes (RFC 6749 section 5.2) meaning the grant is unusable.
const REVOKED_ERRORS: [&str; 3] = ["invalid_grant", "invalid_token", "unauthorized_client"];

/// Token endpoint and client credentials of one provider.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ProviderConfig {
    /// Provider name, matched case-insensitively (e.g. `google`).
    pub name: String,
    /// Token endpoint URL.
    pub token_url: String,
    /// OAuth client id.
    pub client_id: String,
    /// OAuth client secret.
    #[serde(default)]
    pub client_secret: Option<String>,
}

/// Token endpoint success response.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    scope: Option<String>,
}

/// Token endpoint error response.
#[derive(Debug, Deserialize)]
struct TokenErrorResponse {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

/// [`ProviderTokenClient`] posting `grant_type=refresh_token` forms.
#[derive(Debug, Clone)]
pub struct OAuth2TokenClient {
    http_client: reqwest::Client,
    providers: BTreeMap<String, ProviderConfig>,
}

impl OAuth2TokenClient {
    /// Creates a client for the given providers. Redirects are not followed.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(
        providers: impl IntoIterator<Item = ProviderConfig>,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let http_client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .timeout(timeout)
            .build()?;
        Ok(Self {
            http_client,
            providers: providers
                .into_iter()
                .map(|config| (config.name.to_lowercase(), config))
                .collect(),
        })
    }

    /// Names of the configured providers.
    pub fn providers(&self) -> impl Iterator<Item = &str> {
        self.providers.keys().map(String::as_str)
    }

    fn classify(status: u16, body: &str) -> ProviderRefreshError {
        let parsed = serde_json::from_str::<TokenErrorResponse>(body).ok();
        let reason = parsed.as_ref().map_or_else(
            || format!("status {status}"),
            |e| match &e.error_description {
                Some(description) => format!("{}: {description}", e.error),
                None => e.error.clone(),
            },
        );

        let code = parsed.as_ref().map(|e| e.error.as_str());
        let revoked = match code {
            Some(code) if REVOKED_ERRORS.contains(&code) => true,
            Some("temporarily_unavailable") => false,
            _ => matches!(status, 400 | 401),
        };

        if revoked {
            ProviderRefreshError::Revoked { reason }
        } else {
            ProviderRefreshError::RetryLater { reason }
        }
    }
}

#[async_trait]
impl ProviderTokenClient for OAuth2TokenClient {
    async fn refresh(
        &self,
        provider: &str,
        refresh_token: &str,
    ) -> Result<ProviderToken, ProviderRefreshError> {
        let config = self
            .providers
            .get(&provider.to_lowercase())
            .ok_or_else(|| ProviderRefreshError::UnknownProvider(provider.to_string()))?;

        let mut params = vec![
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", config.client_id.as_str()),
        ];
        if let Some(secret) = &config.client_secret {
            params.push(("client_secret", secret.as_str()));
        }
        let body = serde_urlencoded::to_string(&params).map_err(|e| {
            ProviderRefreshError::RetryLater {
                reason: format!("Failed to encode form: {e}"),
            }
        })?;

        debug!(provider = %config.name, "refreshing provider token");
        let response = self
            .http_client
            .post(&config.token_url)
            .header("Content-Type", FORM_CONTENT_TYPE)
            .header("Accept", "application/json")
            .body(body)
            .send()
            .await
            .map_err(|e| ProviderRefreshError::RetryLater {
                reason: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(Self::classify(status.as_u16(), &error_text));
        }

        let token: TokenResponse =
            response
                .json()
                .await
                .map_err(|e| ProviderRefreshError::RetryLater {
                    reason: format!("Failed to parse token response: {e}"),
                })?;

        Ok(ProviderToken {
            access_token: token.access_token,
            refresh_token: token.refresh_token,
            expires_in: token.expires_in,
            scope: token.scope,
        })
    }
}
