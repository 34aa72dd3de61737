//! Third-party OAuth connection records.

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::auth::expiry_after;
use crate::error::{DomainError, DomainResult};

/// Uniqueness key of an OAuth connection: one grant per
/// (tenant, user, provider) triple.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConnectionKey {
    /// Tenant identifier.
    pub tenant_id: String,
    /// User identifier within the tenant.
    pub user_id: String,
    /// Provider name, lowercase (e.g. `google`).
    pub provider: String,
}

impl ConnectionKey {
    /// Creates a key, normalizing the provider name to lowercase.
    ///
    /// # Errors
    ///
    /// Returns an error if any component is empty.
    pub fn new(
        tenant_id: impl Into<String>,
        user_id: impl Into<String>,
        provider: impl Into<String>,
    ) -> DomainResult<Self> {
        let key = Self {
            tenant_id: tenant_id.into(),
            user_id: user_id.into(),
            provider: provider.into().trim().to_lowercase(),
        };

        if key.tenant_id.trim().is_empty() {
            return Err(DomainError::InvalidIdentifier("tenant id is empty".to_string()));
        }
        if key.user_id.trim().is_empty() {
            return Err(DomainError::InvalidIdentifier("user id is empty".to_string()));
        }
        if key.provider.is_empty() {
            return Err(DomainError::InvalidIdentifier("provider is empty".to_string()));
        }
        Ok(key)
    }
}

impl fmt::Display for ConnectionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.tenant_id, self.user_id, self.provider)
    }
}

/// A stored third-party authorization grant (e.g. a mail provider),
/// distinct from the user's own session credential.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuthConnection {
    /// Tenant identifier.
    pub tenant_id: String,
    /// User identifier.
    pub user_id: String,
    /// Provider name.
    pub provider: String,
    /// Current provider access token.
    pub access_token: String,
    /// Provider refresh token, if one was granted.
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// When the access token expires (if known).
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    /// Granted scopes, space separated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    /// When the connection was created.
    pub created_at: DateTime<Utc>,
    /// When the connection was last updated.
    pub updated_at: DateTime<Utc>,
}

impl OAuthConnection {
    /// Creates a connection from a completed consent flow.
    #[must_use]
    pub fn new(
        key: &ConnectionKey,
        access_token: impl Into<String>,
        refresh_token: Option<String>,
        expires_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            tenant_id: key.tenant_id.clone(),
            user_id: key.user_id.clone(),
            provider: key.provider.clone(),
            access_token: access_token.into(),
            refresh_token,
            expires_at,
            scope: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Returns the uniqueness key of this connection.
    #[must_use]
    pub fn key(&self) -> ConnectionKey {
        ConnectionKey {
            tenant_id: self.tenant_id.clone(),
            user_id: self.user_id.clone(),
            provider: self.provider.clone(),
        }
    }

    /// True when the access token is past its expiry at `now`.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expires_at| expires_at < now)
    }

    /// True when the access token can be used at `now` without refreshing,
    /// keeping `margin` of headroom. Tokens without expiry are always fresh;
    /// a margin reaching past the representable range makes every other
    /// token stale.
    #[must_use]
    pub fn is_fresh(&self, now: DateTime<Utc>, margin: Duration) -> bool {
        self.expires_at.is_none_or(|expires_at| {
            now.checked_add_signed(margin)
                .is_some_and(|deadline| expires_at > deadline)
        })
    }

    /// Whether a refresh grant is possible.
    #[must_use]
    pub fn can_refresh(&self) -> bool {
        self.refresh_token
            .as_deref()
            .is_some_and(|token| !token.is_empty())
    }

    /// Applies a refreshed provider token. The stored refresh token is kept
    /// when the provider does not rotate it.
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::InvalidExpiry`] when `expires_in` does not
    /// yield an expiry instant. The connection is left unchanged.
    pub fn apply_refresh(&mut self, token: ProviderToken, now: DateTime<Utc>) -> DomainResult<()> {
        let expires_at = expiry_after(now, token.expires_in)?;
        self.access_token = token.access_token;
        if let Some(refresh_token) = token.refresh_token.filter(|t| !t.is_empty()) {
            self.refresh_token = Some(refresh_token);
        }
        self.expires_at = expires_at;
        if token.scope.is_some() {
            self.scope = token.scope;
        }
        self.updated_at = now;
        Ok(())
    }
}

impl fmt::Debug for OAuthConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OAuthConnection")
            .field("key", &self.key().to_string())
            .field("has_refresh_token", &self.can_refresh())
            .field("expires_at", &self.expires_at)
            .field("updated_at", &self.updated_at)
            .finish_non_exhaustive()
    }
}

/// Token returned by a provider's refresh grant.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderToken {
    /// New access token.
    pub access_token: String,
    /// Rotated refresh token, if the provider issued one.
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Seconds until expiry.
    #[serde(default)]
    pub expires_in: Option<i64>,
    /// Granted scopes.
    #[serde(default)]
    pub scope: Option<String>,
}

impl fmt::Debug for ProviderToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderToken")
            .field("rotated_refresh_token", &self.refresh_token.is_some())
            .field("expires_in", &self.expires_in)
            .finish_non_exhaustive()
    }
}

/// Access token handed to integration services, ready for an outbound
/// provider call.
#[derive(Clone, PartialEq, Eq)]
pub struct ProviderAccessToken {
    /// Connection the token belongs to.
    pub key: ConnectionKey,
    /// The access token.
    pub access_token: String,
    /// When it expires (if known).
    pub expires_at: Option<DateTime<Utc>>,
}

impl fmt::Debug for ProviderAccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderAccessToken")
            .field("key", &self.key)
            .field("expires_at", &self.expires_at)
            .finish_non_exhaustive()
    }
}
