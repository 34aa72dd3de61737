//! Session credential types.
//!
//! A [`Credential`] is the access/refresh token pair issued by the CRM
//! backend together with the identity snapshot of the signed-in user.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};

/// Default token type when the server omits one.
pub const DEFAULT_TOKEN_TYPE: &str = "Bearer";

/// Formats an `Authorization` header value. A blank `token_type` falls
/// back to [`DEFAULT_TOKEN_TYPE`].
#[must_use]
pub fn authorization_value(token_type: &str, access_token: &str) -> String {
    let token_type = token_type.trim();
    let token_type = if token_type.is_empty() {
        DEFAULT_TOKEN_TYPE
    } else {
        token_type
    };
    format!("{token_type} {access_token}")
}

/// Expiry instant of a token issued at `now` with a lifetime of
/// `expires_in` seconds.
///
/// # Errors
///
/// Returns [`DomainError::InvalidExpiry`] for negative lifetimes and for
/// lifetimes whose expiry falls outside the representable date range.
pub(crate) fn expiry_after(
    now: DateTime<Utc>,
    expires_in: Option<i64>,
) -> DomainResult<Option<DateTime<Utc>>> {
    let Some(secs) = expires_in else {
        return Ok(None);
    };
    if secs < 0 {
        return Err(DomainError::InvalidExpiry(secs));
    }
    Duration::try_seconds(secs)
        .and_then(|lifetime| now.checked_add_signed(lifetime))
        .map(Some)
        .ok_or(DomainError::InvalidExpiry(secs))
}

/// Immutable snapshot of the identity fields needed for UI and
/// authorization checks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    /// User identifier.
    pub id: String,
    /// Tenant the user belongs to.
    pub tenant_id: String,
    /// Role name (e.g. `ADMIN`, `AGENT`).
    pub role: String,
    /// Name shown in the UI.
    #[serde(alias = "fullName")]
    pub display_name: String,
    /// Login e-mail, when the server sends it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Tenant display name, when the server sends it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_name: Option<String>,
}

impl UserSummary {
    /// Creates a summary with the mandatory fields.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        tenant_id: impl Into<String>,
        role: impl Into<String>,
        display_name: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            tenant_id: tenant_id.into(),
            role: role.into(),
            display_name: display_name.into(),
            email: None,
            tenant_name: None,
        }
    }
}

/// Token payload returned by the login and refresh endpoints.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    /// Short-lived access token.
    pub access_token: String,
    /// Long-lived refresh token.
    pub refresh_token: String,
    /// Token type, usually `Bearer`.
    #[serde(default)]
    pub token_type: String,
    /// Seconds until the access token expires.
    #[serde(default)]
    pub expires_in: Option<i64>,
    /// The authenticated user.
    pub user: UserSummary,
}

impl std::fmt::Debug for AuthResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthResponse")
            .field("token_type", &self.token_type)
            .field("expires_in", &self.expires_in)
            .field("user", &self.user.id)
            .finish_non_exhaustive()
    }
}

/// Response envelope used by the CRM backend: `{success, message, data}`.
///
/// Some endpoints answer with the bare payload instead, so
/// [`ApiEnvelope::into_data`] accepts both shapes.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ApiEnvelope<T> {
    /// `{success, message, data}` wrapper.
    Wrapped {
        /// Whether the call succeeded.
        success: bool,
        /// Optional server message.
        #[serde(default)]
        message: Option<String>,
        /// Payload, present on success.
        #[serde(default = "Option::default")]
        data: Option<T>,
    },
    /// Bare payload.
    Bare(T),
}

impl<T> ApiEnvelope<T> {
    /// Extracts the payload, or the server message when the call failed.
    ///
    /// # Errors
    ///
    /// Returns the server message (or a generic one) when the envelope
    /// reports failure or carries no data.
    pub fn into_data(self) -> Result<T, String> {
        match self {
            Self::Bare(data)
            | Self::Wrapped {
                success: true,
                data: Some(data),
                ..
            } => Ok(data),
            Self::Wrapped { message, .. } => {
                Err(message.unwrap_or_else(|| "request was not successful".to_string()))
            }
        }
    }
}

/// The access/refresh token pair plus user identity of a client session.
///
/// Owned by the token store and always replaced wholesale.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    /// Access token sent as bearer credential.
    pub access_token: String,
    /// Refresh token used to obtain a new access token.
    pub refresh_token: String,
    /// Token type (usually "Bearer").
    pub token_type: String,
    /// When the access token expires (if known).
    pub expires_at: Option<DateTime<Utc>>,
    /// The signed-in user.
    pub user: UserSummary,
}

impl Credential {
    /// Builds a credential from a login/refresh payload received at `now`.
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::InvalidExpiry`] when `expiresIn` is negative
    /// or too large to yield an expiry instant.
    pub fn from_auth_response(response: AuthResponse, now: DateTime<Utc>) -> DomainResult<Self> {
        let expires_at = expiry_after(now, response.expires_in)?;
        let token_type = if response.token_type.trim().is_empty() {
            DEFAULT_TOKEN_TYPE.to_string()
        } else {
            response.token_type
        };

        Ok(Self {
            access_token: response.access_token,
            refresh_token: response.refresh_token,
            token_type,
            expires_at,
            user: response.user,
        })
    }

    /// Returns the `Authorization` header value, e.g. `Bearer <token>`.
    #[must_use]
    pub fn authorization_header(&self) -> String {
        authorization_value(&self.token_type, &self.access_token)
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .field("token_type", &self.token_type)
            .field("expires_at", &self.expires_at)
            .field("user", &self.user)
            .finish()
    }
}
