//! Outbound request authentication.

use neocrm_domain::request::{ACCEPT, APPLICATION_JSON, AUTHORIZATION, CONTENT_TYPE};
use neocrm_domain::auth::DEFAULT_TOKEN_TYPE;
use neocrm_domain::{ApiRequest, Credential, authorization_value};

/// Decorates outbound requests with the session credential.
///
/// Stateless: the result depends only on the request and the credential
/// passed in.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestAuthenticator;

impl RequestAuthenticator {
    /// Creates an authenticator.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Attach `Authorization: <token_type> <access_token>` when a
    /// credential is present and the JSON content headers. Without a credential any
    /// stale `Authorization` header is left as the caller set it.
    #[must_use]
    pub fn authenticate(&self, request: ApiRequest, credential: Option<&Credential>) -> ApiRequest {
        let request = Self::with_json_headers(request);
        match credential {
            Some(credential) => {
                request.with_header(AUTHORIZATION, credential.authorization_header())
            }
            None => request,
        }
    }

    /// Attach a specific bearer access token, as used when replaying a
    /// request after a refresh whose credential is no longer current.
    #[must_use]
    pub fn authenticate_with_token(&self, request: ApiRequest, access_token: &str) -> ApiRequest {
        Self::with_json_headers(request).with_header(
            AUTHORIZATION,
            authorization_value(DEFAULT_TOKEN_TYPE, access_token),
        )
    }

    fn with_json_headers(mut request: ApiRequest) -> ApiRequest {
        if request.header(CONTENT_TYPE).is_none() {
            request.set_header(CONTENT_TYPE, APPLICATION_JSON);
        }
        if request.header(ACCEPT).is_none() {
            request.set_header(ACCEPT, APPLICATION_JSON);
        }
        request
    }
}
