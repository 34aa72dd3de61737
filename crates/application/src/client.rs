//! Authenticated request execution with transparent credential recovery.

use std::sync::Arc;

use neocrm_domain::{ApiEnvelope, ApiRequest, ApiResponse};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::auth::{RefreshCoordinator, RequestAuthenticator, TokenStore};
use crate::error::{ClientError, ClientResult};
use crate::ports::HttpClient;

/// Status the backend uses to signal an unusable credential.
pub const DEFAULT_AUTH_FAILURE_STATUS: u16 = 401;

/// Which response status triggers credential recovery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthFailurePolicy {
    /// The designated authentication-failure status.
    pub status: u16,
}

impl AuthFailurePolicy {
    /// Creates a policy for `status`.
    #[must_use]
    pub const fn new(status: u16) -> Self {
        Self { status }
    }

    /// Whether `response` is an authentication failure.
    #[must_use]
    pub const fn is_auth_failure(&self, response: &ApiResponse) -> bool {
        response.status == self.status
    }
}

impl Default for AuthFailurePolicy {
    fn default() -> Self {
        Self::new(DEFAULT_AUTH_FAILURE_STATUS)
    }
}

/// Executes CRM API requests on behalf of the signed-in user.
///
/// A request rejected with the auth-failure status waits for a single
/// shared refresh and is replayed once with the new token.
#[derive(Clone)]
pub struct AuthenticatedClient {
    http: Arc<dyn HttpClient>,
    store: TokenStore,
    authenticator: RequestAuthenticator,
    coordinator: RefreshCoordinator,
    policy: AuthFailurePolicy,
}

impl AuthenticatedClient {
    /// Creates a client.
    #[must_use]
    pub fn new(
        http: Arc<dyn HttpClient>,
        store: TokenStore,
        coordinator: RefreshCoordinator,
        policy: AuthFailurePolicy,
    ) -> Self {
        Self {
            http,
            store,
            authenticator: RequestAuthenticator::new(),
            coordinator,
            policy,
        }
    }

    /// Send `request` with the current credential.
    ///
    /// Statuses other than the auth-failure status are returned as-is.
    ///
    /// # Errors
    ///
    /// - `Network` on transport failure (never retried)
    /// - `AuthenticationFailed` when the server rejects the credential and
    ///   no recovery applies
    /// - `RefreshFailed` when recovery failed and the session ended
    pub async fn execute(&self, request: ApiRequest) -> ClientResult<ApiResponse> {
        let credential = self.store.get();
        let sent_token = credential.as_ref().map(|c| c.access_token.clone());
        let request = self.authenticator.authenticate(request, credential.as_deref());

        let response = self.send(&request).await?;
        if !self.policy.is_auth_failure(&response) {
            return Ok(response);
        }

        let status = response.status;
        if request.retry_already_attempted {
            warn!(request_id = %request.id, status, "replayed request rejected again");
            return Err(ClientError::AuthenticationFailed { status });
        }
        let token = if sent_token.is_some() {
            debug!(request_id = %request.id, "credential rejected, waiting for refresh");
            self.coordinator
                .await_fresh_token(sent_token.as_deref())
                .await?
        } else if let Some(current) = self.store.access_token() {
            // Signed in while the request was in flight; that credential
            // was never rejected.
            debug!(request_id = %request.id, "replaying with credential obtained after send");
            current
        } else {
            debug!(request_id = %request.id, "authentication failure without a credential");
            return Err(ClientError::AuthenticationFailed { status });
        };

        let mut replay = self.authenticate_replay(request, &token);
        replay.retry_already_attempted = true;
        let response = self.send(&replay).await?;
        if self.policy.is_auth_failure(&response) {
            warn!(request_id = %replay.id, status = response.status, "replayed request rejected again");
            return Err(ClientError::AuthenticationFailed {
                status: response.status,
            });
        }
        Ok(response)
    }

    /// GET `path`.
    ///
    /// # Errors
    ///
    /// See [`AuthenticatedClient::execute`].
    pub async fn get(&self, path: &str) -> ClientResult<ApiResponse> {
        self.execute(ApiRequest::get(path)).await
    }

    /// POST a JSON body to `path`.
    ///
    /// # Errors
    ///
    /// See [`AuthenticatedClient::execute`].
    pub async fn post_json(&self, path: &str, body: serde_json::Value) -> ClientResult<ApiResponse> {
        self.execute(ApiRequest::post(path, body)).await
    }

    /// PUT a JSON body to `path`.
    ///
    /// # Errors
    ///
    /// See [`AuthenticatedClient::execute`].
    pub async fn put_json(&self, path: &str, body: serde_json::Value) -> ClientResult<ApiResponse> {
        self.execute(ApiRequest::put(path, body)).await
    }

    /// DELETE `path`.
    ///
    /// # Errors
    ///
    /// See [`AuthenticatedClient::execute`].
    pub async fn delete(&self, path: &str) -> ClientResult<ApiResponse> {
        self.execute(ApiRequest::delete(path)).await
    }

    /// Send `request` and decode the payload, unwrapping the
    /// `{success, message, data}` envelope when present.
    ///
    /// # Errors
    ///
    /// Besides the [`AuthenticatedClient::execute`] errors, returns
    /// `UnexpectedStatus` for non-2xx responses and `Decode` when the body
    /// does not match `T`.
    pub async fn send_json<T: DeserializeOwned>(&self, request: ApiRequest) -> ClientResult<T> {
        let response = self.execute(request).await?;
        if !response.is_success() {
            let message = response
                .json::<ApiEnvelope<serde_json::Value>>()
                .ok()
                .and_then(|envelope| envelope.into_data().err())
                .unwrap_or_else(|| response.text());
            return Err(ClientError::UnexpectedStatus {
                status: response.status,
                message,
            });
        }

        response
            .json::<ApiEnvelope<T>>()
            .map_err(|error| ClientError::Decode(error.to_string()))?
            .into_data()
            .map_err(ClientError::Decode)
    }

    /// The coordinator shared by this client's requests.
    #[must_use]
    pub const fn coordinator(&self) -> &RefreshCoordinator {
        &self.coordinator
    }

    /// Authenticate a replay with `access_token`, keeping the token type of
    /// the stored credential when it is the one holding that token.
    fn authenticate_replay(&self, request: ApiRequest, access_token: &str) -> ApiRequest {
        match self.store.get() {
            Some(credential) if credential.access_token == access_token => {
                self.authenticator.authenticate(request, Some(&credential))
            }
            _ => self.authenticator.authenticate_with_token(request, access_token),
        }
    }

    async fn send(&self, request: &ApiRequest) -> ClientResult<ApiResponse> {
        self.http.execute(request).await.map_err(|error| {
            debug!(request_id = %request.id, %error, "transport failure");
            ClientError::Network(error.to_string())
        })
    }
}

impl std::fmt::Debug for AuthenticatedClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthenticatedClient")
            .field("policy", &self.policy)
            .field("coordinator", &self.coordinator)
            .finish_non_exhaustive()
    }
}
