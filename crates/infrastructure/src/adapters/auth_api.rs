//! Session endpoints of the CRM backend over HTTP.

use std::sync::Arc;

use async_trait::async_trait;
use neocrm_application::ports::{AuthApi, AuthApiError, HttpClient, HttpClientError};
use neocrm_domain::request::{ACCEPT, APPLICATION_JSON, CONTENT_TYPE};
use neocrm_domain::{ApiEnvelope, ApiRequest, ApiResponse, AuthResponse};
use serde::de::DeserializeOwned;
use serde_json::json;

/// Login endpoint path.
pub const LOGIN_PATH: &str = "/auth/login";
/// Refresh endpoint path.
pub const REFRESH_PATH: &str = "/auth/refresh";
/// Logout endpoint path.
pub const LOGOUT_PATH: &str = "/auth/logout";

/// [`AuthApi`] calling `/auth/login`, `/auth/refresh` and `/auth/logout`.
///
/// These calls are sent without a bearer token and bypass credential
/// recovery: a rejected refresh is reported, never retried.
#[derive(Clone)]
pub struct HttpAuthApi {
    http: Arc<dyn HttpClient>,
}

impl HttpAuthApi {
    /// Creates the adapter over a transport rooted at the API base URL.
    #[must_use]
    pub fn new(http: Arc<dyn HttpClient>) -> Self {
        Self { http }
    }

    async fn call(&self, path: &str, body: serde_json::Value) -> Result<ApiResponse, AuthApiError> {
        let request = ApiRequest::post(path, body)
            .with_header(CONTENT_TYPE, APPLICATION_JSON)
            .with_header(ACCEPT, APPLICATION_JSON);
        let response = self.http.execute(&request).await.map_err(|e| match e {
            HttpClientError::Timeout { .. }
            | HttpClientError::ConnectionFailed(_)
            | HttpClientError::Other(_) => AuthApiError::Network(e.to_string()),
            HttpClientError::InvalidUrl(message) => AuthApiError::InvalidResponse(message),
        })?;

        if response.is_success() {
            Ok(response)
        } else {
            Err(AuthApiError::Rejected {
                status: response.status,
                message: Self::failure_message(&response),
            })
        }
    }

    fn failure_message(response: &ApiResponse) -> String {
        response
            .json::<ApiEnvelope<serde_json::Value>>()
            .ok()
            .and_then(|envelope| envelope.into_data().err())
            .unwrap_or_else(|| {
                let text = response.text();
                if text.trim().is_empty() {
                    format!("status {}", response.status)
                } else {
                    text
                }
            })
    }

    fn payload<T: DeserializeOwned>(response: &ApiResponse) -> Result<T, AuthApiError> {
        response
            .json::<ApiEnvelope<T>>()
            .map_err(|e| AuthApiError::InvalidResponse(e.to_string()))?
            .into_data()
            .map_err(AuthApiError::InvalidResponse)
    }
}

#[async_trait]
impl AuthApi for HttpAuthApi {
    async fn login(&self, email: &str, password: &str) -> Result<AuthResponse, AuthApiError> {
        let response = self
            .call(LOGIN_PATH, json!({"email": email, "password": password}))
            .await?;
        Self::payload(&response)
    }

    async fn refresh(&self, refresh_token: &str) -> Result<AuthResponse, AuthApiError> {
        let response = self
            .call(REFRESH_PATH, json!({"refreshToken": refresh_token}))
            .await?;
        Self::payload(&response)
    }

    async fn logout(&self, refresh_token: &str) -> Result<(), AuthApiError> {
        self.call(LOGOUT_PATH, json!({"refreshToken": refresh_token}))
            .await
            .map(|_| ())
    }
}

impl std::fmt::Debug for HttpAuthApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpAuthApi").finish_non_exhaustive()
    }
}
