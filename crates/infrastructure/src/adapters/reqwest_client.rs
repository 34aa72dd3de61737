//! HTTP Client implementation using reqwest.
//!
//! This adapter implements the `HttpClient` port for CRM API calls. Paths
//! are resolved against the configured base URL; any response status,
//! including an authentication failure, is returned as a response.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use neocrm_application::ports::{HttpClient, HttpClientError};
use neocrm_domain::{ApiRequest, ApiResponse, HttpMethod};
use reqwest::{Client, Method, Url};
use tracing::debug;

/// Default per-request timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP client implementation using reqwest.
#[derive(Debug, Clone)]
pub struct ReqwestHttpClient {
    client: Client,
    base_url: Url,
    timeout: Duration,
}

impl ReqwestHttpClient {
    /// Creates a client for the API at `base_url`.
    ///
    /// Default configuration:
    /// - Follow redirects: up to 10
    /// - TLS verification: enabled
    /// - User-Agent: "NeoCRM/<version>"
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL is invalid or the client cannot be
    /// created.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, HttpClientError> {
        let base_url =
            Url::parse(base_url).map_err(|e| HttpClientError::InvalidUrl(format!("{e}: {base_url}")))?;
        let client = Client::builder()
            .user_agent(concat!("NeoCRM/", env!("CARGO_PKG_VERSION")))
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .map_err(|e| HttpClientError::Other(e.to_string()))?;

        Ok(Self {
            client,
            base_url,
            timeout,
        })
    }

    /// Creates a client around an existing reqwest client.
    #[must_use]
    pub const fn with_client(client: Client, base_url: Url, timeout: Duration) -> Self {
        Self {
            client,
            base_url,
            timeout,
        }
    }

    /// The API base URL.
    #[must_use]
    pub const fn base_url(&self) -> &Url {
        &self.base_url
    }

    const fn to_reqwest_method(method: HttpMethod) -> Method {
        match method {
            HttpMethod::Get => Method::GET,
            HttpMethod::Post => Method::POST,
            HttpMethod::Put => Method::PUT,
            HttpMethod::Patch => Method::PATCH,
            HttpMethod::Delete => Method::DELETE,
        }
    }

    fn map_error(&self, error: &reqwest::Error) -> HttpClientError {
        if error.is_timeout() {
            return HttpClientError::Timeout {
                timeout_ms: u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX),
            };
        }
        if error.is_connect() {
            return HttpClientError::ConnectionFailed(error.to_string());
        }
        HttpClientError::Other(error.to_string())
    }
}

#[async_trait]
impl HttpClient for ReqwestHttpClient {
    async fn execute(&self, request: &ApiRequest) -> Result<ApiResponse, HttpClientError> {
        let url = request.url(self.base_url.as_str());
        let parsed_url =
            Url::parse(&url).map_err(|e| HttpClientError::InvalidUrl(format!("{e}: {url}")))?;

        let mut builder = self
            .client
            .request(Self::to_reqwest_method(request.method), parsed_url)
            .timeout(self.timeout);
        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }
        if let Some(body) = &request.body {
            let bytes =
                serde_json::to_vec(body).map_err(|e| HttpClientError::Other(e.to_string()))?;
            builder = builder.body(bytes);
        }

        debug!(request_id = %request.id, method = %request.method, %url, "sending request");
        let response = builder.send().await.map_err(|e| self.map_error(&e))?;

        let status = response.status().as_u16();
        let headers: BTreeMap<String, String> = response
            .headers()
            .iter()
            .map(|(k, v)| (k.as_str().to_string(), v.to_str().unwrap_or("<binary>").to_string()))
            .collect();
        let body = response
            .bytes()
            .await
            .map_err(|e| HttpClientError::Other(format!("Failed to read body: {e}")))?
            .to_vec();

        debug!(request_id = %request.id, status, "response received");
        Ok(ApiResponse::new(status, headers, body))
    }
}
