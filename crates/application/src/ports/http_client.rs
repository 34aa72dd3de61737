//! HTTP Client port

use async_trait::async_trait;
use neocrm_domain::{ApiRequest, ApiResponse};

/// Transport-level failures. A response with any status code, including
/// 401, is not an error at this layer.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HttpClientError {
    /// The request did not complete within its timeout.
    #[error("request timed out after {timeout_ms} ms")]
    Timeout {
        /// Timeout that elapsed.
        timeout_ms: u64,
    },

    /// The connection could not be established.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// The URL could not be parsed.
    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    /// Any other transport failure.
    #[error("{0}")]
    Other(String),
}

/// Port for executing API requests.
///
/// This trait abstracts the HTTP client implementation, allowing
/// the application layer to be independent of specific HTTP libraries.
#[async_trait]
pub trait HttpClient: Send + Sync {
    /// Executes a request and returns the response, whatever its status.
    ///
    /// # Errors
    ///
    /// Returns an error only if the request fails at the transport level.
    async fn execute(&self, request: &ApiRequest) -> Result<ApiResponse, HttpClientError>;
}
