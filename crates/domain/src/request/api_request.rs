//! Outbound API request type

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{DomainError, DomainResult};

/// Name of the authorization header.
pub const AUTHORIZATION: &str = "Authorization";
/// Name of the content type header.
pub const CONTENT_TYPE: &str = "Content-Type";
/// Name of the accept header.
pub const ACCEPT: &str = "Accept";
/// JSON media type used by every CRM endpoint.
pub const APPLICATION_JSON: &str = "application/json";

/// HTTP methods used against the CRM API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    /// HTTP GET method
    #[default]
    Get,
    /// HTTP POST method
    Post,
    /// HTTP PUT method
    Put,
    /// HTTP PATCH method
    Patch,
    /// HTTP DELETE method
    Delete,
}

impl HttpMethod {
    /// Returns the method as a static string.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HttpMethod {
    type Err = DomainError;

    fn from_str(s: &str) -> DomainResult<Self> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(Self::Get),
            "POST" => Ok(Self::Post),
            "PUT" => Ok(Self::Put),
            "PATCH" => Ok(Self::Patch),
            "DELETE" => Ok(Self::Delete),
            other => Err(DomainError::UnsupportedMethod(other.to_string())),
        }
    }
}

/// A request to the CRM API, before and after authentication.
///
/// `path` is relative to the configured API base URL unless it is already
/// absolute. Header names are matched case-insensitively.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiRequest {
    /// Correlation id for logging.
    pub id: Uuid,
    /// HTTP method.
    pub method: HttpMethod,
    /// Path relative to the API base, or an absolute URL.
    pub path: String,
    /// Request headers.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    /// JSON body, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<serde_json::Value>,
    /// Set once the request has been replayed after a credential refresh.
    /// A second authentication failure is then surfaced instead of retried.
    #[serde(default)]
    pub retry_already_attempted: bool,
}

impl ApiRequest {
    /// Creates a request with no headers and no body.
    #[must_use]
    pub fn new(method: HttpMethod, path: impl Into<String>) -> Self {
        Self {
            id: Uuid::now_v7(),
            method,
            path: path.into(),
            headers: BTreeMap::new(),
            body: None,
            retry_already_attempted: false,
        }
    }

    /// Creates a GET request.
    #[must_use]
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get, path)
    }

    /// Creates a POST request with a JSON body.
    #[must_use]
    pub fn post(path: impl Into<String>, body: serde_json::Value) -> Self {
        Self::new(HttpMethod::Post, path).with_body(body)
    }

    /// Creates a PUT request with a JSON body.
    #[must_use]
    pub fn put(path: impl Into<String>, body: serde_json::Value) -> Self {
        Self::new(HttpMethod::Put, path).with_body(body)
    }

    /// Creates a DELETE request.
    #[must_use]
    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Delete, path)
    }

    /// Sets the JSON body.
    #[must_use]
    pub fn with_body(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Sets a header, replacing any existing header with the same name
    /// regardless of case.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_header(name, value);
        self
    }

    /// Sets a header in place, replacing any case-insensitive match.
    pub fn set_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        self.headers.retain(|existing, _| !existing.eq_ignore_ascii_case(&name));
        self.headers.insert(name, value.into());
    }

    /// Removes a header (case-insensitive).
    pub fn remove_header(&mut self, name: &str) {
        self.headers.retain(|existing, _| !existing.eq_ignore_ascii_case(name));
    }

    /// Looks up a header value (case-insensitive).
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Returns the bearer token carried by the `Authorization` header.
    #[must_use]
    pub fn bearer_token(&self) -> Option<&str> {
        self.header(AUTHORIZATION)
            .and_then(|value| value.strip_prefix("Bearer "))
    }

    /// Resolves the request URL against `base`.
    #[must_use]
    pub fn url(&self, base: &str) -> String {
        if self.path.starts_with("http://") || self.path.starts_with("https://") {
            return self.path.clone();
        }
        format!(
            "{}/{}",
            base.trim_end_matches('/'),
            self.path.trim_start_matches('/')
        )
    }
}
