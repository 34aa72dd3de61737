//! API response type

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;

/// Response received from the CRM API.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ApiResponse {
    /// HTTP status code
    pub status: u16,
    /// Response headers (lowercase names)
    pub headers: BTreeMap<String, String>,
    /// Raw response body
    pub body: Vec<u8>,
}

impl ApiResponse {
    /// Creates a response.
    #[must_use]
    pub const fn new(status: u16, headers: BTreeMap<String, String>, body: Vec<u8>) -> Self {
        Self {
            status,
            headers,
            body,
        }
    }

    /// Creates a response with a JSON body.
    #[must_use]
    pub fn json_body(status: u16, body: &serde_json::Value) -> Self {
        Self {
            status,
            headers: BTreeMap::from([(
                "content-type".to_string(),
                "application/json".to_string(),
            )]),
            body: body.to_string().into_bytes(),
        }
    }

    /// Returns true if the status code indicates success (2xx).
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }

    /// Body decoded as lossy UTF-8.
    #[must_use]
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Decodes the body as JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if the body is not valid JSON for `T`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }
}
