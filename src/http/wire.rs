//! What crosses the transport boundary.

use bytes::Bytes;
use serde_json::json;

use crate::error::CallerError;
use crate::http::headers::HeaderMap;
use crate::http::request::Method;

/// Status synthesized when no response could be obtained.
pub const NETWORK_FAILURE_STATUS: u16 = 599;

/// A request ready to be sent: absolute URI, normalized headers, encoded body.
#[derive(Debug, Clone, PartialEq)]
pub struct WireRequest {
    pub method: Method,
    pub uri: url::Url,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl WireRequest {
    /// Host part of the URI, used as the default breaker service name.
    pub fn host(&self) -> &str {
        self.uri.host_str().unwrap_or("unknown")
    }
}

/// A response as the transport produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct RawResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: Bytes,
    pub version: String,
}

impl RawResponse {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: Bytes::new(),
            version: "1.1".to_string(),
        }
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.append(name, value);
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// JSON response with a matching Content-Type.
    pub fn json(status: u16, value: &serde_json::Value) -> Self {
        Self::new(status)
            .with_header("Content-Type", "application/json")
            .with_body(value.to_string())
    }

    /// The 599 sentinel standing in for a failure that produced no response.
    pub fn network_failure(error: &CallerError) -> Self {
        Self::json(
            NETWORK_FAILURE_STATUS,
            &json!({
                "message": "Network error",
                "error": error.kind(),
                "detail": error.to_string(),
            }),
        )
    }

    pub fn is_network_failure(&self) -> bool {
        self.status == NETWORK_FAILURE_STATUS
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// `Retry-After` as whole seconds, when numeric.
    pub fn retry_after_secs(&self) -> Option<u64> {
        self.headers
            .get("retry-after")
            .and_then(|v| v.trim().parse::<u64>().ok())
    }
}
