//! Error taxonomy for outbound calls.
//!
//! # Propagation
//! - `Connection` / `Timeout` are absorbed by the retry layer and turned into a
//!   synthesized 599 response once attempts run out
//! - `CircuitOpen` and `Serialization` always reach the caller as errors
//! - Everything else is captured inside the `ResponseModel` unless the request
//!   opted into throw mode

use std::time::Duration;
use thiserror::Error;

/// Errors raised while building, executing or mapping a call.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CallerError {
    /// The transport could not reach the remote end.
    #[error("connection failed: {0}")]
    Connection(String),

    /// A single transport call exceeded its deadline.
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// A response carried a failing status and the caller asked to raise it.
    #[error("HTTP request failed with status code: {status} ({method} {url})")]
    HttpStatus {
        status: u16,
        method: String,
        url: String,
    },

    /// The breaker for the target service is open.
    #[error("Circuit breaker is OPEN for service: {service}")]
    CircuitOpen { service: String },

    /// The request body could not be encoded.
    #[error("serialization failed: {0}")]
    Serialization(String),

    /// A DTO could not be hydrated from the response.
    #[error("mapping failed: {0}")]
    Mapping(String),

    /// The response body was not valid JSON.
    #[error("failed to decode response body: {0}")]
    Decode(String),

    /// The request description itself is unusable (bad URL, bad header).
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// A registry lookup named an operation nobody registered.
    #[error("unknown operation: {0}")]
    UnknownOperation(String),
}

impl CallerError {
    /// Transport-level failures that never produced a response.
    pub fn is_connection_failure(&self) -> bool {
        matches!(self, CallerError::Connection(_) | CallerError::Timeout(_))
    }

    /// Errors that are raised even when throw mode is off.
    pub fn always_propagates(&self) -> bool {
        matches!(
            self,
            CallerError::CircuitOpen { .. } | CallerError::Serialization(_)
        )
    }

    /// Stable classification name, used in logs and the 599 sentinel body.
    pub fn kind(&self) -> &'static str {
        match self {
            CallerError::Connection(_) => "ConnectionError",
            CallerError::Timeout(_) => "TimeoutError",
            CallerError::HttpStatus { .. } => "HTTPStatusError",
            CallerError::CircuitOpen { .. } => "CircuitOpenError",
            CallerError::Serialization(_) => "SerializationError",
            CallerError::Mapping(_) => "MappingError",
            CallerError::Decode(_) => "DecodeError",
            CallerError::InvalidRequest(_) => "InvalidRequestError",
            CallerError::UnknownOperation(_) => "UnknownOperationError",
        }
    }
}

/// Result type for caller operations.
pub type Result<T> = std::result::Result<T, CallerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_classification() {
        assert!(CallerError::Connection("refused".into()).is_connection_failure());
        assert!(CallerError::Timeout(Duration::from_secs(1)).is_connection_failure());
        assert!(!CallerError::Serialization("bad".into()).is_connection_failure());
    }

    #[test]
    fn test_always_propagates() {
        let open = CallerError::CircuitOpen {
            service: "billing".into(),
        };
        assert!(open.always_propagates());
        assert!(CallerError::Serialization("x".into()).always_propagates());
        assert!(!CallerError::Connection("x".into()).always_propagates());
        assert!(!CallerError::Mapping("x".into()).always_propagates());
    }

    #[test]
    fn test_error_display() {
        let err = CallerError::CircuitOpen {
            service: "billing".into(),
        };
        assert_eq!(err.to_string(), "Circuit breaker is OPEN for service: billing");

        let err = CallerError::HttpStatus {
            status: 503,
            method: "GET".into(),
            url: "https://api.test/items".into(),
        };
        assert!(err.to_string().contains("503"));
        assert_eq!(err.kind(), "HTTPStatusError");
    }
}
