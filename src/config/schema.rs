//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the caller.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root configuration for the caller.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct CallerConfig {
    /// Transport settings (timeouts, base URL, user agent).
    pub http: HttpConfig,

    /// Retry policy.
    pub retry: RetryConfig,

    /// Response caching.
    pub cache: CacheConfig,

    /// Circuit breaker thresholds.
    pub circuit_breaker: CircuitBreakerConfig,

    /// Authentication header injection.
    pub auth: AuthConfig,

    /// Logging settings.
    pub logging: LoggingConfig,
}

/// Transport configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct HttpConfig {
    /// Per-call timeout in seconds.
    pub timeout: f64,

    /// Connection establishment timeout in seconds.
    pub connect_timeout: f64,

    /// Base URL prepended to relative request paths.
    pub base_url: Option<String>,

    /// Default User-Agent header value.
    pub user_agent: String,

    /// Honour HTTP(S)_PROXY from the environment.
    pub use_system_proxy: bool,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout: 10.0,
            connect_timeout: 5.0,
            base_url: None,
            user_agent: concat!("caller/", env!("CARGO_PKG_VERSION")).to_string(),
            use_system_proxy: true,
        }
    }
}

/// Largest accepted value for either HTTP timeout, in seconds.
pub const MAX_TIMEOUT_SECS: f64 = 86_400.0;

impl HttpConfig {
    pub fn timeout(&self) -> Duration {
        seconds_or(self.timeout, 10.0)
    }

    pub fn connect_timeout(&self) -> Duration {
        seconds_or(self.connect_timeout, 5.0)
    }
}

/// Seconds clamped to `[0, MAX_TIMEOUT_SECS]`; NaN falls back to `fallback`.
fn seconds_or(secs: f64, fallback: f64) -> Duration {
    Duration::try_from_secs_f64(secs.clamp(0.0, MAX_TIMEOUT_SECS))
        .unwrap_or_else(|_| Duration::from_secs_f64(fallback))
}

/// Retry configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct RetryConfig {
    /// Enable retries.
    pub enabled: bool,

    /// Maximum number of attempts, the first one included.
    pub max_attempts: u32,

    /// Base delay for exponential backoff in milliseconds.
    pub base_delay_ms: u64,

    /// Maximum delay for exponential backoff in milliseconds.
    pub max_delay_ms: u64,

    /// Randomize each delay within [delay/2, delay].
    pub jitter: bool,

    /// Retry on 5xx responses.
    pub on_server_errors: bool,

    /// Retry on 429 responses.
    pub on_too_many_requests: bool,

    /// Retry when no response was obtained.
    pub on_connection_exception: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_attempts: 3,
            base_delay_ms: 200,
            max_delay_ms: 2000,
            jitter: true,
            on_server_errors: true,
            on_too_many_requests: true,
            on_connection_exception: true,
        }
    }
}

/// Response cache configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct CacheConfig {
    /// Cache every GET response (per-call overrides still apply when off).
    pub enabled: bool,

    /// TTL used when the response carries no freshness hint.
    pub ttl_seconds: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            ttl_seconds: 60,
        }
    }
}

/// Circuit breaker configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Install the breaker middleware.
    pub enabled: bool,

    /// Failures before the circuit opens.
    pub failure_threshold: u32,

    /// Seconds an open circuit rejects calls before probing.
    pub timeout_seconds: u64,

    /// Seconds a half-open trial may stay outstanding before another is admitted.
    pub half_open_timeout_seconds: u64,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            failure_threshold: 5,
            timeout_seconds: 60,
            half_open_timeout_seconds: 30,
        }
    }
}

/// Authentication configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct AuthConfig {
    /// Static token injected into every call.
    pub token: Option<String>,

    /// Authorization scheme, e.g. "Bearer".
    pub scheme: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            token: None,
            scheme: "Bearer".to_string(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Install the logging middleware.
    pub enabled: bool,

    /// Level for request/response events (trace, debug, info, warn, error).
    pub level: String,

    /// Subscriber filter used when RUST_LOG is unset.
    pub filter: String,

    /// Output format: "pretty" or "json".
    pub format: String,

    /// Log bodies and unredacted credentials.
    pub log_sensitive_data: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            level: "info".to_string(),
            filter: "caller=info".to_string(),
            format: "pretty".to_string(),
            log_sensitive_data: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CallerConfig::default();
        assert!(config.retry.enabled);
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.retry.base_delay_ms, 200);
        assert!(!config.cache.enabled);
        assert_eq!(config.cache.ttl_seconds, 60);
        assert_eq!(config.circuit_breaker.failure_threshold, 5);
        assert_eq!(config.http.timeout(), Duration::from_secs(10));
    }

    #[test]
    fn test_timeout_accessors_never_panic() {
        let mut http = HttpConfig::default();
        http.timeout = f64::INFINITY;
        http.connect_timeout = f64::NAN;
        assert_eq!(http.timeout(), Duration::from_secs(86_400));
        assert_eq!(http.connect_timeout(), Duration::from_secs(5));

        http.timeout = -3.0;
        assert_eq!(http.timeout(), Duration::ZERO);
    }

    #[test]
    fn test_partial_toml() {
        let config: CallerConfig = toml::from_str(
            r#"
            [retry]
            max_attempts = 5
            jitter = false

            [cache]
            enabled = true
            "#,
        )
        .unwrap();
        assert_eq!(config.retry.max_attempts, 5);
        assert!(!config.retry.jitter);
        assert_eq!(config.retry.base_delay_ms, 200);
        assert!(config.cache.enabled);
        assert_eq!(config.http, HttpConfig::default());
    }
}
