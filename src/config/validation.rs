//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (attempts >= 1, timeouts > 0)
//! - Check that related values agree (base delay <= max delay)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: CallerConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::fmt;

use crate::config::schema::{CallerConfig, MAX_TIMEOUT_SECS};

/// A single semantic problem found in a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub field: &'static str,
    /// Human readable reason.
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

const LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];
const FORMATS: [&str; 2] = ["pretty", "json"];

/// Validate a configuration, collecting every violation.
pub fn validate_config(config: &CallerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if !valid_timeout(config.http.timeout) {
        errors.push(ValidationError::new("http.timeout", timeout_message()));
    }
    if !valid_timeout(config.http.connect_timeout) {
        errors.push(ValidationError::new("http.connect_timeout", timeout_message()));
    }
    if let Some(base) = &config.http.base_url {
        if url::Url::parse(base).is_err() {
            errors.push(ValidationError::new(
                "http.base_url",
                format!("'{}' is not an absolute URL", base),
            ));
        }
    }

    if config.retry.max_attempts == 0 {
        errors.push(ValidationError::new("retry.max_attempts", "must be at least 1"));
    }
    if config.retry.base_delay_ms > config.retry.max_delay_ms {
        errors.push(ValidationError::new(
            "retry.base_delay_ms",
            format!(
                "{} exceeds retry.max_delay_ms {}",
                config.retry.base_delay_ms, config.retry.max_delay_ms
            ),
        ));
    }

    if config.circuit_breaker.failure_threshold == 0 {
        errors.push(ValidationError::new(
            "circuit_breaker.failure_threshold",
            "must be at least 1",
        ));
    }
    if config.circuit_breaker.timeout_seconds == 0 {
        errors.push(ValidationError::new(
            "circuit_breaker.timeout_seconds",
            "must be at least 1",
        ));
    }

    if !LEVELS.contains(&config.logging.level.to_lowercase().as_str()) {
        errors.push(ValidationError::new(
            "logging.level",
            format!("unknown level '{}'", config.logging.level),
        ));
    }
    if !FORMATS.contains(&config.logging.format.as_str()) {
        errors.push(ValidationError::new(
            "logging.format",
            format!("unknown format '{}'", config.logging.format),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn valid_timeout(secs: f64) -> bool {
    secs.is_finite() && secs > 0.0 && secs <= MAX_TIMEOUT_SECS
}

fn timeout_message() -> String {
    format!("must be a finite number of seconds in (0, {}]", MAX_TIMEOUT_SECS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&CallerConfig::default()).is_ok());
    }

    #[test]
    fn test_rejects_non_finite_timeouts() {
        let mut config = CallerConfig::default();
        config.http.timeout = f64::INFINITY;
        config.http.connect_timeout = f64::NAN;

        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field).collect();
        assert_eq!(fields, vec!["http.timeout", "http.connect_timeout"]);

        config.http.timeout = 90_000.0;
        config.http.connect_timeout = 2.5;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors[0].field, "http.timeout");
    }

    #[test]
    fn test_collects_all_errors() {
        let mut config = CallerConfig::default();
        config.retry.max_attempts = 0;
        config.retry.base_delay_ms = 5000;
        config.circuit_breaker.failure_threshold = 0;
        config.logging.level = "loud".into();

        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field).collect();
        assert_eq!(
            fields,
            vec![
                "retry.max_attempts",
                "retry.base_delay_ms",
                "circuit_breaker.failure_threshold",
                "logging.level",
            ]
        );
    }

    #[test]
    fn test_rejects_relative_base_url() {
        let mut config = CallerConfig::default();
        config.http.base_url = Some("/api".into());
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors[0].field, "http.base_url");
    }
}
