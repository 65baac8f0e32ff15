//! Retry decisions.
//!
//! # Responsibilities
//! - Classify each attempt's outcome (connection failure, 429, 5xx, final)
//! - Decide whether another attempt is allowed and how long to wait
//!
//! # Design Decisions
//! - Pure: no sleeping, no I/O; the retry middleware owns the loop
//! - Attempts are counted from 1; `max_attempts` includes the first call
//! - Only connection-level errors are retried; other errors are final

use std::time::Duration;

use crate::config::RetryConfig;
use crate::error::CallerError;
use crate::http::wire::RawResponse;
use crate::resilience::backoff;

/// Why an attempt is worth repeating.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryReason {
    Connection,
    TooManyRequests,
    ServerError,
}

impl RetryReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            RetryReason::Connection => "connection",
            RetryReason::TooManyRequests => "too_many_requests",
            RetryReason::ServerError => "server_error",
        }
    }
}

/// Outcome of `RetryPolicy::decide`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    Retry { delay: Duration, reason: RetryReason },
    Stop,
}

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    config: RetryConfig,
}

impl RetryPolicy {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Retry-eligibility of an outcome, ignoring the attempt budget.
    pub fn classify(&self, outcome: &Result<RawResponse, CallerError>) -> Option<RetryReason> {
        match outcome {
            Err(e) if e.is_connection_failure() && self.config.on_connection_exception => {
                Some(RetryReason::Connection)
            }
            Err(_) => None,
            Ok(r) if r.status == 429 && self.config.on_too_many_requests => {
                Some(RetryReason::TooManyRequests)
            }
            Ok(r) if (500..600).contains(&r.status) && self.config.on_server_errors => {
                Some(RetryReason::ServerError)
            }
            Ok(_) => None,
        }
    }

    /// Decide what follows attempt number `attempt` (1-based).
    pub fn decide(&self, attempt: u32, outcome: &Result<RawResponse, CallerError>) -> RetryDecision {
        if !self.config.enabled || attempt >= self.config.max_attempts {
            return RetryDecision::Stop;
        }

        match self.classify(outcome) {
            Some(reason) => {
                let retry_after = outcome.as_ref().ok().and_then(RawResponse::retry_after_secs);
                RetryDecision::Retry {
                    delay: backoff::retry_delay(
                        attempt,
                        self.config.base_delay_ms,
                        self.config.max_delay_ms,
                        retry_after,
                        self.config.jitter,
                    ),
                    reason,
                }
            }
            None => RetryDecision::Stop,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> RetryPolicy {
        RetryPolicy::new(RetryConfig {
            jitter: false,
            ..Default::default()
        })
    }

    fn delay_of(decision: RetryDecision) -> Duration {
        match decision {
            RetryDecision::Retry { delay, .. } => delay,
            RetryDecision::Stop => panic!("expected retry"),
        }
    }

    #[test]
    fn test_server_error_delays() {
        let p = policy();
        let outcome = Ok(RawResponse::new(503));
        assert_eq!(delay_of(p.decide(1, &outcome)), Duration::from_millis(200));
        assert_eq!(delay_of(p.decide(2, &outcome)), Duration::from_millis(400));
        assert_eq!(p.decide(3, &outcome), RetryDecision::Stop);
    }

    #[test]
    fn test_retry_after_floor() {
        let outcome = Ok(RawResponse::new(429).with_header("Retry-After", "5"));
        match policy().decide(1, &outcome) {
            RetryDecision::Retry { delay, reason } => {
                assert!(delay >= Duration::from_millis(5000));
                assert_eq!(reason, RetryReason::TooManyRequests);
            }
            RetryDecision::Stop => panic!("expected retry"),
        }
    }

    #[test]
    fn test_connection_failure_retried() {
        let outcome = Err(CallerError::Timeout(Duration::from_secs(1)));
        assert_eq!(policy().classify(&outcome), Some(RetryReason::Connection));

        let outcome = Err(CallerError::InvalidRequest("bad".into()));
        assert_eq!(policy().decide(1, &outcome), RetryDecision::Stop);
    }

    #[test]
    fn test_final_statuses() {
        let p = policy();
        for status in [200, 201, 404, 422] {
            assert_eq!(p.decide(1, &Ok(RawResponse::new(status))), RetryDecision::Stop);
        }
    }

    #[test]
    fn test_flags_respected() {
        let p = RetryPolicy::new(RetryConfig {
            on_server_errors: false,
            on_too_many_requests: false,
            on_connection_exception: false,
            ..Default::default()
        });
        assert_eq!(p.classify(&Ok(RawResponse::new(500))), None);
        assert_eq!(p.classify(&Ok(RawResponse::new(429))), None);
        assert_eq!(p.classify(&Err(CallerError::Connection("x".into()))), None);

        let disabled = RetryPolicy::new(RetryConfig {
            enabled: false,
            ..Default::default()
        });
        assert_eq!(disabled.decide(1, &Ok(RawResponse::new(503))), RetryDecision::Stop);
    }

    #[test]
    fn test_jittered_delay_in_range() {
        let p = RetryPolicy::new(RetryConfig::default());
        for _ in 0..50 {
            let d = delay_of(p.decide(2, &Ok(RawResponse::new(500))));
            assert!(d >= Duration::from_millis(200) && d <= Duration::from_millis(400));
        }
    }
}
