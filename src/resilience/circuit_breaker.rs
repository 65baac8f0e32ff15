//! Circuit breaker for remote service protection.
//!
//! # States
//! - Closed: normal operation, requests pass through
//! - Open: service assumed down, requests fail fast
//! - Half-Open: one trial request is let through
//!
//! # State Transitions
//! ```text
//! ┌─────────┐  failures >= threshold   ┌──────┐
//! │ Closed  │ ───────────────────────▶ │ Open │
//! └─────────┘                          └──────┘
//!      ▲                                   │
//!      │ trial succeeds                    │ timeout elapsed since last failure
//!      │                                   ▼
//!      │                              ┌──────────┐
//!      └───────────────────────────── │ HalfOpen │
//!                                     └──────────┘
//!                                          │ trial fails
//!                                          ▼
//!                                       ┌──────┐
//!                                       │ Open │
//!                                       └──────┘
//! ```
//!
//! # Design Decisions
//! - Per-service breaker, keyed `circuit_breaker:{service}` in a shared `Store`
//! - Successes outside half-open decrement the failure count instead of
//!   resetting it, so isolated failures decay
//! - Entering half-open stamps `last_failure`; further calls are rejected
//!   until the trial resolves or `half_open_timeout_seconds` passes
//! - Every call does a plain read-modify-write. Concurrent callers can lose
//!   updates and under-count failures; the store offers no compare-and-swap
//! - An unreadable or failing store reads as the default closed state

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::config::CircuitBreakerConfig;
use crate::error::{CallerError, Result};
use crate::observability::metrics;
use crate::store::{Store, StoreError};

/// Source of "now" in unix seconds.
pub type Clock = Arc<dyn Fn() -> u64 + Send + Sync>;

/// Circuit breaker states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum CircuitStatus {
    #[default]
    Closed,
    Open,
    HalfOpen,
}

impl CircuitStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CircuitStatus::Closed => "closed",
            CircuitStatus::Open => "open",
            CircuitStatus::HalfOpen => "half-open",
        }
    }
}

/// Persisted per-service state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct BreakerState {
    pub status: CircuitStatus,
    pub failures: u32,
    /// Unix seconds, 0 when never failed.
    pub last_failure: u64,
    /// Unix seconds, 0 when never succeeded.
    pub last_success: u64,
}

#[derive(Clone)]
pub struct CircuitBreaker {
    store: Arc<dyn Store>,
    config: CircuitBreakerConfig,
    clock: Clock,
}

impl CircuitBreaker {
    pub fn new(store: Arc<dyn Store>, config: CircuitBreakerConfig) -> Self {
        Self::with_clock(store, config, Arc::new(unix_now))
    }

    pub fn with_clock(store: Arc<dyn Store>, config: CircuitBreakerConfig, clock: Clock) -> Self {
        Self {
            store,
            config,
            clock,
        }
    }

    pub fn state_key(service: &str) -> String {
        format!("circuit_breaker:{}", service)
    }

    /// Stored state of `service`, closed when nothing is stored.
    pub async fn load(&self, service: &str) -> std::result::Result<BreakerState, StoreError> {
        let key = Self::state_key(service);
        match self.store.get(&key).await? {
            Some(bytes) => serde_json::from_slice(&bytes).map_err(|e| StoreError::Corrupt {
                key,
                reason: e.to_string(),
            }),
            None => Ok(BreakerState::default()),
        }
    }

    /// Current state of `service`; store failures read as closed.
    pub async fn state(&self, service: &str) -> BreakerState {
        self.load(service).await.unwrap_or_else(|e| {
            tracing::warn!(service = %service, error = %e, "Breaker state unreadable, assuming closed");
            BreakerState::default()
        })
    }

    async fn save(&self, service: &str, state: &BreakerState) {
        let ttl = Duration::from_secs(self.config.timeout_seconds.saturating_mul(2));
        let bytes = match serde_json::to_vec(state) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(service = %service, error = %e, "Failed to encode breaker state");
                return;
            }
        };
        if let Err(e) = self.store.put(&Self::state_key(service), bytes, ttl).await {
            tracing::warn!(service = %service, error = %e, "Failed to persist breaker state");
        }
    }

    fn transition(&self, service: &str, from: CircuitStatus, to: CircuitStatus) {
        if from != to {
            tracing::info!(
                service = %service,
                from = from.as_str(),
                to = to.as_str(),
                "Circuit breaker state changed"
            );
            metrics::record_circuit_transition(service, to.as_str());
        }
    }

    /// Gate a call. Fails with `CircuitOpen` when the call must not be made.
    pub async fn check(&self, service: &str) -> Result<()> {
        let mut state = self.state(service).await;
        let now = (self.clock)();
        let since_failure = now.saturating_sub(state.last_failure);

        let cooldown = match state.status {
            CircuitStatus::Closed => return Ok(()),
            CircuitStatus::Open => self.config.timeout_seconds,
            CircuitStatus::HalfOpen => self.config.half_open_timeout_seconds,
        };

        if since_failure < cooldown {
            metrics::record_circuit_rejection(service);
            tracing::debug!(service = %service, status = state.status.as_str(), "Call rejected by open circuit");
            return Err(CallerError::CircuitOpen {
                service: service.to_string(),
            });
        }

        let from = state.status;
        state.status = CircuitStatus::HalfOpen;
        state.last_failure = now;
        self.save(service, &state).await;
        self.transition(service, from, CircuitStatus::HalfOpen);
        Ok(())
    }

    pub async fn record_success(&self, service: &str) {
        let mut state = self.state(service).await;
        let from = state.status;

        if state.status == CircuitStatus::HalfOpen {
            state.status = CircuitStatus::Closed;
            state.failures = 0;
        } else {
            state.failures = state.failures.saturating_sub(1);
        }
        state.last_success = (self.clock)();

        self.save(service, &state).await;
        self.transition(service, from, state.status);
    }

    pub async fn record_failure(&self, service: &str) {
        let mut state = self.state(service).await;
        let from = state.status;

        state.failures = state.failures.saturating_add(1);
        state.last_failure = (self.clock)();
        if state.failures >= self.config.failure_threshold || state.status == CircuitStatus::HalfOpen {
            state.status = CircuitStatus::Open;
        }

        self.save(service, &state).await;
        self.transition(service, from, state.status);
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use std::sync::atomic::{AtomicU64, Ordering};

    fn breaker() -> (CircuitBreaker, Arc<AtomicU64>) {
        let now = Arc::new(AtomicU64::new(1_000));
        let clock_now = now.clone();
        let breaker = CircuitBreaker::with_clock(
            Arc::new(MemoryStore::new()),
            CircuitBreakerConfig::default(),
            Arc::new(move || clock_now.load(Ordering::SeqCst)),
        );
        (breaker, now)
    }

    #[tokio::test]
    async fn test_opens_at_threshold() {
        let (cb, _) = breaker();
        for _ in 0..4 {
            cb.record_failure("svc").await;
        }
        assert_eq!(cb.state("svc").await.status, CircuitStatus::Closed);
        assert!(cb.check("svc").await.is_ok());

        cb.record_failure("svc").await;
        let state = cb.state("svc").await;
        assert_eq!(state.status, CircuitStatus::Open);
        assert_eq!(state.failures, 5);
        assert!(matches!(
            cb.check("svc").await,
            Err(CallerError::CircuitOpen { .. })
        ));
    }

    #[tokio::test]
    async fn test_half_open_trial_success_closes() {
        let (cb, now) = breaker();
        for _ in 0..5 {
            cb.record_failure("svc").await;
        }

        now.fetch_add(59, Ordering::SeqCst);
        assert!(cb.check("svc").await.is_err());

        now.fetch_add(1, Ordering::SeqCst);
        assert!(cb.check("svc").await.is_ok());
        assert_eq!(cb.state("svc").await.status, CircuitStatus::HalfOpen);

        cb.record_success("svc").await;
        let state = cb.state("svc").await;
        assert_eq!(state.status, CircuitStatus::Closed);
        assert_eq!(state.failures, 0);
    }

    #[tokio::test]
    async fn test_half_open_trial_failure_reopens() {
        let (cb, now) = breaker();
        for _ in 0..5 {
            cb.record_failure("svc").await;
        }
        now.fetch_add(60, Ordering::SeqCst);
        assert!(cb.check("svc").await.is_ok());

        cb.record_failure("svc").await;
        assert_eq!(cb.state("svc").await.status, CircuitStatus::Open);
        assert!(cb.check("svc").await.is_err());
    }

    #[tokio::test]
    async fn test_half_open_admits_single_trial() {
        let (cb, now) = breaker();
        for _ in 0..5 {
            cb.record_failure("svc").await;
        }
        now.fetch_add(60, Ordering::SeqCst);
        assert!(cb.check("svc").await.is_ok());
        assert!(cb.check("svc").await.is_err());

        now.fetch_add(30, Ordering::SeqCst);
        assert!(cb.check("svc").await.is_ok());
    }

    #[tokio::test]
    async fn test_success_decays_failures() {
        let (cb, _) = breaker();
        cb.record_failure("svc").await;
        cb.record_failure("svc").await;
        cb.record_success("svc").await;
        assert_eq!(cb.state("svc").await.failures, 1);

        cb.record_success("svc").await;
        cb.record_success("svc").await;
        let state = cb.state("svc").await;
        assert_eq!(state.failures, 0);
        assert_eq!(state.last_success, 1_000);
    }

    #[tokio::test]
    async fn test_services_are_independent() {
        let (cb, _) = breaker();
        for _ in 0..5 {
            cb.record_failure("a").await;
        }
        assert!(cb.check("a").await.is_err());
        assert!(cb.check("b").await.is_ok());
    }

    #[tokio::test]
    async fn test_corrupt_state_reads_as_closed() {
        let store = Arc::new(MemoryStore::new());
        let cb = CircuitBreaker::new(store.clone(), CircuitBreakerConfig::default());
        store
            .put(&CircuitBreaker::state_key("a"), b"garbage".to_vec(), Duration::from_secs(60))
            .await
            .unwrap();

        assert!(matches!(
            cb.load("a").await,
            Err(StoreError::Corrupt { key, .. }) if key == "circuit_breaker:a"
        ));
        assert_eq!(cb.state("a").await, BreakerState::default());
        assert!(cb.check("a").await.is_ok());
    }

    #[test]
    fn test_state_serialization() {
        let state = BreakerState {
            status: CircuitStatus::HalfOpen,
            ..Default::default()
        };
        let json = serde_json::to_value(state).unwrap();
        assert_eq!(json["status"], "half-open");
    }
}
