//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Call to a remote service:
//!     → circuit_breaker.rs (reject fast while the service is open)
//!     → timeouts.rs (deadline per transport attempt)
//!     → On failure: retries.rs (classify, decide, compute delay via backoff.rs)
//!     → circuit_breaker.rs (record success / failure)
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every transport attempt has a deadline
//! - A breaker rejection ends the call; it is never retried
//! - Policies are plain values; the middleware in `http::middleware` drives them

pub mod backoff;
pub mod circuit_breaker;
pub mod retries;
pub mod timeouts;

pub use circuit_breaker::{BreakerState, CircuitBreaker, CircuitStatus, Clock};
pub use retries::{RetryDecision, RetryPolicy, RetryReason};
pub use timeouts::with_timeout;
