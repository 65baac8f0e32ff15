//! Drives the retry loop around the inner chain.
//!
//! # Data Flow
//! ```text
//! attempt n → outcome
//!     → RetryPolicy::decide(n, outcome)
//!         Retry { delay } → sleep(delay) → attempt n+1
//!         Stop            → response: returned as is
//!                         → connection failure: 599 sentinel
//!                         → other error: propagated
//! ```
//!
//! Attempts are strictly sequential; the sleep suspends only this call.

use async_trait::async_trait;

use super::{Middleware, Next};
use crate::error::Result;
use crate::executor::CallContext;
use crate::http::wire::{RawResponse, WireRequest};
use crate::observability::metrics;
use crate::resilience::{RetryDecision, RetryPolicy};

pub struct RetryMiddleware {
    policy: RetryPolicy,
}

impl RetryMiddleware {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }
}

#[async_trait]
impl Middleware for RetryMiddleware {
    fn name(&self) -> &str {
        "retry"
    }

    async fn handle(
        &self,
        request: WireRequest,
        ctx: &CallContext,
        next: Next<'_>,
    ) -> Result<RawResponse> {
        let mut attempt = 1;
        loop {
            let outcome = next.run(request.clone(), ctx).await;

            match self.policy.decide(attempt, &outcome) {
                RetryDecision::Retry { delay, reason } => {
                    tracing::warn!(
                        request_id = %ctx.request_id(),
                        attempt,
                        reason = reason.as_str(),
                        delay_ms = delay.as_millis() as u64,
                        "Retrying request"
                    );
                    metrics::record_retry(reason.as_str());
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                RetryDecision::Stop => {
                    return match outcome {
                        Err(e) if e.is_connection_failure() => {
                            tracing::warn!(
                                request_id = %ctx.request_id(),
                                attempts = attempt,
                                error = %e,
                                "Giving up, returning network failure response"
                            );
                            Ok(RawResponse::network_failure(&e))
                        }
                        other => other,
                    };
                }
            }
        }
    }
}
