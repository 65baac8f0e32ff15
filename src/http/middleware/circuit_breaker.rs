//! Gates calls on the per-service breaker and reports their outcome.
//!
//! A transport error or a status >= 500 counts as a failure. The 5xx
//! response itself is still returned so retry and the caller can see it.

use async_trait::async_trait;

use super::{Middleware, Next};
use crate::error::Result;
use crate::executor::CallContext;
use crate::http::wire::{RawResponse, WireRequest};
use crate::resilience::CircuitBreaker;

pub struct CircuitBreakerMiddleware {
    breaker: CircuitBreaker,
}

impl CircuitBreakerMiddleware {
    pub fn new(breaker: CircuitBreaker) -> Self {
        Self { breaker }
    }
}

#[async_trait]
impl Middleware for CircuitBreakerMiddleware {
    fn name(&self) -> &str {
        "circuit_breaker"
    }

    async fn handle(
        &self,
        request: WireRequest,
        ctx: &CallContext,
        next: Next<'_>,
    ) -> Result<RawResponse> {
        let service = ctx.service(request.host());
        self.breaker.check(&service).await?;

        let result = next.run(request, ctx).await;
        match &result {
            Ok(response) if response.status < 500 => self.breaker.record_success(&service).await,
            Ok(response) => {
                tracing::debug!(
                    request_id = %ctx.request_id(),
                    service = %service,
                    status_code = response.status,
                    "Server error counted against circuit"
                );
                self.breaker.record_failure(&service).await
            }
            Err(e) => {
                tracing::debug!(
                    request_id = %ctx.request_id(),
                    service = %service,
                    error = %e,
                    "Failure counted against circuit"
                );
                self.breaker.record_failure(&service).await
            }
        }
        result
    }
}
