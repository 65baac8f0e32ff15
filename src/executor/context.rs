//! Per-call state shared by every middleware of one execution.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::http::request::RequestModel;

/// Header carrying the per-call correlation id.
pub const X_REQUEST_ID: &str = "X-Request-Id";

/// Everything a middleware may need to know about the call it is part of.
#[derive(Debug)]
pub struct CallContext {
    request: Arc<RequestModel>,
    request_id: String,
    timeout: Duration,
    started: Instant,
    attempts: AtomicU32,
    from_cache: AtomicBool,
}

impl CallContext {
    pub fn new(request: Arc<RequestModel>, request_id: impl Into<String>, timeout: Duration) -> Self {
        Self {
            request,
            request_id: request_id.into(),
            timeout,
            started: Instant::now(),
            attempts: AtomicU32::new(0),
            from_cache: AtomicBool::new(false),
        }
    }

    pub fn request(&self) -> &Arc<RequestModel> {
        &self.request
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    /// Deadline for a single transport attempt.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn started(&self) -> Instant {
        self.started
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Count a transport attempt, returning its 1-based number.
    pub fn record_attempt(&self) -> u32 {
        self.attempts.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn mark_from_cache(&self) {
        self.from_cache.store(true, Ordering::SeqCst);
    }

    pub fn from_cache(&self) -> bool {
        self.from_cache.load(Ordering::SeqCst)
    }

    /// Breaker service name: the `service` caller option, else the URL host.
    pub fn service(&self, host: &str) -> String {
        self.request
            .options
            .service()
            .map(str::to_string)
            .unwrap_or_else(|| host.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attempt_counter() {
        let ctx = CallContext::new(
            Arc::new(RequestModel::to("https://api.test")),
            "id",
            Duration::from_secs(1),
        );
        assert_eq!(ctx.attempts(), 0);
        assert_eq!(ctx.record_attempt(), 1);
        assert_eq!(ctx.record_attempt(), 2);
        assert_eq!(ctx.attempts(), 2);
    }

    #[test]
    fn test_service_name() {
        let plain = CallContext::new(
            Arc::new(RequestModel::to("https://api.test")),
            "id",
            Duration::from_secs(1),
        );
        assert_eq!(plain.service("api.test"), "api.test");

        let named = CallContext::new(
            Arc::new(RequestModel::to("https://api.test").service("billing")),
            "id",
            Duration::from_secs(1),
        );
        assert_eq!(named.service("api.test"), "billing");
    }
}
