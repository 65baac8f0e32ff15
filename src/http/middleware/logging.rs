//! Request / response / failure logging.
//!
//! Events: `API Request`, `API Response` (WARN from status 400), and
//! `API Request Failed` (ERROR). Sensitive headers render as `***` and
//! request bodies are omitted unless `log_sensitive_data` is set.

use std::time::Instant;

use async_trait::async_trait;
use tracing::Level;

use super::{Middleware, Next};
use crate::config::LoggingConfig;
use crate::error::Result;
use crate::event_at;
use crate::executor::CallContext;
use crate::http::headers::{is_sensitive, HeaderMap};
use crate::http::wire::{RawResponse, WireRequest};
use crate::observability::logging::parse_level;

pub struct LoggingMiddleware {
    level: Level,
    log_sensitive_data: bool,
}

impl LoggingMiddleware {
    pub fn new(level: Level, log_sensitive_data: bool) -> Self {
        Self {
            level,
            log_sensitive_data,
        }
    }

    pub fn from_config(config: &LoggingConfig) -> Self {
        Self::new(parse_level(&config.level), config.log_sensitive_data)
    }

    /// `name: value` pairs with sensitive values masked.
    pub fn sanitize_headers(&self, headers: &HeaderMap) -> String {
        headers
            .iter()
            .map(|(name, values)| {
                if !self.log_sensitive_data && is_sensitive(name) {
                    format!("{}: ***", name)
                } else {
                    format!("{}: {}", name, values.join(", "))
                }
            })
            .collect::<Vec<_>>()
            .join("; ")
    }
}

#[async_trait]
impl Middleware for LoggingMiddleware {
    fn name(&self) -> &str {
        "logging"
    }

    async fn handle(
        &self,
        request: WireRequest,
        ctx: &CallContext,
        next: Next<'_>,
    ) -> Result<RawResponse> {
        let start = Instant::now();
        let method = request.method;
        let uri = request.uri.to_string();

        let body = if self.log_sensitive_data && !request.body.is_empty() {
            Some(String::from_utf8_lossy(&request.body).into_owned())
        } else {
            None
        };
        event_at!(
            self.level,
            request_id = %ctx.request_id(),
            method = %method,
            uri = %uri,
            headers = %self.sanitize_headers(&request.headers),
            body = body.as_deref(),
            "API Request"
        );

        let result = next.run(request, ctx).await;
        let duration_ms = (start.elapsed().as_secs_f64() * 100_000.0).round() / 100.0;

        match &result {
            Ok(response) => {
                let level = if response.status >= 400 {
                    Level::WARN
                } else {
                    self.level
                };
                event_at!(
                    level,
                    request_id = %ctx.request_id(),
                    method = %method,
                    uri = %uri,
                    status_code = response.status,
                    duration_ms,
                    response_headers = %self.sanitize_headers(&response.headers),
                    "API Response"
                );
            }
            Err(e) => {
                tracing::error!(
                    request_id = %ctx.request_id(),
                    method = %method,
                    uri = %uri,
                    duration_ms,
                    error = %e,
                    exception = e.kind(),
                    "API Request Failed"
                );
            }
        }
        result
    }
}
