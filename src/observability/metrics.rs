//! Metrics collection.
//!
//! # Metrics
//! - `caller_requests_total` (counter): finished calls by method, status
//! - `caller_request_duration_seconds` (histogram): call latency, retries included
//! - `caller_retries_total` (counter): retries by reason
//! - `caller_cache_hits_total` / `caller_cache_misses_total` (counters)
//! - `caller_circuit_rejections_total` (counter): fail-fast rejections by service
//! - `caller_circuit_state_changes_total` (counter): transitions by service, target state
//!
//! # Design Decisions
//! - Recorded through the `metrics` facade; without an installed recorder
//!   every call is a no-op, so the embedding application picks the exporter
//! - Label values stay low-cardinality (no URLs)

use std::time::Instant;

pub fn record_request(method: &str, status: u16, start: Instant) {
    metrics::counter!(
        "caller_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    metrics::histogram!("caller_request_duration_seconds").record(start.elapsed().as_secs_f64());
}

pub fn record_retry(reason: &'static str) {
    metrics::counter!("caller_retries_total", "reason" => reason).increment(1);
}

pub fn record_cache_lookup(hit: bool) {
    if hit {
        metrics::counter!("caller_cache_hits_total").increment(1);
    } else {
        metrics::counter!("caller_cache_misses_total").increment(1);
    }
}

pub fn record_circuit_rejection(service: &str) {
    metrics::counter!("caller_circuit_rejections_total", "service" => service.to_string())
        .increment(1);
}

pub fn record_circuit_transition(service: &str, to: &'static str) {
    metrics::counter!(
        "caller_circuit_state_changes_total",
        "service" => service.to_string(),
        "to" => to
    )
    .increment(1);
}
