//! Exponential backoff with optional jitter.

use rand::Rng;
use std::time::Duration;

/// Exponential delay in milliseconds: `min(base * 2^(attempt-1), max)`.
pub fn calculate_backoff(attempt: u32, base_ms: u64, max_ms: u64) -> u64 {
    if attempt == 0 {
        return 0;
    }

    let exponential_base = 2u64.saturating_pow(attempt - 1);
    base_ms.saturating_mul(exponential_base).min(max_ms)
}

/// Raise `delay_ms` to honour a numeric `Retry-After`.
pub fn honour_retry_after(delay_ms: u64, retry_after_secs: Option<u64>) -> u64 {
    match retry_after_secs {
        Some(secs) => delay_ms.max(secs.saturating_mul(1000)),
        None => delay_ms,
    }
}

/// Uniform integer in `[delay/2, delay]`.
pub fn apply_jitter(delay_ms: u64) -> u64 {
    let low = delay_ms / 2;
    if low >= delay_ms {
        return delay_ms;
    }
    rand::thread_rng().gen_range(low..=delay_ms)
}

/// Full delay for one retry.
pub fn retry_delay(
    attempt: u32,
    base_ms: u64,
    max_ms: u64,
    retry_after_secs: Option<u64>,
    jitter: bool,
) -> Duration {
    let delay = honour_retry_after(calculate_backoff(attempt, base_ms, max_ms), retry_after_secs);
    let delay = if jitter { apply_jitter(delay) } else { delay };
    Duration::from_millis(delay)
}
