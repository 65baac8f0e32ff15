//! Timeout enforcement.
//!
//! # Responsibilities
//! - Wrap each transport call with a deadline
//! - Surface expiry as `CallerError::Timeout`, which retry treats as a
//!   connection failure
//!
//! # Design Decisions
//! - Uses Tokio's timeout facilities
//! - The deadline bounds one attempt, not the whole retry loop

use std::future::Future;
use std::time::Duration;

use crate::error::{CallerError, Result};

/// Run `fut` with a deadline.
pub async fn with_timeout<T, F>(timeout: Duration, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(timeout, fut).await {
        Ok(result) => result,
        Err(_) => Err(CallerError::Timeout(timeout)),
    }
}
