//! Shared key/value storage.
//!
//! # Responsibilities
//! - Hold cache entries and circuit breaker state
//! - Expire entries after their TTL
//!
//! # Design Decisions
//! - Values are opaque bytes; callers own their encoding (JSON)
//! - A failing store never fails a call: consumers log and degrade
//! - Backends are swappable behind the `Store` trait so several processes can
//!   share breaker state through an external store

pub mod memory;

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

pub use memory::MemoryStore;

/// Errors reported by a store backend.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("corrupt entry for key {key}: {reason}")]
    Corrupt { key: String, reason: String },
}

/// Async key/value store with per-entry expiry.
#[async_trait]
pub trait Store: Send + Sync {
    /// Fetch a live entry.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;

    /// Insert or replace an entry that expires after `ttl`.
    async fn put(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), StoreError>;

    /// Drop an entry if present.
    async fn remove(&self, key: &str) -> Result<(), StoreError>;
}
