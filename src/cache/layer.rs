//! Response cache on top of a `Store`.
//!
//! # Responsibilities
//! - Decide whether a call participates in caching
//! - Serialize 2xx responses with a TTL derived from the response itself
//! - Serve stored entries back as `RawResponse`
//!
//! # TTL Precedence
//! ```text
//! Cache-Control: max-age=N      → N seconds
//! Expires: <future http-date>   → seconds until then
//! otherwise                     → configured ttl_seconds
//! ```
//!
//! Whatever the source, the TTL is capped at `MAX_TTL`.
//!
//! # Design Decisions
//! - Store failures and undecodable entries are logged and read as a miss;
//!   a cache problem never fails the call

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use base64::Engine;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::http::headers::HeaderMap;
use crate::http::request::Method;
use crate::http::wire::RawResponse;
use crate::observability::metrics;
use crate::store::{Store, StoreError};

/// Longest time any response is kept.
pub const MAX_TTL: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// Whether a call should go through the cache.
pub fn should_cache(method: Method, per_call: Option<bool>, global_enabled: bool) -> bool {
    method == Method::Get && (global_enabled || per_call == Some(true))
}

/// What is persisted per cached response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub status: u16,
    pub headers: HeaderMap,
    /// Base64 of the body bytes.
    pub body: String,
    pub version: String,
    /// Unix seconds.
    pub expires_at: u64,
}

impl CacheEntry {
    fn from_response(response: &RawResponse, ttl: Duration) -> Self {
        Self {
            status: response.status,
            headers: response.headers.clone(),
            body: base64::engine::general_purpose::STANDARD.encode(&response.body),
            version: response.version.clone(),
            expires_at: unix_now().saturating_add(ttl.as_secs()),
        }
    }

    fn decode(key: &str, bytes: &[u8]) -> Result<Self, StoreError> {
        serde_json::from_slice(bytes).map_err(|e| corrupt(key, e))
    }

    fn into_response(self, key: &str) -> Result<RawResponse, StoreError> {
        let body = base64::engine::general_purpose::STANDARD
            .decode(self.body)
            .map_err(|e| corrupt(key, e))?;
        Ok(RawResponse {
            status: self.status,
            headers: self.headers,
            body: Bytes::from(body),
            version: self.version,
        })
    }
}

/// Cache of raw responses keyed by `cache::key::derive_key`.
#[derive(Clone)]
pub struct CacheLayer {
    store: Arc<dyn Store>,
    default_ttl: Duration,
}

impl CacheLayer {
    pub fn new(store: Arc<dyn Store>, default_ttl: Duration) -> Self {
        Self { store, default_ttl }
    }

    /// Fetch a live entry; any failure reads as a miss.
    pub async fn get(&self, key: &str) -> Option<RawResponse> {
        let bytes = match self.store.get(key).await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => {
                metrics::record_cache_lookup(false);
                return None;
            }
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Cache read failed, treating as miss");
                metrics::record_cache_lookup(false);
                return None;
            }
        };

        let decoded = CacheEntry::decode(key, &bytes).and_then(|entry| {
            let expires_at = entry.expires_at;
            entry.into_response(key).map(|response| (expires_at, response))
        });

        match decoded {
            Ok((expires_at, _)) if expires_at <= unix_now() => {
                tracing::debug!(key = %key, "Cache entry expired");
                metrics::record_cache_lookup(false);
                None
            }
            Ok((_, response)) => {
                metrics::record_cache_lookup(true);
                tracing::debug!(key = %key, status_code = response.status, "Cache hit");
                Some(response)
            }
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Discarding unreadable cache entry");
                metrics::record_cache_lookup(false);
                None
            }
        }
    }

    /// Store `response` if it is a 2xx with a positive TTL.
    ///
    /// Returns whether an entry was written.
    pub async fn put(&self, key: &str, response: &RawResponse) -> bool {
        if !response.is_success() {
            return false;
        }
        let ttl = self.ttl_for(response);
        if ttl.is_zero() {
            return false;
        }

        let entry = CacheEntry::from_response(response, ttl);
        let bytes = match serde_json::to_vec(&entry) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Failed to encode cache entry");
                return false;
            }
        };

        match self.store.put(key, bytes, ttl).await {
            Ok(()) => {
                tracing::debug!(key = %key, ttl_secs = ttl.as_secs(), "Response cached");
                true
            }
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Cache write failed");
                false
            }
        }
    }

    /// TTL for a response: max-age, then Expires, then the default,
    /// capped at `MAX_TTL`.
    pub fn ttl_for(&self, response: &RawResponse) -> Duration {
        self.uncapped_ttl(response).min(MAX_TTL)
    }

    fn uncapped_ttl(&self, response: &RawResponse) -> Duration {
        if let Some(secs) = response
            .headers
            .get("cache-control")
            .and_then(parse_max_age)
        {
            return Duration::from_secs(secs);
        }

        if let Some(remaining) = response
            .headers
            .get("expires")
            .and_then(|v| httpdate::parse_http_date(v).ok())
            .and_then(|at| at.duration_since(SystemTime::now()).ok())
        {
            return Duration::from_secs(remaining.as_secs());
        }

        self.default_ttl
    }
}

/// `public, max-age=120` → 120.
pub fn parse_max_age(cache_control: &str) -> Option<u64> {
    cache_control.split(',').find_map(|directive| {
        let (name, value) = directive.trim().split_once('=')?;
        if name.trim().eq_ignore_ascii_case("max-age") {
            value.trim().trim_matches('"').parse().ok()
        } else {
            None
        }
    })
}

fn corrupt(key: &str, reason: impl std::fmt::Display) -> StoreError {
    StoreError::Corrupt {
        key: key.to_string(),
        reason: reason.to_string(),
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
    use async_trait::async_trait;

    fn layer() -> CacheLayer {
        CacheLayer::new(Arc::new(MemoryStore::new()), Duration::from_secs(60))
    }

    #[test]
    fn test_should_cache() {
        assert!(should_cache(Method::Get, None, true));
        assert!(should_cache(Method::Get, Some(true), false));
        assert!(!should_cache(Method::Get, None, false));
        assert!(!should_cache(Method::Get, Some(false), false));
        assert!(!should_cache(Method::Post, Some(true), true));
    }

    #[test]
    fn test_parse_max_age() {
        assert_eq!(parse_max_age("public, max-age=120"), Some(120));
        assert_eq!(parse_max_age("max-age=\"30\", must-revalidate"), Some(30));
        assert_eq!(parse_max_age("no-cache"), None);
        assert_eq!(parse_max_age("s-maxage=10"), None);
    }

    #[test]
    fn test_ttl_precedence() {
        let layer = layer();

        let both = RawResponse::new(200)
            .with_header("Cache-Control", "max-age=120")
            .with_header("Expires", &httpdate::fmt_http_date(SystemTime::now() + Duration::from_secs(600)));
        assert_eq!(layer.ttl_for(&both), Duration::from_secs(120));

        let expires = RawResponse::new(200).with_header(
            "Expires",
            &httpdate::fmt_http_date(SystemTime::now() + Duration::from_secs(600)),
        );
        let ttl = layer.ttl_for(&expires).as_secs();
        assert!((598..=600).contains(&ttl));

        let past = RawResponse::new(200).with_header("Expires", "Wed, 21 Oct 2015 07:28:00 GMT");
        assert_eq!(layer.ttl_for(&past), Duration::from_secs(60));
    }

    #[tokio::test(start_paused = true)]
    async fn test_round_trip_and_expiry() {
        let layer = layer();
        let response = RawResponse::new(200)
            .with_header("Cache-Control", "max-age=120")
            .with_header("X-Tag", "a")
            .with_body("payload");

        assert!(layer.put("k", &response).await);
        tokio::time::advance(Duration::from_secs(119)).await;
        assert_eq!(layer.get("k").await, Some(response));

        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(layer.get("k").await, None);
    }

    #[tokio::test]
    async fn test_huge_max_age_is_capped() {
        let layer = layer();
        let response = RawResponse::new(200)
            .with_header("Cache-Control", "max-age=18446744073709551615")
            .with_body("forever");

        assert_eq!(layer.ttl_for(&response), MAX_TTL);
        assert!(layer.put("k", &response).await);
        assert_eq!(layer.get("k").await, Some(response));
    }

    #[test]
    fn test_expires_at_saturates() {
        let entry = CacheEntry::from_response(&RawResponse::new(200), Duration::MAX);
        assert_eq!(entry.expires_at, u64::MAX);
    }

    #[tokio::test]
    async fn test_expired_and_corrupt_entries_are_misses() {
        let store = Arc::new(MemoryStore::new());
        let layer = CacheLayer::new(store.clone(), Duration::from_secs(60));

        let mut stale = CacheEntry::from_response(&RawResponse::new(200), Duration::from_secs(60));
        stale.expires_at = 1;
        store
            .put("stale", serde_json::to_vec(&stale).unwrap(), Duration::from_secs(60))
            .await
            .unwrap();
        assert!(layer.get("stale").await.is_none());

        store
            .put("junk", b"{not json".to_vec(), Duration::from_secs(60))
            .await
            .unwrap();
        assert!(layer.get("junk").await.is_none());
        assert!(matches!(
            CacheEntry::decode("junk", b"{not json"),
            Err(StoreError::Corrupt { key, .. }) if key == "junk"
        ));
    }

    #[tokio::test]
    async fn test_only_success_stored() {
        let layer = layer();
        assert!(!layer.put("k", &RawResponse::new(404)).await);
        assert!(!layer.put("k", &RawResponse::new(500)).await);
        assert!(layer.get("k").await.is_none());
    }

    #[tokio::test]
    async fn test_zero_ttl_not_stored() {
        let layer = layer();
        let response = RawResponse::new(200).with_header("Cache-Control", "max-age=0");
        assert!(!layer.put("k", &response).await);
    }

    struct BrokenStore;

    #[async_trait]
    impl Store for BrokenStore {
        async fn get(&self, _key: &str) -> Result<Option<Vec<u8>>, StoreError> {
            Err(StoreError::Unavailable("down".into()))
        }

        async fn put(&self, _key: &str, _value: Vec<u8>, _ttl: Duration) -> Result<(), StoreError> {
            Err(StoreError::Unavailable("down".into()))
        }

        async fn remove(&self, _key: &str) -> Result<(), StoreError> {
            Err(StoreError::Unavailable("down".into()))
        }
    }

    #[tokio::test]
    async fn test_store_failure_is_a_miss() {
        let layer = CacheLayer::new(Arc::new(BrokenStore), Duration::from_secs(60));
        assert!(!layer.put("k", &RawResponse::new(200)).await);
        assert!(layer.get("k").await.is_none());
    }
}
