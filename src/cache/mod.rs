//! Response caching subsystem.
//!
//! # Data Flow
//! ```text
//! RequestModel (GET, cache enabled or per-call override)
//!     → key.rs (method + URL + sorted query → caller:get:<sha256>)
//!     → layer.rs get → hit: RawResponse served, transport skipped
//!     → miss: call continues; 2xx result stored with derived TTL
//! ```

pub mod key;
pub mod layer;

pub use key::derive_key;
pub use layer::{parse_max_age, should_cache, CacheEntry, CacheLayer};
