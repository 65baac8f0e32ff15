//! Cache key derivation.
//!
//! ```text
//! (GET, https://api.test/items, {b: 2, a: 1})
//!     → {"m":"GET","q":{"a":1,"b":2},"u":"https://api.test/items"}
//!     → sha256 → hex
//!     → caller:get:<hex>
//! ```
//! Headers and body never take part: only bodyless read methods are keyed.

use std::collections::BTreeMap;
use std::fmt::Write;

use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::http::query::Query;
use crate::http::request::Method;

pub const KEY_PREFIX: &str = "caller:get:";

/// Stable key for a cacheable request, `None` for methods that are never cached.
pub fn derive_key(method: Method, url: &str, query: &Query) -> Option<String> {
    if !matches!(method, Method::Get | Method::Head) {
        return None;
    }

    let mut canonical: BTreeMap<&str, Value> = BTreeMap::new();
    canonical.insert("m", Value::String(method.as_str().to_string()));
    canonical.insert("u", Value::String(url.to_string()));
    canonical.insert(
        "q",
        Value::Object(query.normalized().into_iter().collect()),
    );

    // BTreeMap and serde_json::Map both serialize with sorted keys.
    let encoded = serde_json::to_string(&canonical).ok()?;
    let digest = Sha256::digest(encoded.as_bytes());

    let mut key = String::with_capacity(KEY_PREFIX.len() + digest.len() * 2);
    key.push_str(KEY_PREFIX);
    for byte in digest {
        let _ = write!(key, "{:02x}", byte);
    }
    Some(key)
}
