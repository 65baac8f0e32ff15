//! Case-insensitive, multi-valued header map.
//!
//! # Design Decisions
//! - Insertion order is preserved so wire output is deterministic
//! - Names keep the casing they were given; lookups ignore case
//! - `train_case` is applied only when a request is put on the wire

use serde::{Deserialize, Serialize};

/// Ordered header map where each name may carry several values.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderMap {
    entries: Vec<(String, Vec<String>)>,
}

impl HeaderMap {
    pub fn new() -> Self {
        Self::default()
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.entries
            .iter()
            .position(|(n, _)| n.eq_ignore_ascii_case(name))
    }

    /// Replace every value of `name` with a single value.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.insert_all(name, vec![value.into()]);
    }

    /// Replace every value of `name` with `values`.
    pub fn insert_all(&mut self, name: impl Into<String>, values: Vec<String>) {
        let name = name.into();
        match self.position(&name) {
            Some(i) => self.entries[i].1 = values,
            None => self.entries.push((name, values)),
        }
    }

    /// Add a value, keeping existing ones.
    pub fn append(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        match self.position(&name) {
            Some(i) => self.entries[i].1.push(value.into()),
            None => self.entries.push((name, vec![value.into()])),
        }
    }

    /// First value of `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.get_all(name)
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    /// All values of `name`.
    pub fn get_all(&self, name: &str) -> Option<&[String]> {
        self.position(name).map(|i| self.entries[i].1.as_slice())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    pub fn remove(&mut self, name: &str) -> Option<Vec<String>> {
        self.position(name).map(|i| self.entries.remove(i).1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.entries
            .iter()
            .map(|(n, v)| (n.as_str(), v.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Copy with every name rewritten to Train-Case.
    pub fn normalized(&self) -> HeaderMap {
        let mut out = HeaderMap::new();
        for (name, values) in &self.entries {
            for value in values {
                out.append(train_case(name), value.clone());
            }
        }
        out
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for HeaderMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = HeaderMap::new();
        for (k, v) in iter {
            map.append(k, v);
        }
        map
    }
}

/// `content-type` → `Content-Type`, `x-request-id` → `X-Request-Id`.
pub fn train_case(name: &str) -> String {
    name.split('-')
        .map(|segment| {
            let lower = segment.to_ascii_lowercase();
            let mut chars = lower.chars();
            match chars.next() {
                Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join("-")
}

/// Headers whose values never reach the logs unless explicitly allowed.
pub const SENSITIVE_HEADERS: [&str; 4] = [
    "authorization",
    "cookie",
    "set-cookie",
    "proxy-authorization",
];

pub fn is_sensitive(name: &str) -> bool {
    SENSITIVE_HEADERS
        .iter()
        .any(|s| s.eq_ignore_ascii_case(name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_case_insensitive_lookup() {
        let mut headers = HeaderMap::new();
        headers.insert("content-type", "application/json");
        assert_eq!(headers.get("Content-Type"), Some("application/json"));
        assert!(headers.contains("CONTENT-TYPE"));

        headers.insert("Content-Type", "text/plain");
        assert_eq!(headers.len(), 1);
        assert_eq!(headers.get("content-type"), Some("text/plain"));
    }

    #[test]
    fn test_append_keeps_values() {
        let mut headers = HeaderMap::new();
        headers.append("Accept", "text/html");
        headers.append("accept", "application/json");
        assert_eq!(
            headers.get_all("ACCEPT").unwrap(),
            &["text/html".to_string(), "application/json".to_string()]
        );
    }

    #[test]
    fn test_train_case() {
        assert_eq!(train_case("content-type"), "Content-Type");
        assert_eq!(train_case("X-REQUEST-ID"), "X-Request-Id");
        assert_eq!(train_case("accept"), "Accept");
        assert_eq!(train_case("www-authenticate"), "Www-Authenticate");
    }

    #[test]
    fn test_normalized_merges_duplicates() {
        let headers: HeaderMap = vec![("x-tag", "a"), ("X-Tag", "b")].into_iter().collect();
        let normalized = headers.normalized();
        assert_eq!(normalized.iter().next().unwrap().0, "X-Tag");
        assert_eq!(normalized.get_all("x-tag").unwrap().len(), 2);
    }

    #[test]
    fn test_sensitive_names() {
        assert!(is_sensitive("Authorization"));
        assert!(is_sensitive("set-cookie"));
        assert!(!is_sensitive("accept"));
    }
}
