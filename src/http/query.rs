//! Query parameters and URL-encoded pairs.
//!
//! # Encoding Rules
//! ```text
//! {"a": 1, "b": "x y"}       → a=1&b=x%20y
//! {"tags": ["a", "b"]}       → tags%5B0%5D=a&tags%5B1%5D=b
//! {"f": {"k": true}}         → f%5Bk%5D=1
//! {"gone": null}             → (dropped)
//! ```
//! Percent-encoding follows RFC 3986; the same encoder backs form bodies.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Ordered query parameters. Null values are kept until encoding.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Query {
    params: Vec<(String, Value)>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a parameter, replacing an earlier one of the same name.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        let name = name.into();
        let value = value.into();
        match self.params.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = value,
            None => self.params.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.params.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        let i = self.params.iter().position(|(n, _)| n == name)?;
        Some(self.params.remove(i).1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.params.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Key-sorted view without nulls, used for cache fingerprints.
    pub fn normalized(&self) -> BTreeMap<String, Value> {
        self.params
            .iter()
            .filter(|(_, v)| !v.is_null())
            .map(|(n, v)| (n.clone(), v.clone()))
            .collect()
    }

    /// Render as `k=v&...` in insertion order.
    pub fn encode(&self) -> String {
        encode_pairs(self.params.iter().map(|(n, v)| (n.as_str(), v)))
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Query {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut query = Query::new();
        for (k, v) in iter {
            query.set(k, v);
        }
        query
    }
}

/// Encode name/value pairs with bracket nesting for arrays and objects.
pub fn encode_pairs<'a>(pairs: impl Iterator<Item = (&'a str, &'a Value)>) -> String {
    let mut out = Vec::new();
    for (name, value) in pairs {
        flatten(name.to_string(), value, &mut out);
    }
    out.join("&")
}

fn flatten(prefix: String, value: &Value, out: &mut Vec<String>) {
    match value {
        Value::Null => {}
        Value::Array(items) => {
            for (i, item) in items.iter().enumerate() {
                flatten(format!("{}[{}]", prefix, i), item, out);
            }
        }
        Value::Object(map) => {
            for (k, item) in map {
                flatten(format!("{}[{}]", prefix, k), item, out);
            }
        }
        scalar => out.push(format!(
            "{}={}",
            urlencoding::encode(&prefix),
            urlencoding::encode(&scalar_text(scalar))
        )),
    }
}

/// Text form of a scalar as it appears in query strings and form parts.
pub fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Bool(true) => "1".to_string(),
        Value::Bool(false) => "0".to_string(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_scalar_encoding() {
        let query: Query = vec![("a", json!(1)), ("b", json!("x y"))].into_iter().collect();
        assert_eq!(query.encode(), "a=1&b=x%20y");
    }

    #[test]
    fn test_nulls_dropped_and_bools_numeric() {
        let query: Query = vec![("on", json!(true)), ("off", json!(false)), ("gone", Value::Null)]
            .into_iter()
            .collect();
        assert_eq!(query.encode(), "on=1&off=0");
        assert!(!query.normalized().contains_key("gone"));
    }

    #[test]
    fn test_nested_brackets() {
        let query: Query = vec![("tags", json!(["a", "b"])), ("f", json!({"k": "v"}))]
            .into_iter()
            .collect();
        assert_eq!(
            query.encode(),
            "tags%5B0%5D=a&tags%5B1%5D=b&f%5Bk%5D=v"
        );
    }

    #[test]
    fn test_set_replaces() {
        let mut query = Query::new();
        query.set("page", 1);
        query.set("page", 2);
        assert_eq!(query.get("page"), Some(&json!(2)));
        assert_eq!(query.encode(), "page=2");
    }

    #[test]
    fn test_normalized_is_sorted() {
        let query: Query = vec![("b", json!(2)), ("a", json!(1))].into_iter().collect();
        let keys: Vec<_> = query.normalized().into_keys().collect();
        assert_eq!(keys, vec!["a", "b"]);
    }
}
