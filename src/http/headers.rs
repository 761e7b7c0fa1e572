//! Case-insensitive, insertion-ordered header map.
//!
//! # Responsibilities
//! - Store header fields with lowercase names, including HTTP/2 pseudo-fields
//! - Preserve single and multi-valued entries exactly as given
//! - Merge defaults with overrides (last writer wins)
//!
//! # Design Decisions
//! - Names are lowercased on the way in, so lookup never needs to normalize twice
//! - Replacing a value keeps the entry's original position
//! - Pseudo-fields (`:status`, `:path`, ...) live in the same map as ordinary
//!   headers, matching how the transport hands them over

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

pub const CONTENT_TYPE: &str = "content-type";
pub const CONTENT_LENGTH: &str = "content-length";

pub const PSEUDO_METHOD: &str = ":method";
pub const PSEUDO_PATH: &str = ":path";
pub const PSEUDO_SCHEME: &str = ":scheme";
pub const PSEUDO_AUTHORITY: &str = ":authority";
pub const PSEUDO_STATUS: &str = ":status";

/// A header value: one string, or several in order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum HeaderValue {
    Single(String),
    Multi(Vec<String>),
}

impl HeaderValue {
    /// First value, if any.
    pub fn first(&self) -> Option<&str> {
        match self {
            HeaderValue::Single(v) => Some(v.as_str()),
            HeaderValue::Multi(vs) => vs.first().map(String::as_str),
        }
    }

    /// All values in order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        let values: &[String] = match self {
            HeaderValue::Single(v) => std::slice::from_ref(v),
            HeaderValue::Multi(vs) => vs.as_slice(),
        };
        values.iter().map(String::as_str)
    }

    fn push(&mut self, value: String) {
        match self {
            HeaderValue::Single(existing) => {
                let first = std::mem::take(existing);
                *self = HeaderValue::Multi(vec![first, value]);
            }
            HeaderValue::Multi(vs) => vs.push(value),
        }
    }
}

impl fmt::Display for HeaderValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HeaderValue::Single(v) => f.write_str(v),
            HeaderValue::Multi(vs) => f.write_str(&vs.join(", ")),
        }
    }
}

impl From<&str> for HeaderValue {
    fn from(value: &str) -> Self {
        HeaderValue::Single(value.to_string())
    }
}

impl From<String> for HeaderValue {
    fn from(value: String) -> Self {
        HeaderValue::Single(value)
    }
}

impl From<Vec<String>> for HeaderValue {
    fn from(values: Vec<String>) -> Self {
        HeaderValue::Multi(values)
    }
}

impl From<Vec<&str>> for HeaderValue {
    fn from(values: Vec<&str>) -> Self {
        HeaderValue::Multi(values.into_iter().map(str::to_string).collect())
    }
}

/// Ordered header map with case-insensitive names.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "BTreeMap<String, HeaderValue>", into = "BTreeMap<String, HeaderValue>")]
pub struct Headers {
    entries: Vec<(String, HeaderValue)>,
}

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `name` to `value`, replacing any existing value for the same name.
    pub fn insert(&mut self, name: impl AsRef<str>, value: impl Into<HeaderValue>) {
        let name = name.as_ref().to_ascii_lowercase();
        let value = value.into();
        match self.position(&name) {
            Some(idx) => self.entries[idx].1 = value,
            None => self.entries.push((name, value)),
        }
    }

    /// Add `value` after any existing values for `name`.
    pub fn append(&mut self, name: impl AsRef<str>, value: impl Into<String>) {
        let name = name.as_ref().to_ascii_lowercase();
        let value = value.into();
        match self.position(&name) {
            Some(idx) => self.entries[idx].1.push(value),
            None => self.entries.push((name, HeaderValue::Single(value))),
        }
    }

    pub fn get(&self, name: &str) -> Option<&HeaderValue> {
        let name = name.to_ascii_lowercase();
        self.position(&name).map(|idx| &self.entries[idx].1)
    }

    /// First value for `name`.
    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(HeaderValue::first)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn remove(&mut self, name: &str) -> Option<HeaderValue> {
        let name = name.to_ascii_lowercase();
        self.position(&name).map(|idx| self.entries.remove(idx).1)
    }

    /// Overlay `other` on top of `self`; entries from `other` win.
    pub fn merge(&mut self, other: &Headers) {
        for (name, value) in &other.entries {
            self.insert(name, value.clone());
        }
    }

    /// Return `defaults` overlaid with `overrides`.
    pub fn merged(defaults: &Headers, overrides: &Headers) -> Headers {
        let mut merged = defaults.clone();
        merged.merge(overrides);
        merged
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &HeaderValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Ordinary headers, skipping `:`-prefixed pseudo-fields.
    pub fn regular(&self) -> impl Iterator<Item = (&str, &HeaderValue)> {
        self.iter().filter(|(k, _)| !k.starts_with(':'))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn position(&self, lowercase_name: &str) -> Option<usize> {
        self.entries.iter().position(|(k, _)| k == lowercase_name)
    }
}

impl<K: AsRef<str>, V: Into<HeaderValue>> FromIterator<(K, V)> for Headers {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut headers = Headers::new();
        for (k, v) in iter {
            headers.insert(k, v);
        }
        headers
    }
}

impl From<BTreeMap<String, HeaderValue>> for Headers {
    fn from(map: BTreeMap<String, HeaderValue>) -> Self {
        map.into_iter().collect()
    }
}

impl From<Headers> for BTreeMap<String, HeaderValue> {
    fn from(headers: Headers) -> Self {
        headers.entries.into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_is_case_insensitive() {
        let mut headers = Headers::new();
        headers.insert("X-Custom", "one");
        headers.insert("x-custom", "two");

        assert_eq!(headers.len(), 1);
        assert_eq!(headers.get_str("X-CUSTOM"), Some("two"));
        assert_eq!(headers.iter().next().map(|(k, _)| k), Some("x-custom"));
    }

    #[test]
    fn test_merge_request_wins() {
        let defaults: Headers = [("X-Custom", "session"), ("accept", "*/*")].into_iter().collect();
        let overrides: Headers = [("x-CUSTOM", "request")].into_iter().collect();

        let merged = Headers::merged(&defaults, &overrides);
        assert_eq!(merged.get_str("x-custom"), Some("request"));
        assert_eq!(merged.get_str("accept"), Some("*/*"));
        // replaced entries keep their slot
        let names: Vec<_> = merged.iter().map(|(k, _)| k).collect();
        assert_eq!(names, vec!["x-custom", "accept"]);
    }

    #[test]
    fn test_append_builds_multi_value() {
        let mut headers = Headers::new();
        headers.append("Set-Cookie", "a=1");
        headers.append("set-cookie", "b=2");

        let values: Vec<_> = headers.get("set-cookie").unwrap().iter().collect();
        assert_eq!(values, vec!["a=1", "b=2"]);
        assert_eq!(headers.get("set-cookie").unwrap().to_string(), "a=1, b=2");
    }

    #[test]
    fn test_regular_skips_pseudo_fields() {
        let mut headers = Headers::new();
        headers.insert(PSEUDO_METHOD, "GET");
        headers.insert(PSEUDO_PATH, "/");
        headers.insert("accept", "text/plain");

        let regular: Vec<_> = headers.regular().map(|(k, _)| k).collect();
        assert_eq!(regular, vec!["accept"]);
    }

    #[test]
    fn test_deserialize_from_toml_table() {
        let headers: Headers = toml::from_str(
            r#"
            X-Api-Key = "secret"
            accept = ["application/json", "text/plain"]
            "#,
        )
        .unwrap();

        assert_eq!(headers.get_str("x-api-key"), Some("secret"));
        assert_eq!(
            headers.get("accept"),
            Some(&HeaderValue::Multi(vec!["application/json".into(), "text/plain".into()]))
        );
    }
}
