//! Header multimap shared by requests, responses and log records.

use std::collections::btree_map;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A header's value: a single string, or an ordered list for repeated names.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum HeaderValue {
    One(String),
    Many(Vec<String>),
}

impl HeaderValue {
    /// First value, if any.
    pub fn first(&self) -> Option<&str> {
        match self {
            HeaderValue::One(v) => Some(v),
            HeaderValue::Many(vs) => vs.first().map(String::as_str),
        }
    }

    /// Iterate over every value in order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        let slice: &[String] = match self {
            HeaderValue::One(v) => std::slice::from_ref(v),
            HeaderValue::Many(vs) => vs,
        };
        slice.iter().map(String::as_str)
    }

    /// Rewrite every value independently, keeping the variant.
    pub fn map(&self, mut f: impl FnMut(&str) -> String) -> HeaderValue {
        match self {
            HeaderValue::One(v) => HeaderValue::One(f(v)),
            HeaderValue::Many(vs) => HeaderValue::Many(vs.iter().map(|v| f(v)).collect()),
        }
    }

    /// Append a value, promoting `One` to `Many`.
    pub fn push(&mut self, value: String) {
        match self {
            HeaderValue::One(existing) => {
                let first = std::mem::take(existing);
                *self = HeaderValue::Many(vec![first, value]);
            }
            HeaderValue::Many(vs) => vs.push(value),
        }
    }

    /// Number of values.
    pub fn len(&self) -> usize {
        match self {
            HeaderValue::One(_) => 1,
            HeaderValue::Many(vs) => vs.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Values joined with `", "` (HTTP list syntax).
    pub fn joined(&self) -> String {
        self.iter().collect::<Vec<_>>().join(", ")
    }
}

impl From<&str> for HeaderValue {
    fn from(v: &str) -> Self {
        HeaderValue::One(v.to_string())
    }
}

impl From<String> for HeaderValue {
    fn from(v: String) -> Self {
        HeaderValue::One(v)
    }
}

impl From<Vec<String>> for HeaderValue {
    fn from(vs: Vec<String>) -> Self {
        HeaderValue::Many(vs)
    }
}

/// Header multimap keyed by lowercased name, iterated in name order.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Headers(BTreeMap<String, HeaderValue>);

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a header, replacing any existing values.
    pub fn insert(&mut self, name: &str, value: impl Into<HeaderValue>) {
        self.0.insert(name.trim().to_ascii_lowercase(), value.into());
    }

    /// Add a value, keeping existing values for the same name.
    pub fn append(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        match self.0.entry(name.trim().to_ascii_lowercase()) {
            btree_map::Entry::Occupied(mut e) => e.get_mut().push(value),
            btree_map::Entry::Vacant(e) => {
                e.insert(HeaderValue::One(value));
            }
        }
    }

    /// Builder-style [`Headers::append`].
    pub fn with(mut self, name: &str, value: impl Into<String>) -> Self {
        self.append(name, value);
        self
    }

    /// Look up a header (case-insensitive).
    pub fn get(&self, name: &str) -> Option<&HeaderValue> {
        if name.bytes().any(|b| b.is_ascii_uppercase()) {
            self.0.get(&name.to_ascii_lowercase())
        } else {
            self.0.get(name)
        }
    }

    /// First value of a header (case-insensitive).
    pub fn get_first(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(HeaderValue::first)
    }

    pub fn remove(&mut self, name: &str) -> Option<HeaderValue> {
        self.0.remove(&name.to_ascii_lowercase())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &HeaderValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&str, &mut HeaderValue)> {
        self.0.iter_mut().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Convert from an `http` header map, keeping repeated names in order.
    /// Values that are not visible ASCII are decoded lossily.
    pub fn from_header_map(map: &http::HeaderMap) -> Self {
        let mut headers = Self::new();
        for (name, value) in map {
            let value = match value.to_str() {
                Ok(s) => s.to_string(),
                Err(_) => String::from_utf8_lossy(value.as_bytes()).into_owned(),
            };
            headers.append(name.as_str(), value);
        }
        headers
    }
}

impl<K: AsRef<str>, V: Into<String>> FromIterator<(K, V)> for Headers {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut headers = Self::new();
        for (k, v) in iter {
            headers.append(k.as_ref(), v);
        }
        headers
    }
}

impl From<&http::HeaderMap> for Headers {
    fn from(map: &http::HeaderMap) -> Self {
        Self::from_header_map(map)
    }
}
