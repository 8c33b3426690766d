//! Raw request query parameters.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Control keys consumed by the query builder; never used as filters.
pub const RESERVED_KEYS: &[&str] = &["searchTerm", "sort", "limit", "page", "fields"];

/// A single query-parameter value: one string, or several when the key
/// repeats (`?status=active&status=probation`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    One(String),
    Many(Vec<String>),
}

impl ParamValue {
    /// First value, if any.
    pub fn first(&self) -> Option<&str> {
        match self {
            Self::One(s) => Some(s),
            Self::Many(v) => v.first().map(String::as_str),
        }
    }

    /// All values joined with `,` (list-style control keys).
    pub fn joined(&self) -> String {
        match self {
            Self::One(s) => s.clone(),
            Self::Many(v) => v.join(","),
        }
    }

    fn push(&mut self, value: String) {
        match self {
            Self::One(existing) => {
                *self = Self::Many(vec![std::mem::take(existing), value]);
            }
            Self::Many(v) => v.push(value),
        }
    }
}

impl From<&str> for ParamValue {
    fn from(s: &str) -> Self {
        Self::One(s.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(s: String) -> Self {
        Self::One(s)
    }
}

impl From<Vec<String>> for ParamValue {
    fn from(v: Vec<String>) -> Self {
        Self::Many(v)
    }
}

impl From<Vec<&str>> for ParamValue {
    fn from(v: Vec<&str>) -> Self {
        Self::Many(v.into_iter().map(str::to_string).collect())
    }
}

/// The raw query mapping of one list request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QueryParams(BTreeMap<String, ParamValue>);

impl QueryParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<ParamValue>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.0.get(key)
    }

    /// First value of `key`, trimmed; `None` when missing or blank.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0
            .get(key)
            .and_then(ParamValue::first)
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ParamValue)> {
        self.0.iter()
    }

    /// Non-reserved entries, in key order.
    ///
    /// Keys starting with `$` are dropped: they would read as filter
    /// operators, and no document field is named that way.
    pub fn filter_entries(&self) -> impl Iterator<Item = (&String, &ParamValue)> {
        self.0
            .iter()
            .filter(|(k, _)| !RESERVED_KEYS.contains(&k.as_str()) && !k.starts_with('$'))
    }

    /// Parse a URL query string (`a=1&b=two%20words&a=2`).
    ///
    /// Keys and values are percent-decoded and `+` is read as a space.
    /// Repeated keys collect into [`ParamValue::Many`]. Pairs without `=` and
    /// pairs that fail to decode are dropped.
    pub fn from_query_string(query: &str) -> Self {
        let mut params = Self::new();
        let query = query.strip_prefix('?').unwrap_or(query);
        for pair in query.split('&').filter(|p| !p.is_empty()) {
            let (raw_key, raw_value) = match pair.split_once('=') {
                Some(kv) => kv,
                None => continue,
            };
            let (key, value) = match (decode(raw_key), decode(raw_value)) {
                (Some(k), Some(v)) if !k.is_empty() => (k, v),
                _ => continue,
            };
            match params.0.get_mut(&key) {
                Some(existing) => existing.push(value),
                None => {
                    params.0.insert(key, ParamValue::One(value));
                }
            }
        }
        params
    }
}

fn decode(raw: &str) -> Option<String> {
    urlencoding::decode(&raw.replace('+', " "))
        .ok()
        .map(|s| s.into_owned())
}

impl<K: Into<String>, V: Into<ParamValue>> FromIterator<(K, V)> for QueryParams {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}
