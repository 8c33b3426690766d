//! Runtime options for list queries.

use serde::{Deserialize, Serialize};

/// Defaults applied by [`QueryBuilder`](crate::query::builder::QueryBuilder)
/// when the request omits or garbles a control parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QueryOptions {
    /// Page used when `page` is missing or not a positive integer.
    pub default_page: usize,
    /// Page size used when `limit` is missing or not a positive integer.
    /// `None` is the unbounded sentinel: the whole match set is one page.
    pub default_limit: Option<usize>,
    /// Upper bound for a client-supplied `limit`.
    pub max_limit: Option<usize>,
    /// Sort spec used when `sort` is missing or names no fields.
    pub default_sort: String,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            default_page: 1,
            default_limit: Some(10),
            max_limit: None,
            default_sort: "-createdAt".to_string(),
        }
    }
}

impl QueryOptions {
    /// Options whose default page size is unbounded.
    pub fn unbounded() -> Self {
        Self {
            default_limit: None,
            ..Self::default()
        }
    }

    /// Parse options from a JSON document; missing keys keep their defaults.
    pub fn from_json(raw: &str) -> serde_json::Result<Self> {
        serde_json::from_str(raw)
    }
}
