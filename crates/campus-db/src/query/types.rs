//! Query type definitions: filter, sort, pagination, projection, and relation
//! expansion.

use serde::{Deserialize, Serialize};
use serde_json::Value;

// ============================================================================
// Sort Types
// ============================================================================

/// Sort direction for a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

/// A sort specification for a single field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortEntry {
    pub field: String,
    pub direction: SortDirection,
}

impl SortEntry {
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Asc,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Desc,
        }
    }
}

/// Parse a comma-separated sort spec (`"-cgpa,name"`) into ordered entries.
///
/// A leading `-` marks a descending field. Empty segments are skipped, so
/// `"name,,"` yields a single entry and `""` yields none.
pub fn parse_sort_spec(spec: &str) -> Vec<SortEntry> {
    spec.split(',')
        .map(str::trim)
        .filter_map(|part| match part.strip_prefix('-') {
            Some(field) => {
                let field = field.trim();
                (!field.is_empty()).then(|| SortEntry::desc(field))
            }
            None => (!part.is_empty()).then(|| SortEntry::asc(part)),
        })
        .collect()
}

// ============================================================================
// Projection
// ============================================================================

/// Field projection applied to returned documents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Projection {
    /// Return only these fields (identifiers are always kept).
    Include(Vec<String>),
    /// Return everything except these fields.
    Exclude(Vec<String>),
}

impl Projection {
    /// Parse a comma-separated field list. `-field` excludes; when any plain
    /// field is listed the exclusions are dropped. Returns `None` when the list
    /// names no fields.
    pub fn parse(spec: &str) -> Option<Self> {
        let mut include = Vec::new();
        let mut exclude = Vec::new();
        for part in spec.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            match part.strip_prefix('-') {
                Some(field) if !field.trim().is_empty() => exclude.push(field.trim().to_string()),
                Some(_) => {}
                None => include.push(part.to_string()),
            }
        }
        if !include.is_empty() {
            Some(Self::Include(include))
        } else if !exclude.is_empty() {
            Some(Self::Exclude(exclude))
        } else {
            None
        }
    }
}

// ============================================================================
// Relation Expansion
// ============================================================================

/// Replace a reference field's id with the referenced document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Populate {
    /// Field on the queried document holding the referenced id.
    pub path: String,
    /// Collection the id points into.
    pub collection: String,
}

// ============================================================================
// Query Type
// ============================================================================

/// Complete query specification with filter, sort, pagination, projection,
/// and relation expansion.
#[derive(Debug, Clone, Default)]
pub struct Query {
    /// MongoDB-style filter object.
    pub filter: Option<Value>,
    /// Ordered sort specification.
    pub sort: Option<Vec<SortEntry>>,
    /// Maximum number of results to return.
    pub limit: Option<usize>,
    /// Number of results to skip.
    pub offset: Option<usize>,
    /// Fields to return.
    pub projection: Option<Projection>,
    /// References to expand after projection.
    pub populate: Vec<Populate>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scope the query with a filter.
    pub fn with_filter(mut self, filter: Value) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Expand `path` with the document it references in `collection`.
    pub fn populate(mut self, path: impl Into<String>, collection: impl Into<String>) -> Self {
        self.populate.push(Populate {
            path: path.into(),
            collection: collection.into(),
        });
        self
    }
}

// ============================================================================
// Filter Composition
// ============================================================================

/// AND together the non-empty filters. Returns `None` when nothing remains,
/// the single filter when only one remains, and `{ "$and": [...] }` otherwise.
pub fn and_filters(filters: impl IntoIterator<Item = Value>) -> Option<Value> {
    let mut parts: Vec<Value> = filters
        .into_iter()
        .filter(|f| match f {
            Value::Object(obj) => !obj.is_empty(),
            Value::Null => false,
            _ => true,
        })
        .collect();

    match parts.len() {
        0 => None,
        1 => parts.pop(),
        _ => Some(serde_json::json!({ "$and": parts })),
    }
}

// ============================================================================
// Tests
// ============================================================================
