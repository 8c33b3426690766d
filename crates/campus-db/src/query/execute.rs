//! Query execution engine: scan-and-filter with sorting, pagination and
//! projection.

use std::cmp::Ordering;

use serde_json::{Map, Value};

use crate::error::Result;

use super::operators::{compare_values, filter_records, get_field_value};
use super::types::{Projection, Query, SortDirection, SortEntry};

/// Identifier field kept by every projection.
pub const ID_FIELD: &str = "id";

// ============================================================================
// Sorting
// ============================================================================

static NULL: Value = Value::Null;

fn field_or_null<'a>(record: &'a Value, path: &str) -> &'a Value {
    get_field_value(record, path).unwrap_or(&NULL)
}

/// Order records by each entry in turn; later entries break ties left by
/// earlier ones. Missing fields compare as null. Stable, so full ties keep
/// their stored order.
pub fn sort_records(mut records: Vec<Value>, sort: &[SortEntry]) -> Vec<Value> {
    if sort.is_empty() {
        return records;
    }

    records.sort_by(|a, b| {
        sort.iter()
            .map(|entry| {
                let ord = compare_values(field_or_null(a, &entry.field), field_or_null(b, &entry.field));
                match entry.direction {
                    SortDirection::Asc => ord,
                    SortDirection::Desc => ord.reverse(),
                }
            })
            .find(|ord| ord.is_ne())
            .unwrap_or(Ordering::Equal)
    });
    records
}

// ============================================================================
// Pagination
// ============================================================================

/// Apply offset then limit to a list of records.
pub fn paginate_records(
    records: Vec<Value>,
    offset: Option<usize>,
    limit: Option<usize>,
) -> Vec<Value> {
    let skipped = records.into_iter().skip(offset.unwrap_or(0));
    match limit {
        Some(n) => skipped.take(n).collect(),
        None => skipped.collect(),
    }
}

// ============================================================================
// Projection
// ============================================================================

/// Apply a projection to one top-level document.
///
/// Inclusion keeps the listed fields plus `id`; dotted paths keep the whole
/// top-level field they start with. Exclusion removes the listed top-level
/// fields but never `id`.
pub fn project_record(record: Value, projection: &Projection) -> Value {
    let obj = match record {
        Value::Object(obj) => obj,
        other => return other,
    };

    let top = |field: &str| field.split('.').next().unwrap_or(field).to_string();

    let projected: Map<String, Value> = match projection {
        Projection::Include(fields) => {
            let keep: Vec<String> = fields.iter().map(|f| top(f)).collect();
            obj.into_iter()
                .filter(|(k, _)| k == ID_FIELD || keep.iter().any(|f| f == k))
                .collect()
        }
        Projection::Exclude(fields) => obj
            .into_iter()
            .filter(|(k, _)| k == ID_FIELD || !fields.iter().any(|f| f == k))
            .collect(),
    };

    Value::Object(projected)
}

// ============================================================================
// Query Execution
// ============================================================================

/// Execute a query against a list of records (in-memory scan-and-filter).
///
/// 1. Apply filter (if present).
/// 2. Sort.
/// 3. Paginate (offset then limit).
/// 4. Project.
///
/// Relation expansion is left to the store, which can see other collections.
pub fn execute_query(records: &[Value], query: &Query) -> Result<Vec<Value>> {
    let filtered = match &query.filter {
        Some(filter) => filter_records(records, filter)?,
        None => records.to_vec(),
    };

    let sorted = match &query.sort {
        Some(entries) => sort_records(filtered, entries),
        None => filtered,
    };

    let page = paginate_records(sorted, query.offset, query.limit);

    Ok(match &query.projection {
        Some(projection) => page
            .into_iter()
            .map(|r| project_record(r, projection))
            .collect(),
        None => page,
    })
}

/// Count records matching `filter` (no sort, no window).
pub fn count_matching(records: &[Value], filter: Option<&Value>) -> Result<usize> {
    match filter {
        Some(filter) => Ok(filter_records(records, filter)?.len()),
        None => Ok(records.len()),
    }
}

// ============================================================================
// Tests
// ============================================================================
