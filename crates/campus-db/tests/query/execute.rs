//! Tests for query execution: sort, window, projection and count.

use campus_db::query::execute::{
    count_matching, execute_query, paginate_records, project_record, sort_records,
};
use campus_db::query::types::{parse_sort_spec, Projection, Query, SortEntry};
use serde_json::{json, Value};

fn records() -> Vec<Value> {
    vec![
        json!({ "id": "1", "name": "Alice",   "cgpa": 3.5, "createdAt": "2024-01-15" }),
        json!({ "id": "2", "name": "Bob",     "cgpa": 3.9, "createdAt": "2024-02-20" }),
        json!({ "id": "3", "name": "Charlie", "cgpa": 3.5, "createdAt": "2024-01-10" }),
        json!({ "id": "4", "name": "Diana",   "cgpa": 2.0, "createdAt": "2024-03-01" }),
        json!({ "id": "5", "name": "Eve",     "cgpa": 3.9, "createdAt": "2024-02-15" }),
    ]
}

fn ids(records: &[Value]) -> Vec<&str> {
    records.iter().map(|r| r["id"].as_str().unwrap()).collect()
}

// ============================================================================
// sort_records
// ============================================================================

#[test]
fn sort_desc_then_asc() {
    let sorted = sort_records(records(), &parse_sort_spec("-cgpa,name"));
    assert_eq!(ids(&sorted), ["2", "5", "1", "3", "4"]);
}

#[test]
fn missing_field_sorts_last_ascending() {
    let docs = vec![
        json!({ "id": "a" }),
        json!({ "id": "b", "cgpa": 3.0 }),
        json!({ "id": "c", "cgpa": 2.0 }),
    ];
    let sorted = sort_records(docs, &[SortEntry::asc("cgpa")]);
    assert_eq!(ids(&sorted), ["c", "b", "a"]);
}

#[test]
fn sort_is_stable_for_ties() {
    let sorted = sort_records(records(), &[SortEntry::asc("cgpa")]);
    assert_eq!(ids(&sorted)[..3], ["4", "1", "3"]);
}

#[test]
fn empty_sort_keeps_stored_order() {
    assert_eq!(ids(&sort_records(records(), &[])), ["1", "2", "3", "4", "5"]);
}

// ============================================================================
// paginate_records
// ============================================================================

#[test]
fn offset_then_limit() {
    let page = paginate_records(records(), Some(2), Some(2));
    assert_eq!(ids(&page), ["3", "4"]);
}

#[test]
fn no_limit_returns_rest() {
    let page = paginate_records(records(), Some(3), None);
    assert_eq!(ids(&page), ["4", "5"]);
}

// ============================================================================
// project_record
// ============================================================================

#[test]
fn include_keeps_id() {
    let projected = project_record(records().remove(0), &Projection::Include(vec!["name".into()]));
    assert_eq!(projected, json!({ "id": "1", "name": "Alice" }));
}

#[test]
fn exclude_never_drops_id() {
    let projection = Projection::Exclude(vec!["id".into(), "cgpa".into(), "createdAt".into()]);
    let projected = project_record(records().remove(0), &projection);
    assert_eq!(projected, json!({ "id": "1", "name": "Alice" }));
}

#[test]
fn include_dotted_path_keeps_top_level_field() {
    let doc = json!({ "id": "s", "name": { "firstName": "A", "lastName": "B" }, "x": 1 });
    let projected = project_record(doc, &Projection::Include(vec!["name.firstName".into()]));
    assert_eq!(
        projected,
        json!({ "id": "s", "name": { "firstName": "A", "lastName": "B" } })
    );
}

// ============================================================================
// execute_query / count_matching
// ============================================================================

#[test]
fn execute_filters_sorts_windows_and_projects() {
    let query = Query {
        filter: Some(json!({ "cgpa": { "$gte": 3.0 } })),
        sort: Some(parse_sort_spec("-createdAt")),
        limit: Some(2),
        offset: Some(1),
        projection: Projection::parse("name"),
        populate: Vec::new(),
    };
    let result = execute_query(&records(), &query).unwrap();
    assert_eq!(
        result,
        vec![
            json!({ "id": "5", "name": "Eve" }),
            json!({ "id": "1", "name": "Alice" }),
        ]
    );
}

#[test]
fn count_ignores_window() {
    let filter = json!({ "cgpa": 3.9 });
    assert_eq!(count_matching(&records(), Some(&filter)).unwrap(), 2);
    assert_eq!(count_matching(&records(), None).unwrap(), 5);
    let filter = json!({ "cgpa": { "$gte": 3.5 } });
    assert_eq!(count_matching(&records(), Some(&filter)).unwrap(), 4);
}
