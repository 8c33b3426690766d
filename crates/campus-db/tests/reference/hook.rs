//! Tests for ReferenceHook: the mapping gate on a store's write path.

use std::sync::Arc;

use campus_db::error::{CampusError, ReferenceError};
use campus_db::modules::department;
use campus_db::storage::{CollectionDef, DocumentStore, MemoryStore};
use serde_json::json;

const COLLECTION: &str = department::COLLECTION;

fn store() -> MemoryStore {
    let mut store = MemoryStore::new();
    store
        .initialize(&[Arc::new(department::collection_def())])
        .unwrap();
    store
}

fn english() -> serde_json::Value {
    json!({ "name": "English", "shortForm": "ENG", "departmentCode": "114" })
}

fn reference_error(err: CampusError) -> ReferenceError {
    match err {
        CampusError::Reference(e) => e,
        other => panic!("expected a reference error, got {other:?}"),
    }
}

#[test]
fn canonical_create_is_stored() {
    let store = store();
    let doc = store.insert(COLLECTION, english()).unwrap();
    assert_eq!(doc["shortForm"], "ENG");
    assert_eq!(store.count(COLLECTION, None).unwrap(), 1);
}

#[test]
fn mismatched_create_is_vetoed() {
    let store = store();
    let err = store
        .insert(
            COLLECTION,
            json!({ "name": "English", "shortForm": "ECO", "departmentCode": "114" }),
        )
        .unwrap_err();
    assert_eq!(err.status_code(), 400);
    assert!(matches!(
        reference_error(err),
        ReferenceError::MappingMismatch { ref expected, .. } if expected == "ENG"
    ));
    assert_eq!(store.count(COLLECTION, None).unwrap(), 0);
}

#[test]
fn second_create_is_duplicate_entity() {
    let store = store();
    store.insert(COLLECTION, english()).unwrap();
    let err = store.insert(COLLECTION, english()).unwrap_err();
    assert_eq!(err.status_code(), 409);
    assert_eq!(err.to_string(), "This department already exists!");
}

#[test]
fn invalid_name_is_checked_before_duplicates() {
    let store = store();
    let err = store
        .insert(COLLECTION, json!({ "name": "Physics" }))
        .unwrap_err();
    assert!(matches!(reference_error(err), ReferenceError::InvalidReference { .. }));
}

#[test]
fn update_with_consistent_values_succeeds() {
    let store = store();
    let doc = store.insert(COLLECTION, english()).unwrap();
    let updated = store
        .find_one_and_update(COLLECTION, &json!({ "id": doc["id"] }), &json!({ "shortForm": "ENG" }))
        .unwrap()
        .unwrap();
    assert_eq!(updated["name"], "English");
}

#[test]
fn rename_without_short_form_is_vetoed() {
    let store = store();
    let doc = store.insert(COLLECTION, english()).unwrap();
    let err = store
        .find_one_and_update(COLLECTION, &json!({ "id": doc["id"] }), &json!({ "name": "Law" }))
        .unwrap_err();
    assert!(matches!(
        reference_error(err),
        ReferenceError::MappingMismatch { ref field, ref expected, .. }
            if field == "shortForm" && expected == "LLB"
    ));
    let stored = store.get(COLLECTION, doc["id"].as_str().unwrap()).unwrap().unwrap();
    assert_eq!(stored["name"], "English");
}

#[test]
fn update_of_missing_record_is_not_found_before_mapping() {
    let store = store();
    let err = store
        .find_one_and_update(
            COLLECTION,
            &json!({ "id": "missing" }),
            &json!({ "name": "Nonsense", "shortForm": "???" }),
        )
        .unwrap_err();
    assert_eq!(err.status_code(), 404);
    assert_eq!(err.to_string(), "This department does not exist!");
}

#[test]
fn hook_only_guards_its_collection() {
    let mut store = MemoryStore::new();
    store
        .initialize(&[
            Arc::new(department::collection_def()),
            Arc::new(CollectionDef::new("other")),
        ])
        .unwrap();
    assert!(store.insert("other", json!({ "name": "Physics" })).is_ok());
}
