//! Tests for MemoryStore: collection registry, auto-filled fields, unique
//! constraints, updates, hooks and relation expansion.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use campus_db::error::{CampusError, StorageError, ValidationError, ValidationErrors};
use campus_db::query::Query;
use campus_db::storage::{
    CollectionDef, CollectionView, DocumentStore, MemoryStore, StoreOptions, WriteHook,
};
use serde_json::{json, Value};

fn options() -> StoreOptions {
    let tick = Arc::new(AtomicUsize::new(0));
    let ids = Arc::new(AtomicUsize::new(0));
    StoreOptions {
        now: Some(Arc::new(move || format!("t{:03}", tick.fetch_add(1, Ordering::SeqCst)))),
        generate_id: Some(Arc::new(move || {
            format!("id{}", ids.fetch_add(1, Ordering::SeqCst) + 1)
        })),
    }
}

fn store_with(defs: Vec<CollectionDef>) -> MemoryStore {
    let mut store = MemoryStore::with_options(options());
    let defs: Vec<Arc<CollectionDef>> = defs.into_iter().map(Arc::new).collect();
    store.initialize(&defs).unwrap();
    store
}

fn faculties() -> MemoryStore {
    store_with(vec![CollectionDef::new("faculties").unique("name")])
}

// ============================================================================
// Lifecycle
// ============================================================================

#[test]
fn uninitialized_store_rejects_calls() {
    let store = MemoryStore::new();
    assert!(!store.is_initialized());
    let err = store.find("faculties", &Query::new()).unwrap_err();
    assert!(matches!(err, CampusError::Storage(StorageError::NotInitialized)));
}

#[test]
fn unknown_collection_is_rejected() {
    let store = faculties();
    let err = store.insert("nope", json!({})).unwrap_err();
    assert!(matches!(
        err,
        CampusError::Storage(StorageError::CollectionNotRegistered(ref c)) if c == "nope"
    ));
    assert_eq!(err.status_code(), 500);
}

#[test]
fn initialize_again_keeps_documents() {
    let mut store = faculties();
    store.insert("faculties", json!({ "name": "Science" })).unwrap();
    store
        .initialize(&[Arc::new(CollectionDef::new("students"))])
        .unwrap();
    assert_eq!(store.count("faculties", None).unwrap(), 1);
    assert_eq!(store.count("students", None).unwrap(), 0);
}

// ============================================================================
// insert
// ============================================================================

#[test]
fn insert_fills_id_and_timestamps() {
    let store = faculties();
    let doc = store.insert("faculties", json!({ "name": "Science" })).unwrap();
    assert_eq!(
        doc,
        json!({ "id": "id1", "name": "Science", "createdAt": "t000", "updatedAt": "t000" })
    );
    assert_eq!(store.get("faculties", "id1").unwrap(), Some(doc));
}

#[test]
fn insert_keeps_supplied_id() {
    let store = faculties();
    let doc = store
        .insert("faculties", json!({ "id": "custom", "name": "Arts" }))
        .unwrap();
    assert_eq!(doc["id"], "custom");
}

#[test]
fn insert_rejects_non_object() {
    let store = faculties();
    let err = store.insert("faculties", json!([1, 2])).unwrap_err();
    assert!(matches!(err, CampusError::Storage(StorageError::NotAnObject { .. })));
}

#[test]
fn unique_field_collision_is_rejected() {
    let store = faculties();
    let first = store.insert("faculties", json!({ "name": "Science" })).unwrap();
    let err = store
        .insert("faculties", json!({ "name": "Science" }))
        .unwrap_err();
    match err {
        CampusError::Storage(StorageError::UniqueConstraint {
            field,
            existing_id,
            value,
            ..
        }) => {
            assert_eq!(field, "name");
            assert_eq!(existing_id, first["id"].as_str().unwrap());
            assert_eq!(value, json!("Science"));
        }
        other => panic!("expected UniqueConstraint, got {other:?}"),
    }
    assert_eq!(store.count("faculties", None).unwrap(), 1);
}

#[test]
fn duplicate_id_is_rejected() {
    let store = faculties();
    store.insert("faculties", json!({ "id": "x", "name": "A" })).unwrap();
    let err = store
        .insert("faculties", json!({ "id": "x", "name": "B" }))
        .unwrap_err();
    assert_eq!(err.status_code(), 409);
}

// ============================================================================
// find_one_and_update
// ============================================================================

#[test]
fn update_overlays_fields_and_refreshes_updated_at() {
    let store = faculties();
    store
        .insert("faculties", json!({ "name": "Science", "dean": "A" }))
        .unwrap();
    let updated = store
        .find_one_and_update("faculties", &json!({ "id": "id1" }), &json!({ "dean": "B" }))
        .unwrap()
        .unwrap();
    assert_eq!(updated["dean"], "B");
    assert_eq!(updated["name"], "Science");
    assert_eq!(updated["createdAt"], "t000");
    assert_eq!(updated["updatedAt"], "t001");
}

#[test]
fn update_accepts_set_and_dotted_paths() {
    let store = store_with(vec![CollectionDef::new("students")]);
    store
        .insert(
            "students",
            json!({ "name": { "firstName": "Rahim", "lastName": "Uddin" } }),
        )
        .unwrap();
    let updated = store
        .find_one_and_update(
            "students",
            &json!({ "id": "id1" }),
            &json!({ "$set": { "name.lastName": "Khan" } }),
        )
        .unwrap()
        .unwrap();
    assert_eq!(updated["name"], json!({ "firstName": "Rahim", "lastName": "Khan" }));
}

#[test]
fn update_cannot_change_id_or_created_at() {
    let store = faculties();
    store.insert("faculties", json!({ "name": "Science" })).unwrap();
    let updated = store
        .find_one_and_update(
            "faculties",
            &json!({ "id": "id1" }),
            &json!({ "id": "other", "createdAt": "never" }),
        )
        .unwrap()
        .unwrap();
    assert_eq!(updated["id"], "id1");
    assert_eq!(updated["createdAt"], "t000");
}

#[test]
fn update_without_match_returns_none() {
    let store = faculties();
    let result = store
        .find_one_and_update("faculties", &json!({ "id": "missing" }), &json!({ "x": 1 }))
        .unwrap();
    assert_eq!(result, None);
}

#[test]
fn update_into_unique_collision_is_rejected() {
    let store = faculties();
    store.insert("faculties", json!({ "name": "Science" })).unwrap();
    store.insert("faculties", json!({ "name": "Arts" })).unwrap();
    let err = store
        .find_one_and_update("faculties", &json!({ "id": "id2" }), &json!({ "name": "Science" }))
        .unwrap_err();
    assert!(matches!(err, CampusError::Storage(StorageError::UniqueConstraint { .. })));
    assert_eq!(store.get("faculties", "id2").unwrap().unwrap()["name"], "Arts");

    // Re-saving the same value on the same document is not a collision.
    store
        .find_one_and_update("faculties", &json!({ "id": "id1" }), &json!({ "name": "Science" }))
        .unwrap();
}

// ============================================================================
// Hooks
// ============================================================================

struct FrozenHook;

impl WriteHook for FrozenHook {
    fn pre_create(&self, view: &CollectionView<'_>, _doc: &Value) -> campus_db::Result<()> {
        if view.exists(&json!({ "frozen": true }))? {
            let message = format!("{} is frozen", view.name());
            return Err(ValidationErrors(vec![ValidationError::new("body", message)]).into());
        }
        Ok(())
    }

    fn pre_update(
        &self,
        _view: &CollectionView<'_>,
        _filter: &Value,
        update: &Value,
    ) -> campus_db::Result<()> {
        if update.get("locked").is_some() {
            return Err(
                ValidationErrors(vec![ValidationError::new("body.locked", "Read-only")]).into(),
            );
        }
        Ok(())
    }
}

#[test]
fn hooks_see_stored_documents_and_can_veto() {
    let store = store_with(vec![CollectionDef::new("terms").hook(Arc::new(FrozenHook))]);
    store.insert("terms", json!({ "frozen": true })).unwrap();
    let err = store.insert("terms", json!({ "name": "Fall" })).unwrap_err();
    match err {
        CampusError::Validation(errs) => assert_eq!(errs.0[0].message, "terms is frozen"),
        other => panic!("expected validation error, got {other:?}"),
    }
    assert_eq!(store.count("terms", None).unwrap(), 1);
}

#[test]
fn pre_update_veto_leaves_document_unchanged() {
    let store = store_with(vec![CollectionDef::new("terms").hook(Arc::new(FrozenHook))]);
    store.insert("terms", json!({ "name": "Fall" })).unwrap();
    let err = store
        .find_one_and_update("terms", &json!({ "id": "id1" }), &json!({ "locked": true }))
        .unwrap_err();
    assert!(matches!(err, CampusError::Validation(ref errs) if errs.has_path("body.locked")));
    assert!(store.get("terms", "id1").unwrap().unwrap().get("locked").is_none());
}

// ============================================================================
// Queries, casts and populate
// ============================================================================

#[test]
fn find_casts_string_filters_for_declared_fields() {
    use campus_db::storage::FieldKind;

    let store = store_with(vec![CollectionDef::new("students")
        .cast("cgpa", FieldKind::Number)
        .cast("isDeleted", FieldKind::Boolean)]);
    store
        .insert("students", json!({ "cgpa": 3.75, "isDeleted": false }))
        .unwrap();
    let query = Query::new().with_filter(json!({ "cgpa": "3.75", "isDeleted": "false" }));
    assert_eq!(store.find("students", &query).unwrap().len(), 1);
    assert_eq!(
        store
            .count("students", Some(&json!({ "cgpa": { "$in": ["3.75", "4"] } })))
            .unwrap(),
        1
    );
}

#[test]
fn populate_replaces_reference_with_document() {
    let store = store_with(vec![
        CollectionDef::new("faculties"),
        CollectionDef::new("departments"),
    ]);
    let faculty = store.insert("faculties", json!({ "name": "Science" })).unwrap();
    store
        .insert("departments", json!({ "name": "English", "faculty": faculty["id"] }))
        .unwrap();
    store
        .insert("departments", json!({ "name": "Law", "faculty": "gone" }))
        .unwrap();

    let query = Query::new().populate("faculty", "faculties");
    let found = store.find("departments", &query).unwrap();
    assert_eq!(found[0]["faculty"], faculty);
    assert_eq!(found[1]["faculty"], Value::Null);
}

#[test]
fn find_one_and_exists_use_stored_order() {
    let store = faculties();
    store.insert("faculties", json!({ "name": "A", "kind": "x" })).unwrap();
    store.insert("faculties", json!({ "name": "B", "kind": "x" })).unwrap();
    let first = store.find_one("faculties", &json!({ "kind": "x" })).unwrap().unwrap();
    assert_eq!(first["name"], "A");
    assert!(store.exists("faculties", &json!({ "name": "B" })).unwrap());
    assert!(!store.exists("faculties", &json!({ "name": "C" })).unwrap());
}
