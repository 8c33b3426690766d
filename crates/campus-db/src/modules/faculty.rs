//! Academic faculties.

use std::sync::Arc;

use serde_json::{json, Value};

use crate::config::QueryOptions;
use crate::error::{Result, StorageError, ValidationError, ValidationErrors};
use crate::query::{ListResult, Query, QueryBuilder, QueryParams};
use crate::storage::{CollectionDef, DocumentStore};

pub const COLLECTION: &str = "academicFaculties";
pub const SEARCHABLE_FIELDS: &[&str] = &["name"];

const NAME_REQUIRED: &str = "Academic faculty name is required";

pub fn collection_def() -> CollectionDef {
    CollectionDef::new(COLLECTION).unique("name")
}

/// `name` must be a non-empty string.
pub fn validate_create(body: &Value) -> Result<(), ValidationErrors> {
    match body.get("name") {
        Some(Value::String(s)) if !s.trim().is_empty() => Ok(()),
        _ => Err(ValidationErrors(vec![ValidationError::new(
            "body.name",
            NAME_REQUIRED,
        )])),
    }
}

/// Like create, but numbers and booleans are accepted and coerced to strings.
pub fn validate_update(body: &Value) -> Result<Value, ValidationErrors> {
    let name = match body.get("name") {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(v @ (Value::Number(_) | Value::Bool(_))) => v.to_string(),
        _ => String::new(),
    };
    if name.is_empty() {
        return Err(ValidationErrors(vec![ValidationError::new(
            "body.name",
            NAME_REQUIRED,
        )]));
    }
    let mut update = body.as_object().cloned().unwrap_or_default();
    update.insert("name".to_string(), Value::String(name));
    Ok(Value::Object(update))
}

/// Faculty service functions.
pub struct FacultyService<S: DocumentStore> {
    store: Arc<S>,
    options: QueryOptions,
}

impl<S: DocumentStore> FacultyService<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self::with_options(store, QueryOptions::default())
    }

    pub fn with_options(store: Arc<S>, options: QueryOptions) -> Self {
        Self { store, options }
    }

    pub fn create(&self, payload: Value) -> Result<Value> {
        validate_create(&payload)?;
        self.store.insert(COLLECTION, payload)
    }

    pub fn get_all(&self, params: QueryParams) -> Result<ListResult> {
        let list = QueryBuilder::with_options(Query::new(), params, self.options.clone())
            .search(SEARCHABLE_FIELDS)
            .filter()
            .sort()
            .paginate()
            .fields()
            .exec_with_meta(self.store.as_ref(), COLLECTION)?;
        tracing::debug!(collection = COLLECTION, total = list.meta.total, "listed faculties");
        Ok(list)
    }

    pub fn get_single(&self, id: &str) -> Result<Option<Value>> {
        self.store.get(COLLECTION, id)
    }

    pub fn update(&self, id: &str, payload: Value) -> Result<Value> {
        let update = validate_update(&payload)?;
        self.store
            .find_one_and_update(COLLECTION, &json!({ "id": id }), &update)?
            .ok_or_else(|| {
                StorageError::NotFound {
                    collection: COLLECTION.to_string(),
                    id: id.to_string(),
                }
                .into()
            })
    }
}
