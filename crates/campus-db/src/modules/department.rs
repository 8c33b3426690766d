//! Academic departments: the canonical name/short form/code triple.
//!
//! The triple is enforced three times on the way in: request validation
//! ([`validate_create`] / [`validate_update`]), service autofill, and the
//! store's [`ReferenceHook`] which re-checks against stored state.

use std::sync::{Arc, OnceLock};

use serde_json::{json, Value};

use crate::config::QueryOptions;
use crate::error::{Result, StorageError, ValidationError, ValidationErrors};
use crate::query::{ListResult, Query, QueryBuilder, QueryParams};
use crate::reference::{
    CanonicalTable, PayloadMode, ReferenceFields, ReferenceHook, ReferenceValidator,
};
use crate::storage::{CollectionDef, DocumentStore};

use super::faculty;

pub const COLLECTION: &str = "academicDepartments";
pub const SEARCHABLE_FIELDS: &[&str] = &["name", "shortForm", "departmentCode"];

/// Field referencing the owning faculty.
pub const FACULTY_FIELD: &str = "academicFaculty";

/// The department table: name → (short form, code).
pub fn department_info() -> Arc<CanonicalTable> {
    static TABLE: OnceLock<Arc<CanonicalTable>> = OnceLock::new();
    TABLE
        .get_or_init(|| {
            CanonicalTable::new(
                "department",
                [
                    ("English", "ENG", "114"),
                    ("Economics", "ECO", "111"),
                    ("Law", "LLB", "113"),
                    ("BusinessAdministration", "BBA", "116"),
                    ("ComputerScience", "CSE", "115"),
                    ("SoftwareEngineering", "SWE", "134"),
                    ("ElectricalEngineering", "EEE", "141"),
                ],
            )
            .into_shared()
        })
        .clone()
}

pub fn reference_fields() -> ReferenceFields {
    ReferenceFields::new("name", "shortForm", "departmentCode")
}

pub fn validator() -> ReferenceValidator {
    ReferenceValidator::new(department_info(), reference_fields())
}

pub fn collection_def() -> CollectionDef {
    CollectionDef::new(COLLECTION)
        .unique("name")
        .unique("shortForm")
        .unique("departmentCode")
        .hook(Arc::new(ReferenceHook::new(validator())))
}

fn check_faculty(body: &Value, mode: PayloadMode, errors: &mut Vec<ValidationError>) {
    let path = format!("body.{FACULTY_FIELD}");
    match body.get(FACULTY_FIELD) {
        Some(Value::String(_)) => {}
        None | Some(Value::Null) if mode == PayloadMode::Update => {}
        _ => errors.push(ValidationError::new(path, "Faculty id must be a string")),
    }
}

fn validate(body: &Value, mode: PayloadMode) -> Result<(), ValidationErrors> {
    let mut errors = match validator().validate_payload(body, mode) {
        Ok(()) => Vec::new(),
        Err(ValidationErrors(errors)) => errors,
    };
    check_faculty(body, mode, &mut errors);
    ValidationErrors(errors).into_result()
}

pub fn validate_create(body: &Value) -> Result<(), ValidationErrors> {
    validate(body, PayloadMode::Create)
}

pub fn validate_update(body: &Value) -> Result<(), ValidationErrors> {
    validate(body, PayloadMode::Update)
}

/// Department service functions.
pub struct DepartmentService<S: DocumentStore> {
    store: Arc<S>,
    options: QueryOptions,
    validator: ReferenceValidator,
}

impl<S: DocumentStore> DepartmentService<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self::with_options(store, QueryOptions::default())
    }

    pub fn with_options(store: Arc<S>, options: QueryOptions) -> Self {
        Self {
            store,
            options,
            validator: validator(),
        }
    }

    fn base_query() -> Query {
        Query::new().populate(FACULTY_FIELD, faculty::COLLECTION)
    }

    fn not_found(id: &str) -> StorageError {
        StorageError::NotFound {
            collection: COLLECTION.to_string(),
            id: id.to_string(),
        }
    }

    /// Create a department. A missing short form or code is derived from
    /// the name.
    pub fn create(&self, payload: Value) -> Result<Value> {
        validate_create(&payload)?;
        let doc = self.validator.autofill(&payload)?;
        let created = self.store.insert(COLLECTION, doc)?;
        let name = created.get("name").and_then(Value::as_str).unwrap_or_default();
        tracing::debug!(collection = COLLECTION, name, "created department");
        Ok(created)
    }

    pub fn get_all(&self, params: QueryParams) -> Result<ListResult> {
        let list = QueryBuilder::with_options(Self::base_query(), params, self.options.clone())
            .search(SEARCHABLE_FIELDS)
            .filter()
            .sort()
            .paginate()
            .fields()
            .exec_with_meta(self.store.as_ref(), COLLECTION)?;
        tracing::debug!(collection = COLLECTION, total = list.meta.total, "listed departments");
        Ok(list)
    }

    /// Fetch one department with its faculty expanded.
    pub fn get_single(&self, id: &str) -> Result<Option<Value>> {
        let query = Self::base_query().with_filter(json!({ "id": id }));
        Ok(self.store.find(COLLECTION, &query)?.into_iter().next())
    }

    /// Update a department.
    ///
    /// When the payload renames the department, a short form or code it does
    /// not carry is derived from the new name before the store re-checks the
    /// merged record.
    pub fn update(&self, id: &str, payload: Value) -> Result<Value> {
        validate_update(&payload)?;
        let renames = payload
            .get(&self.validator.fields().name)
            .is_some_and(|v| !v.is_null());
        let update = if renames {
            self.validator.autofill(&payload)?
        } else {
            payload
        };

        self.store
            .find_one_and_update(COLLECTION, &json!({ "id": id }), &update)?
            .ok_or_else(|| Self::not_found(id))?;
        self.get_single(id)?
            .ok_or_else(|| Self::not_found(id).into())
    }
}
