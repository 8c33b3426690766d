//! Students, addressed by their university-issued `studentId`.
//!
//! Deletion is soft: the record stays in the collection with `isDeleted`
//! set, and every read path filters it out.

use std::sync::Arc;

use serde_json::{json, Map, Value};

use crate::config::QueryOptions;
use crate::error::{ReferenceError, Result, StorageError, ValidationError, ValidationErrors};
use crate::query::{ListResult, Query, QueryBuilder, QueryParams};
use crate::storage::{CollectionDef, DocumentStore, FieldKind};

pub const COLLECTION: &str = "students";
pub const SEARCHABLE_FIELDS: &[&str] = &[
    "universityEmail",
    "name.firstName",
    "name.lastName",
    "presentAddress",
    "studentId",
];

pub const STUDENT_ID: &str = "studentId";
pub const UNIVERSITY_EMAIL: &str = "universityEmail";
pub const FULL_NAME: &str = "fullName";
pub const IS_DELETED: &str = "isDeleted";
pub const DELETED_AT: &str = "deletedAt";

const GENDERS: &[&str] = &["male", "female", "other"];
const BLOOD_GROUPS: &[&str] = &["A+", "A-", "B+", "B-", "AB+", "AB-", "O+", "O-"];

/// Fields a client update may not touch. Deletion has its own path and
/// `fullName` is derived on read.
const PROTECTED_ON_UPDATE: &[&str] = &[IS_DELETED, DELETED_AT, FULL_NAME];

pub fn collection_def() -> CollectionDef {
    CollectionDef::new(COLLECTION)
        .unique(STUDENT_ID)
        .unique(UNIVERSITY_EMAIL)
        .cast("cgpa", FieldKind::Number)
        .cast("completedCredits", FieldKind::Number)
        .cast("enrolledCredits", FieldKind::Number)
        .cast("admissionYear", FieldKind::Number)
        .cast(IS_DELETED, FieldKind::Boolean)
        .cast("isFinancialHold", FieldKind::Boolean)
        .cast("emailVerified", FieldKind::Boolean)
}

/// Filter excluding soft-deleted records.
fn not_deleted() -> Value {
    json!({ IS_DELETED: { "$ne": true } })
}

fn by_student_id(student_id: &str) -> Value {
    json!({ "$and": [{ STUDENT_ID: student_id }, not_deleted()] })
}

/// Attach the derived `fullName`: first, middle and last name joined by
/// single spaces, skipping blank parts. Records without a `name` object
/// (e.g. projected away) are returned as they are.
pub fn with_full_name(mut record: Value) -> Value {
    let Some(name) = record.get("name").and_then(Value::as_object) else {
        return record;
    };
    let full = ["firstName", "middleName", "lastName"]
        .into_iter()
        .filter_map(|part| name.get(part).and_then(Value::as_str))
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    if let Some(obj) = record.as_object_mut() {
        obj.insert(FULL_NAME.to_string(), Value::String(full));
    }
    record
}

// ---------------------------------------------------------------------------
// Payload validation
// ---------------------------------------------------------------------------

struct Checker<'a> {
    obj: &'a Map<String, Value>,
    required: bool,
    errors: Vec<ValidationError>,
}

impl<'a> Checker<'a> {
    fn get(&self, path: &str) -> Option<&'a Value> {
        let mut parts = path.split('.');
        let first = parts.next()?;
        let mut current = self.obj.get(first)?;
        for part in parts {
            current = current.get(part)?;
        }
        Some(current).filter(|v| !v.is_null())
    }

    fn fail(&mut self, path: &str, message: impl Into<String>) {
        self.errors
            .push(ValidationError::new(format!("body.{path}"), message));
    }

    /// A string field; `Some(value)` when present and a string.
    fn string(&mut self, path: &str) -> Option<&'a str> {
        match self.get(path) {
            Some(Value::String(s)) => Some(s.as_str()),
            Some(_) => {
                self.fail(path, "Expected string");
                None
            }
            None => {
                if self.required {
                    self.fail(path, "Required");
                }
                None
            }
        }
    }

    fn optional_enum(&mut self, path: &str, allowed: &[&str]) {
        match self.get(path) {
            None => {}
            Some(Value::String(s)) if allowed.contains(&s.as_str()) => {}
            Some(_) => self.fail(
                path,
                format!("Expected one of {}", allowed.join(" | ")),
            ),
        }
    }

    fn finish(self) -> Result<(), ValidationErrors> {
        ValidationErrors(self.errors).into_result()
    }
}

fn validate(body: &Value, required: bool) -> Result<(), ValidationErrors> {
    let empty = Map::new();
    let obj = body.as_object().unwrap_or(&empty);
    let mut check = Checker {
        obj,
        required,
        errors: Vec::new(),
    };

    if !required && obj.is_empty() {
        return Err(ValidationErrors(vec![ValidationError::new(
            "body",
            "At least one field must be provided for update",
        )]));
    }

    if let Some(id) = check.string(STUDENT_ID) {
        if id.trim().is_empty() {
            check.fail(STUDENT_ID, "Student id cannot be empty");
        }
    }
    if let Some(first) = check.string("name.firstName") {
        if !first.starts_with(|c: char| c.is_ascii_uppercase()) {
            check.fail("name.firstName", "First Name must start with a capital letter");
        } else if first.chars().count() > 20 {
            check.fail("name.firstName", "First Name cannot exceed 20 characters");
        }
    }
    if let Some(last) = check.string("name.lastName") {
        if last.is_empty() {
            check.fail("name.lastName", "Last Name is required");
        }
    }
    if let Some(email) = check.string(UNIVERSITY_EMAIL) {
        if !looks_like_email(email) {
            check.fail(UNIVERSITY_EMAIL, "Invalid email");
        }
    }
    match check.get("gender") {
        None if required => check.fail("gender", "Required"),
        _ => check.optional_enum("gender", GENDERS),
    }
    check.optional_enum("bloodGroup", BLOOD_GROUPS);
    check.finish()
}

fn looks_like_email(s: &str) -> bool {
    match s.split_once('@') {
        Some((local, domain)) => !local.is_empty() && domain.contains('.') && !s.contains(' '),
        None => false,
    }
}

pub fn validate_create(body: &Value) -> Result<(), ValidationErrors> {
    validate(body, true)
}

pub fn validate_update(body: &Value) -> Result<(), ValidationErrors> {
    validate(body, false)
}

fn lowercase_email(obj: &mut Map<String, Value>) {
    if let Some(Value::String(email)) = obj.get_mut(UNIVERSITY_EMAIL) {
        *email = email.trim().to_lowercase();
    }
}

// ---------------------------------------------------------------------------
// StudentService
// ---------------------------------------------------------------------------

/// Student service functions.
pub struct StudentService<S: DocumentStore> {
    store: Arc<S>,
    options: QueryOptions,
}

impl<S: DocumentStore> StudentService<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self::with_options(store, QueryOptions::default())
    }

    pub fn with_options(store: Arc<S>, options: QueryOptions) -> Self {
        Self { store, options }
    }

    fn not_found(student_id: &str) -> StorageError {
        StorageError::NotFound {
            collection: COLLECTION.to_string(),
            id: student_id.to_string(),
        }
    }

    /// Create a student. A `studentId` already on file (deleted or not) is
    /// rejected.
    pub fn create(&self, payload: Value) -> Result<Value> {
        validate_create(&payload)?;
        let mut obj = payload.as_object().cloned().unwrap_or_default();
        let student_id = obj
            .get(STUDENT_ID)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        if self
            .store
            .exists(COLLECTION, &json!({ STUDENT_ID: student_id.as_str() }))?
        {
            tracing::warn!(collection = COLLECTION, student_id = %student_id, "duplicate student");
            return Err(ReferenceError::DuplicateEntity {
                entity: "student".to_string(),
                name: student_id,
            }
            .into());
        }

        lowercase_email(&mut obj);
        obj.insert(IS_DELETED.to_string(), Value::Bool(false));
        // Derived on read; never stored.
        obj.remove(FULL_NAME);
        let created = self.store.insert(COLLECTION, Value::Object(obj))?;
        Ok(with_full_name(created))
    }

    pub fn get_all(&self, params: QueryParams) -> Result<ListResult> {
        let base = Query::new().with_filter(not_deleted());
        let mut list = QueryBuilder::with_options(base, params, self.options.clone())
            .search(SEARCHABLE_FIELDS)
            .filter()
            .sort()
            .paginate()
            .fields()
            .exec_with_meta(self.store.as_ref(), COLLECTION)?;
        list.result = list.result.into_iter().map(with_full_name).collect();
        tracing::debug!(collection = COLLECTION, total = list.meta.total, "listed students");
        Ok(list)
    }

    pub fn get_single(&self, student_id: &str) -> Result<Option<Value>> {
        Ok(self
            .store
            .find_one(COLLECTION, &by_student_id(student_id))?
            .map(with_full_name))
    }

    /// Look up an active student by university email, case-insensitively.
    pub fn find_by_university_email(&self, email: &str) -> Result<Option<Value>> {
        let filter = json!({
            "$and": [{ UNIVERSITY_EMAIL: email.trim().to_lowercase() }, not_deleted()]
        });
        Ok(self.store.find_one(COLLECTION, &filter)?.map(with_full_name))
    }

    /// Update a student. Soft-delete markers in the payload are ignored.
    pub fn update(&self, student_id: &str, payload: Value) -> Result<Value> {
        validate_update(&payload)?;
        let mut obj = payload.as_object().cloned().unwrap_or_default();
        for field in PROTECTED_ON_UPDATE {
            obj.remove(*field);
            if let Some(Value::Object(set)) = obj.get_mut("$set") {
                set.remove(*field);
            }
        }
        lowercase_email(&mut obj);
        if let Some(Value::Object(set)) = obj.get_mut("$set") {
            lowercase_email(set);
        }

        self.store
            .find_one_and_update(COLLECTION, &by_student_id(student_id), &Value::Object(obj))?
            .map(with_full_name)
            .ok_or_else(|| Self::not_found(student_id).into())
    }

    /// Soft-delete a student and return the marked record.
    pub fn delete(&self, student_id: &str) -> Result<Value> {
        let marker = json!({
            IS_DELETED: true,
            DELETED_AT: chrono::Utc::now().to_rfc3339(),
        });
        let deleted = self
            .store
            .find_one_and_update(COLLECTION, &by_student_id(student_id), &marker)?
            .ok_or_else(|| Self::not_found(student_id))?;
        tracing::debug!(collection = COLLECTION, student_id, "soft-deleted student");
        Ok(with_full_name(deleted))
    }
}
