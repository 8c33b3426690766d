//! Reference consistency checks: a record's short form and code must be the
//! canonical derivation of its name.
//!
//! Every check here is a pure function of the table and the values handed in.
//! Store access (duplicate and existence lookups) lives in
//! [`ReferenceHook`](super::hook::ReferenceHook).

use std::sync::Arc;

use serde_json::{Map, Value};

use crate::error::{ReferenceError, ValidationError, ValidationErrors};
use crate::storage::hooks::update_fields;

use super::mapping::{CanonicalTable, ReferenceFields};

// ============================================================================
// ReferenceTriple
// ============================================================================

/// The `(name, short form, code)` values a record declares.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReferenceTriple {
    pub name: Option<String>,
    pub short_form: Option<String>,
    pub code: Option<String>,
}

impl ReferenceTriple {
    pub fn new(name: &str, short_form: &str, code: &str) -> Self {
        Self {
            name: Some(name.to_string()),
            short_form: Some(short_form.to_string()),
            code: Some(code.to_string()),
        }
    }

    /// Read the triple from a document. Non-string values count as absent.
    pub fn from_doc(doc: &Value, fields: &ReferenceFields) -> Self {
        match doc.as_object() {
            Some(obj) => Self::from_map(obj, fields),
            None => Self::default(),
        }
    }

    fn from_map(obj: &Map<String, Value>, fields: &ReferenceFields) -> Self {
        let read = |key: &str| obj.get(key).and_then(Value::as_str).map(str::to_string);
        Self {
            name: read(&fields.name),
            short_form: read(&fields.short_form),
            code: read(&fields.code),
        }
    }

    /// Overlay `update` onto `self`: every value the update sets wins.
    pub fn overlay(self, update: ReferenceTriple) -> Self {
        Self {
            name: update.name.or(self.name),
            short_form: update.short_form.or(self.short_form),
            code: update.code.or(self.code),
        }
    }
}

// ============================================================================
// PayloadMode
// ============================================================================

/// Whether a request payload creates a record (name required, short form
/// and code derivable) or updates one (all fields optional).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadMode {
    Create,
    Update,
}

// ============================================================================
// ReferenceValidator
// ============================================================================

/// Canonical-mapping gate for one enumerated-triple entity.
#[derive(Debug, Clone)]
pub struct ReferenceValidator {
    table: Arc<CanonicalTable>,
    fields: ReferenceFields,
}

impl ReferenceValidator {
    pub fn new(table: Arc<CanonicalTable>, fields: ReferenceFields) -> Self {
        Self { table, fields }
    }

    pub fn table(&self) -> &CanonicalTable {
        &self.table
    }

    pub fn fields(&self) -> &ReferenceFields {
        &self.fields
    }

    fn invalid(&self, name: &str) -> ReferenceError {
        ReferenceError::InvalidReference {
            entity: self.table.entity().to_string(),
            name: name.to_string(),
        }
    }

    /// Check a triple against the table.
    ///
    /// Short form is checked before code; the first disagreement is returned.
    pub fn check(&self, triple: &ReferenceTriple) -> Result<(), ReferenceError> {
        let name = triple.name.as_deref().unwrap_or_default();
        let expected = self.table.get(name).ok_or_else(|| self.invalid(name))?;

        if triple.short_form.as_deref() != Some(expected.short_form.as_str()) {
            return Err(ReferenceError::MappingMismatch {
                field: self.fields.short_form.clone(),
                expected: expected.short_form.clone(),
                name: name.to_string(),
            });
        }
        if triple.code.as_deref() != Some(expected.code.as_str()) {
            return Err(ReferenceError::MappingMismatch {
                field: self.fields.code.clone(),
                expected: expected.code.clone(),
                name: name.to_string(),
            });
        }
        Ok(())
    }

    /// Check a document about to be created.
    pub fn check_create(&self, doc: &Value) -> Result<(), ReferenceError> {
        self.check(&ReferenceTriple::from_doc(doc, &self.fields))
    }

    /// The post-update values: `update` overlaid onto `existing`.
    pub fn effective(&self, existing: &Value, update: &Value) -> ReferenceTriple {
        let stored = ReferenceTriple::from_doc(existing, &self.fields);
        let changes = update_fields(update)
            .map(|obj| ReferenceTriple::from_map(obj, &self.fields))
            .unwrap_or_default();
        stored.overlay(changes)
    }

    /// Check the effective values of an update to `existing`.
    pub fn check_update(&self, existing: &Value, update: &Value) -> Result<(), ReferenceError> {
        self.check(&self.effective(existing, update))
    }

    /// Fill a missing short form and code from the payload's name.
    ///
    /// Values the payload already carries are kept as sent, so a contradicting
    /// value still reaches [`check`](Self::check).
    pub fn autofill(&self, payload: &Value) -> Result<Value, ReferenceError> {
        let mut obj = payload.as_object().cloned().unwrap_or_default();
        let name = obj
            .get(&self.fields.name)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let expected = self.table.get(&name).ok_or_else(|| self.invalid(&name))?;

        for (field, value) in [
            (&self.fields.short_form, &expected.short_form),
            (&self.fields.code, &expected.code),
        ] {
            if obj.get(field).map_or(true, Value::is_null) {
                obj.insert(field.clone(), Value::String(value.clone()));
            }
        }
        Ok(Value::Object(obj))
    }

    /// Request-body validation.
    ///
    /// Reports a missing name (create only), and every field that is not a
    /// string or is outside the table's enumeration. When those all pass, reports a short
    /// form or code that contradicts a sent name. Paths are `body.<field>`.
    pub fn validate_payload(&self, body: &Value, mode: PayloadMode) -> Result<(), ValidationErrors> {
        let mut errors = Vec::new();
        let empty = Map::new();
        let obj = body.as_object().unwrap_or(&empty);

        let enums: [(&String, Vec<&str>); 3] = [
            (&self.fields.name, self.table.names().collect()),
            (&self.fields.short_form, self.table.short_forms().collect()),
            (&self.fields.code, self.table.codes().collect()),
        ];
        for (field, allowed) in &enums {
            let path = format!("body.{field}");
            match obj.get(field.as_str()) {
                None | Some(Value::Null) => {
                    if mode == PayloadMode::Create && *field == &self.fields.name {
                        errors.push(ValidationError::new(path, "Required"));
                    }
                }
                Some(Value::String(s)) if allowed.contains(&s.as_str()) => {}
                Some(Value::String(s)) => errors.push(ValidationError::new(
                    path,
                    format!(
                        "Invalid enum value. Expected {}, received '{s}'",
                        allowed
                            .iter()
                            .map(|a| format!("'{a}'"))
                            .collect::<Vec<_>>()
                            .join(" | ")
                    ),
                )),
                Some(_) => errors.push(ValidationError::new(path, "Expected string")),
            }
        }

        if errors.is_empty() {
            self.check_matching(obj, &mut errors);
        }
        ValidationErrors(errors).into_result()
    }

    /// Report sent short form / code values that contradict a sent name.
    fn check_matching(&self, obj: &Map<String, Value>, errors: &mut Vec<ValidationError>) {
        let triple = ReferenceTriple::from_map(obj, &self.fields);
        let Some(expected) = triple.name.as_deref().and_then(|n| self.table.get(n)) else {
            return;
        };
        let name = triple.name.as_deref().unwrap_or_default();

        for (field, sent, want) in [
            (&self.fields.short_form, &triple.short_form, &expected.short_form),
            (&self.fields.code, &triple.code, &expected.code),
        ] {
            if let Some(sent) = sent {
                if sent != want {
                    errors.push(ValidationError::new(
                        format!("body.{field}"),
                        format!(r#"{field} must be "{want}" for "{name}""#),
                    ));
                }
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
