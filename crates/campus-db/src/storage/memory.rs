//! MemoryStore: an in-process `DocumentStore` holding every collection in
//! memory.
//!
//! Writes run their hooks, unique checks and the mutation under one lock, so a
//! hook's view of the collection cannot go stale before the write lands.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::{Map, Value};

use crate::error::{Result, StorageError};
use crate::query::execute::{count_matching, execute_query, ID_FIELD};
use crate::query::operators::{get_field_value, matches_filter, values_equal};
use crate::query::types::{Populate, Query};

use super::collection::CollectionDef;
use super::hooks::{update_fields, CollectionView};
use super::traits::DocumentStore;

/// Timestamp field set on insert.
pub const CREATED_AT: &str = "createdAt";
/// Timestamp field refreshed on every write.
pub const UPDATED_AT: &str = "updatedAt";

/// Fields an update payload cannot change.
const IMMUTABLE_FIELDS: &[&str] = &[ID_FIELD, CREATED_AT];

/// Closure producing a string (clock or id generator).
pub type StringFn = dyn Fn() -> String + Send + Sync;

/// Generate a random UUID (v4).
pub fn generate_uuid() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Options controlling auto-filled fields.
#[derive(Clone, Default)]
pub struct StoreOptions {
    /// Clock for `createdAt`/`updatedAt`. Defaults to `chrono::Utc::now()`
    /// in RFC 3339.
    pub now: Option<Arc<StringFn>>,
    /// Id generator. Defaults to [`generate_uuid`].
    pub generate_id: Option<Arc<StringFn>>,
}

impl std::fmt::Debug for StoreOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreOptions")
            .field("now", &self.now.as_ref().map(|_| "<fn>"))
            .field("generate_id", &self.generate_id.as_ref().map(|_| "<fn>"))
            .finish()
    }
}

/// In-memory document store.
///
/// Documents are kept per collection in insertion order. `initialize()` must
/// be called with every collection the caller will touch.
pub struct MemoryStore {
    collections: Mutex<HashMap<String, Vec<Value>>>,
    defs: HashMap<String, Arc<CollectionDef>>,
    initialized: bool,
    options: StoreOptions,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_options(StoreOptions::default())
    }

    pub fn with_options(options: StoreOptions) -> Self {
        Self {
            collections: Mutex::new(HashMap::new()),
            defs: HashMap::new(),
            initialized: false,
            options,
        }
    }

    /// Register collection definitions. Calling it again adds collections and
    /// keeps any stored documents.
    pub fn initialize(&mut self, defs: &[Arc<CollectionDef>]) -> Result<()> {
        let mut collections = self.collections.lock();
        for def in defs {
            collections.entry(def.name.clone()).or_default();
            self.defs.insert(def.name.clone(), Arc::clone(def));
        }
        self.initialized = true;
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    fn def(&self, collection: &str) -> Result<&CollectionDef> {
        if !self.initialized {
            return Err(StorageError::NotInitialized.into());
        }
        self.defs
            .get(collection)
            .map(|d| d.as_ref())
            .ok_or_else(|| StorageError::CollectionNotRegistered(collection.to_string()).into())
    }

    fn now(&self) -> String {
        match &self.options.now {
            Some(f) => f(),
            None => chrono::Utc::now().to_rfc3339(),
        }
    }

    fn next_id(&self) -> String {
        match &self.options.generate_id {
            Some(f) => f(),
            None => generate_uuid(),
        }
    }

    /// Reject `doc` if any unique field collides with another stored document.
    fn check_unique(
        def: &CollectionDef,
        docs: &[Value],
        doc: &Value,
        exclude: Option<usize>,
    ) -> Result<()> {
        let fields = std::iter::once(ID_FIELD).chain(def.unique.iter().map(String::as_str));
        for field in fields {
            let value = match get_field_value(doc, field) {
                Some(v) if !v.is_null() => v,
                _ => continue,
            };
            let clash = docs.iter().enumerate().find(|(i, other)| {
                Some(*i) != exclude
                    && get_field_value(other, field).is_some_and(|v| values_equal(v, value))
            });
            if let Some((_, existing)) = clash {
                let existing_id = existing
                    .get(ID_FIELD)
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();
                tracing::warn!(
                    collection = %def.name,
                    field,
                    existing_id = %existing_id,
                    "unique constraint rejected write"
                );
                return Err(StorageError::UniqueConstraint {
                    collection: def.name.clone(),
                    field: field.to_string(),
                    existing_id,
                    value: value.clone(),
                }
                .into());
            }
        }
        Ok(())
    }

    /// Expand populated references in place.
    fn populate(
        collections: &HashMap<String, Vec<Value>>,
        record: &mut Value,
        populate: &Populate,
    ) -> Result<()> {
        let target = collections
            .get(&populate.collection)
            .ok_or_else(|| StorageError::CollectionNotRegistered(populate.collection.clone()))?;
        let lookup = |id: &Value| -> Value {
            target
                .iter()
                .find(|doc| doc.get(ID_FIELD) == Some(id))
                .cloned()
                .unwrap_or(Value::Null)
        };

        let slot = match record.as_object_mut().and_then(|o| o.get_mut(&populate.path)) {
            Some(slot) => slot,
            None => return Ok(()),
        };
        let expanded = match &*slot {
            id @ Value::String(_) => lookup(id),
            Value::Array(ids) => Value::Array(ids.iter().map(|id| lookup(id)).collect()),
            _ => return Ok(()),
        };
        *slot = expanded;
        Ok(())
    }
}

/// Apply an update payload (plain fields or `{ "$set": {...} }`) onto `doc`.
/// Dotted keys address nested fields; immutable fields are skipped.
fn apply_update(doc: &mut Map<String, Value>, update: &Value) {
    let fields = match update_fields(update) {
        Some(fields) => fields,
        None => return,
    };

    for (key, value) in fields {
        if key.starts_with('$') || IMMUTABLE_FIELDS.contains(&key.as_str()) {
            continue;
        }
        set_path(doc, key, value.clone());
    }
}

fn set_path(doc: &mut Map<String, Value>, path: &str, value: Value) {
    match path.split_once('.') {
        None => {
            doc.insert(path.to_string(), value);
        }
        Some((head, rest)) => {
            let child = doc
                .entry(head.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if !child.is_object() {
                *child = Value::Object(Map::new());
            }
            if let Value::Object(child) = child {
                set_path(child, rest, value);
            }
        }
    }
}

impl DocumentStore for MemoryStore {
    fn find(&self, collection: &str, query: &Query) -> Result<Vec<Value>> {
        let def = self.def(collection)?;
        let query = Query {
            filter: query.filter.as_ref().map(|f| def.cast_filter(f)),
            ..query.clone()
        };

        let collections = self.collections.lock();
        let docs = collections.get(collection).map(Vec::as_slice).unwrap_or(&[]);
        let mut records = execute_query(docs, &query)?;
        for populate in &query.populate {
            for record in &mut records {
                Self::populate(&collections, record, populate)?;
            }
        }
        Ok(records)
    }

    fn count(&self, collection: &str, filter: Option<&Value>) -> Result<usize> {
        let def = self.def(collection)?;
        let filter = filter.map(|f| def.cast_filter(f));
        let collections = self.collections.lock();
        let docs = collections.get(collection).map(Vec::as_slice).unwrap_or(&[]);
        count_matching(docs, filter.as_ref())
    }

    fn find_one(&self, collection: &str, filter: &Value) -> Result<Option<Value>> {
        let def = self.def(collection)?;
        let filter = def.cast_filter(filter);
        let collections = self.collections.lock();
        let docs = collections.get(collection).map(Vec::as_slice).unwrap_or(&[]);
        Ok(CollectionView::new(collection, docs).find_one(&filter)?.cloned())
    }

    fn insert(&self, collection: &str, doc: Value) -> Result<Value> {
        let def = self.def(collection)?;
        let mut obj = match doc {
            Value::Object(obj) => obj,
            _ => {
                return Err(StorageError::NotAnObject {
                    collection: collection.to_string(),
                }
                .into())
            }
        };

        let mut collections = self.collections.lock();
        let docs = collections.entry(collection.to_string()).or_default();

        let candidate = Value::Object(obj.clone());
        let view = CollectionView::new(collection, docs);
        for hook in def.hooks() {
            if let Err(e) = hook.pre_create(&view, &candidate) {
                tracing::warn!(collection, error = %e, "pre-create hook rejected insert");
                return Err(e);
            }
        }

        let now = self.now();
        let missing_id = obj
            .get(ID_FIELD)
            .and_then(Value::as_str)
            .map_or(true, str::is_empty);
        if missing_id {
            obj.insert(ID_FIELD.to_string(), Value::String(self.next_id()));
        }
        if obj.get(CREATED_AT).map_or(true, Value::is_null) {
            obj.insert(CREATED_AT.to_string(), Value::String(now.clone()));
        }
        obj.insert(UPDATED_AT.to_string(), Value::String(now));

        let record = Value::Object(obj);
        Self::check_unique(def, docs, &record, None)?;

        let id = record.get(ID_FIELD).and_then(Value::as_str).unwrap_or_default();
        tracing::debug!(collection, id, "inserted document");
        docs.push(record.clone());
        Ok(record)
    }

    fn find_one_and_update(
        &self,
        collection: &str,
        filter: &Value,
        update: &Value,
    ) -> Result<Option<Value>> {
        let def = self.def(collection)?;
        let filter = def.cast_filter(filter);

        let mut collections = self.collections.lock();
        let docs = collections.entry(collection.to_string()).or_default();

        let view = CollectionView::new(collection, docs);
        for hook in def.hooks() {
            if let Err(e) = hook.pre_update(&view, &filter, update) {
                tracing::warn!(collection, error = %e, "pre-update hook rejected update");
                return Err(e);
            }
        }

        let mut position = None;
        for (i, doc) in docs.iter().enumerate() {
            if matches_filter(doc, &filter)? {
                position = Some(i);
                break;
            }
        }
        let index = match position {
            Some(i) => i,
            None => return Ok(None),
        };

        let mut merged = match &docs[index] {
            Value::Object(obj) => obj.clone(),
            _ => Map::new(),
        };
        apply_update(&mut merged, update);
        merged.insert(UPDATED_AT.to_string(), Value::String(self.now()));
        let merged = Value::Object(merged);

        Self::check_unique(def, docs, &merged, Some(index))?;

        let id = merged.get(ID_FIELD).and_then(Value::as_str).unwrap_or_default();
        tracing::debug!(collection, id, "updated document");
        docs[index] = merged.clone();
        Ok(Some(merged))
    }
}
