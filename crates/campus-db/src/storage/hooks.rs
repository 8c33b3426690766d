//! Write hooks: veto points on a collection's write path.

use serde_json::{Map, Value};

use crate::error::Result;
use crate::query::operators::matches_filter;

/// The fields an update payload sets: the `$set` object when present,
/// otherwise the payload itself.
pub fn update_fields(update: &Value) -> Option<&Map<String, Value>> {
    match update.get("$set").and_then(Value::as_object) {
        Some(set) => Some(set),
        None => update.as_object(),
    }
}

/// Read-only view of a collection's stored documents, handed to hooks while
/// the store holds its write lock.
#[derive(Debug, Clone, Copy)]
pub struct CollectionView<'a> {
    name: &'a str,
    docs: &'a [Value],
}

impl<'a> CollectionView<'a> {
    pub fn new(name: &'a str, docs: &'a [Value]) -> Self {
        Self { name, docs }
    }

    pub fn name(&self) -> &'a str {
        self.name
    }

    /// First stored document matching `filter`.
    pub fn find_one(&self, filter: &Value) -> Result<Option<&'a Value>> {
        for doc in self.docs {
            if matches_filter(doc, filter)? {
                return Ok(Some(doc));
            }
        }
        Ok(None)
    }

    pub fn exists(&self, filter: &Value) -> Result<bool> {
        Ok(self.find_one(filter)?.is_some())
    }
}

/// Hooks run by the store before a write lands.
///
/// Both methods default to accepting the write. Returning an error vetoes the
/// write and the error is surfaced to the caller unchanged.
pub trait WriteHook: Send + Sync {
    /// Called with the candidate document before insertion.
    fn pre_create(&self, _view: &CollectionView<'_>, _doc: &Value) -> Result<()> {
        Ok(())
    }

    /// Called with the identifying filter and the update payload before the
    /// update is applied.
    fn pre_update(&self, _view: &CollectionView<'_>, _filter: &Value, _update: &Value) -> Result<()> {
        Ok(())
    }
}
