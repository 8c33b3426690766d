/// Document store trait for campus-db.
///
/// `DocumentStore` is the narrow collection-scoped interface the query builder
/// and module services consume: find with filter/sort/window/projection, an
/// independent count, single-document lookups, and the two write paths that
/// carry pre-create / pre-update hooks.
use serde_json::{json, Value};

use crate::error::Result;
use crate::query::types::Query;

/// Collection-scoped document operations.
///
/// Implementors must be `Send + Sync` so one store can serve concurrent
/// requests.
pub trait DocumentStore: Send + Sync {
    /// Run a query: filter, sort, skip/limit, projection, then relation
    /// expansion.
    fn find(&self, collection: &str, query: &Query) -> Result<Vec<Value>>;

    /// Count documents matching `filter` (all documents when `None`).
    /// Ignores any sort, window or projection.
    fn count(&self, collection: &str, filter: Option<&Value>) -> Result<usize>;

    /// First document matching `filter` in stored order.
    fn find_one(&self, collection: &str, filter: &Value) -> Result<Option<Value>>;

    /// Whether any document matches `filter`.
    fn exists(&self, collection: &str, filter: &Value) -> Result<bool> {
        Ok(self.find_one(collection, filter)?.is_some())
    }

    /// Fetch a document by its `id`.
    fn get(&self, collection: &str, id: &str) -> Result<Option<Value>> {
        self.find_one(collection, &json!({ "id": id }))
    }

    /// Insert a new document and return it as stored (with `id`, `createdAt`
    /// and `updatedAt` filled). Pre-create hooks may veto the write.
    fn insert(&self, collection: &str, doc: Value) -> Result<Value>;

    /// Overlay `update` onto the first document matching `filter` and return
    /// the updated document, or `None` when nothing matched. Pre-update hooks
    /// run first and may veto the write.
    fn find_one_and_update(
        &self,
        collection: &str,
        filter: &Value,
        update: &Value,
    ) -> Result<Option<Value>>;
}
