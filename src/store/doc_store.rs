//! # Document Store
//!
//! Whole-JSON-document records keyed by (collection, id). Upsert replaces
//! the stored document wholesale; deep merging exists as an explicit
//! utility ([`merge_json`]) and is never applied implicitly.

use std::sync::Arc;

use serde_json::Value;

use super::errors::{StoreError, StoreResult};
use crate::engine::{DocumentRecord, FieldFilter, StorageEngine};
use crate::path::HierarchicalPath;

/// (collection, id)-keyed JSON document storage.
pub struct DocumentStore {
    engine: Arc<dyn StorageEngine>,
}

impl DocumentStore {
    pub fn new(engine: Arc<dyn StorageEngine>) -> Self {
        Self { engine }
    }

    /// Fetch one document; `NotFound` when the key is absent.
    pub fn get(&self, collection: &HierarchicalPath, id: &str) -> StoreResult<Value> {
        self.engine
            .get_document(collection, id)?
            .ok_or_else(|| StoreError::NotFound(format!("{}/{}", collection, id)))
    }

    /// Create-or-replace by key. No merge: the stored document is replaced
    /// wholesale.
    pub fn upsert(
        &self,
        collection: &HierarchicalPath,
        id: &str,
        data: Value,
    ) -> StoreResult<()> {
        Ok(self.engine.put_document(collection, id, data)?)
    }

    /// Remove one document; returns whether anything was removed.
    pub fn delete(&self, collection: &HierarchicalPath, id: &str) -> StoreResult<bool> {
        Ok(self.engine.delete_document(collection, id)?)
    }

    /// All documents in a collection.
    pub fn list(&self, collection: &HierarchicalPath) -> StoreResult<Vec<DocumentRecord>> {
        Ok(self.engine.list_documents(collection)?)
    }

    /// Collections structurally under `prefix`.
    pub fn child_collections(
        &self,
        prefix: &HierarchicalPath,
    ) -> StoreResult<Vec<HierarchicalPath>> {
        Ok(self.engine.collections_under(prefix)?)
    }

    /// Field-filtered search. Filters compose as a conjunction over the same
    /// collection scope.
    pub fn search(
        &self,
        collection: &HierarchicalPath,
        filters: &[FieldFilter],
    ) -> StoreResult<Vec<DocumentRecord>> {
        Ok(self.engine.search_documents(collection, filters)?)
    }
}

/// Deep-merge `b` into `a`: object values merge recursively, everything
/// else overwrites. Callers invoke this explicitly before `upsert` when
/// they want merge semantics.
pub fn merge_json(a: &mut Value, b: &Value) {
    match (a, b) {
        (Value::Object(a_map), Value::Object(b_map)) => {
            for (key, b_value) in b_map {
                match a_map.get_mut(key) {
                    Some(a_value) if a_value.is_object() && b_value.is_object() => {
                        merge_json(a_value, b_value);
                    }
                    _ => {
                        a_map.insert(key.clone(), b_value.clone());
                    }
                }
            }
        }
        (a_slot, b_value) => *a_slot = b_value.clone(),
    }
}
