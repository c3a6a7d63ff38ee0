//! # Path Store
//!
//! The write/read/delete protocol for flattened leaves.
//!
//! ## Invariants
//! - PS-1: a path is never simultaneously a leaf and an ancestor of other
//!   leaves; writing a path evicts its entire subtree first
//! - PS-2: the delete pass covers the whole batch before any write, so a
//!   record written earlier in a batch survives a later record's
//!   subtree-clear
//!
//! Deletes applied before a failing write are not rolled back; atomicity
//! across the delete and write passes is left to the engine's own
//! transaction guarantees. With write serialization enabled, batches that
//! touch the same root segment take per-root locks (in sorted order) so the
//! delete+write window of one writer cannot interleave with another's.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex as StdMutex;

use serde_json::Value;
use tokio::sync::{Mutex, OwnedMutexGuard};

use super::errors::{StoreError, StoreResult};
use crate::codec;
use crate::engine::{LeafRecord, StorageEngine, StorageError};
use crate::observability::Logger;
use crate::path::{HierarchicalPath, PathPredicate};
use crate::value::TypedValue;

/// Leaf store with subtree-consistent replace-on-write semantics.
pub struct PathStore {
    engine: Arc<dyn StorageEngine>,
    serialize_writes: bool,
    root_locks: StdMutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl PathStore {
    pub fn new(engine: Arc<dyn StorageEngine>) -> Self {
        Self {
            engine,
            serialize_writes: false,
            root_locks: StdMutex::new(HashMap::new()),
        }
    }

    /// Enable per-root-segment write serialization (PS-2 across writers).
    pub fn with_serialized_writes(mut self, enabled: bool) -> Self {
        self.serialize_writes = enabled;
        self
    }

    /// Decode raw flattened pairs into leaf records.
    ///
    /// Unrepresentable values (objects, nulls, empty or mixed arrays) are
    /// skipped with a warning rather than failing the batch.
    pub fn decode_leaves(pairs: Vec<(HierarchicalPath, Value)>) -> Vec<LeafRecord> {
        let mut records = Vec::with_capacity(pairs.len());
        for (path, raw) in pairs {
            match TypedValue::from_json(&raw) {
                Some(value) => records.push(LeafRecord::new(path, value)),
                None => {
                    Logger::warn("LEAF_SKIPPED", &[("path", &path.to_string())]);
                }
            }
        }
        records
    }

    /// Flatten a nested document under `base` and upsert the result.
    pub async fn insert_document(
        &self,
        document: &Value,
        base: &HierarchicalPath,
    ) -> StoreResult<()> {
        let records = Self::decode_leaves(codec::flatten(document, base));
        self.upsert(records).await
    }

    /// Subtree-consistent batch upsert.
    ///
    /// Pass one deletes each record's path and descendant subtree; pass two
    /// writes the whole batch with replace-on-conflict. The first storage
    /// error aborts the remainder.
    pub async fn upsert(&self, records: Vec<LeafRecord>) -> StoreResult<()> {
        let _guards = if self.serialize_writes {
            self.lock_roots(&records).await?
        } else {
            Vec::new()
        };

        for record in &records {
            self.engine
                .delete_leaves(&PathPredicate::StartsWith(record.path.clone()))?;
        }
        self.engine.put_leaves(records)?;
        Ok(())
    }

    /// Delete the subtree under `prefix`, returning the removed records.
    /// The root prefix clears the whole store.
    pub fn delete(&self, prefix: &HierarchicalPath) -> StoreResult<Vec<LeafRecord>> {
        Ok(self
            .engine
            .delete_leaves(&PathPredicate::StartsWith(prefix.clone()))?)
    }

    /// Structural query over the leaf namespace.
    pub fn query(&self, predicate: &PathPredicate) -> StoreResult<Vec<LeafRecord>> {
        Ok(self.engine.query_leaves(predicate)?)
    }

    /// Read the subtree under `path` back as a nested document.
    pub fn get_subtree(&self, path: &HierarchicalPath) -> StoreResult<Value> {
        let records = self.query(&PathPredicate::StartsWith(path.clone()))?;
        Ok(codec::reconstruct(
            records
                .into_iter()
                .map(|record| (record.path, record.value.to_json())),
            path,
        ))
    }

    /// Take the per-root locks for every distinct root segment in the batch,
    /// in sorted order so concurrent writers cannot deadlock.
    async fn lock_roots(
        &self,
        records: &[LeafRecord],
    ) -> StoreResult<Vec<OwnedMutexGuard<()>>> {
        let mut roots: Vec<String> = records
            .iter()
            .filter_map(|record| record.path.first_segment())
            .map(str::to_string)
            .collect();
        roots.sort();
        roots.dedup();

        let locks: Vec<Arc<Mutex<()>>> = {
            let mut table = self
                .root_locks
                .lock()
                .map_err(|_| StoreError::Storage(StorageError::backend("lock poisoned")))?;
            roots
                .iter()
                .map(|root| Arc::clone(table.entry(root.clone()).or_default()))
                .collect()
        };

        let mut guards = Vec::with_capacity(locks.len());
        for lock in locks {
            guards.push(lock.lock_owned().await);
        }
        Ok(guards)
    }
}
