//! # In-Memory Reference Engine
//!
//! Implements the full engine contract over ordered maps. Used by tests and
//! the default server; durability is somebody else's job.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, RwLock};

use serde_json::Value;
use tokio::sync::mpsc;

use super::{
    DocumentRecord, FieldFilter, LeafRecord, NotificationFeed, StorageEngine, StorageError,
    StorageResult,
};
use crate::path::{HierarchicalPath, PathPredicate};
use crate::value::TypedValue;

/// Ordered-map engine. Leaves live in a `BTreeMap` keyed by path, so scans
/// come back in path order; documents key on (collection, id).
#[derive(Default)]
pub struct MemoryEngine {
    leaves: RwLock<BTreeMap<HierarchicalPath, TypedValue>>,
    documents: RwLock<BTreeMap<(HierarchicalPath, String), Value>>,
    channels: Mutex<HashMap<String, Vec<mpsc::UnboundedSender<String>>>>,
}

impl MemoryEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored leaves. Test/introspection helper.
    pub fn leaf_count(&self) -> usize {
        self.leaves.read().map(|l| l.len()).unwrap_or(0)
    }
}

fn poisoned() -> StorageError {
    StorageError::backend("lock poisoned")
}

impl StorageEngine for MemoryEngine {
    fn put_leaves(&self, records: Vec<LeafRecord>) -> StorageResult<()> {
        let mut leaves = self.leaves.write().map_err(|_| poisoned())?;
        for record in records {
            leaves.insert(record.path, record.value);
        }
        Ok(())
    }

    fn query_leaves(&self, predicate: &PathPredicate) -> StorageResult<Vec<LeafRecord>> {
        let leaves = self.leaves.read().map_err(|_| poisoned())?;
        Ok(leaves
            .iter()
            .filter(|(path, _)| predicate.matches(path))
            .map(|(path, value)| LeafRecord::new(path.clone(), value.clone()))
            .collect())
    }

    fn delete_leaves(&self, predicate: &PathPredicate) -> StorageResult<Vec<LeafRecord>> {
        let mut leaves = self.leaves.write().map_err(|_| poisoned())?;
        let doomed: Vec<HierarchicalPath> = leaves
            .keys()
            .filter(|path| predicate.matches(path))
            .cloned()
            .collect();
        let mut removed = Vec::with_capacity(doomed.len());
        for path in doomed {
            if let Some(value) = leaves.remove(&path) {
                removed.push(LeafRecord::new(path, value));
            }
        }
        Ok(removed)
    }

    fn get_document(
        &self,
        collection: &HierarchicalPath,
        id: &str,
    ) -> StorageResult<Option<Value>> {
        let documents = self.documents.read().map_err(|_| poisoned())?;
        Ok(documents
            .get(&(collection.clone(), id.to_string()))
            .cloned())
    }

    fn put_document(
        &self,
        collection: &HierarchicalPath,
        id: &str,
        data: Value,
    ) -> StorageResult<()> {
        let mut documents = self.documents.write().map_err(|_| poisoned())?;
        documents.insert((collection.clone(), id.to_string()), data);
        Ok(())
    }

    fn delete_document(&self, collection: &HierarchicalPath, id: &str) -> StorageResult<bool> {
        let mut documents = self.documents.write().map_err(|_| poisoned())?;
        Ok(documents
            .remove(&(collection.clone(), id.to_string()))
            .is_some())
    }

    fn list_documents(&self, collection: &HierarchicalPath) -> StorageResult<Vec<DocumentRecord>> {
        let documents = self.documents.read().map_err(|_| poisoned())?;
        Ok(documents
            .iter()
            .filter(|((c, _), _)| c == collection)
            .map(|((c, id), data)| DocumentRecord {
                collection: c.clone(),
                id: id.clone(),
                data: data.clone(),
            })
            .collect())
    }

    fn collections_under(
        &self,
        prefix: &HierarchicalPath,
    ) -> StorageResult<Vec<HierarchicalPath>> {
        let documents = self.documents.read().map_err(|_| poisoned())?;
        let mut found: Vec<HierarchicalPath> = documents
            .keys()
            .map(|(collection, _)| collection)
            .filter(|collection| collection.starts_with(prefix))
            .cloned()
            .collect();
        found.dedup();
        Ok(found)
    }

    fn search_documents(
        &self,
        collection: &HierarchicalPath,
        filters: &[FieldFilter],
    ) -> StorageResult<Vec<DocumentRecord>> {
        let documents = self.documents.read().map_err(|_| poisoned())?;
        Ok(documents
            .iter()
            .filter(|((c, _), data)| {
                c == collection && filters.iter().all(|filter| filter.matches(data))
            })
            .map(|((c, id), data)| DocumentRecord {
                collection: c.clone(),
                id: id.clone(),
                data: data.clone(),
            })
            .collect())
    }

    fn notify(&self, channel: &str, payload: &str) -> StorageResult<()> {
        let mut channels = self.channels.lock().map_err(|_| poisoned())?;
        if let Some(senders) = channels.get_mut(channel) {
            // Drop feeds whose receivers are gone.
            senders.retain(|sender| sender.send(payload.to_string()).is_ok());
        }
        Ok(())
    }

    fn listen(&self, channel: &str) -> StorageResult<NotificationFeed> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut channels = self.channels.lock().map_err(|_| poisoned())?;
        channels.entry(channel.to_string()).or_default().push(tx);
        Ok(rx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn p(s: &str) -> HierarchicalPath {
        HierarchicalPath::parse(s).unwrap()
    }

    fn leaf(path: &str, value: TypedValue) -> LeafRecord {
        LeafRecord::new(p(path), value)
    }

    #[test]
    fn put_replaces_on_path_conflict() {
        let engine = MemoryEngine::new();
        engine
            .put_leaves(vec![leaf("a.b", TypedValue::Int32(1))])
            .unwrap();
        engine
            .put_leaves(vec![leaf("a.b", TypedValue::Text("x".into()))])
            .unwrap();

        let found = engine.query_leaves(&PathPredicate::Equals(p("a.b"))).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].value, TypedValue::Text("x".into()));
    }

    #[test]
    fn query_is_structural_not_substring() {
        let engine = MemoryEngine::new();
        engine
            .put_leaves(vec![
                leaf("posts.1.title", TypedValue::Text("a".into())),
                leaf("posts.11.title", TypedValue::Text("b".into())),
            ])
            .unwrap();

        let found = engine
            .query_leaves(&PathPredicate::StartsWith(p("posts.1")))
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].path, p("posts.1.title"));
    }

    #[test]
    fn delete_returns_removed_records() {
        let engine = MemoryEngine::new();
        engine
            .put_leaves(vec![
                leaf("a.b", TypedValue::Int32(1)),
                leaf("a.c", TypedValue::Int32(2)),
                leaf("z", TypedValue::Int32(3)),
            ])
            .unwrap();

        let removed = engine
            .delete_leaves(&PathPredicate::StartsWith(p("a")))
            .unwrap();
        assert_eq!(removed.len(), 2);
        assert_eq!(engine.leaf_count(), 1);
    }

    #[test]
    fn documents_key_on_collection_and_id() {
        let engine = MemoryEngine::new();
        engine
            .put_document(&p("users"), "1", json!({"name": "ada"}))
            .unwrap();
        engine
            .put_document(&p("users"), "2", json!({"name": "bob"}))
            .unwrap();

        assert_eq!(
            engine.get_document(&p("users"), "1").unwrap(),
            Some(json!({"name": "ada"}))
        );
        assert_eq!(engine.list_documents(&p("users")).unwrap().len(), 2);
        assert!(engine.delete_document(&p("users"), "1").unwrap());
        assert!(!engine.delete_document(&p("users"), "1").unwrap());
    }

    #[test]
    fn collections_under_is_structural() {
        let engine = MemoryEngine::new();
        engine.put_document(&p("app.users"), "1", json!({})).unwrap();
        engine.put_document(&p("app.posts"), "1", json!({})).unwrap();
        engine.put_document(&p("apps"), "1", json!({})).unwrap();

        let found = engine.collections_under(&p("app")).unwrap();
        assert_eq!(found, vec![p("app.posts"), p("app.users")]);
    }

    #[tokio::test]
    async fn notify_reaches_listeners() {
        let engine = MemoryEngine::new();
        let mut feed = engine.listen("c1").unwrap();
        engine.notify("c1", "payload").unwrap();
        assert_eq!(feed.recv().await.as_deref(), Some("payload"));

        // Notifying a silent channel succeeds and drops the payload.
        engine.notify("nobody", "lost").unwrap();
    }
}
