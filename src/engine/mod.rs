//! # Backing Engine Contract
//!
//! The store layers sit on top of an engine that can persist typed leaf
//! records keyed by hierarchical path, run structural path queries, store
//! whole JSON documents keyed by (collection, id), and expose a named
//! notification primitive. This module specifies that contract and ships
//! an in-memory reference engine; a persistent engine is deliberately out
//! of scope.

mod errors;
mod memory;

pub use errors::{StorageError, StorageResult};
pub use memory::MemoryEngine;

use serde_json::Value;
use tokio::sync::mpsc;

use crate::path::{HierarchicalPath, PathPredicate};
use crate::value::TypedValue;

/// A single leaf: one path, one typed value. Primary key = path.
#[derive(Debug, Clone, PartialEq)]
pub struct LeafRecord {
    pub path: HierarchicalPath,
    pub value: TypedValue,
}

impl LeafRecord {
    pub fn new(path: HierarchicalPath, value: TypedValue) -> Self {
        Self { path, value }
    }
}

/// A whole-document record. Unique key = (collection, id).
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentRecord {
    pub collection: HierarchicalPath,
    pub id: String,
    pub data: Value,
}

/// A field-level test applied to documents during search.
///
/// `json_path` addresses a field inside the document (dot-separated keys).
/// When the addressed field is an array, the pattern matches if any element
/// matches.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldFilter {
    pub json_path: String,
    pub pattern: FieldPattern,
}

/// Pattern kinds for field filtering. `Contains` supports `*` wildcards.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldPattern {
    Contains(String),
    Equals(String),
    NotEquals(String),
    StartsWith(String),
    EndsWith(String),
    StartsAndEndsWith(String, String),
}

impl FieldFilter {
    pub fn new(json_path: impl Into<String>, pattern: FieldPattern) -> Self {
        Self {
            json_path: json_path.into(),
            pattern,
        }
    }

    /// Apply the filter to a document.
    pub fn matches(&self, document: &Value) -> bool {
        let field = match lookup(document, &self.json_path) {
            Some(v) => v,
            None => return matches!(self.pattern, FieldPattern::NotEquals(_)),
        };
        match field {
            Value::Array(items) => items.iter().any(|item| self.pattern.matches(item)),
            other => self.pattern.matches(other),
        }
    }
}

impl FieldPattern {
    fn matches(&self, value: &Value) -> bool {
        let text = stringify(value);
        match self {
            Self::Contains(pattern) => wildcard_regex(pattern)
                .map(|re| re.is_match(&text))
                .unwrap_or(false),
            Self::Equals(expected) => text == *expected,
            Self::NotEquals(expected) => text != *expected,
            Self::StartsWith(prefix) => text.starts_with(prefix),
            Self::EndsWith(suffix) => text.ends_with(suffix),
            Self::StartsAndEndsWith(prefix, suffix) => {
                text.len() >= prefix.len() + suffix.len()
                    && text.starts_with(prefix)
                    && text.ends_with(suffix)
            }
        }
    }
}

fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Translates a `*`-wildcard pattern into an anchored-nowhere regex.
fn wildcard_regex(pattern: &str) -> Option<regex::Regex> {
    let translated: Vec<String> = pattern.split('*').map(|part| regex::escape(part)).collect();
    regex::Regex::new(&translated.join(".*")).ok()
}

/// Walks a dot-separated field path inside a document.
fn lookup<'a>(document: &'a Value, json_path: &str) -> Option<&'a Value> {
    let mut current = document;
    for key in json_path.split('.') {
        current = match current {
            Value::Object(map) => map.get(key)?,
            Value::Array(items) => items.get(key.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Stream of payloads arriving on a named notification channel.
pub type NotificationFeed = mpsc::UnboundedReceiver<String>;

/// The backing engine contract.
///
/// Leaf upserts are create-or-replace on the path key. Queries and deletes
/// are structural (segment-aware), never raw substring matches. Document
/// storage is keyed by (collection, id) with whole-document replacement.
/// `notify`/`listen` form a named publish/subscribe primitive; notifying a
/// channel nobody listens on succeeds and drops the payload, mirroring how
/// an external bus behaves.
pub trait StorageEngine: Send + Sync {
    fn put_leaves(&self, records: Vec<LeafRecord>) -> StorageResult<()>;
    fn query_leaves(&self, predicate: &PathPredicate) -> StorageResult<Vec<LeafRecord>>;
    fn delete_leaves(&self, predicate: &PathPredicate) -> StorageResult<Vec<LeafRecord>>;

    fn get_document(
        &self,
        collection: &HierarchicalPath,
        id: &str,
    ) -> StorageResult<Option<Value>>;
    fn put_document(
        &self,
        collection: &HierarchicalPath,
        id: &str,
        data: Value,
    ) -> StorageResult<()>;
    fn delete_document(&self, collection: &HierarchicalPath, id: &str) -> StorageResult<bool>;
    fn list_documents(&self, collection: &HierarchicalPath) -> StorageResult<Vec<DocumentRecord>>;
    fn collections_under(
        &self,
        prefix: &HierarchicalPath,
    ) -> StorageResult<Vec<HierarchicalPath>>;
    fn search_documents(
        &self,
        collection: &HierarchicalPath,
        filters: &[FieldFilter],
    ) -> StorageResult<Vec<DocumentRecord>>;

    fn notify(&self, channel: &str, payload: &str) -> StorageResult<()>;
    fn listen(&self, channel: &str) -> StorageResult<NotificationFeed>;
}
