//! Store-level invariants: flatten/reconstruct round trips, subtree
//! replacement, and structural prefix queries.

use std::sync::Arc;

use serde_json::json;

use arbordb::engine::{LeafRecord, MemoryEngine};
use arbordb::store::{merge_json, DocumentStore, PathStore};
use arbordb::value::TypedValue;
use arbordb::{codec, HierarchicalPath, PathPredicate};

fn p(s: &str) -> HierarchicalPath {
    HierarchicalPath::parse(s).unwrap()
}

fn path_store() -> PathStore {
    PathStore::new(Arc::new(MemoryEngine::new()))
}

#[test]
fn flatten_reconstruct_round_trip_for_scalar_leaf_documents() {
    let document = json!({
        "posts": {
            "1": {"title": "hi", "views": 3, "live": true},
            "2": {"title": "second"},
        },
        "owner": "ada",
    });
    let leaves = codec::flatten(&document, &HierarchicalPath::root());
    assert_eq!(
        codec::reconstruct(leaves, &HierarchicalPath::root()),
        document
    );
}

#[tokio::test]
async fn writing_a_parent_path_evicts_the_descendant_subtree() {
    let store = path_store();
    store
        .upsert(vec![LeafRecord::new(p("a.b"), TypedValue::Int32(5))])
        .await
        .unwrap();
    store
        .upsert(vec![LeafRecord::new(p("a"), TypedValue::Text("x".into()))])
        .await
        .unwrap();

    let records = store.query(&PathPredicate::StartsWith(p("a"))).unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].path, p("a"));
    assert_eq!(records[0].value, TypedValue::Text("x".into()));
}

#[tokio::test]
async fn prefix_queries_never_leak_sibling_subtrees() {
    let store = path_store();
    store
        .upsert(vec![
            LeafRecord::new(p("posts.1.title"), TypedValue::Text("a".into())),
            LeafRecord::new(p("posts.1.body"), TypedValue::Text("b".into())),
            LeafRecord::new(p("posts.2.title"), TypedValue::Text("c".into())),
        ])
        .await
        .unwrap();

    let records = store
        .query(&PathPredicate::StartsWith(p("posts.1")))
        .unwrap();
    let mut paths: Vec<String> = records.iter().map(|r| r.path.to_string()).collect();
    paths.sort();
    assert_eq!(paths, vec!["posts.1.body", "posts.1.title"]);
}

#[tokio::test]
async fn end_to_end_flatten_store_and_read_back() {
    let store = path_store();
    let document = json!({"posts": {"1": {"title": "hi", "tags": ["a", "b"]}}});

    // Scalar array elements flatten to indexed leaves only.
    let raw = codec::flatten(&document, &HierarchicalPath::root());
    let mut raw_paths: Vec<String> = raw.iter().map(|(path, _)| path.to_string()).collect();
    raw_paths.sort();
    assert_eq!(
        raw_paths,
        vec!["posts.1.tags[0]", "posts.1.tags[1]", "posts.1.title"]
    );

    store
        .insert_document(&document, &HierarchicalPath::root())
        .await
        .unwrap();
    assert_eq!(
        store.get_subtree(&p("posts.1")).unwrap(),
        json!({"title": "hi", "tags": ["a", "b"]})
    );
}

#[tokio::test]
async fn empty_prefix_delete_drains_the_namespace() {
    let store = path_store();
    store
        .insert_document(
            &json!({"a": {"x": 1}, "b": {"y": 2}}),
            &HierarchicalPath::root(),
        )
        .await
        .unwrap();

    let removed = store.delete(&HierarchicalPath::root()).unwrap();
    assert_eq!(removed.len(), 2);
    assert_eq!(
        store.get_subtree(&HierarchicalPath::root()).unwrap(),
        json!({})
    );
}

#[test]
fn document_upsert_is_whole_replacement_and_merge_is_explicit() {
    let store = DocumentStore::new(Arc::new(MemoryEngine::new()));
    store
        .upsert(&p("users"), "1", json!({"name": "ada", "age": 36}))
        .unwrap();

    // Whole-document replace loses fields not present in the new document.
    store.upsert(&p("users"), "1", json!({"name": "ada"})).unwrap();
    assert_eq!(store.get(&p("users"), "1").unwrap(), json!({"name": "ada"}));

    // Merge semantics require an explicit merge before the upsert.
    let mut merged = store.get(&p("users"), "1").unwrap();
    merge_json(&mut merged, &json!({"age": 37}));
    store.upsert(&p("users"), "1", merged).unwrap();
    assert_eq!(
        store.get(&p("users"), "1").unwrap(),
        json!({"name": "ada", "age": 37})
    );
}
