//! # Path Codec
//!
//! Converts between nested JSON documents and flat (path, value) leaf
//! pairs. Pure data transformation, no I/O.
//!
//! Flattening emits a leaf for every terminal (non-object) value. Object
//! nodes never get a leaf of their own. Sequence elements always get an
//! indexed leaf at `base[i]`; composite elements (objects or sequences)
//! are additionally recursed into, so both the element's own entry and its
//! descendants are emitted.
//!
//! Reconstruction is last-seen-wins on colliding keys: callers are expected
//! to hand in conflict-free leaf sets (the store's replace-on-write protocol
//! guarantees this for stored data).

use serde_json::{Map, Value};

use crate::path::{index_parts, HierarchicalPath};

/// Flatten a nested document into (path, raw value) leaf pairs under `base`.
pub fn flatten(document: &Value, base: &HierarchicalPath) -> Vec<(HierarchicalPath, Value)> {
    let mut leaves = Vec::new();
    walk(document, base, &mut leaves);
    leaves
}

fn walk(value: &Value, path: &HierarchicalPath, out: &mut Vec<(HierarchicalPath, Value)>) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                let child_path = path.child(key);
                match child {
                    Value::Object(_) | Value::Array(_) => walk(child, &child_path, out),
                    _ => out.push((child_path, child.clone())),
                }
            }
        }
        Value::Array(items) => {
            for (i, element) in items.iter().enumerate() {
                let element_path = path.with_index(i);
                out.push((element_path.clone(), element.clone()));
                if element.is_object() || element.is_array() {
                    walk(element, &element_path, out);
                }
            }
        }
        // A bare scalar has no key to hang a leaf on.
        _ => {}
    }
}

/// Rebuild a nested document from leaf pairs, relative to `base`.
///
/// Leaves not prefixed by `base` are skipped, so a non-matching base yields
/// an empty document. The empty base reconstructs the whole namespace.
/// Indexed segments (`tags[0]`) rebuild JSON arrays; index gaps fill with
/// `null`.
pub fn reconstruct<I>(leaves: I, base: &HierarchicalPath) -> Value
where
    I: IntoIterator<Item = (HierarchicalPath, Value)>,
{
    let mut root = Value::Object(Map::new());
    for (path, value) in leaves {
        let relative = match path.strip_prefix(base) {
            Some(r) if !r.is_empty() => r,
            // A leaf exactly at the base has no key inside the subtree.
            _ => continue,
        };
        insert_at(&mut root, relative.segments(), value);
    }
    root
}

fn insert_at(node: &mut Value, segments: &[String], value: Value) {
    let (segment, rest) = match segments.split_first() {
        Some(split) => split,
        None => return,
    };

    if !node.is_object() {
        *node = Value::Object(Map::new());
    }
    let map = match node.as_object_mut() {
        Some(m) => m,
        None => return,
    };

    match index_parts(segment) {
        Some((name, index)) if !name.is_empty() => {
            let slot = map
                .entry(name.to_string())
                .or_insert_with(|| Value::Array(Vec::new()));
            if !slot.is_array() {
                *slot = Value::Array(Vec::new());
            }
            if let Some(array) = slot.as_array_mut() {
                while array.len() <= index {
                    array.push(Value::Null);
                }
                if rest.is_empty() {
                    array[index] = value;
                } else {
                    insert_at(&mut array[index], rest, value);
                }
            }
        }
        _ => {
            if rest.is_empty() {
                map.insert(segment.clone(), value);
            } else {
                let child = map
                    .entry(segment.clone())
                    .or_insert_with(|| Value::Object(Map::new()));
                insert_at(child, rest, value);
            }
        }
    }
}
