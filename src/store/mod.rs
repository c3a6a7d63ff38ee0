//! # Store Layer
//!
//! Two sibling stores over the backing engine:
//!
//! - [`PathStore`]: flattened leaves with subtree-consistent writes
//! - [`DocumentStore`]: whole JSON documents keyed by (collection, id)

mod doc_store;
mod errors;
mod path_store;

pub use doc_store::{merge_json, DocumentStore};
pub use errors::{StoreError, StoreResult};
pub use path_store::PathStore;
