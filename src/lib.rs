//! arbordb - a path-addressed, realtime document store
//!
//! Nested documents are flattened into individually addressable leaf
//! paths; any subtree can be read back in nested form; changes fan out to
//! subscribed realtime connections and to a channel-keyed notification bus.

pub mod auth;
pub mod codec;
pub mod config;
pub mod engine;
pub mod observability;
pub mod path;
pub mod realtime;
pub mod store;
pub mod value;

pub use engine::{LeafRecord, MemoryEngine, StorageEngine};
pub use path::{HierarchicalPath, PathPredicate};
pub use realtime::{NotificationBus, RealtimeGateway};
pub use store::{DocumentStore, PathStore};
pub use value::TypedValue;
