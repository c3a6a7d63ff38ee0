//! # Connection Registry
//!
//! Tracks live realtime connections by opaque client id. The registry
//! exclusively owns the per-connection outboxes; no other component holds
//! transport handles.
//!
//! Broadcast takes a point-in-time snapshot of the sender list under the
//! read lock, then delivers after releasing it, so connect/disconnect
//! never contends with in-flight fan-out I/O. Delivery is best-effort:
//! a failing recipient is logged and skipped, never aborting the rest.

use std::collections::HashMap;

use tokio::sync::{mpsc, RwLock};

use super::errors::{RealtimeError, RealtimeResult};
use crate::observability::Logger;

/// Outbox sender for one connection; frames are pre-serialized text.
pub type FrameSender = mpsc::UnboundedSender<String>;

/// Concurrent-safe registry of live connections.
#[derive(Default)]
pub struct ConnectionRegistry {
    connections: RwLock<HashMap<String, FrameSender>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection. Replaces any stale entry under the same id.
    pub async fn add(&self, id: &str, sender: FrameSender) {
        let mut connections = self.connections.write().await;
        connections.insert(id.to_string(), sender);
    }

    /// Deregister a connection. Unknown ids are a no-op.
    pub async fn remove(&self, id: &str) {
        let mut connections = self.connections.write().await;
        connections.remove(id);
    }

    /// Number of live connections.
    pub async fn len(&self) -> usize {
        self.connections.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.connections.read().await.is_empty()
    }

    /// Registered client ids, unordered.
    pub async fn client_ids(&self) -> Vec<String> {
        self.connections.read().await.keys().cloned().collect()
    }

    /// Point-to-point send. Fails when the id is unknown.
    pub async fn send_to(&self, id: &str, frame: &str) -> RealtimeResult<()> {
        let connections = self.connections.read().await;
        let sender = connections
            .get(id)
            .ok_or_else(|| RealtimeError::ConnectionNotFound(id.to_string()))?;
        sender
            .send(frame.to_string())
            .map_err(|_| RealtimeError::ConnectionError(format!("outbox closed for {}", id)))
    }

    /// Multi-send. Unknown ids are silently skipped.
    pub async fn send_to_many(&self, ids: &[String], frame: &str) {
        let connections = self.connections.read().await;
        for id in ids {
            if let Some(sender) = connections.get(id) {
                if sender.send(frame.to_string()).is_err() {
                    Logger::warn("SEND_FAILED", &[("client_id", id)]);
                }
            }
        }
    }

    /// Deliver to every connection except the excluded ids.
    pub async fn broadcast(&self, frame: &str, exclude: &[&str]) {
        let recipients: Vec<(String, FrameSender)> = {
            let connections = self.connections.read().await;
            connections
                .iter()
                .filter(|(id, _)| !exclude.contains(&id.as_str()))
                .map(|(id, sender)| (id.clone(), sender.clone()))
                .collect()
        };

        for (id, sender) in recipients {
            if sender.send(frame.to_string()).is_err() {
                Logger::warn("BROADCAST_SEND_FAILED", &[("client_id", &id)]);
            }
        }
    }
}
