//! # Notification Bus
//!
//! Channel-keyed publish/subscribe bridging the engine's named notify
//! primitive into blocking, in-process "wait for next payload" semantics.
//!
//! Delivery is a rendezvous: each channel has a single delivery slot that
//! buffers at most one undelivered payload, and at most one waiter is
//! served per publish. Publishing to a channel nobody has subscribed fails
//! with `ChannelNotFound`; there is no buffering before interest exists.
//!
//! The external listen call blocks on the engine, so each subscription
//! runs its bridge in its own spawned task; waiters never stall connection
//! handling.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;

use super::errors::{RealtimeError, RealtimeResult};
use crate::engine::StorageEngine;
use crate::observability::Logger;

struct ChannelSlot {
    tx: mpsc::Sender<String>,
    rx: Arc<Mutex<mpsc::Receiver<String>>>,
    forwarder: JoinHandle<()>,
}

impl Drop for ChannelSlot {
    fn drop(&mut self) {
        self.forwarder.abort();
    }
}

/// Per-channel rendezvous pub/sub over the engine's notification primitive.
pub struct NotificationBus {
    engine: Arc<dyn StorageEngine>,
    channels: StdMutex<HashMap<String, ChannelSlot>>,
}

impl NotificationBus {
    pub fn new(engine: Arc<dyn StorageEngine>) -> Self {
        Self {
            engine,
            channels: StdMutex::new(HashMap::new()),
        }
    }

    /// Register interest in a channel: create the delivery slot and spawn
    /// the bridge pulling from the engine's feed. Idempotent.
    pub fn subscribe(&self, channel: &str) -> RealtimeResult<()> {
        let mut channels = self.lock_channels()?;
        if channels.contains_key(channel) {
            return Ok(());
        }

        let mut feed = self.engine.listen(channel)?;
        let (tx, rx) = mpsc::channel(1);
        let slot_tx = tx.clone();
        let name = channel.to_string();
        let forwarder = tokio::spawn(async move {
            while let Some(payload) = feed.recv().await {
                if slot_tx.send(payload).await.is_err() {
                    break;
                }
            }
            Logger::debug("CHANNEL_FEED_CLOSED", &[("channel", &name)]);
        });

        channels.insert(
            channel.to_string(),
            ChannelSlot {
                tx,
                rx: Arc::new(Mutex::new(rx)),
                forwarder,
            },
        );
        Ok(())
    }

    /// Drop the channel's delivery slot and stop its bridge. Unknown
    /// channels are a no-op.
    pub fn unsubscribe(&self, channel: &str) -> RealtimeResult<()> {
        let mut channels = self.lock_channels()?;
        channels.remove(channel);
        Ok(())
    }

    /// Publish through the external bus. The payload comes back through the
    /// bridge on every subscribed process, this one included.
    pub fn notify(&self, channel: &str, payload: &str) -> RealtimeResult<()> {
        self.engine.notify(channel, payload)?;
        Ok(())
    }

    /// Deliver a payload to the channel's slot in-process.
    ///
    /// Fails with `ChannelNotFound` when no subscription exists. Blocks
    /// while a previous payload is still undelivered (rendezvous).
    pub async fn publish(&self, channel: &str, payload: &str) -> RealtimeResult<()> {
        let tx = {
            let channels = self.lock_channels()?;
            channels
                .get(channel)
                .map(|slot| slot.tx.clone())
                .ok_or_else(|| RealtimeError::ChannelNotFound(channel.to_string()))?
        };
        tx.send(payload.to_string())
            .await
            .map_err(|_| RealtimeError::ChannelClosed(channel.to_string()))
    }

    /// Block until the next payload arrives on the channel. At most one
    /// waiter is served per publish.
    pub async fn await_next(&self, channel: &str) -> RealtimeResult<String> {
        let rx = {
            let channels = self.lock_channels()?;
            channels
                .get(channel)
                .map(|slot| Arc::clone(&slot.rx))
                .ok_or_else(|| RealtimeError::ChannelNotFound(channel.to_string()))?
        };
        let mut rx = rx.lock().await;
        rx.recv()
            .await
            .ok_or_else(|| RealtimeError::ChannelClosed(channel.to_string()))
    }

    /// Bounded wait: like [`await_next`](Self::await_next) but abandons the
    /// wait after `timeout`, reclaiming the calling task.
    pub async fn await_next_timeout(
        &self,
        channel: &str,
        timeout: Duration,
    ) -> RealtimeResult<String> {
        match tokio::time::timeout(timeout, self.await_next(channel)).await {
            Ok(result) => result,
            Err(_) => Err(RealtimeError::WaitTimeout(channel.to_string())),
        }
    }

    fn lock_channels(
        &self,
    ) -> RealtimeResult<std::sync::MutexGuard<'_, HashMap<String, ChannelSlot>>> {
        self.channels
            .lock()
            .map_err(|_| RealtimeError::Internal("channel table lock poisoned".into()))
    }
}
