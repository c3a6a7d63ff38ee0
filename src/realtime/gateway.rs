//! # Realtime Gateway
//!
//! WebSocket transport composing the registry, stores, bus, and session
//! state machine. One spawned task per connection; operations within a
//! connection are strictly ordered, and a failing connection only ever
//! takes itself down.

use std::net::SocketAddr;
use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc};
use tokio_tungstenite::{accept_async, tungstenite::Message};
use uuid::Uuid;

use super::bus::NotificationBus;
use super::errors::{RealtimeError, RealtimeResult};
use super::registry::ConnectionRegistry;
use super::session::{BroadcastScope, GetResponseMode, Session, SessionContext};
use crate::auth::CredentialValidator;
use crate::engine::StorageEngine;
use crate::observability::Logger;
use crate::store::{DocumentStore, PathStore};

/// Gateway configuration.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Bind address for the WebSocket listener
    pub bind_addr: String,
    /// How Get results are delivered
    pub get_response: GetResponseMode,
    /// Serialize writes to overlapping subtrees
    pub serialize_writes: bool,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:4100".to_string(),
            get_response: GetResponseMode::default(),
            serialize_writes: false,
        }
    }
}

/// The message-driven realtime protocol server.
pub struct RealtimeGateway {
    config: GatewayConfig,
    registry: Arc<ConnectionRegistry>,
    documents: Arc<DocumentStore>,
    bus: Arc<NotificationBus>,
    session_ctx: Arc<SessionContext>,
    shutdown_tx: broadcast::Sender<()>,
}

impl RealtimeGateway {
    pub fn new(
        engine: Arc<dyn StorageEngine>,
        validator: Arc<dyn CredentialValidator>,
        config: GatewayConfig,
    ) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        let path_store = Arc::new(
            PathStore::new(Arc::clone(&engine)).with_serialized_writes(config.serialize_writes),
        );
        let session_ctx = Arc::new(SessionContext {
            path_store,
            validator,
            get_response: config.get_response,
        });

        Self {
            config,
            registry: Arc::new(ConnectionRegistry::new()),
            documents: Arc::new(DocumentStore::new(Arc::clone(&engine))),
            bus: Arc::new(NotificationBus::new(engine)),
            session_ctx,
            shutdown_tx,
        }
    }

    /// The live connection registry.
    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    /// The path store the gateway writes through.
    pub fn path_store(&self) -> &Arc<PathStore> {
        &self.session_ctx.path_store
    }

    /// The sibling whole-document store.
    pub fn documents(&self) -> &Arc<DocumentStore> {
        &self.documents
    }

    /// The channel-keyed notification bus.
    pub fn bus(&self) -> &Arc<NotificationBus> {
        &self.bus
    }

    /// Signal every connection task and the accept loop to stop.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }

    /// Bind the configured address and serve until shutdown.
    pub async fn run(&self) -> RealtimeResult<()> {
        let addr: SocketAddr = self
            .config
            .bind_addr
            .parse()
            .map_err(|e| RealtimeError::Config(format!("invalid bind address: {}", e)))?;
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| RealtimeError::Config(format!("failed to bind {}: {}", addr, e)))?;
        self.serve(listener).await
    }

    /// Serve connections from an already-bound listener.
    pub async fn serve(&self, listener: TcpListener) -> RealtimeResult<()> {
        if let Ok(addr) = listener.local_addr() {
            Logger::info("GATEWAY_LISTENING", &[("addr", &addr.to_string())]);
        }

        let mut shutdown_rx = self.shutdown_tx.subscribe();
        loop {
            tokio::select! {
                accepted = listener.accept() => {
                    match accepted {
                        Ok((stream, peer_addr)) => {
                            let registry = Arc::clone(&self.registry);
                            let ctx = Arc::clone(&self.session_ctx);
                            let shutdown_rx = self.shutdown_tx.subscribe();
                            tokio::spawn(async move {
                                if let Err(e) = handle_connection(
                                    stream, peer_addr, registry, ctx, shutdown_rx,
                                )
                                .await
                                {
                                    Logger::error(
                                        "CONN_FAILED",
                                        &[
                                            ("peer", &peer_addr.to_string()),
                                            ("reason", &e.to_string()),
                                        ],
                                    );
                                }
                            });
                        }
                        Err(e) => {
                            Logger::error("ACCEPT_FAILED", &[("reason", &e.to_string())]);
                        }
                    }
                }

                _ = shutdown_rx.recv() => {
                    Logger::info("GATEWAY_SHUTDOWN", &[]);
                    break;
                }
            }
        }
        Ok(())
    }
}

async fn handle_connection(
    stream: TcpStream,
    peer_addr: SocketAddr,
    registry: Arc<ConnectionRegistry>,
    ctx: Arc<SessionContext>,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> RealtimeResult<()> {
    let ws_stream = accept_async(stream)
        .await
        .map_err(|e| RealtimeError::ConnectionError(format!("handshake failed: {}", e)))?;
    let (mut ws_sender, mut ws_receiver) = ws_stream.split();

    let connection_id = Uuid::new_v4().to_string();
    let (outbox, mut inbox) = mpsc::unbounded_channel::<String>();
    registry.add(&connection_id, outbox.clone()).await;
    Logger::info(
        "CONN_OPEN",
        &[
            ("client_id", &connection_id),
            ("peer", &peer_addr.to_string()),
        ],
    );

    let mut session = Session::new(connection_id.clone());

    loop {
        tokio::select! {
            inbound = ws_receiver.next() => {
                match inbound {
                    Some(Ok(Message::Text(text))) => {
                        let verdict = session.handle_text(&text, &ctx).await;
                        for reply in verdict.replies {
                            if let Some(frame) = reply.to_text() {
                                let _ = outbox.send(frame);
                            }
                        }
                        if let Some((envelope, scope)) = verdict.broadcast {
                            if let Some(frame) = envelope.to_text() {
                                match scope {
                                    BroadcastScope::ExcludeSelf => {
                                        registry.broadcast(&frame, &[session.id()]).await;
                                    }
                                    BroadcastScope::All => {
                                        registry.broadcast(&frame, &[]).await;
                                    }
                                }
                            }
                        }
                        if verdict.disconnect {
                            // Flush anything already queued before closing.
                            while let Ok(frame) = inbox.try_recv() {
                                let _ = ws_sender.send(Message::Text(frame)).await;
                            }
                            break;
                        }
                    }
                    // The protocol is JSON text; anything else is malformed
                    // input and terminates the connection.
                    Some(Ok(Message::Binary(_))) => break,
                    Some(Ok(Message::Ping(data))) => {
                        if ws_sender.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        Logger::warn(
                            "CONN_RECV_ERROR",
                            &[("client_id", &connection_id), ("reason", &e.to_string())],
                        );
                        break;
                    }
                    _ => {}
                }
            }

            Some(frame) = inbox.recv() => {
                if ws_sender.send(Message::Text(frame)).await.is_err() {
                    break;
                }
            }

            _ = shutdown_rx.recv() => break,
        }
    }

    registry.remove(&connection_id).await;
    Logger::info("CONN_CLOSED", &[("client_id", &connection_id)]);
    Ok(())
}
