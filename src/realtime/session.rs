//! # Connection Session
//!
//! The per-connection protocol state machine:
//! `Connected -> Authenticated -> Closed`, with operations strictly ordered
//! as received. The session is deliberately free of socket I/O; it turns an
//! inbound frame into a [`SessionVerdict`] and the gateway performs the
//! actual sends, which keeps the protocol unit-testable.

use std::sync::Arc;

use super::message::{AuthPayload, CrudPayload, Envelope, OpCode};
use crate::auth::CredentialValidator;
use crate::codec;
use crate::path::HierarchicalPath;
use crate::store::PathStore;

/// How Get results leave the gateway.
///
/// The store's observed behavior is to broadcast Get results to every
/// connection (shared-cursor semantics); `Direct` switches to a point reply
/// to the requester only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GetResponseMode {
    #[default]
    Broadcast,
    Direct,
}

/// Who receives a broadcast frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BroadcastScope {
    /// Everyone but the originating connection
    ExcludeSelf,
    /// Every connection, originator included
    All,
}

/// Shared collaborators handed to every session.
pub struct SessionContext {
    pub path_store: Arc<PathStore>,
    pub validator: Arc<dyn CredentialValidator>,
    pub get_response: GetResponseMode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionState {
    Connected,
    Authenticated,
}

/// What the gateway should do after one inbound frame.
#[derive(Debug, Default)]
pub struct SessionVerdict {
    /// Frames for the originating connection, in order.
    pub replies: Vec<Envelope>,
    /// Optional fan-out frame.
    pub broadcast: Option<(Envelope, BroadcastScope)>,
    /// Terminate the connection after delivering the above.
    pub disconnect: bool,
}

impl SessionVerdict {
    fn reply(envelope: Envelope) -> Self {
        Self {
            replies: vec![envelope],
            ..Self::default()
        }
    }

    fn closing(envelope: Envelope) -> Self {
        Self {
            replies: vec![envelope],
            disconnect: true,
            ..Self::default()
        }
    }

    fn terminate() -> Self {
        Self {
            disconnect: true,
            ..Self::default()
        }
    }
}

/// One connection's protocol state.
pub struct Session {
    id: String,
    state: SessionState,
}

impl Session {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            state: SessionState::Connected,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn is_authenticated(&self) -> bool {
        self.state == SessionState::Authenticated
    }

    /// Process one inbound text frame.
    ///
    /// An undecodable envelope terminates the connection. Operations before
    /// a successful Auth are rejected without state change and without
    /// touching the store.
    pub async fn handle_text(&mut self, text: &str, ctx: &SessionContext) -> SessionVerdict {
        let envelope: Envelope = match serde_json::from_str(text) {
            Ok(envelope) => envelope,
            Err(_) => return SessionVerdict::terminate(),
        };

        match (self.state, envelope.op) {
            (_, OpCode::Auth) => self.handle_auth(envelope.data, ctx),
            (SessionState::Connected, op) => SessionVerdict::reply(Envelope::error(
                op,
                "unauthorized",
                "authenticate before issuing operations",
            )),
            (SessionState::Authenticated, OpCode::Insert) => {
                self.handle_insert(envelope.data, ctx).await
            }
            (SessionState::Authenticated, OpCode::Delete) => {
                self.handle_delete(envelope.data, ctx)
            }
            (SessionState::Authenticated, OpCode::Get) => self.handle_get(envelope.data, ctx),
            (SessionState::Authenticated, OpCode::Update) => SessionVerdict::reply(
                Envelope::error(OpCode::Update, "unimplemented", "update is reserved"),
            ),
        }
    }

    fn handle_auth(&mut self, data: serde_json::Value, ctx: &SessionContext) -> SessionVerdict {
        let payload: AuthPayload = match serde_json::from_value(data) {
            Ok(payload) => payload,
            Err(_) => return SessionVerdict::terminate(),
        };

        match ctx.validator.validate(&payload.token) {
            Ok(()) => {
                self.state = SessionState::Authenticated;
                SessionVerdict::reply(Envelope::auth_ack(true, &self.id))
            }
            // Unauthorized handshake is terminal for this connection.
            Err(_) => SessionVerdict::closing(Envelope::auth_ack(false, &self.id)),
        }
    }

    async fn handle_insert(
        &mut self,
        data: serde_json::Value,
        ctx: &SessionContext,
    ) -> SessionVerdict {
        let (payload, base) = match decode_crud(OpCode::Insert, data) {
            Ok(decoded) => decoded,
            Err(verdict) => return verdict,
        };

        match ctx.path_store.insert_document(&payload.data, &base).await {
            Ok(()) => {
                let accepted = Envelope::new(
                    OpCode::Insert,
                    serde_json::json!({ "path": payload.path, "data": payload.data }),
                );
                SessionVerdict {
                    replies: vec![Envelope::new(
                        OpCode::Insert,
                        serde_json::json!({ "success": true, "path": payload.path }),
                    )],
                    broadcast: Some((accepted, BroadcastScope::ExcludeSelf)),
                    disconnect: false,
                }
            }
            Err(err) => SessionVerdict::reply(Envelope::error(
                OpCode::Insert,
                "insert failed",
                &err.to_string(),
            )),
        }
    }

    fn handle_delete(&mut self, data: serde_json::Value, ctx: &SessionContext) -> SessionVerdict {
        let (payload, base) = match decode_crud(OpCode::Delete, data) {
            Ok(decoded) => decoded,
            Err(verdict) => return verdict,
        };

        match ctx.path_store.delete(&base) {
            Ok(removed) => {
                let deleted = codec::reconstruct(
                    removed
                        .into_iter()
                        .map(|record| (record.path, record.value.to_json())),
                    &base,
                );
                let body = serde_json::json!({ "path": payload.path, "data": deleted });
                SessionVerdict {
                    replies: vec![Envelope::new(
                        OpCode::Delete,
                        serde_json::json!({ "success": true, "path": payload.path }),
                    )],
                    broadcast: Some((
                        Envelope::new(OpCode::Delete, body),
                        BroadcastScope::ExcludeSelf,
                    )),
                    disconnect: false,
                }
            }
            // Broadcast on success only.
            Err(err) => SessionVerdict::reply(Envelope::error(
                OpCode::Delete,
                "delete failed",
                &err.to_string(),
            )),
        }
    }

    fn handle_get(&mut self, data: serde_json::Value, ctx: &SessionContext) -> SessionVerdict {
        let (payload, base) = match decode_crud(OpCode::Get, data) {
            Ok(decoded) => decoded,
            Err(verdict) => return verdict,
        };

        match ctx.path_store.get_subtree(&base) {
            Ok(document) => {
                let body = Envelope::new(
                    OpCode::Get,
                    serde_json::json!({ "path": payload.path, "data": document }),
                );
                match ctx.get_response {
                    GetResponseMode::Direct => SessionVerdict::reply(body),
                    GetResponseMode::Broadcast => SessionVerdict {
                        replies: Vec::new(),
                        broadcast: Some((body, BroadcastScope::All)),
                        disconnect: false,
                    },
                }
            }
            Err(err) => SessionVerdict::reply(Envelope::error(
                OpCode::Get,
                "get failed",
                &err.to_string(),
            )),
        }
    }
}

fn decode_crud(
    op: OpCode,
    data: serde_json::Value,
) -> Result<(CrudPayload, HierarchicalPath), SessionVerdict> {
    let payload: CrudPayload = serde_json::from_value(data).map_err(|err| {
        SessionVerdict::reply(Envelope::error(op, "bad payload", &err.to_string()))
    })?;
    let base = HierarchicalPath::parse(&payload.path).map_err(|err| {
        SessionVerdict::reply(Envelope::error(op, "bad path", &err.to_string()))
    })?;
    Ok((payload, base))
}
