//! # Realtime Module
//!
//! Change propagation over persistent connections.
//!
//! ## Architecture
//!
//! - **Registry**: live connection map, point send and broadcast fan-out
//! - **Bus**: channel-keyed rendezvous pub/sub bridging the engine's
//!   notification primitive to in-process waiters
//! - **Session**: per-connection protocol state machine, free of socket I/O
//! - **Gateway**: WebSocket transport composing the pieces

mod bus;
mod errors;
mod gateway;
mod message;
mod registry;
mod session;

pub use bus::NotificationBus;
pub use errors::{RealtimeError, RealtimeResult};
pub use gateway::{GatewayConfig, RealtimeGateway};
pub use message::{AuthPayload, CrudPayload, Envelope, ErrorBody, OpCode};
pub use registry::ConnectionRegistry;
pub use session::{BroadcastScope, GetResponseMode, Session, SessionContext, SessionVerdict};
