//! # Server Configuration
//!
//! CLI surface for the gateway. Startup stays thin: parse arguments,
//! assemble the engine, validator, and gateway, then serve.

use std::sync::Arc;

use clap::Parser;

use crate::auth::{self, CredentialValidator, JwtValidator, SharedSecretValidator};
use crate::engine::MemoryEngine;
use crate::observability::Logger;
use crate::realtime::{GatewayConfig, GetResponseMode, RealtimeGateway, RealtimeResult};

/// Run the realtime gateway.
#[derive(Debug, Parser)]
#[command(name = "arbordb", about = "A path-addressed, realtime document store")]
pub struct ServeArgs {
    /// WebSocket bind address
    #[arg(long, default_value = "0.0.0.0:4100")]
    pub bind: String,

    /// Shared secret (or JWT signing key when --jwt-issuer is set).
    /// Generated and logged when omitted.
    #[arg(long)]
    pub secret: Option<String>,

    /// Validate credentials as HS256 JWTs from this issuer instead of a
    /// shared-secret compare
    #[arg(long)]
    pub jwt_issuer: Option<String>,

    /// Reply Get results to the requester only instead of broadcasting
    #[arg(long, default_value_t = false)]
    pub direct_get: bool,

    /// Serialize writes to overlapping subtrees
    #[arg(long, default_value_t = false)]
    pub serialize_writes: bool,
}

impl ServeArgs {
    /// Assemble a gateway over the in-memory reference engine.
    pub fn build_gateway(&self) -> RealtimeGateway {
        let secret = match &self.secret {
            Some(secret) => secret.clone(),
            None => {
                let generated = auth::generate_secret();
                Logger::warn("SECRET_GENERATED", &[("secret", &generated)]);
                generated
            }
        };

        let validator: Arc<dyn CredentialValidator> = match &self.jwt_issuer {
            Some(issuer) => Arc::new(JwtValidator::new(&secret, issuer)),
            None => Arc::new(SharedSecretValidator::new(secret)),
        };

        let config = GatewayConfig {
            bind_addr: self.bind.clone(),
            get_response: if self.direct_get {
                GetResponseMode::Direct
            } else {
                GetResponseMode::Broadcast
            },
            serialize_writes: self.serialize_writes,
        };

        RealtimeGateway::new(Arc::new(MemoryEngine::new()), validator, config)
    }
}

/// Parse-free entry used by `main`: build and serve until shutdown.
pub async fn run(args: ServeArgs) -> RealtimeResult<()> {
    args.build_gateway().run().await
}
