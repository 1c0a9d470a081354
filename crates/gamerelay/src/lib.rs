//! # gamerelay
//!
//! Real-time message relay for multiplayer game sessions.
//!
//! Clients connect over WebSockets to a game that was created from a
//! lobby. Game developers implement a single [`GameLogic`] trait; the relay
//! handles connections, reconnects, routing, and shutdown.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use gamerelay::prelude::*;
//!
//! // Implement GameLogic for your game, then:
//! // let token = CancellationToken::new();
//! // let (hub, _routing) = Hub::spawn("my-game", HubConfig::default(), MyGame, token);
//! // let service = Arc::new(GameService::new(hub, tickets, lobbies, TracingPublisher));
//! // let server = RelayServerBuilder::new()
//! //     .bind("0.0.0.0:8080")
//! //     .build(service)
//! //     .await?;
//! // server.run().await
//! ```

mod config;
mod error;
mod handler;
mod server;

pub use config::{RelayConfig, ServerConfig};
pub use error::RelayError;
pub use handler::{JoinRequest, JoinUriError, TICKET_PARAM};
pub use server::{RelayServer, RelayServerBuilder, RelayService};

pub use gamerelay_hub::GameLogic;

/// Installs a `tracing` subscriber that honours `RUST_LOG`, falling back
/// to `info`. Meant for binaries; calling it twice is harmless.
pub fn init_tracing() {
    init_tracing_with("info");
}

/// Like [`init_tracing`], with a custom fallback filter.
pub fn init_tracing_with(default_filter: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

/// Everything needed to stand up a relay.
pub mod prelude {
    pub use std::sync::Arc;

    pub use gamerelay_hub::{
        CallbackError, Game, GameInfo, GameLogic, GameStatus, Hub, HubConfig,
        HubError, OverflowPolicy, Player, PlayerStatus, Reader,
    };
    pub use gamerelay_protocol::{
        CreateGameRequest, CreateGameResponse, DispatchMessage, ErrorResponse,
        GameEvent, GameId, LobbyId, PlayerId,
    };
    pub use gamerelay_service::{
        GameService, InMemoryLobbies, Lobby, LobbyBot, LobbyPlayer,
        LobbyRepository, Publisher, ServiceError, StaticTickets,
        TracingPublisher, UserRepository,
    };
    pub use gamerelay_transport::{
        Connection, MemoryConnection, MemoryPeer, WebSocketConnection,
    };
    pub use tokio_util::sync::CancellationToken;

    pub use crate::{
        RelayConfig, RelayError, RelayServer, RelayServerBuilder, ServerConfig,
        init_tracing,
    };
}
