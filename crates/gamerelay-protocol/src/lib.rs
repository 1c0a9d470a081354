//! Shared vocabulary for gamerelay.
//!
//! This crate holds the plain data that crosses crate boundaries:
//!
//! - **Identifiers** ([`PlayerId`], [`GameId`], [`LobbyId`]): string
//!   newtypes, so a lobby id can't be passed where a game id is expected.
//! - **Routing** ([`DispatchMessage`]): the request the hub's routing
//!   loop consumes.
//! - **Boundary shapes** ([`CreateGameRequest`], [`CreateGameResponse`],
//!   [`ErrorResponse`]): what the outer layer exchanges with clients.
//! - **Events** ([`PublisherEvent`], [`GameEvent`]): what gets published
//!   to the broker when a game starts or ends.
//!
//! Game payloads themselves are opaque `Vec<u8>`; nothing here looks
//! inside them.

mod error;
mod events;
mod types;

pub use error::ProtocolError;
pub use events::{GameEvent, GameEventContent, PublisherEvent};
pub use types::{
    CreateGameRequest, CreateGameResponse, DispatchMessage, ErrorResponse,
    GameId, LobbyId, PlayerId,
};
