//! Game orchestration for gamerelay.
//!
//! [`GameService`] ties a [`Hub`](gamerelay_hub::Hub) to the services
//! around it:
//!
//! - [`UserRepository`] turns join tickets into user ids
//! - [`LobbyRepository`] says who is in a lobby
//! - [`Publisher`] announces game lifecycle events
//!
//! Each seam has an in-memory implementation ([`StaticTickets`],
//! [`InMemoryLobbies`], [`TracingPublisher`]) for development and tests.

mod auth;
mod error;
mod lobby;
mod publisher;
mod service;

pub use auth::{StaticTickets, UnknownTicket, UserRepository};
pub use error::{BoxError, ServiceError};
pub use lobby::{InMemoryLobbies, Lobby, LobbyBot, LobbyPlayer, LobbyRepository};
pub use publisher::{Publisher, TracingPublisher};
pub use service::{GameService, seat_permutation};
