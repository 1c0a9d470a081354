//! Game registry and message routing for gamerelay.
//!
//! A [`Hub`] holds the running [`Game`]s of one game type. Each game owns
//! its [`Player`]s, and each connected player has a writer pump draining
//! its mailbox and a reader pump feeding the game's [`GameLogic`].
//!
//! # Key types
//!
//! - [`GameLogic`]: the trait game developers implement
//! - [`Hub`] / [`RoutingLoop`]: registry plus the single routing task
//! - [`Game`]: one session's metadata, state, and players
//! - [`Player`]: per-player connection state machine
//! - [`Reader`]: the reader pump, returned by [`start_pumps`]
//! - [`HubConfig`]: queue sizes and the overflow policy

mod config;
mod error;
mod game;
mod hub;
mod logic;
mod player;
mod pump;

pub use config::{
    DEFAULT_DISPATCH_BUFFER_SIZE, DEFAULT_MAILBOX_CAPACITY, HubConfig,
    OverflowPolicy,
};
pub use error::{CallbackError, HubError};
pub use game::{Game, GameInfo, GameStatus};
pub use hub::{Hub, RoutingLoop};
pub use logic::GameLogic;
pub use player::{Attachment, Delivery, Player, PlayerProfile, PlayerStatus};
pub use pump::{Reader, start_pumps};
