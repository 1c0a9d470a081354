//! The `GameLogic` trait, the extension point for game developers.
//!
//! The hub owns connections, mailboxes, and routing. Everything a
//! particular game means by a message lives behind this trait: decode the
//! raw bytes, update the game's state, and call
//! [`Hub::try_dispatch`](crate::Hub::try_dispatch) to send replies.

use gamerelay_transport::Connection;

use crate::{CallbackError, Game, Hub, Player};

/// The hooks a game implements.
///
/// Every hook runs synchronously on the task that triggered it: the
/// message hook runs on the sender's reader pump, so the next frame from
/// that player is not read until it returns. Keep hooks short and never
/// block in them.
///
/// Each hook is generic over the connection type so the same game logic
/// runs over WebSockets in production and in-memory connections in tests.
pub trait GameLogic: Send + Sync + Sized + 'static {
    /// State stored in every [`Game`]. The hub never looks inside it.
    type State: Send + 'static;

    /// Creates the state for a freshly created game.
    fn new_state(&self) -> Self::State;

    /// Handles one payload received from `player`.
    fn on_message_received<C: Connection>(
        &self,
        hub: &Hub<Self, C>,
        game: &Game<Self::State, C>,
        player: &Player<C>,
        message: &[u8],
    ) -> Result<(), CallbackError>;

    /// Called after `player` attached a new connection. Typical use:
    /// send them a snapshot of the current state. Default: no-op.
    fn on_player_joined<C: Connection>(
        &self,
        _hub: &Hub<Self, C>,
        _game: &Game<Self::State, C>,
        _player: &Player<C>,
    ) -> Result<(), CallbackError> {
        Ok(())
    }

    /// Called after `player`'s reader pump stopped and the player was
    /// kicked. Default: no-op.
    fn on_player_left<C: Connection>(
        &self,
        _hub: &Hub<Self, C>,
        _game: &Game<Self::State, C>,
        _player: &Player<C>,
    ) -> Result<(), CallbackError> {
        Ok(())
    }

    /// Called once a game has been registered and announced. Default:
    /// no-op.
    fn on_game_created<C: Connection>(
        &self,
        _hub: &Hub<Self, C>,
        _game: &Game<Self::State, C>,
    ) -> Result<(), CallbackError> {
        Ok(())
    }
}
