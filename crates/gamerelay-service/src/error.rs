//! Error types for game orchestration.

use gamerelay_hub::CallbackError;
use gamerelay_protocol::{GameId, LobbyId, PlayerId, ProtocolError};

/// A boxed collaborator error.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors returned by [`GameService`](crate::GameService).
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// The join ticket could not be resolved to a user.
    #[error("ticket is not valid")]
    InvalidTicket,

    #[error("game {0} not found")]
    GameNotFound(GameId),

    /// The user is not a member of the game. Players are only created
    /// when the game is, never at join time.
    #[error("player {0} not found")]
    PlayerNotFound(PlayerId),

    #[error("lobby {0} not found")]
    LobbyNotFound(LobbyId),

    /// Two lobby members map to the same player id.
    #[error("lobby lists player {0} more than once")]
    DuplicatePlayer(PlayerId),

    /// The lobby service failed.
    #[error("lobby lookup failed: {0}")]
    Lobby(#[source] BoxError),

    /// The event could not be published.
    #[error("publish failed: {0}")]
    Publish(#[source] BoxError),

    /// A game logic hook rejected the operation.
    #[error("game logic error: {0}")]
    Callback(#[from] CallbackError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

impl ServiceError {
    /// `true` for the errors caused by a bad request rather than a fault on
    /// our side.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidTicket
                | Self::GameNotFound(_)
                | Self::PlayerNotFound(_)
                | Self::LobbyNotFound(_)
        )
    }
}
