//! Identifiers, the routing request, and boundary request/response shapes.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ProtocolError;

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// Generates a string newtype id with the conversions every id needs.
///
/// Ids are strings because they come from outside: the user service hands
/// out player ids, the lobby service hands out lobby ids, and game ids
/// are generated here as 24-character hex strings.
macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord,
            Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            /// Creates an id from anything string-like.
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Borrows the id as a `&str`.
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Returns `true` for the empty id.
            pub fn is_empty(&self) -> bool {
                self.0.is_empty()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_string())
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }

        impl std::borrow::Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }
    };
}

string_id!(
    /// A player's identity. For humans this is the user id from the user
    /// service; for bots it is the bot's numeric id rendered as a string.
    PlayerId
);

string_id!(
    /// Identifies one running game (a session) inside a hub.
    GameId
);

string_id!(
    /// Identifies the lobby a game was created from.
    LobbyId
);

// ---------------------------------------------------------------------------
// DispatchMessage
// ---------------------------------------------------------------------------

/// A routing request consumed by the hub's routing loop.
///
/// `receiver_ids` is an ordered set: each receiver is offered `body` in the
/// order listed, and [`DispatchMessage::new`] drops repeated ids so nobody
/// gets the same payload twice from one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchMessage {
    /// The game whose players should receive the body.
    pub game_id: GameId,
    /// Who gets it, in delivery order.
    pub receiver_ids: Vec<PlayerId>,
    /// The opaque payload.
    pub body: Vec<u8>,
}

impl DispatchMessage {
    /// Builds a request, keeping the first occurrence of each receiver.
    pub fn new(
        game_id: GameId,
        receivers: impl IntoIterator<Item = PlayerId>,
        body: impl Into<Vec<u8>>,
    ) -> Self {
        let mut receiver_ids: Vec<PlayerId> = Vec::new();
        for id in receivers {
            if !receiver_ids.contains(&id) {
                receiver_ids.push(id);
            }
        }
        Self {
            game_id,
            receiver_ids,
            body: body.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Boundary shapes
// ---------------------------------------------------------------------------

/// Body of a "create game" request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CreateGameRequest {
    /// The lobby whose members become the game's players.
    pub lobby_id: LobbyId,
}

impl CreateGameRequest {
    /// Decodes and validates a request body.
    ///
    /// Unknown fields are rejected, as is an empty lobby id.
    pub fn from_json(data: &[u8]) -> Result<Self, ProtocolError> {
        let request: Self =
            serde_json::from_slice(data).map_err(ProtocolError::Decode)?;
        if request.lobby_id.is_empty() {
            return Err(ProtocolError::InvalidMessage(
                "lobbyId must not be empty".into(),
            ));
        }
        Ok(request)
    }
}

/// Result of a successful "create game".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateGameResponse {
    /// The id clients use to join.
    pub game_id: GameId,
}

/// Error body sent to a client, over HTTP or as the last WebSocket
/// payload before the server closes a failed join.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Human-readable reason.
    pub message: String,
}

impl ErrorResponse {
    /// Creates an error body.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Encodes the body as JSON bytes.
    pub fn encode(&self) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(self).map_err(ProtocolError::Encode)
    }
}
