//! Events published to the message broker.
//!
//! The broker format is a two-level JSON document: an outer
//! [`PublisherEvent`] whose `content` field is itself a JSON *string*.
//! Consumers decode the outer envelope, switch on `type`, then decode
//! `content` with the matching shape.
//!
//! ```text
//! {"type":"GameCreated","content":"{\"gameId\":\"..\",\"lobbyId\":\"..\",\"gameSlug\":\"..\"}"}
//! ```

use serde::{Deserialize, Serialize};

use crate::{GameId, LobbyId, ProtocolError};

/// The outer envelope of every published event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublisherEvent {
    /// Event name, e.g. `"GameCreated"`.
    #[serde(rename = "type")]
    pub kind: String,
    /// The JSON-encoded event body.
    pub content: String,
}

/// Body shared by the game lifecycle events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameEventContent {
    pub game_id: GameId,
    pub lobby_id: LobbyId,
    pub game_slug: String,
}

/// Game lifecycle events the relay publishes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GameEvent {
    /// A game was created from a lobby and is ready for joins.
    Created(GameEventContent),
    /// A game finished and was removed from the hub.
    Ended(GameEventContent),
}

impl GameEvent {
    /// Builds a `GameCreated` event.
    pub fn created(
        game_id: GameId,
        lobby_id: LobbyId,
        game_slug: impl Into<String>,
    ) -> Self {
        Self::Created(GameEventContent {
            game_id,
            lobby_id,
            game_slug: game_slug.into(),
        })
    }

    /// Builds a `GameEnded` event.
    pub fn ended(
        game_id: GameId,
        lobby_id: LobbyId,
        game_slug: impl Into<String>,
    ) -> Self {
        Self::Ended(GameEventContent {
            game_id,
            lobby_id,
            game_slug: game_slug.into(),
        })
    }

    /// The value of the envelope's `type` field.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Created(_) => "GameCreated",
            Self::Ended(_) => "GameEnded",
        }
    }

    /// Serializes the event into the broker wire format.
    pub fn encode(&self) -> Result<String, ProtocolError> {
        let content = match self {
            Self::Created(c) | Self::Ended(c) => c,
        };
        let content =
            serde_json::to_string(content).map_err(ProtocolError::Encode)?;
        let event = PublisherEvent {
            kind: self.kind().to_string(),
            content,
        };
        serde_json::to_string(&event).map_err(ProtocolError::Encode)
    }

    /// Parses an event back from the broker wire format.
    pub fn decode(message: &str) -> Result<Self, ProtocolError> {
        let event: PublisherEvent =
            serde_json::from_str(message).map_err(ProtocolError::Decode)?;
        let content: GameEventContent = serde_json::from_str(&event.content)
            .map_err(ProtocolError::Decode)?;
        match event.kind.as_str() {
            "GameCreated" => Ok(Self::Created(content)),
            "GameEnded" => Ok(Self::Ended(content)),
            other => Err(ProtocolError::InvalidMessage(format!(
                "unknown event type {other}"
            ))),
        }
    }
}
