//! Lobby lookup.

use std::convert::Infallible;
use std::future::Future;

use dashmap::DashMap;
use gamerelay_protocol::{LobbyId, PlayerId};
use serde::{Deserialize, Serialize};

/// A human member of a lobby.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LobbyPlayer {
    pub id: PlayerId,
    pub username: String,
    pub avatar_id: u8,
}

/// A bot seat in a lobby. Bot ids are numeric; the game uses the decimal
/// rendering as the player id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LobbyBot {
    pub id: u64,
    pub username: String,
    pub avatar_id: u8,
}

impl LobbyBot {
    pub fn player_id(&self) -> PlayerId {
        PlayerId::new(self.id.to_string())
    }
}

/// A lobby as the lobby service describes it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lobby {
    pub id: LobbyId,
    #[serde(default)]
    pub players: Vec<LobbyPlayer>,
    #[serde(default)]
    pub bots: Vec<LobbyBot>,
}

impl Lobby {
    /// Total number of seats, humans and bots.
    pub fn seat_count(&self) -> usize {
        self.players.len() + self.bots.len()
    }
}

/// Looks lobbies up by id.
pub trait LobbyRepository: Send + Sync + 'static {
    type Error: std::error::Error + Send + Sync + 'static;

    /// `Ok(None)` means the lobby does not exist.
    fn find_by_id(
        &self,
        id: &LobbyId,
    ) -> impl Future<Output = Result<Option<Lobby>, Self::Error>> + Send;
}

/// Lobbies held in memory, for development and tests.
#[derive(Debug, Default)]
pub struct InMemoryLobbies {
    lobbies: DashMap<LobbyId, Lobby>,
}

impl InMemoryLobbies {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, lobby: Lobby) {
        self.lobbies.insert(lobby.id.clone(), lobby);
    }

    pub fn remove(&self, id: &LobbyId) -> Option<Lobby> {
        self.lobbies.remove(id).map(|(_, lobby)| lobby)
    }
}

impl FromIterator<Lobby> for InMemoryLobbies {
    fn from_iter<I: IntoIterator<Item = Lobby>>(iter: I) -> Self {
        let lobbies = Self::new();
        for lobby in iter {
            lobbies.insert(lobby);
        }
        lobbies
    }
}

impl LobbyRepository for InMemoryLobbies {
    type Error = Infallible;

    async fn find_by_id(&self, id: &LobbyId) -> Result<Option<Lobby>, Infallible> {
        Ok(self.lobbies.get(id).map(|entry| entry.value().clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lobby_decodes_camel_case_with_missing_bots() {
        let lobby: Lobby = serde_json::from_str(
            r#"{"id":"L1","players":[{"id":"u1","username":"ann","avatarId":4}]}"#,
        )
        .unwrap();
        assert_eq!(lobby.players[0].avatar_id, 4);
        assert!(lobby.bots.is_empty());
        assert_eq!(lobby.seat_count(), 1);
    }

    #[test]
    fn test_bot_player_id_is_decimal() {
        let bot = LobbyBot {
            id: 42,
            username: "robo".into(),
            avatar_id: 0,
        };
        assert_eq!(bot.player_id(), PlayerId::from("42"));
    }

    #[tokio::test]
    async fn test_in_memory_find_by_id() {
        let lobbies: InMemoryLobbies = [Lobby {
            id: LobbyId::from("L1"),
            players: vec![],
            bots: vec![],
        }]
        .into_iter()
        .collect();

        assert!(lobbies.find_by_id(&LobbyId::from("L1")).await.unwrap().is_some());
        assert!(lobbies.find_by_id(&LobbyId::from("L2")).await.unwrap().is_none());
    }
}
