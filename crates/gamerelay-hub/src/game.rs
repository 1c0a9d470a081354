//! A single game session: metadata, opaque state, and its players.

use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use gamerelay_protocol::{GameId, LobbyId, PlayerId};
use gamerelay_transport::Connection;
use parking_lot::{Mutex, MutexGuard};
use serde::{Deserialize, Serialize};

use crate::Player;

/// Lifecycle status of a game. Games start out pending; moving them on is
/// the game logic's business.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameStatus {
    #[default]
    Pending,
}

impl fmt::Display for GameStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => f.write_str("pending"),
        }
    }
}

/// Immutable facts about a game, fixed at creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameInfo {
    pub id: GameId,
    pub status: GameStatus,
    pub creator_id: PlayerId,
    /// Unix seconds.
    pub created_at: i64,
    pub lobby_id: LobbyId,
}

/// One running game.
///
/// The player set is filled in while the game is being built and is
/// not meant to change afterwards; joins reconnect existing players.
pub struct Game<S, C: Connection> {
    info: GameInfo,
    state: Mutex<S>,
    players: DashMap<PlayerId, Arc<Player<C>>>,
}

impl<S, C: Connection> Game<S, C> {
    pub fn new(info: GameInfo, state: S) -> Self {
        Self {
            info,
            state: Mutex::new(state),
            players: DashMap::new(),
        }
    }

    pub fn id(&self) -> &GameId {
        &self.info.id
    }

    pub fn info(&self) -> &GameInfo {
        &self.info
    }

    pub fn status(&self) -> GameStatus {
        self.info.status
    }

    pub fn creator_id(&self) -> &PlayerId {
        &self.info.creator_id
    }

    pub fn created_at(&self) -> i64 {
        self.info.created_at
    }

    pub fn lobby_id(&self) -> &LobbyId {
        &self.info.lobby_id
    }

    /// Locks the game state.
    ///
    /// Hooks for one game can run on several reader pumps at once, so the
    /// state is behind a lock. Do not hold the guard across an `.await`.
    pub fn state(&self) -> MutexGuard<'_, S> {
        self.state.lock()
    }

    /// Looks up a player by id.
    pub fn player(&self, id: &PlayerId) -> Option<Arc<Player<C>>> {
        self.players.get(id).map(|entry| Arc::clone(entry.value()))
    }

    /// Registers a player. Replaces any player with the same id.
    pub fn insert_player(&self, player: Player<C>) -> Arc<Player<C>> {
        let player = Arc::new(player);
        self.players
            .insert(player.id().clone(), Arc::clone(&player));
        player
    }

    pub fn remove_player(&self, id: &PlayerId) -> Option<Arc<Player<C>>> {
        self.players.remove(id).map(|(_, player)| player)
    }

    /// Clones out every player handle. Use this before doing async work on
    /// the players so no map shard stays locked across an await.
    pub fn players(&self) -> Vec<Arc<Player<C>>> {
        self.players
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect()
    }

    /// Ids of every player, sorted by seat index.
    pub fn player_ids(&self) -> Vec<PlayerId> {
        let mut players = self.players();
        players.sort_by_key(|p| p.index());
        players.into_iter().map(|p| p.id().clone()).collect()
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    /// `true` while at least one human player has a live connection.
    pub fn has_connected_humans(&self) -> bool {
        self.players
            .iter()
            .any(|entry| !entry.is_bot() && entry.is_connected())
    }
}

impl<S, C: Connection> fmt::Debug for Game<S, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Game")
            .field("info", &self.info)
            .field("players", &self.players.len())
            .finish_non_exhaustive()
    }
}
