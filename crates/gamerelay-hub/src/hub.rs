//! The hub: game registry, dispatch queue, and routing loop.
//!
//! # Architecture
//!
//! ```text
//!   reader pumps ── on_message_received ──┐
//!                                         │ try_dispatch / dispatch
//!                                         ▼
//!                               ┌──────────────────┐
//!                               │  dispatch queue  │  bounded mpsc
//!                               └────────┬─────────┘
//!                                        │ one RoutingLoop task
//!                         ┌──────────────┼──────────────┐
//!                         ▼              ▼              ▼
//!                     mailbox A      mailbox B      mailbox C
//!                         │              │              │
//!                     writer pump    writer pump    writer pump
//! ```
//!
//! The routing loop is the only consumer of the queue. It never waits on a
//! mailbox: a full mailbox is handled by the configured
//! [`OverflowPolicy`], so one slow client cannot stall every other game on
//! the hub.
//!
//! # Shutdown
//!
//! When the shutdown token fires, the routing loop kicks every player of
//! every game and exits. Kicking closes each connection, which is what
//! unblocks reader pumps parked in `recv`.

use std::sync::Arc;

use dashmap::DashMap;
use futures_util::future::join_all;
use gamerelay_protocol::{DispatchMessage, GameId};
use gamerelay_transport::Connection;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::{Delivery, Game, GameLogic, HubConfig, HubError, OverflowPolicy, Player};

/// Process-wide registry of the games of one game type.
pub struct Hub<G: GameLogic, C: Connection> {
    game_slug: String,
    config: HubConfig,
    logic: G,
    games: DashMap<GameId, Arc<Game<G::State, C>>>,
    dispatch_tx: mpsc::Sender<DispatchMessage>,
    shutdown: CancellationToken,
}

/// The routing task. Returned by [`Hub::new`] so the caller decides where
/// it runs; [`Hub::spawn`] runs it on the Tokio runtime.
pub struct RoutingLoop<G: GameLogic, C: Connection> {
    hub: Arc<Hub<G, C>>,
    dispatch_rx: mpsc::Receiver<DispatchMessage>,
}

// ---------------------------------------------------------------------------
// Construction
// ---------------------------------------------------------------------------

impl<G: GameLogic, C: Connection> Hub<G, C> {
    /// Creates a hub and the routing loop that serves it.
    pub fn new(
        game_slug: impl Into<String>,
        config: HubConfig,
        logic: G,
        shutdown: CancellationToken,
    ) -> (Arc<Self>, RoutingLoop<G, C>) {
        let config = config.normalized();
        let (dispatch_tx, dispatch_rx) =
            mpsc::channel(config.dispatch_buffer_size);
        let hub = Arc::new(Self {
            game_slug: game_slug.into(),
            config,
            logic,
            games: DashMap::new(),
            dispatch_tx,
            shutdown,
        });
        let routing = RoutingLoop {
            hub: Arc::clone(&hub),
            dispatch_rx,
        };
        (hub, routing)
    }

    /// Creates a hub and spawns its routing loop.
    pub fn spawn(
        game_slug: impl Into<String>,
        config: HubConfig,
        logic: G,
        shutdown: CancellationToken,
    ) -> (Arc<Self>, JoinHandle<()>) {
        let (hub, routing) = Self::new(game_slug, config, logic, shutdown);
        let handle = tokio::spawn(routing.run());
        (hub, handle)
    }

    pub fn game_slug(&self) -> &str {
        &self.game_slug
    }

    pub fn config(&self) -> &HubConfig {
        &self.config
    }

    pub fn logic(&self) -> &G {
        &self.logic
    }

    pub fn shutdown_token(&self) -> &CancellationToken {
        &self.shutdown
    }

    /// A fresh state for a new game.
    pub fn new_state(&self) -> G::State {
        self.logic.new_state()
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

impl<G: GameLogic, C: Connection> Hub<G, C> {
    pub fn find_game(&self, id: &GameId) -> Option<Arc<Game<G::State, C>>> {
        self.games.get(id).map(|entry| Arc::clone(entry.value()))
    }

    /// Registers a game, replacing any game with the same id.
    pub fn insert_game(
        &self,
        game: Game<G::State, C>,
    ) -> Arc<Game<G::State, C>> {
        let game = Arc::new(game);
        self.games.insert(game.id().clone(), Arc::clone(&game));
        tracing::info!(game_id = %game.id(), game_slug = %self.game_slug, "game registered");
        game
    }

    /// Drops the game from the registry, then kicks every player.
    ///
    /// The entry goes first so a join that attaches after the kicks can
    /// see the game is gone and back out.
    pub async fn remove_game(
        &self,
        id: &GameId,
    ) -> Option<Arc<Game<G::State, C>>> {
        let (_, game) = self.games.remove(id)?;
        kick_players(game.players()).await;
        tracing::info!(game_id = %id, "game removed");
        Some(game)
    }

    /// `true` while `game` is the entry registered under its id.
    pub fn is_registered(&self, game: &Arc<Game<G::State, C>>) -> bool {
        self.games
            .get(game.id())
            .is_some_and(|entry| Arc::ptr_eq(entry.value(), game))
    }

    pub fn game_count(&self) -> usize {
        self.games.len()
    }

    pub fn game_ids(&self) -> Vec<GameId> {
        self.games.iter().map(|entry| entry.key().clone()).collect()
    }

    /// Kicks every player of every game. Games stay registered and the
    /// routing loop keeps running, so players may join again.
    pub async fn shutdown_all(&self) {
        tracing::info!(game_slug = %self.game_slug, "kicking all players");
        self.kick_all().await;
    }

    async fn kick_all(&self) {
        // Snapshot first so no shard lock is held while kicks await.
        let games: Vec<_> = self
            .games
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();
        let players = games.iter().flat_map(|game| game.players()).collect();
        kick_players(players).await;
    }
}

async fn kick_players<C: Connection>(players: Vec<Arc<Player<C>>>) {
    join_all(players.iter().map(|player| player.kick())).await;
}

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

impl<G: GameLogic, C: Connection> Hub<G, C> {
    /// Queues a routing request, waiting for room in the queue.
    pub async fn dispatch(&self, message: DispatchMessage) -> Result<(), HubError> {
        self.dispatch_tx
            .send(message)
            .await
            .map_err(|_| HubError::Closed)
    }

    /// Queues a routing request without waiting. This is the one to call
    /// from inside a [`GameLogic`] hook.
    pub fn try_dispatch(&self, message: DispatchMessage) -> Result<(), HubError> {
        self.dispatch_tx.try_send(message).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => HubError::DispatchFull,
            mpsc::error::TrySendError::Closed(_) => HubError::Closed,
        })
    }

    /// Offers one request's body to each receiver, in order.
    fn route(&self, message: DispatchMessage) {
        let DispatchMessage {
            game_id,
            receiver_ids,
            body,
        } = message;

        let Some(game) = self.find_game(&game_id) else {
            tracing::debug!(%game_id, "dispatch for unknown game dropped");
            return;
        };

        for receiver_id in &receiver_ids {
            let Some(player) = game.player(receiver_id) else {
                continue;
            };
            match player.offer(body.clone()) {
                Delivery::Queued | Delivery::Closed => {}
                Delivery::Full => self.overflow(player),
            }
        }
    }

    fn overflow(&self, player: Arc<Player<C>>) {
        match self.config.overflow {
            OverflowPolicy::Drop => {
                tracing::warn!(
                    game_id = %player.game_id(),
                    player_id = %player.id(),
                    "mailbox full, payload dropped"
                );
            }
            OverflowPolicy::Kick => {
                tracing::warn!(
                    game_id = %player.game_id(),
                    player_id = %player.id(),
                    "mailbox full, kicking player"
                );
                tokio::spawn(async move { player.kick().await });
            }
        }
    }
}

// ---------------------------------------------------------------------------
// RoutingLoop
// ---------------------------------------------------------------------------

impl<G: GameLogic, C: Connection> RoutingLoop<G, C> {
    /// Routes requests until the shutdown token fires, then kicks every
    /// player and returns.
    pub async fn run(mut self) {
        tracing::info!(game_slug = %self.hub.game_slug, "routing loop started");
        loop {
            tokio::select! {
                biased;
                _ = self.hub.shutdown.cancelled() => {
                    tracing::info!(
                        game_slug = %self.hub.game_slug,
                        games = self.hub.game_count(),
                        "shutting down hub"
                    );
                    self.hub.kick_all().await;
                    break;
                }
                message = self.dispatch_rx.recv() => match message {
                    Some(message) => self.hub.route(message),
                    None => break,
                },
            }
        }
        tracing::info!(game_slug = %self.hub.game_slug, "routing loop stopped");
    }
}

// =========================================================================
// Tests
// =========================================================================
