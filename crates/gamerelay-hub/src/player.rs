//! Per-player connection state.
//!
//! A [`Player`] outlives any single connection. It is created when the
//! game is created, before anyone has connected, and a client may attach
//! to it many times: a reconnect after a dropped socket, or a second
//! browser tab superseding the first.
//!
//! # State machine
//!
//! ```text
//!   Fresh ──(attach)──→ Connected ──(kick)──→ Closed
//!                          ↑  │                 │
//!                          └──┘(attach)         │
//!                          ↑                    │
//!                          └──────(attach)──────┘
//! ```
//!
//! The connection, the mailbox sender, and the flags live together behind
//! one lock, so the routing loop sees either the whole old pair or the
//! whole new pair.
//!
//! # Closing exactly once
//!
//! The mailbox is "closed" by dropping its only sender, and the connection
//! is closed by whoever takes it out of the `Option`. Both happen with
//! `Option::take` under the lock, so any number of concurrent kicks close
//! each of them at most once.
//!
//! # Generations
//!
//! Every attach bumps a generation counter. Pumps remember the generation
//! they were started for, and when they finish they only tear the player
//! down if it is still on that generation. That keeps the pumps of a
//! superseded connection from kicking the connection that replaced it.

use std::sync::Arc;

use gamerelay_protocol::{GameId, PlayerId};
use gamerelay_transport::Connection;
use parking_lot::Mutex;
use tokio::sync::mpsc;

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// Profile data for a player slot, as it comes from the lobby.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerProfile {
    pub id: PlayerId,
    pub username: String,
    pub avatar_id: u8,
}

/// Where a player is in its connection lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerStatus {
    /// Registered, never attached.
    Fresh,
    /// Attached, mailbox open.
    Connected,
    /// Was attached, has since been kicked.
    Closed,
}

/// Result of offering a payload to a player's mailbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// The payload is queued for the writer pump.
    Queued,
    /// The mailbox is closed (player kicked, never connected, or a bot).
    Closed,
    /// The mailbox is at capacity; the payload was not queued.
    Full,
}

/// What a successful attach hands back: the receiving end of the fresh
/// mailbox and the connection it belongs to.
///
/// Pass it to [`start_pumps`](crate::start_pumps).
pub struct Attachment<C: Connection> {
    pub connection: Arc<C>,
    pub mailbox: mpsc::Receiver<Vec<u8>>,
    pub generation: u64,
}

/// One participant of a game.
pub struct Player<C: Connection> {
    id: PlayerId,
    game_id: GameId,
    index: usize,
    username: String,
    avatar_id: u8,
    is_bot: bool,
    link: Mutex<Link<C>>,
}

/// Everything that changes on attach and kick.
struct Link<C> {
    connection: Option<Arc<C>>,
    /// `None` means the mailbox is closed.
    mailbox: Option<mpsc::Sender<Vec<u8>>>,
    is_connected: bool,
    generation: u64,
}

// ---------------------------------------------------------------------------
// Construction and accessors
// ---------------------------------------------------------------------------

impl<C: Connection> Player<C> {
    /// A human player slot, not yet connected.
    pub fn human(profile: PlayerProfile, game_id: GameId, index: usize) -> Self {
        Self::build(profile, game_id, index, false)
    }

    /// A bot slot. Bots have no transport; they count as present from the
    /// start until kicked, and their mailbox stays closed, so routing
    /// skips them.
    pub fn bot(profile: PlayerProfile, game_id: GameId, index: usize) -> Self {
        Self::build(profile, game_id, index, true)
    }

    fn build(
        profile: PlayerProfile,
        game_id: GameId,
        index: usize,
        is_bot: bool,
    ) -> Self {
        Self {
            id: profile.id,
            game_id,
            index,
            username: profile.username,
            avatar_id: profile.avatar_id,
            is_bot,
            link: Mutex::new(Link {
                connection: None,
                mailbox: None,
                is_connected: is_bot,
                generation: 0,
            }),
        }
    }

    pub fn id(&self) -> &PlayerId {
        &self.id
    }

    pub fn game_id(&self) -> &GameId {
        &self.game_id
    }

    /// The 1-based seat index assigned at game creation.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn avatar_id(&self) -> u8 {
        self.avatar_id
    }

    pub fn is_bot(&self) -> bool {
        self.is_bot
    }

    pub fn is_connected(&self) -> bool {
        self.link.lock().is_connected
    }

    /// `true` when the current mailbox must not be written to.
    pub fn is_closed(&self) -> bool {
        self.link.lock().mailbox.is_none()
    }

    /// The generation of the most recent attach (0 if never attached).
    pub fn generation(&self) -> u64 {
        self.link.lock().generation
    }

    pub fn status(&self) -> PlayerStatus {
        let link = self.link.lock();
        if link.mailbox.is_some() {
            PlayerStatus::Connected
        } else if link.generation == 0 {
            PlayerStatus::Fresh
        } else {
            PlayerStatus::Closed
        }
    }
}

// ---------------------------------------------------------------------------
// Transitions
// ---------------------------------------------------------------------------

impl<C: Connection> Player<C> {
    /// Installs `connection` with a fresh mailbox of `mailbox_capacity`.
    ///
    /// If a previous connection is live it is superseded: its mailbox is
    /// closed (its writer pump drains and exits) and the connection itself
    /// is closed after the lock is released. Close errors are logged.
    pub async fn attach(
        &self,
        connection: Arc<C>,
        mailbox_capacity: usize,
    ) -> Attachment<C> {
        let (tx, rx) = mpsc::channel(mailbox_capacity.max(1));

        let (previous, generation) = {
            let mut link = self.link.lock();
            // Replacing the sender drops the old one, which closes the old
            // mailbox.
            link.mailbox = Some(tx);
            let previous = link.connection.replace(Arc::clone(&connection));
            link.is_connected = true;
            link.generation += 1;
            (previous, link.generation)
        };

        if let Some(previous) = previous {
            tracing::info!(
                player_id = %self.id,
                game_id = %self.game_id,
                old = %previous.id(),
                new = %connection.id(),
                "superseding previous connection"
            );
            self.close_connection(&previous).await;
        }

        Attachment {
            connection,
            mailbox: rx,
            generation,
        }
    }

    /// Closes the mailbox and the connection and marks the player
    /// disconnected. Safe to call any number of times from any task.
    pub async fn kick(&self) {
        if let Some(connection) = self.detach(None) {
            self.close_connection(&connection).await;
        }
    }

    /// Like [`kick`](Self::kick), but only if the player is still on
    /// `generation`. Returns `false` when a newer attach has taken over,
    /// in which case nothing is touched.
    pub async fn kick_generation(&self, generation: u64) -> bool {
        if self.generation() != generation {
            return false;
        }
        if let Some(connection) = self.detach(Some(generation)) {
            self.close_connection(&connection).await;
        }
        true
    }

    /// Closes the mailbox and detaches the connection *without* closing
    /// it, handing it back to the caller. Used when a join fails after the
    /// attach: the caller still has to tell the client why before closing.
    pub fn release(&self, generation: u64) -> Option<Arc<C>> {
        self.detach(Some(generation))
    }

    /// Offers `body` to the mailbox without waiting.
    pub fn offer(&self, body: Vec<u8>) -> Delivery {
        let link = self.link.lock();
        match &link.mailbox {
            None => Delivery::Closed,
            Some(tx) => match tx.try_send(body) {
                Ok(()) => Delivery::Queued,
                Err(mpsc::error::TrySendError::Full(_)) => Delivery::Full,
                // The writer pump is gone; it will kick us shortly.
                Err(mpsc::error::TrySendError::Closed(_)) => Delivery::Closed,
            },
        }
    }

    /// Shared body of kick and release. With `Some(generation)`, does
    /// nothing unless the player is on that generation.
    fn detach(&self, generation: Option<u64>) -> Option<Arc<C>> {
        let mut link = self.link.lock();
        if generation.is_some_and(|g| g != link.generation) {
            return None;
        }
        if link.mailbox.take().is_some() {
            tracing::debug!(player_id = %self.id, "mailbox closed");
        }
        link.is_connected = false;
        link.connection.take()
    }

    async fn close_connection(&self, connection: &C) {
        if let Err(e) = connection.close().await {
            tracing::error!(
                player_id = %self.id,
                game_id = %self.game_id,
                error = %e,
                "could not close player connection"
            );
        }
    }
}

impl<C: Connection> std::fmt::Debug for Player<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Player")
            .field("id", &self.id)
            .field("game_id", &self.game_id)
            .field("index", &self.index)
            .field("is_bot", &self.is_bot)
            .field("status", &self.status())
            .finish()
    }
}

// =========================================================================
// Tests
// =========================================================================
