//! Connection pumps.
//!
//! Every attached connection gets two loops:
//!
//! - the **writer** drains the player's mailbox into the connection. It is
//!   spawned by [`start_pumps`] and ends when the mailbox closes or a send
//!   fails.
//! - the **reader** feeds received payloads to
//!   [`GameLogic::on_message_received`]. [`start_pumps`] hands it back as a
//!   [`Reader`] so the caller picks the task it runs on.
//!
//! When either loop ends it kicks the player, but only for the generation
//! it was started with (see [`Player::kick_generation`]).

use std::sync::Arc;

use gamerelay_transport::Connection;
use tokio::sync::mpsc;

use crate::{Attachment, GameLogic, Hub, Player};

/// Spawns the writer pump for a fresh attachment and returns the reader.
pub fn start_pumps<G: GameLogic, C: Connection>(
    hub: &Arc<Hub<G, C>>,
    player: &Arc<Player<C>>,
    attachment: Attachment<C>,
) -> Reader<G, C> {
    let Attachment {
        connection,
        mailbox,
        generation,
    } = attachment;

    tokio::spawn(write_pump(
        Arc::clone(player),
        Arc::clone(&connection),
        mailbox,
        generation,
    ));

    Reader {
        hub: Arc::clone(hub),
        player: Arc::clone(player),
        connection,
        generation,
    }
}

async fn write_pump<C: Connection>(
    player: Arc<Player<C>>,
    connection: Arc<C>,
    mut mailbox: mpsc::Receiver<Vec<u8>>,
    generation: u64,
) {
    while let Some(body) = mailbox.recv().await {
        if let Err(e) = connection.send(&body).await {
            tracing::warn!(
                game_id = %player.game_id(),
                player_id = %player.id(),
                error = %e,
                "send failed, stopping writer"
            );
            break;
        }
    }
    tracing::debug!(player_id = %player.id(), generation, "writer stopped");
    player.kick_generation(generation).await;
}

/// The reader pump of one attached connection.
pub struct Reader<G: GameLogic, C: Connection> {
    hub: Arc<Hub<G, C>>,
    player: Arc<Player<C>>,
    connection: Arc<C>,
    generation: u64,
}

impl<G: GameLogic, C: Connection> Reader<G, C> {
    pub fn player(&self) -> &Arc<Player<C>> {
        &self.player
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Reads until the connection closes, a receive fails, or the hub
    /// shuts down. Then kicks the player and, if this reader still owned
    /// the player's current connection, calls
    /// [`GameLogic::on_player_left`].
    pub async fn run(self) {
        let shutdown = self.hub.shutdown_token().clone();
        loop {
            if shutdown.is_cancelled() {
                tracing::debug!(player_id = %self.player.id(), "hub shutting down, reader exits");
                break;
            }
            match self.connection.recv().await {
                Ok(Some(message)) => self.handle(&message),
                Ok(None) => {
                    tracing::info!(
                        game_id = %self.player.game_id(),
                        player_id = %self.player.id(),
                        "connection closed"
                    );
                    break;
                }
                Err(e) => {
                    tracing::warn!(
                        game_id = %self.player.game_id(),
                        player_id = %self.player.id(),
                        error = %e,
                        "receive failed"
                    );
                    break;
                }
            }
        }

        if !self.player.kick_generation(self.generation).await {
            // Superseded by a newer connection; that one owns the player.
            return;
        }

        let hub: &Hub<G, C> = &self.hub;
        let player: &Player<C> = &self.player;
        let Some(game) = hub.find_game(player.game_id()) else {
            return;
        };
        if let Err(e) = hub.logic().on_player_left(hub, &game, player) {
            tracing::error!(
                game_id = %game.id(),
                player_id = %self.player.id(),
                error = %e,
                "on_player_left failed"
            );
        }
    }

    fn handle(&self, message: &[u8]) {
        let hub: &Hub<G, C> = &self.hub;
        let player: &Player<C> = &self.player;
        let Some(game) = hub.find_game(player.game_id()) else {
            tracing::debug!(
                game_id = %self.player.game_id(),
                "message for unknown game dropped"
            );
            return;
        };
        if let Err(e) =
            hub.logic().on_message_received(hub, &game, player, message)
        {
            tracing::error!(
                game_id = %game.id(),
                player_id = %self.player.id(),
                error = %e,
                "on_message_received failed"
            );
        }
    }
}
