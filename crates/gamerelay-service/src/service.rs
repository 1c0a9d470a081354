//! Game creation, joining, and teardown.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use gamerelay_hub::{
    Game, GameInfo, GameLogic, GameStatus, Hub, Player, PlayerProfile, Reader,
    start_pumps,
};
use gamerelay_protocol::{
    CreateGameRequest, CreateGameResponse, GameEvent, GameId, PlayerId,
};
use gamerelay_transport::Connection;
use rand::Rng;
use rand::seq::SliceRandom;

use crate::{LobbyRepository, Publisher, ServiceError, UserRepository};

/// Orchestrates the life of a game on top of a [`Hub`].
///
/// ```text
///  create(lobby) ──→ players registered (Fresh) ──→ GameCreated published
///                                  │
///  join(ticket, conn) ──→ attach ──┴──→ on_player_joined ──→ pumps
///                                  │
///  finish(game) ──→ players kicked, game removed ──→ GameEnded published
/// ```
pub struct GameService<G, C, U, L, P>
where
    G: GameLogic,
    C: Connection,
{
    hub: Arc<Hub<G, C>>,
    users: U,
    lobbies: L,
    publisher: P,
}

impl<G, C, U, L, P> GameService<G, C, U, L, P>
where
    G: GameLogic,
    C: Connection,
    U: UserRepository,
    L: LobbyRepository,
    P: Publisher,
{
    pub fn new(hub: Arc<Hub<G, C>>, users: U, lobbies: L, publisher: P) -> Self {
        Self {
            hub,
            users,
            lobbies,
            publisher,
        }
    }

    pub fn hub(&self) -> &Arc<Hub<G, C>> {
        &self.hub
    }

    pub fn users(&self) -> &U {
        &self.users
    }

    pub fn lobbies(&self) -> &L {
        &self.lobbies
    }

    pub fn publisher(&self) -> &P {
        &self.publisher
    }

    /// Creates a game from a lobby and announces it.
    ///
    /// Every lobby member gets a player slot up front, humans first and
    /// then bots, each seated at the next index of a uniformly random
    /// permutation of `1..=members`.
    ///
    /// # Errors
    ///
    /// The game is registered before the `GameCreated` event is published.
    /// If publishing or `on_game_created` fails the error is returned but
    /// the game stays registered and joinable.
    pub async fn create(
        &self,
        creator_id: &PlayerId,
        request: CreateGameRequest,
    ) -> Result<CreateGameResponse, ServiceError> {
        let lobby = self
            .lobbies
            .find_by_id(&request.lobby_id)
            .await
            .map_err(|e| {
                tracing::error!(lobby_id = %request.lobby_id, error = %e, "could not find lobby by id");
                ServiceError::Lobby(Box::new(e))
            })?
            .ok_or_else(|| ServiceError::LobbyNotFound(request.lobby_id.clone()))?;

        let info = GameInfo {
            id: generate_game_id(),
            status: GameStatus::Pending,
            creator_id: creator_id.clone(),
            created_at: unix_now(),
            lobby_id: lobby.id.clone(),
        };
        let game = Game::new(info, self.hub.new_state());

        let seats = seat_permutation(lobby.seat_count());
        let humans = lobby.players.iter().map(|member| {
            let profile = PlayerProfile {
                id: member.id.clone(),
                username: member.username.clone(),
                avatar_id: member.avatar_id,
            };
            (profile, false)
        });
        let bots = lobby.bots.iter().map(|bot| {
            let profile = PlayerProfile {
                id: bot.player_id(),
                username: bot.username.clone(),
                avatar_id: bot.avatar_id,
            };
            (profile, true)
        });
        for ((profile, is_bot), &index) in humans.chain(bots).zip(&seats) {
            // Bot ids are stringified numbers and may collide with a human id.
            if game.player(&profile.id).is_some() {
                tracing::warn!(lobby_id = %lobby.id, player_id = %profile.id, "duplicate lobby member");
                return Err(ServiceError::DuplicatePlayer(profile.id));
            }
            let player = if is_bot {
                Player::bot(profile, game.id().clone(), index)
            } else {
                Player::human(profile, game.id().clone(), index)
            };
            game.insert_player(player);
        }

        let game = self.hub.insert_game(game);
        let game_id = game.id().clone();

        let event =
            GameEvent::created(game_id.clone(), lobby.id.clone(), self.hub.game_slug())
                .encode()?;
        self.publisher.publish(&event).await.map_err(|e| {
            tracing::error!(%game_id, lobby_id = %lobby.id, error = %e, "could not publish GameCreated");
            ServiceError::Publish(Box::new(e))
        })?;

        let hub: &Hub<G, C> = &self.hub;
        hub.logic().on_game_created(hub, &game).map_err(|e| {
            tracing::error!(%game_id, lobby_id = %lobby.id, error = %e, "on_game_created failed");
            ServiceError::from(e)
        })?;

        tracing::info!(
            %game_id,
            lobby_id = %lobby.id,
            humans = lobby.players.len(),
            bots = lobby.bots.len(),
            "game created"
        );
        Ok(CreateGameResponse { game_id })
    }

    /// Reconnects the ticket holder's player slot to `connection`.
    ///
    /// On success the writer pump is already running and the returned
    /// [`Reader`] is ready to run. On failure nothing is left attached:
    /// the caller still owns `connection` and should tell the peer why
    /// before closing it.
    pub async fn join(
        &self,
        game_id: &GameId,
        ticket: &str,
        connection: Arc<C>,
    ) -> Result<Reader<G, C>, ServiceError> {
        let user_id = self.users.acquire_user_id(ticket).await.map_err(|e| {
            tracing::warn!(error = %e, "could not acquire user by ticket");
            ServiceError::InvalidTicket
        })?;

        let game = self
            .hub
            .find_game(game_id)
            .ok_or_else(|| ServiceError::GameNotFound(game_id.clone()))?;

        let player = match game.player(&user_id) {
            Some(player) if !player.is_bot() => player,
            _ => return Err(ServiceError::PlayerNotFound(user_id)),
        };

        let attachment = player
            .attach(connection, self.hub.config().mailbox_capacity)
            .await;

        // A concurrent finish may have removed the game after the lookup
        // above and kicked before this attach.
        if !self.hub.is_registered(&game) {
            tracing::info!(%game_id, player_id = %player.id(), "game ended while joining");
            player.release(attachment.generation);
            return Err(ServiceError::GameNotFound(game_id.clone()));
        }

        let hub: &Hub<G, C> = &self.hub;
        if let Err(e) = hub.logic().on_player_joined(hub, &game, &player) {
            tracing::error!(
                %game_id,
                player_id = %player.id(),
                error = %e,
                "on_player_joined failed"
            );
            player.release(attachment.generation);
            return Err(e.into());
        }

        tracing::info!(%game_id, player_id = %player.id(), "player joined");
        Ok(start_pumps(&self.hub, &player, attachment))
    }

    /// Ends a game: kicks its players, drops it from the hub, and
    /// publishes `GameEnded`.
    pub async fn finish(&self, game_id: &GameId) -> Result<(), ServiceError> {
        let game = self
            .hub
            .find_game(game_id)
            .ok_or_else(|| ServiceError::GameNotFound(game_id.clone()))?;

        let event = GameEvent::ended(
            game_id.clone(),
            game.lobby_id().clone(),
            self.hub.game_slug(),
        )
        .encode()?;

        self.hub.remove_game(game_id).await;

        self.publisher.publish(&event).await.map_err(|e| {
            tracing::error!(%game_id, error = %e, "could not publish GameEnded");
            ServiceError::Publish(Box::new(e))
        })?;
        tracing::info!(%game_id, "game finished");
        Ok(())
    }
}

/// A random permutation of `1..=n`.
pub fn seat_permutation(n: usize) -> Vec<usize> {
    let mut seats: Vec<usize> = (1..=n).collect();
    seats.shuffle(&mut rand::rng());
    seats
}

/// 12 random bytes as 24 lowercase hex characters.
fn generate_game_id() -> GameId {
    let bytes: [u8; 12] = rand::rng().random();
    GameId::new(bytes.iter().map(|b| format!("{b:02x}")).collect::<String>())
}

fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or_default()
}
