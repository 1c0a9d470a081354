//! Integration tests for `GameService` with in-memory collaborators.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use gamerelay_hub::{
    CallbackError, Game, GameLogic, Hub, HubConfig, Player, PlayerStatus,
};
use gamerelay_protocol::{
    CreateGameRequest, DispatchMessage, GameEvent, GameId, LobbyId, PlayerId,
};
use gamerelay_service::{
    GameService, InMemoryLobbies, Lobby, LobbyBot, LobbyPlayer,
    LobbyRepository, Publisher, ServiceError, StaticTickets,
};
use gamerelay_transport::{Connection, MemoryConnection};
use tokio_util::sync::CancellationToken;

// =========================================================================
// Fakes
// =========================================================================

/// Greets every player that joins with a "welcome" payload.
#[derive(Default)]
struct Greeter {
    refuse_joins: AtomicBool,
    games_created: AtomicUsize,
}

impl GameLogic for Greeter {
    type State = ();

    fn new_state(&self) -> Self::State {}

    fn on_message_received<C: Connection>(
        &self,
        _hub: &Hub<Self, C>,
        _game: &Game<(), C>,
        _player: &Player<C>,
        _message: &[u8],
    ) -> Result<(), CallbackError> {
        Ok(())
    }

    fn on_player_joined<C: Connection>(
        &self,
        hub: &Hub<Self, C>,
        game: &Game<(), C>,
        player: &Player<C>,
    ) -> Result<(), CallbackError> {
        if self.refuse_joins.load(Ordering::SeqCst) {
            return Err(CallbackError::msg("table is closed"));
        }
        let msg = DispatchMessage::new(
            game.id().clone(),
            [player.id().clone()],
            b"welcome".to_vec(),
        );
        hub.try_dispatch(msg).map_err(CallbackError::new)
    }

    fn on_game_created<C: Connection>(
        &self,
        _hub: &Hub<Self, C>,
        _game: &Game<(), C>,
    ) -> Result<(), CallbackError> {
        self.games_created.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("broker unavailable")]
struct BrokerDown;

#[derive(Default)]
struct RecordingPublisher {
    fail: AtomicBool,
    published: Mutex<Vec<String>>,
}

impl RecordingPublisher {
    fn events(&self) -> Vec<GameEvent> {
        self.published
            .lock()
            .unwrap()
            .iter()
            .map(|m| GameEvent::decode(m).expect("valid event"))
            .collect()
    }
}

impl Publisher for RecordingPublisher {
    type Error = BrokerDown;

    async fn publish(&self, message: &str) -> Result<(), BrokerDown> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(BrokerDown);
        }
        self.published.lock().unwrap().push(message.to_string());
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("lobby service timed out")]
struct LobbyTimeout;

struct BrokenLobbies;

impl LobbyRepository for BrokenLobbies {
    type Error = LobbyTimeout;

    async fn find_by_id(&self, _id: &LobbyId) -> Result<Option<Lobby>, LobbyTimeout> {
        Err(LobbyTimeout)
    }
}

type TestService<L = InMemoryLobbies> =
    GameService<Greeter, MemoryConnection, StaticTickets, L, RecordingPublisher>;

// =========================================================================
// Helpers
// =========================================================================

fn lobby(id: &str, humans: &[&str], bots: &[u64]) -> Lobby {
    Lobby {
        id: LobbyId::from(id),
        players: humans
            .iter()
            .map(|h| LobbyPlayer {
                id: PlayerId::from(*h),
                username: format!("{h}-name"),
                avatar_id: 2,
            })
            .collect(),
        bots: bots
            .iter()
            .map(|&b| LobbyBot {
                id: b,
                username: format!("bot-{b}"),
                avatar_id: 9,
            })
            .collect(),
    }
}

fn service_with<L: LobbyRepository>(lobbies: L) -> TestService<L> {
    let (hub, _routing) = Hub::spawn(
        "greeter",
        HubConfig::default(),
        Greeter::default(),
        CancellationToken::new(),
    );
    GameService::new(hub, StaticTickets::new(), lobbies, RecordingPublisher::default())
}

fn service(lobbies: impl IntoIterator<Item = Lobby>) -> TestService {
    service_with(lobbies.into_iter().collect())
}

fn request(lobby_id: &str) -> CreateGameRequest {
    CreateGameRequest {
        lobby_id: LobbyId::from(lobby_id),
    }
}

async fn create(service: &TestService, lobby_id: &str) -> GameId {
    service
        .create(&PlayerId::from("creator"), request(lobby_id))
        .await
        .expect("create should succeed")
        .game_id
}

// =========================================================================
// create
// =========================================================================

#[tokio::test]
async fn test_create_registers_every_lobby_member() {
    let service = service([lobby("L1", &["ann", "ben"], &[7, 8])]);

    let game_id = create(&service, "L1").await;

    let game = service.hub().find_game(&game_id).expect("registered");
    assert_eq!(game.player_count(), 4);
    assert_eq!(game.lobby_id(), &LobbyId::from("L1"));
    assert_eq!(game.creator_id(), &PlayerId::from("creator"));

    let seats: HashSet<usize> = game.players().iter().map(|p| p.index()).collect();
    assert_eq!(seats, HashSet::from([1, 2, 3, 4]));

    let ann = game.player(&PlayerId::from("ann")).unwrap();
    assert_eq!(ann.status(), PlayerStatus::Fresh);
    assert_eq!(ann.username(), "ann-name");
    assert!(!ann.is_bot());

    let bot = game.player(&PlayerId::from("7")).unwrap();
    assert!(bot.is_bot());
    assert!(bot.is_connected());
    assert!(bot.is_closed());
    assert_eq!(bot.avatar_id(), 9);
}

#[tokio::test]
async fn test_create_publishes_game_created() {
    let service = service([lobby("L1", &["ann"], &[])]);

    let game_id = create(&service, "L1").await;

    let events = service.publisher().events();
    assert_eq!(
        events,
        vec![GameEvent::created(game_id, LobbyId::from("L1"), "greeter")]
    );
    assert_eq!(service.hub().logic().games_created.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_create_unknown_lobby_fails() {
    let service = service([]);

    let result = service.create(&PlayerId::from("u"), request("nope")).await;

    assert!(matches!(result, Err(ServiceError::LobbyNotFound(id)) if id.as_str() == "nope"));
    assert_eq!(service.hub().game_count(), 0);
}

#[tokio::test]
async fn test_create_surfaces_lobby_service_failure() {
    let service = service_with(BrokenLobbies);

    let result = service.create(&PlayerId::from("u"), request("L1")).await;

    assert!(matches!(result, Err(ServiceError::Lobby(_))));
}

#[tokio::test]
async fn test_create_publish_failure_leaves_game_registered() {
    let service = service([lobby("L1", &["ann"], &[])]);
    service.publisher().fail.store(true, Ordering::SeqCst);

    let result = service.create(&PlayerId::from("u"), request("L1")).await;

    assert!(matches!(result, Err(ServiceError::Publish(_))));
    assert_eq!(service.hub().game_count(), 1);
    assert_eq!(service.hub().logic().games_created.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_create_rejects_bot_id_colliding_with_human() {
    let service = service([lobby("L1", &["ann", "7"], &[7])]);

    let result = service.create(&PlayerId::from("creator"), request("L1")).await;

    assert!(matches!(result, Err(ServiceError::DuplicatePlayer(id)) if id == PlayerId::from("7")));
    assert_eq!(service.hub().game_count(), 0);
    assert!(service.publisher().events().is_empty());
}

#[tokio::test]
async fn test_create_gives_each_game_a_distinct_id() {
    let service = service([lobby("L1", &["ann"], &[])]);

    let a = create(&service, "L1").await;
    let b = create(&service, "L1").await;

    assert_ne!(a, b);
    assert_eq!(service.hub().game_count(), 2);
}

// =========================================================================
// join
// =========================================================================

#[tokio::test]
async fn test_join_attaches_player_and_starts_pumps() {
    let service = service([lobby("L1", &["ann"], &[])]);
    let game_id = create(&service, "L1").await;
    service.users().issue("t-ann", PlayerId::from("ann"));

    let (conn, mut peer) = MemoryConnection::pair();
    let reader = service
        .join(&game_id, "t-ann", Arc::new(conn))
        .await
        .expect("join should succeed");
    let reader_task = tokio::spawn(reader.run());

    let welcome = tokio::time::timeout(Duration::from_secs(2), peer.recv())
        .await
        .expect("welcome in time");
    assert_eq!(welcome.as_deref(), Some(&b"welcome"[..]));

    let game = service.hub().find_game(&game_id).unwrap();
    let ann = game.player(&PlayerId::from("ann")).unwrap();
    assert_eq!(ann.status(), PlayerStatus::Connected);

    peer.hang_up();
    tokio::time::timeout(Duration::from_secs(2), reader_task)
        .await
        .expect("reader should end")
        .unwrap();
    assert_eq!(ann.status(), PlayerStatus::Closed);
}

#[tokio::test]
async fn test_join_with_bad_ticket_is_rejected() {
    let service = service([lobby("L1", &["ann"], &[])]);
    let game_id = create(&service, "L1").await;

    let (conn, _peer) = MemoryConnection::pair();
    let result = service.join(&game_id, "forged", Arc::new(conn)).await;

    assert!(matches!(result, Err(ServiceError::InvalidTicket)));
}

#[tokio::test]
async fn test_join_unknown_game_is_rejected() {
    let service = service([]);
    service.users().issue("t", PlayerId::from("ann"));

    let (conn, _peer) = MemoryConnection::pair();
    let result = service.join(&GameId::from("ghost"), "t", Arc::new(conn)).await;

    assert!(matches!(result, Err(ServiceError::GameNotFound(_))));
}

#[tokio::test]
async fn test_join_requires_pre_registered_player() {
    let service = service([lobby("L1", &["ann"], &[])]);
    let game_id = create(&service, "L1").await;
    service.users().issue("t", PlayerId::from("stranger"));

    let (conn, _peer) = MemoryConnection::pair();
    let result = service.join(&game_id, "t", Arc::new(conn)).await;

    assert!(matches!(result, Err(ServiceError::PlayerNotFound(id)) if id.as_str() == "stranger"));
    let game = service.hub().find_game(&game_id).unwrap();
    assert_eq!(game.player_count(), 1, "join never adds players");
}

#[tokio::test]
async fn test_join_cannot_take_over_a_bot_seat() {
    let service = service([lobby("L1", &["ann"], &[42])]);
    let game_id = create(&service, "L1").await;
    service.users().issue("t", PlayerId::from("42"));

    let (conn, _peer) = MemoryConnection::pair();
    let result = service.join(&game_id, "t", Arc::new(conn)).await;

    assert!(matches!(result, Err(ServiceError::PlayerNotFound(_))));
}

#[tokio::test]
async fn test_join_hook_failure_detaches_without_closing() {
    let service = service([lobby("L1", &["ann"], &[])]);
    let game_id = create(&service, "L1").await;
    service.users().issue("t", PlayerId::from("ann"));
    service.hub().logic().refuse_joins.store(true, Ordering::SeqCst);

    let (conn, peer) = MemoryConnection::pair();
    let conn = Arc::new(conn);
    let result = service.join(&game_id, "t", Arc::clone(&conn)).await;

    assert!(matches!(result, Err(ServiceError::Callback(_))));
    let ann = service
        .hub()
        .find_game(&game_id)
        .unwrap()
        .player(&PlayerId::from("ann"))
        .unwrap();
    assert!(ann.is_closed());
    assert_eq!(peer.close_calls(), 0, "the caller reports and closes");
    conn.send(b"sorry").await.expect("connection still usable");
}

#[tokio::test]
async fn test_rejoin_supersedes_previous_connection() {
    let service = service([lobby("L1", &["ann"], &[])]);
    let game_id = create(&service, "L1").await;
    service.users().issue_reusable("t", PlayerId::from("ann"));

    let (first, first_peer) = MemoryConnection::pair();
    let old = service.join(&game_id, "t", Arc::new(first)).await.unwrap();
    let old_task = tokio::spawn(old.run());

    let (second, mut second_peer) = MemoryConnection::pair();
    let new = service.join(&game_id, "t", Arc::new(second)).await.unwrap();
    let _new_task = tokio::spawn(new.run());

    tokio::time::timeout(Duration::from_secs(2), old_task)
        .await
        .expect("old reader should end")
        .unwrap();
    assert_eq!(first_peer.close_calls(), 1);

    let welcome = tokio::time::timeout(Duration::from_secs(2), second_peer.recv())
        .await
        .expect("welcome in time");
    assert_eq!(welcome.as_deref(), Some(&b"welcome"[..]));
    assert_eq!(second_peer.close_calls(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_join_racing_finish_never_leaves_a_live_connection() {
    for round in 0..50 {
        let service = Arc::new(service([lobby("L1", &["ann"], &[])]));
        let game_id = create(&service, "L1").await;
        service.users().issue("t", PlayerId::from("ann"));
        let ann = service
            .hub()
            .find_game(&game_id)
            .and_then(|game| game.player(&PlayerId::from("ann")))
            .unwrap();

        let (conn, _peer) = MemoryConnection::pair();
        let joining = {
            let service = Arc::clone(&service);
            let game_id = game_id.clone();
            tokio::spawn(async move { service.join(&game_id, "t", Arc::new(conn)).await })
        };
        let finishing = {
            let service = Arc::clone(&service);
            let game_id = game_id.clone();
            tokio::spawn(async move { service.finish(&game_id).await })
        };
        finishing.await.unwrap().expect("finish");
        let _ = joining.await.unwrap();

        assert!(service.hub().find_game(&game_id).is_none());
        assert_ne!(
            ann.status(),
            PlayerStatus::Connected,
            "round {round}: player left attached to a removed game"
        );
    }
}

// =========================================================================
// finish
// =========================================================================

#[tokio::test]
async fn test_finish_removes_game_and_publishes_game_ended() {
    let service = service([lobby("L1", &["ann"], &[])]);
    let game_id = create(&service, "L1").await;
    service.users().issue("t", PlayerId::from("ann"));
    let (conn, peer) = MemoryConnection::pair();
    let reader = service.join(&game_id, "t", Arc::new(conn)).await.unwrap();
    let reader_task = tokio::spawn(reader.run());

    service.finish(&game_id).await.expect("finish");

    assert!(service.hub().find_game(&game_id).is_none());
    assert!(peer.is_closed());
    tokio::time::timeout(Duration::from_secs(2), reader_task)
        .await
        .expect("reader should end")
        .unwrap();
    let events = service.publisher().events();
    assert_eq!(
        events.last(),
        Some(&GameEvent::ended(game_id, LobbyId::from("L1"), "greeter"))
    );
}

#[tokio::test]
async fn test_finish_unknown_game_fails() {
    let service = service([]);
    let result = service.finish(&GameId::from("ghost")).await;
    assert!(matches!(result, Err(ServiceError::GameNotFound(_))));
}
