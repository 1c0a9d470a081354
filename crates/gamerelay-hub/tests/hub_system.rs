//! Integration tests for the hub, its pumps, and shutdown, using
//! in-memory connections.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use gamerelay_hub::{
    CallbackError, Game, GameInfo, GameLogic, GameStatus, Hub, HubConfig,
    Player, PlayerProfile, start_pumps,
};
use gamerelay_protocol::{DispatchMessage, GameId, LobbyId, PlayerId};
use gamerelay_transport::{Connection, MemoryConnection, MemoryPeer};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

// =========================================================================
// Mock game: every message is broadcast to every player of the game.
// =========================================================================

#[derive(Default)]
struct Broadcast {
    left: AtomicUsize,
}

#[derive(Default)]
struct Log {
    received: Vec<Vec<u8>>,
}

impl GameLogic for Broadcast {
    type State = Log;

    fn new_state(&self) -> Log {
        Log::default()
    }

    fn on_message_received<C: Connection>(
        &self,
        hub: &Hub<Self, C>,
        game: &Game<Log, C>,
        _player: &Player<C>,
        message: &[u8],
    ) -> Result<(), CallbackError> {
        if message == b"bad" {
            return Err(CallbackError::msg("rejected"));
        }
        game.state().received.push(message.to_vec());
        let msg =
            DispatchMessage::new(game.id().clone(), game.player_ids(), message);
        hub.try_dispatch(msg).map_err(CallbackError::new)
    }

    fn on_player_left<C: Connection>(
        &self,
        _hub: &Hub<Self, C>,
        _game: &Game<Log, C>,
        _player: &Player<C>,
    ) -> Result<(), CallbackError> {
        self.left.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

type TestHub = Hub<Broadcast, MemoryConnection>;
type TestGame = Game<Log, MemoryConnection>;

// =========================================================================
// Helpers
// =========================================================================

fn spawn_hub() -> (Arc<TestHub>, JoinHandle<()>, CancellationToken) {
    let token = CancellationToken::new();
    let (hub, handle) = Hub::spawn(
        "broadcast",
        HubConfig::default(),
        Broadcast::default(),
        token.clone(),
    );
    (hub, handle, token)
}

fn register_game(hub: &TestHub, id: &str, players: &[&str]) -> Arc<TestGame> {
    let info = GameInfo {
        id: GameId::from(id),
        status: GameStatus::Pending,
        creator_id: PlayerId::from(players.first().copied().unwrap_or("nobody")),
        created_at: 0,
        lobby_id: LobbyId::from("lobby"),
    };
    let game = Game::new(info, hub.new_state());
    for (i, p) in players.iter().enumerate() {
        let profile = PlayerProfile {
            id: PlayerId::from(*p),
            username: p.to_string(),
            avatar_id: 1,
        };
        game.insert_player(Player::human(profile, game.id().clone(), i + 1));
    }
    hub.insert_game(game)
}

/// Attaches a fresh in-memory connection to `player` and starts both
/// pumps. Returns the client side and the reader task.
async fn connect(
    hub: &Arc<TestHub>,
    game: &TestGame,
    player: &str,
) -> (MemoryPeer, JoinHandle<()>) {
    let player = game.player(&PlayerId::from(player)).expect("registered");
    let (conn, peer) = MemoryConnection::pair();
    let attachment = player
        .attach(Arc::new(conn), hub.config().mailbox_capacity)
        .await;
    let reader = start_pumps(hub, &player, attachment);
    (peer, tokio::spawn(reader.run()))
}

async fn recv(peer: &mut MemoryPeer) -> Option<Vec<u8>> {
    tokio::time::timeout(Duration::from_secs(2), peer.recv())
        .await
        .expect("peer should receive in time")
}

async fn finishes(handle: JoinHandle<()>) {
    tokio::time::timeout(Duration::from_secs(2), handle)
        .await
        .expect("task should finish in time")
        .expect("task should not panic");
}

// =========================================================================
// Routing through the pumps
// =========================================================================

#[tokio::test]
async fn test_message_is_broadcast_to_every_connected_player() {
    let (hub, _routing, _token) = spawn_hub();
    let game = register_game(&hub, "g1", &["a", "b"]);
    let (mut a, _ra) = connect(&hub, &game, "a").await;
    let (mut b, _rb) = connect(&hub, &game, "b").await;

    a.send(b"hello".to_vec()).expect("send");

    assert_eq!(recv(&mut a).await.as_deref(), Some(&b"hello"[..]));
    assert_eq!(recv(&mut b).await.as_deref(), Some(&b"hello"[..]));
    assert_eq!(game.state().received, vec![b"hello".to_vec()]);
}

#[tokio::test]
async fn test_messages_arrive_in_dispatch_order() {
    let (hub, _routing, _token) = spawn_hub();
    let game = register_game(&hub, "g1", &["a"]);
    let (mut a, _ra) = connect(&hub, &game, "a").await;

    for i in 0..20u8 {
        a.send(vec![i]).expect("send");
    }
    for i in 0..20u8 {
        assert_eq!(recv(&mut a).await, Some(vec![i]));
    }
}

#[tokio::test]
async fn test_callback_error_does_not_stop_reader() {
    let (hub, _routing, _token) = spawn_hub();
    let game = register_game(&hub, "g1", &["a"]);
    let (mut a, reader) = connect(&hub, &game, "a").await;

    a.send(b"bad".to_vec()).expect("send");
    a.send(b"good".to_vec()).expect("send");

    assert_eq!(recv(&mut a).await.as_deref(), Some(&b"good"[..]));
    assert!(!reader.is_finished());
}

#[tokio::test]
async fn test_unknown_game_dispatch_does_not_stop_routing() {
    let (hub, _routing, _token) = spawn_hub();
    let game = register_game(&hub, "g1", &["a"]);
    let (mut a, _ra) = connect(&hub, &game, "a").await;

    hub.dispatch(DispatchMessage::new(
        GameId::from("ghost"),
        [PlayerId::from("a")],
        b"lost".to_vec(),
    ))
    .await
    .expect("dispatch");
    a.send(b"after".to_vec()).expect("send");

    assert_eq!(recv(&mut a).await.as_deref(), Some(&b"after"[..]));
}

// =========================================================================
// Leaving and reconnecting
// =========================================================================

#[tokio::test]
async fn test_hang_up_kicks_player_and_fires_left() {
    let (hub, _routing, _token) = spawn_hub();
    let game = register_game(&hub, "g1", &["a"]);
    let (mut a, reader) = connect(&hub, &game, "a").await;

    a.hang_up();
    finishes(reader).await;

    let player = game.player(&PlayerId::from("a")).unwrap();
    assert!(player.is_closed());
    assert!(!player.is_connected());
    assert_eq!(a.close_calls(), 1);
    assert_eq!(hub.logic().left.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_reconnect_keeps_new_connection_alive() {
    let (hub, _routing, _token) = spawn_hub();
    let game = register_game(&hub, "g1", &["a"]);
    let (old, old_reader) = connect(&hub, &game, "a").await;
    let (mut new, new_reader) = connect(&hub, &game, "a").await;

    // The superseded reader stops without tearing down its successor.
    finishes(old_reader).await;
    assert_eq!(old.close_calls(), 1);
    assert_eq!(new.close_calls(), 0);
    assert_eq!(hub.logic().left.load(Ordering::SeqCst), 0);

    new.send(b"still here".to_vec()).expect("send");
    assert_eq!(recv(&mut new).await.as_deref(), Some(&b"still here"[..]));
    assert!(!new_reader.is_finished());
}

#[tokio::test]
async fn test_remove_game_ends_readers() {
    let (hub, _routing, _token) = spawn_hub();
    let game = register_game(&hub, "g1", &["a", "b"]);
    let (a, ra) = connect(&hub, &game, "a").await;
    let (b, rb) = connect(&hub, &game, "b").await;

    hub.remove_game(&GameId::from("g1")).await;

    finishes(ra).await;
    finishes(rb).await;
    assert!(a.is_closed());
    assert!(b.is_closed());
    assert!(hub.find_game(&GameId::from("g1")).is_none());
}

// =========================================================================
// Shutdown
// =========================================================================

#[tokio::test]
async fn test_shutdown_drains_every_connection() {
    let (hub, routing, token) = spawn_hub();

    let mut peers = Vec::new();
    let mut readers = Vec::new();
    for g in 0..4 {
        let ids: Vec<String> = (0..5).map(|p| format!("p{g}-{p}")).collect();
        let refs: Vec<&str> = ids.iter().map(String::as_str).collect();
        let game = register_game(&hub, &format!("g{g}"), &refs);
        for id in &refs {
            let (peer, reader) = connect(&hub, &game, id).await;
            peers.push(peer);
            readers.push(reader);
        }
    }

    // Every client stays silent, so every reader is parked in recv.
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(readers.iter().all(|r| !r.is_finished()));

    token.cancel();

    finishes(routing).await;
    for reader in readers {
        finishes(reader).await;
    }
    for peer in &peers {
        assert!(peer.is_closed());
        assert_eq!(peer.close_calls(), 1);
    }
}

#[tokio::test]
async fn test_dispatch_after_shutdown_is_rejected() {
    let (hub, routing, token) = spawn_hub();
    token.cancel();
    finishes(routing).await;

    let result = hub.try_dispatch(DispatchMessage::new(
        GameId::from("g"),
        [PlayerId::from("a")],
        b"x".to_vec(),
    ));
    assert!(result.is_err());
}
