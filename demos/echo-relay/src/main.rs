use gamerelay::prelude::*;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Game types
// ---------------------------------------------------------------------------

const HISTORY_LIMIT: usize = 50;

#[derive(Deserialize)]
struct Say {
    text: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
struct Line {
    seat: usize,
    from: String,
    text: String,
}

#[derive(Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
enum Event {
    Said(Line),
    History { lines: Vec<Line> },
}

#[derive(Default)]
struct Chat {
    lines: Vec<Line>,
}

// ---------------------------------------------------------------------------
// Game logic
// ---------------------------------------------------------------------------

/// A table chat: every line is relayed to every seat, and late joiners get
/// the recent history.
struct EchoRoom;

fn encode(event: &Event) -> Result<Vec<u8>, CallbackError> {
    serde_json::to_vec(event).map_err(CallbackError::new)
}

impl GameLogic for EchoRoom {
    type State = Chat;

    fn new_state(&self) -> Chat {
        Chat::default()
    }

    fn on_message_received<C: Connection>(
        &self,
        hub: &Hub<Self, C>,
        game: &Game<Chat, C>,
        player: &Player<C>,
        message: &[u8],
    ) -> Result<(), CallbackError> {
        let say: Say = serde_json::from_slice(message).map_err(CallbackError::new)?;
        if say.text.trim().is_empty() {
            return Err(CallbackError::msg("empty line"));
        }

        let line = Line {
            seat: player.index(),
            from: player.username().to_string(),
            text: say.text,
        };
        {
            let mut chat = game.state();
            chat.lines.push(line.clone());
            if chat.lines.len() > HISTORY_LIMIT {
                let excess = chat.lines.len() - HISTORY_LIMIT;
                chat.lines.drain(..excess);
            }
        }

        let body = encode(&Event::Said(line))?;
        hub.try_dispatch(DispatchMessage::new(game.id().clone(), game.player_ids(), body))
            .map_err(CallbackError::new)
    }

    fn on_player_joined<C: Connection>(
        &self,
        hub: &Hub<Self, C>,
        game: &Game<Chat, C>,
        player: &Player<C>,
    ) -> Result<(), CallbackError> {
        let lines = game.state().lines.clone();
        let body = encode(&Event::History { lines })?;
        hub.try_dispatch(DispatchMessage::new(game.id().clone(), [player.id().clone()], body))
            .map_err(CallbackError::new)
    }

    fn on_player_left<C: Connection>(
        &self,
        _hub: &Hub<Self, C>,
        game: &Game<Chat, C>,
        player: &Player<C>,
    ) -> Result<(), CallbackError> {
        tracing::info!(game_id = %game.id(), player = %player.username(), "left the table");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Server bootstrap
// ---------------------------------------------------------------------------

fn demo_lobby() -> Lobby {
    Lobby {
        id: LobbyId::from("demo"),
        players: ["alice", "bob"]
            .into_iter()
            .enumerate()
            .map(|(i, name)| LobbyPlayer {
                id: PlayerId::from(name),
                username: name.to_string(),
                avatar_id: i as u8,
            })
            .collect(),
        bots: vec![LobbyBot {
            id: 1,
            username: "parrot".to_string(),
            avatar_id: 9,
        }],
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    gamerelay::init_tracing();

    let config = match std::env::args().nth(1) {
        Some(path) => RelayConfig::from_file(path)?,
        None => RelayConfig {
            game_slug: "echo".to_string(),
            ..RelayConfig::default()
        },
    };

    let token = CancellationToken::new();
    let (hub, routing) =
        Hub::spawn(config.game_slug.clone(), config.hub.clone(), EchoRoom, token.clone());

    let lobby = demo_lobby();
    let tickets = StaticTickets::new();
    for member in &lobby.players {
        tickets.issue_reusable(format!("ticket-{}", member.id), member.id.clone());
    }
    let lobbies = InMemoryLobbies::new();
    lobbies.insert(lobby.clone());

    let service = Arc::new(GameService::new(hub, tickets, lobbies, TracingPublisher));
    let game_id = service
        .create(
            &PlayerId::from("alice"),
            CreateGameRequest {
                lobby_id: lobby.id.clone(),
            },
        )
        .await?
        .game_id;

    let server = RelayServerBuilder::new()
        .config(config.server.clone())
        .build(Arc::clone(&service))
        .await?;
    let addr = server.local_addr()?;
    for member in &lobby.players {
        tracing::info!(
            player = %member.username,
            url = %format!(
                "ws://{addr}{}/{game_id}/join?{}=ticket-{}",
                config.server.join_path_prefix.trim_end_matches('/'),
                gamerelay::TICKET_PARAM,
                member.id
            ),
            "join url"
        );
    }

    let shutdown = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("ctrl-c received, shutting down");
            shutdown.cancel();
        }
    });

    server.run().await?;
    routing.await?;
    Ok(())
}
