//! Per-connection handler for the join endpoint.
//!
//! Each accepted TCP stream gets its own Tokio task running this handler.
//! The flow is:
//!   1. Finish the WebSocket upgrade (time-boxed, origin-checked)
//!   2. Parse `{prefix}/{game_id}/join?ticketId=...` from the upgrade URI
//!   3. `GameService::join` → reconnect the player, start the writer
//!   4. Run the reader pump until the connection ends
//!
//! If step 2 or 3 fails the peer gets one [`ErrorResponse`] payload and
//! the connection is closed.

use std::sync::Arc;

use gamerelay_hub::GameLogic;
use gamerelay_protocol::{ErrorResponse, GameId};
use gamerelay_service::{GameService, LobbyRepository, Publisher, UserRepository};
use gamerelay_transport::{Connection, PendingUpgrade, Uri, WebSocketConnection};

use url::form_urlencoded;

use crate::RelayError;

/// Query parameter carrying the join ticket.
pub const TICKET_PARAM: &str = "ticketId";

/// Why an upgrade URI is not a join request.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum JoinUriError {
    #[error("path must look like {prefix}/{{gameId}}/join")]
    BadPath { prefix: String },

    #[error("missing ticketId query parameter")]
    MissingTicket,
}

/// A parsed join request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinRequest {
    pub game_id: GameId,
    pub ticket: String,
}

impl JoinRequest {
    /// Parses a request target such as `/games/abc/join?ticketId=t1`.
    pub fn parse(uri: &str, prefix: &str) -> Result<Self, JoinUriError> {
        let uri: Uri = uri.parse().map_err(|_| JoinUriError::BadPath {
            prefix: prefix.to_string(),
        })?;
        Self::from_uri(&uri, prefix)
    }

    /// Extracts the game id from the path and the percent-decoded ticket
    /// from the query.
    pub fn from_uri(uri: &Uri, prefix: &str) -> Result<Self, JoinUriError> {
        let bad_path = || JoinUriError::BadPath {
            prefix: prefix.to_string(),
        };

        let rest = uri
            .path()
            .strip_prefix(prefix.trim_end_matches('/'))
            .and_then(|rest| rest.strip_prefix('/'))
            .ok_or_else(bad_path)?;
        let game_id = rest
            .trim_end_matches('/')
            .strip_suffix("/join")
            .filter(|id| !id.is_empty() && !id.contains('/'))
            .ok_or_else(bad_path)?;

        let ticket = form_urlencoded::parse(uri.query().unwrap_or_default().as_bytes())
            .find(|(key, _)| key == TICKET_PARAM)
            .map(|(_, value)| value.into_owned())
            .filter(|value| !value.is_empty())
            .ok_or(JoinUriError::MissingTicket)?;

        Ok(Self {
            game_id: GameId::from(game_id),
            ticket,
        })
    }
}

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<G, U, L, P>(
    pending: PendingUpgrade,
    service: Arc<GameService<G, WebSocketConnection, U, L, P>>,
    join_path_prefix: Arc<str>,
) -> Result<(), RelayError>
where
    G: GameLogic,
    U: UserRepository,
    L: LobbyRepository,
    P: Publisher,
{
    let conn = Arc::new(pending.upgrade().await?);
    let conn_id = conn.id();

    let request = match JoinRequest::from_uri(conn.request_uri(), &join_path_prefix) {
        Ok(request) => request,
        Err(e) => {
            tracing::debug!(%conn_id, uri = %conn.request_uri(), error = %e, "rejecting upgrade");
            reject(&conn, &e.to_string()).await;
            return Err(e.into());
        }
    };

    match service
        .join(&request.game_id, &request.ticket, Arc::clone(&conn))
        .await
    {
        Ok(reader) => {
            tracing::debug!(%conn_id, game_id = %request.game_id, "reader taking over");
            reader.run().await;
            Ok(())
        }
        Err(e) => {
            tracing::info!(%conn_id, game_id = %request.game_id, error = %e, "join failed");
            reject(&conn, &e.to_string()).await;
            Err(e.into())
        }
    }
}

/// Sends an error payload, then closes. Both steps are best-effort.
async fn reject(conn: &WebSocketConnection, message: &str) {
    match ErrorResponse::new(message).encode() {
        Ok(body) => {
            if let Err(e) = conn.send(&body).await {
                tracing::debug!(conn_id = %conn.id(), error = %e, "could not send error payload");
            }
        }
        Err(e) => tracing::warn!(error = %e, "could not encode error payload"),
    }
    if let Err(e) = conn.close().await {
        tracing::debug!(conn_id = %conn.id(), error = %e, "could not close rejected connection");
    }
}
