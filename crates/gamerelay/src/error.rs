//! Unified error type for gamerelay.

use gamerelay_hub::HubError;
use gamerelay_protocol::ProtocolError;
use gamerelay_service::ServiceError;
use gamerelay_transport::TransportError;

use crate::handler::JoinUriError;

/// Top-level error that wraps every crate-specific error, so the `?`
/// operator works across layers.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Hub(#[from] HubError),

    #[error(transparent)]
    Service(#[from] ServiceError),

    /// The upgrade request did not name a game and ticket.
    #[error(transparent)]
    JoinUri(#[from] JoinUriError),

    #[error("invalid configuration: {0}")]
    Config(#[from] serde_json::Error),

    #[error("could not read configuration: {0}")]
    Io(#[from] std::io::Error),
}
