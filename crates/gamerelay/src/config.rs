//! Relay configuration.
//!
//! ```json
//! {
//!   "gameSlug": "six-nimmt",
//!   "hub": { "dispatch_buffer_size": 500, "mailbox_capacity": 50, "overflow": "drop" },
//!   "server": {
//!     "bindAddr": "0.0.0.0:8080",
//!     "joinPathPrefix": "/games",
//!     "handshakeTimeoutMs": 10000,
//!     "allowedOrigins": ["https://play.example.com"]
//!   }
//! }
//! ```
//!
//! Every field is optional.

use std::path::Path;
use std::time::Duration;

use gamerelay_hub::HubConfig;
use gamerelay_transport::UpgradeOptions;
use serde::{Deserialize, Serialize};

use crate::RelayError;

/// WebSocket endpoint settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ServerConfig {
    pub bind_addr: String,
    /// Join URLs look like `{prefix}/{game_id}/join?ticketId=...`.
    pub join_path_prefix: String,
    /// Time a client gets to finish the WebSocket upgrade.
    pub handshake_timeout_ms: u64,
    /// Origins allowed to open a join. Empty allows any origin.
    pub allowed_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
            join_path_prefix: "/games".to_string(),
            handshake_timeout_ms: 10_000,
            allowed_origins: Vec::new(),
        }
    }
}

impl ServerConfig {
    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_millis(self.handshake_timeout_ms.max(1))
    }

    pub(crate) fn upgrade_options(&self) -> UpgradeOptions {
        UpgradeOptions {
            handshake_timeout: self.handshake_timeout(),
            allowed_origins: self.allowed_origins.clone(),
        }
    }
}

/// Everything a relay process needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RelayConfig {
    /// The game type this process serves.
    pub game_slug: String,
    pub hub: HubConfig,
    pub server: ServerConfig,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            game_slug: "game".to_string(),
            hub: HubConfig::default(),
            server: ServerConfig::default(),
        }
    }
}

impl RelayConfig {
    pub fn from_json(json: &str) -> Result<Self, RelayError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, RelayError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }
}
