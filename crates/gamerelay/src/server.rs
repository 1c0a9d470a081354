//! `RelayServer` builder and accept loop.
//!
//! This is the entry point for running a relay. It ties the layers
//! together: transport → join handler → game service → hub.

use std::sync::Arc;

use gamerelay_hub::GameLogic;
use gamerelay_service::{GameService, LobbyRepository, Publisher, UserRepository};
use gamerelay_transport::{Transport, WebSocketConnection, WebSocketTransport};
use tokio_util::sync::CancellationToken;

use crate::handler::handle_connection;
use crate::{RelayError, ServerConfig};

/// The game service type the relay serves over WebSockets.
pub type RelayService<G, U, L, P> = GameService<G, WebSocketConnection, U, L, P>;

/// Builder for configuring and starting a relay server.
///
/// # Example
///
/// ```rust,ignore
/// let server = RelayServerBuilder::new()
///     .bind("0.0.0.0:8080")
///     .build(service)
///     .await?;
/// server.run().await
/// ```
pub struct RelayServerBuilder {
    config: ServerConfig,
    shutdown: Option<CancellationToken>,
}

impl RelayServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            config: ServerConfig::default(),
            shutdown: None,
        }
    }

    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.config.bind_addr = addr.to_string();
        self
    }

    pub fn join_path_prefix(mut self, prefix: &str) -> Self {
        self.config.join_path_prefix = prefix.to_string();
        self
    }

    /// Bounds how long a client may take to finish the upgrade.
    pub fn handshake_timeout(mut self, timeout: std::time::Duration) -> Self {
        self.config.handshake_timeout_ms =
            u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Only accepts upgrades whose `Origin` header is in `origins`.
    pub fn allowed_origins<I, S>(mut self, origins: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.allowed_origins = origins.into_iter().map(Into::into).collect();
        self
    }

    /// Stops the accept loop when `token` fires. Defaults to the hub's
    /// shutdown token.
    pub fn shutdown(mut self, token: CancellationToken) -> Self {
        self.shutdown = Some(token);
        self
    }

    /// Binds the listener.
    pub async fn build<G, U, L, P>(
        self,
        service: Arc<RelayService<G, U, L, P>>,
    ) -> Result<RelayServer<G, U, L, P>, RelayError>
    where
        G: GameLogic,
        U: UserRepository,
        L: LobbyRepository,
        P: Publisher,
    {
        let transport = WebSocketTransport::bind(&self.config.bind_addr)
            .await?
            .with_options(self.config.upgrade_options());
        let shutdown = self
            .shutdown
            .unwrap_or_else(|| service.hub().shutdown_token().clone());
        Ok(RelayServer {
            transport,
            service,
            join_path_prefix: Arc::from(self.config.join_path_prefix),
            shutdown,
        })
    }
}

impl Default for RelayServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound relay server.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct RelayServer<G, U, L, P>
where
    G: GameLogic,
{
    transport: WebSocketTransport,
    service: Arc<RelayService<G, U, L, P>>,
    join_path_prefix: Arc<str>,
    shutdown: CancellationToken,
}

impl<G, U, L, P> RelayServer<G, U, L, P>
where
    G: GameLogic,
    U: UserRepository,
    L: LobbyRepository,
    P: Publisher,
{
    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.transport.local_addr()
    }

    pub fn service(&self) -> &Arc<RelayService<G, U, L, P>> {
        &self.service
    }

    /// Accepts connections and spawns a handler task for each, until the
    /// shutdown token fires. The WebSocket upgrade runs on the handler
    /// task, so a slow handshake never stalls the accept loop.
    ///
    /// Stopping the accept loop does not touch live connections; those are
    /// closed by the hub when the same token reaches its routing loop.
    pub async fn run(self) -> Result<(), RelayError> {
        tracing::info!(
            game_slug = %self.service.hub().game_slug(),
            "relay server running"
        );

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                accepted = self.transport.accept_tcp() => match accepted {
                    Ok(pending) => {
                        let service = Arc::clone(&self.service);
                        let prefix = Arc::clone(&self.join_path_prefix);
                        tokio::spawn(async move {
                            if let Err(e) = handle_connection(pending, service, prefix).await {
                                tracing::debug!(error = %e, "connection ended with error");
                            }
                        });
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "accept failed");
                    }
                },
            }
        }

        self.transport.shutdown().await?;
        tracing::info!("relay server stopped");
        Ok(())
    }
}
