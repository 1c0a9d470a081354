//! WebSocket transport implementation using `tokio-tungstenite`.

use std::net::SocketAddr;
use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::handshake::server::{
    ErrorResponse, Request, Response,
};
use tokio_tungstenite::tungstenite::http::{StatusCode, Uri, header};
use tokio_util::sync::CancellationToken;

use crate::{Connection, ConnectionId, Transport, TransportError};

/// How long `close` waits for the close frame to be flushed.
const CLOSE_FLUSH_TIMEOUT: Duration = Duration::from_secs(1);

type WsStream = tokio_tungstenite::WebSocketStream<tokio::net::TcpStream>;

/// Default time allowed for a client to complete the HTTP upgrade.
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// A WebSocket-based [`Transport`] that listens for incoming connections.
pub struct WebSocketTransport {
    listener: TcpListener,
    options: UpgradeOptions,
}

/// How a [`PendingUpgrade`] performs its handshake.
#[derive(Debug, Clone)]
pub struct UpgradeOptions {
    /// Upper bound on the whole HTTP upgrade.
    pub handshake_timeout: Duration,
    /// Accepted values of the `Origin` header. Empty accepts any origin,
    /// including requests without one.
    pub allowed_origins: Vec<String>,
}

impl Default for UpgradeOptions {
    fn default() -> Self {
        Self {
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
            allowed_origins: Vec::new(),
        }
    }
}

impl UpgradeOptions {
    fn origin_allowed(&self, origin: Option<&str>) -> bool {
        if self.allowed_origins.is_empty() {
            return true;
        }
        origin.is_some_and(|origin| {
            self.allowed_origins
                .iter()
                .any(|allowed| allowed.trim_end_matches('/') == origin)
        })
    }
}

impl WebSocketTransport {
    /// Binds a new WebSocket transport to the given address.
    pub async fn bind(addr: &str) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(TransportError::AcceptFailed)?;
        tracing::info!(addr, "WebSocket transport listening");
        Ok(Self {
            listener,
            options: UpgradeOptions::default(),
        })
    }

    /// Sets the handshake options used by [`Transport::accept`].
    pub fn with_options(mut self, options: UpgradeOptions) -> Self {
        self.options = options;
        self
    }

    /// Returns the local address the listener is bound to.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accepts the next TCP connection without upgrading it.
    ///
    /// Servers call this in their accept loop and run
    /// [`PendingUpgrade::upgrade`] on a per-connection task, so a client
    /// that never finishes its handshake only holds up itself.
    pub async fn accept_tcp(&self) -> Result<PendingUpgrade, TransportError> {
        let (stream, addr) = self
            .listener
            .accept()
            .await
            .map_err(TransportError::AcceptFailed)?;
        Ok(PendingUpgrade {
            stream,
            addr,
            options: self.options.clone(),
        })
    }
}

impl Transport for WebSocketTransport {
    type Connection = WebSocketConnection;
    type Error = TransportError;

    async fn accept(&mut self) -> Result<Self::Connection, Self::Error> {
        self.accept_tcp().await?.upgrade().await
    }

    async fn shutdown(&self) -> Result<(), Self::Error> {
        Ok(())
    }
}

/// An accepted TCP stream that has not been upgraded yet.
pub struct PendingUpgrade {
    stream: TcpStream,
    addr: SocketAddr,
    options: UpgradeOptions,
}

impl PendingUpgrade {
    pub fn peer_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Runs the HTTP upgrade, bounded by the handshake timeout. Requests
    /// from an origin outside the allow list get a `403` and no
    /// connection.
    pub async fn upgrade(self) -> Result<WebSocketConnection, TransportError> {
        let Self {
            stream,
            addr,
            options,
        } = self;

        // The join endpoint routes on the upgrade request's path and query,
        // so keep the URI around for the handler.
        let mut request_uri = Uri::default();
        let mut rejected_origin = None;
        let handshake = tokio_tungstenite::accept_hdr_async(
            stream,
            |req: &Request, resp: Response| -> Result<Response, ErrorResponse> {
                let origin = req
                    .headers()
                    .get(header::ORIGIN)
                    .and_then(|value| value.to_str().ok());
                if !options.origin_allowed(origin) {
                    rejected_origin = Some(origin.unwrap_or_default().to_string());
                    let mut forbidden =
                        ErrorResponse::new(Some("origin not allowed".to_string()));
                    *forbidden.status_mut() = StatusCode::FORBIDDEN;
                    return Err(forbidden);
                }
                request_uri = req.uri().clone();
                Ok(resp)
            },
        );

        let ws = match tokio::time::timeout(options.handshake_timeout, handshake).await {
            Ok(Ok(ws)) => ws,
            Ok(Err(e)) => {
                if let Some(origin) = rejected_origin {
                    tracing::info!(%addr, %origin, "upgrade from disallowed origin refused");
                    return Err(TransportError::OriginRejected(origin));
                }
                return Err(TransportError::AcceptFailed(std::io::Error::new(
                    std::io::ErrorKind::ConnectionRefused,
                    e,
                )));
            }
            Err(_) => {
                tracing::debug!(%addr, "handshake timed out");
                return Err(TransportError::HandshakeTimedOut(options.handshake_timeout));
            }
        };

        let id = ConnectionId::next();
        tracing::debug!(%id, %addr, uri = %request_uri, "accepted WebSocket connection");

        let (sink, stream) = ws.split();
        Ok(WebSocketConnection {
            id,
            request_uri,
            sink: Mutex::new(sink),
            stream: Mutex::new(stream),
            closed: CancellationToken::new(),
        })
    }
}

/// A single WebSocket connection.
///
/// The stream is split so a writer can send while a reader is parked in
/// `recv`. `close` cancels a token that both halves watch, so neither side
/// stays blocked on a peer that has gone quiet.
pub struct WebSocketConnection {
    id: ConnectionId,
    request_uri: Uri,
    sink: Mutex<SplitSink<WsStream, Message>>,
    stream: Mutex<SplitStream<WsStream>>,
    closed: CancellationToken,
}

impl WebSocketConnection {
    /// The target of the HTTP upgrade request, e.g.
    /// `/games/abc/join?ticketId=t1`.
    pub fn request_uri(&self) -> &Uri {
        &self.request_uri
    }

    /// Returns `true` once `close` has been called.
    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }
}

impl Connection for WebSocketConnection {
    type Error = TransportError;

    async fn send(&self, data: &[u8]) -> Result<(), Self::Error> {
        let msg = Message::Binary(data.to_vec().into());
        tokio::select! {
            _ = self.closed.cancelled() => Err(TransportError::ConnectionClosed(
                "closed locally".into(),
            )),
            result = async { self.sink.lock().await.send(msg).await } => {
                result.map_err(|e| {
                    TransportError::SendFailed(std::io::Error::new(
                        std::io::ErrorKind::BrokenPipe,
                        e,
                    ))
                })
            }
        }
    }

    async fn recv(&self) -> Result<Option<Vec<u8>>, Self::Error> {
        let mut stream = tokio::select! {
            _ = self.closed.cancelled() => return Ok(None),
            guard = self.stream.lock() => guard,
        };
        loop {
            let msg = tokio::select! {
                _ = self.closed.cancelled() => return Ok(None),
                msg = stream.next() => msg,
            };
            match msg {
                Some(Ok(Message::Binary(data))) => {
                    return Ok(Some(data.into()));
                }
                Some(Ok(Message::Text(text))) => {
                    return Ok(Some(text.as_bytes().to_vec()));
                }
                Some(Ok(Message::Close(_))) | None => return Ok(None),
                Some(Ok(_)) => continue, // skip ping/pong/frame
                Some(Err(e)) => {
                    return Err(TransportError::ReceiveFailed(
                        std::io::Error::new(
                            std::io::ErrorKind::ConnectionReset,
                            e,
                        ),
                    ));
                }
            }
        }
    }

    async fn close(&self) -> Result<(), Self::Error> {
        if self.closed.is_cancelled() {
            return Ok(());
        }
        self.closed.cancel();

        // Best effort: a peer that stopped reading must not hold us here.
        match tokio::time::timeout(CLOSE_FLUSH_TIMEOUT, async {
            self.sink.lock().await.close().await
        })
        .await
        {
            Ok(result) => result.map_err(|e| {
                TransportError::SendFailed(std::io::Error::new(
                    std::io::ErrorKind::BrokenPipe,
                    e,
                ))
            }),
            Err(_) => {
                tracing::debug!(id = %self.id, "close frame flush timed out");
                Ok(())
            }
        }
    }

    fn id(&self) -> ConnectionId {
        self.id
    }
}
