//! In-process connection pair.
//!
//! [`MemoryConnection::pair`] returns the server side (a [`Connection`])
//! and a [`MemoryPeer`] that plays the role of the remote client. The peer
//! also counts how many times the server side was closed, which is what
//! the hub's close-exactly-once tests observe.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::{Mutex, mpsc};
use tokio_util::sync::CancellationToken;

use crate::{Connection, ConnectionId, TransportError};

/// Server side of an in-process connection.
pub struct MemoryConnection {
    id: ConnectionId,
    inbound: Mutex<mpsc::UnboundedReceiver<Vec<u8>>>,
    outbound: mpsc::UnboundedSender<Vec<u8>>,
    closed: CancellationToken,
    close_calls: Arc<AtomicUsize>,
}

/// Client side of an in-process connection.
pub struct MemoryPeer {
    id: ConnectionId,
    to_server: Option<mpsc::UnboundedSender<Vec<u8>>>,
    from_server: mpsc::UnboundedReceiver<Vec<u8>>,
    closed: CancellationToken,
    close_calls: Arc<AtomicUsize>,
}

impl MemoryConnection {
    /// Creates a connected pair.
    pub fn pair() -> (MemoryConnection, MemoryPeer) {
        let (client_tx, server_rx) = mpsc::unbounded_channel();
        let (server_tx, client_rx) = mpsc::unbounded_channel();
        let closed = CancellationToken::new();
        let close_calls = Arc::new(AtomicUsize::new(0));
        let id = ConnectionId::next();

        let conn = MemoryConnection {
            id,
            inbound: Mutex::new(server_rx),
            outbound: server_tx,
            closed: closed.clone(),
            close_calls: Arc::clone(&close_calls),
        };
        let peer = MemoryPeer {
            id,
            to_server: Some(client_tx),
            from_server: client_rx,
            closed,
            close_calls,
        };
        (conn, peer)
    }
}

impl Connection for MemoryConnection {
    type Error = TransportError;

    async fn send(&self, data: &[u8]) -> Result<(), Self::Error> {
        if self.closed.is_cancelled() {
            return Err(TransportError::ConnectionClosed(
                "closed locally".into(),
            ));
        }
        self.outbound.send(data.to_vec()).map_err(|_| {
            TransportError::ConnectionClosed("peer dropped".into())
        })
    }

    async fn recv(&self) -> Result<Option<Vec<u8>>, Self::Error> {
        tokio::select! {
            _ = self.closed.cancelled() => Ok(None),
            msg = async { self.inbound.lock().await.recv().await } => Ok(msg),
        }
    }

    async fn close(&self) -> Result<(), Self::Error> {
        self.close_calls.fetch_add(1, Ordering::SeqCst);
        self.closed.cancel();
        Ok(())
    }

    fn id(&self) -> ConnectionId {
        self.id
    }
}

impl MemoryPeer {
    /// The id shared with the server side.
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Sends a payload to the server side.
    pub fn send(&self, data: impl Into<Vec<u8>>) -> Result<(), TransportError> {
        match &self.to_server {
            Some(tx) if !self.closed.is_cancelled() => {
                tx.send(data.into()).map_err(|_| {
                    TransportError::ConnectionClosed("server dropped".into())
                })
            }
            _ => Err(TransportError::ConnectionClosed(
                "connection closed".into(),
            )),
        }
    }

    /// Waits for the next payload from the server side.
    ///
    /// Returns `None` once the server closed the connection and every
    /// payload sent before that has been drained.
    pub async fn recv(&mut self) -> Option<Vec<u8>> {
        tokio::select! {
            biased;
            msg = self.from_server.recv() => msg,
            _ = self.closed.cancelled() => self.from_server.try_recv().ok(),
        }
    }

    /// Drops the client-to-server direction, as a peer hanging up would.
    /// The server's next `recv` returns `Ok(None)`.
    pub fn hang_up(&mut self) {
        self.to_server = None;
    }

    /// Returns `true` once the server side has been closed.
    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }

    /// How many times the server side's `close` has been called.
    pub fn close_calls(&self) -> usize {
        self.close_calls.load(Ordering::SeqCst)
    }
}
