//! The single active client connection.
//!
//! # Responsibilities
//! - Own the 0-or-1 live client socket
//! - Generate unique connection IDs for tracing
//! - Perform one bounded read per readiness event
//! - Classify orderly and abrupt disconnects

use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use tokio::net::TcpStream;

/// Global atomic counter for connection IDs.
/// Using relaxed ordering is sufficient since we only need uniqueness, not synchronization.
static CONNECTION_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Take the next ID; only attaching a client does this.
    pub(crate) fn new() -> Self {
        Self(CONNECTION_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Why a connection went away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// Peer closed its write side (read returned 0).
    Eof,
    /// Read failed; treated exactly like an orderly close.
    Error(io::ErrorKind),
    /// Closed by the server during shutdown.
    Shutdown,
}

/// Result of one read on the active connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOutcome {
    /// Bytes arrived; only the count is kept.
    Data(usize),
    /// The peer is gone. The caller must `disconnect`.
    Closed(CloseReason),
    /// Interrupted, spurious readiness, or no connection. Nothing changed.
    Transient,
}

/// Summary of a connection after it was closed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClosedConnection {
    pub id: ConnectionId,
    pub peer: SocketAddr,
    pub bytes_received: u64,
    pub duration: Duration,
}

#[derive(Debug)]
struct ActiveConnection {
    stream: TcpStream,
    peer: SocketAddr,
    id: ConnectionId,
    bytes_received: u64,
    opened_at: Instant,
}

/// Slot holding at most one client socket.
#[derive(Debug)]
pub struct Connection {
    active: Option<ActiveConnection>,
    buffer: Vec<u8>,
}

impl Connection {
    /// Create an empty slot that reads up to `read_buffer_size` bytes at a time.
    pub fn new(read_buffer_size: usize) -> Self {
        Self {
            active: None,
            buffer: vec![0; read_buffer_size.max(1)],
        }
    }

    /// Whether a client is currently attached.
    pub fn is_present(&self) -> bool {
        self.active.is_some()
    }

    /// Peer address of the active client.
    pub fn peer(&self) -> Option<SocketAddr> {
        self.active.as_ref().map(|a| a.peer)
    }

    /// Make `stream` the active connection.
    ///
    /// Hands the stream back if the slot is already occupied.
    pub(crate) fn attach(
        &mut self,
        stream: TcpStream,
        peer: SocketAddr,
    ) -> Result<ConnectionId, TcpStream> {
        if self.active.is_some() {
            return Err(stream);
        }
        let id = ConnectionId::new();
        self.active = Some(ActiveConnection {
            stream,
            peer,
            id,
            bytes_received: 0,
            opened_at: Instant::now(),
        });
        Ok(id)
    }

    /// Wait until the active socket is readable.
    ///
    /// Cancel safe. Never resolves when the slot is empty.
    pub async fn readable(&self) -> io::Result<()> {
        match &self.active {
            Some(active) => active.stream.readable().await,
            None => std::future::pending().await,
        }
    }

    /// Perform one read of up to the configured buffer size.
    pub fn read_available(&mut self) -> ReadOutcome {
        let Some(active) = self.active.as_mut() else {
            return ReadOutcome::Transient;
        };

        match active.stream.try_read(&mut self.buffer) {
            Ok(0) => ReadOutcome::Closed(CloseReason::Eof),
            Ok(n) => {
                active.bytes_received += n as u64;
                tracing::info!(
                    connection_id = %active.id,
                    bytes = n,
                    "Received bytes"
                );
                ReadOutcome::Data(n)
            }
            Err(e)
                if e.kind() == io::ErrorKind::Interrupted
                    || e.kind() == io::ErrorKind::WouldBlock =>
            {
                ReadOutcome::Transient
            }
            Err(e) => {
                tracing::debug!(connection_id = %active.id, error = %e, "Read failed");
                ReadOutcome::Closed(CloseReason::Error(e.kind()))
            }
        }
    }

    /// Close the active socket and empty the slot.
    ///
    /// Returns `None` if there was nothing to close, so repeated calls never
    /// report the same disconnect twice.
    pub fn disconnect(&mut self) -> Option<ClosedConnection> {
        let active = self.active.take()?;
        let closed = ClosedConnection {
            id: active.id,
            peer: active.peer,
            bytes_received: active.bytes_received,
            duration: active.opened_at.elapsed(),
        };
        drop(active.stream);
        tracing::trace!(connection_id = %closed.id, "Connection closed");
        Some(closed)
    }
}
