//! TCP listener with a one-client admission policy.
//!
//! # Responsibilities
//! - Bind to the configured address with address reuse enabled
//! - Accept incoming TCP connections
//! - Admit at most one client; close every other one on arrival
//! - Graceful handling of accept errors

use std::io;
use std::net::SocketAddr;

use thiserror::Error;
use tokio::net::{TcpListener, TcpSocket, TcpStream};

use crate::config::ListenerConfig;
use crate::net::connection::{Connection, ConnectionId};

/// Error type for listener operations.
#[derive(Debug, Error)]
pub enum ListenerError {
    /// The bind address did not parse.
    #[error("Invalid bind address {0:?}")]
    Address(String),

    /// Failed to create or bind the socket.
    #[error("Failed to bind: {0}")]
    Bind(#[source] io::Error),

    /// Failed to mark the socket listening.
    #[error("Failed to listen: {0}")]
    Listen(#[source] io::Error),

    /// Failed to accept connection.
    #[error("Failed to accept: {0}")]
    Accept(#[source] io::Error),
}

impl ListenerError {
    /// Whether the loop should simply try again on its next pass.
    pub fn is_transient(&self) -> bool {
        matches!(self, ListenerError::Accept(_))
    }
}

/// What happened to a freshly accepted socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// It became the active connection.
    Admitted(ConnectionId),
    /// Another client was active; the socket was closed unread.
    Rejected,
}

/// The listening socket.
pub struct Listener {
    /// `None` once closed.
    inner: Option<TcpListener>,
    local_addr: SocketAddr,
}

impl Listener {
    /// Create, bind and listen on the configured address.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn open(config: &ListenerConfig) -> Result<Self, ListenerError> {
        let addr: SocketAddr = config
            .bind_address
            .parse()
            .map_err(|_| ListenerError::Address(config.bind_address.clone()))?;

        let socket = if addr.is_ipv4() {
            TcpSocket::new_v4()
        } else {
            TcpSocket::new_v6()
        }
        .map_err(ListenerError::Bind)?;

        socket.set_reuseaddr(true).map_err(ListenerError::Bind)?;
        socket.bind(addr).map_err(ListenerError::Bind)?;
        let listener = socket.listen(config.backlog).map_err(ListenerError::Listen)?;

        let local_addr = listener.local_addr().map_err(ListenerError::Bind)?;

        tracing::info!(
            address = %local_addr,
            backlog = config.backlog,
            "Listener bound"
        );

        Ok(Self {
            inner: Some(listener),
            local_addr,
        })
    }

    /// Accept a new connection.
    ///
    /// Cancel safe. Never resolves once the listener is closed.
    pub async fn accept(&self) -> Result<(TcpStream, SocketAddr), ListenerError> {
        match &self.inner {
            Some(listener) => listener.accept().await.map_err(ListenerError::Accept),
            None => std::future::pending().await,
        }
    }

    /// Apply the admission policy to an accepted socket.
    pub fn admit(
        &self,
        connection: &mut Connection,
        stream: TcpStream,
        peer: SocketAddr,
    ) -> Admission {
        match connection.attach(stream, peer) {
            Ok(id) => {
                tracing::info!(connection_id = %id, peer_addr = %peer, "Connection accepted");
                Admission::Admitted(id)
            }
            Err(stream) => {
                drop(stream);
                tracing::info!(
                    peer_addr = %peer,
                    active_peer = ?connection.peer(),
                    "Connection immediately closed"
                );
                Admission::Rejected
            }
        }
    }

    /// Get the local address this listener is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn is_open(&self) -> bool {
        self.inner.is_some()
    }

    /// Release the listening socket. Idempotent.
    pub fn close(&mut self) {
        if self.inner.take().is_some() {
            tracing::debug!(address = %self.local_addr, "Listener closed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;

    fn loopback() -> ListenerConfig {
        ListenerConfig {
            bind_address: "127.0.0.1:0".into(),
            backlog: 4,
        }
    }

    #[tokio::test]
    async fn binds_ephemeral_port() {
        let listener = Listener::open(&loopback()).unwrap();
        assert_ne!(listener.local_addr().port(), 0);
        assert!(listener.is_open());
    }

    #[tokio::test]
    async fn occupied_port_fails_to_bind() {
        let holder = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let config = ListenerConfig {
            bind_address: holder.local_addr().unwrap().to_string(),
            backlog: 4,
        };

        let err = Listener::open(&config).err().expect("bind should fail");
        assert!(matches!(err, ListenerError::Bind(_) | ListenerError::Listen(_)));
        assert!(!err.is_transient());
    }

    #[tokio::test]
    async fn bad_address_is_rejected() {
        let config = ListenerConfig {
            bind_address: "localhost-ish".into(),
            backlog: 4,
        };
        assert!(matches!(
            Listener::open(&config),
            Err(ListenerError::Address(_))
        ));
    }

    #[tokio::test]
    async fn second_client_is_closed_unread() {
        let listener = Listener::open(&loopback()).unwrap();
        let addr = listener.local_addr();
        let mut slot = Connection::new(64);

        let _first = TcpStream::connect(addr).await.unwrap();
        let (stream, peer) = listener.accept().await.unwrap();
        assert!(matches!(
            listener.admit(&mut slot, stream, peer),
            Admission::Admitted(_)
        ));

        let mut second = TcpStream::connect(addr).await.unwrap();
        let (stream, peer) = listener.accept().await.unwrap();
        assert_eq!(listener.admit(&mut slot, stream, peer), Admission::Rejected);

        let mut buf = [0u8; 8];
        let n = second.read(&mut buf).await.unwrap_or(0);
        assert_eq!(n, 0);
        assert!(slot.is_present());
    }

    #[tokio::test]
    async fn close_is_idempotent() {
        let mut listener = Listener::open(&loopback()).unwrap();
        listener.close();
        listener.close();
        assert!(!listener.is_open());
    }
}
