//! Server setup and the single-client event loop.
//!
//! # Responsibilities
//! - Validate configuration
//! - Install the signal interceptor, then open the listener (fail fast)
//! - Run the event loop until the shutdown threshold is reached
//! - Publish loop progress on a watch channel
//!
//! # Design Decisions
//! - Single-threaded: the loop owns every socket and counter outright
//! - Setup errors and the loop's fatal wait error map to distinct exit codes

mod event_loop;

use std::net::SocketAddr;

use thiserror::Error;
use tokio::sync::watch;

use crate::config::{validate_config, ConfigError, ServerConfig};
use crate::lifecycle::{ShutdownCounter, SignalError, SignalInterceptor};
use crate::net::{Connection, Listener, ListenerError};

use event_loop::EventLoop;

/// Top-level error for running the server.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Signal setup failed: {0}")]
    SignalSetup(#[source] SignalError),

    #[error("Listener setup failed: {0}")]
    Listener(#[from] ListenerError),

    #[error("Event loop wait failed: {0}")]
    Wait(#[source] SignalError),
}

impl ServerError {
    /// Process exit status for this error.
    pub fn exit_code(&self) -> u8 {
        match self {
            ServerError::SignalSetup(_) | ServerError::Listener(_) => 1,
            ServerError::Config(_) => 2,
            ServerError::Wait(_) => 3,
        }
    }
}

/// Loop state as seen from outside.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoopState {
    /// A client is attached.
    Running,
    /// No client; waiting on the listener and the signal only.
    #[default]
    Draining,
    /// Threshold reached (or fatal error); the loop has exited.
    Terminated,
}

/// Snapshot of loop progress, published after every iteration.
///
/// The value returned by [`Server::run`] is the final snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ServerStatus {
    pub state: LoopState,
    /// Qualifying events so far (signals + disconnects).
    pub shutdown_events: u32,
    pub signals: u32,
    pub disconnects: u32,
    pub accepted: u64,
    pub rejected: u64,
    pub bytes_received: u64,
    pub active_peer: Option<SocketAddr>,
}

/// A bound server, ready to run.
pub struct Server {
    event_loop: EventLoop,
    local_addr: SocketAddr,
    status_rx: watch::Receiver<ServerStatus>,
}

impl Server {
    /// Validate `config`, install the signal interceptor and open the listener.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn bind(config: ServerConfig) -> Result<Self, ServerError> {
        validate_config(&config).map_err(ConfigError::Validation)?;

        let interceptor =
            SignalInterceptor::install(config.shutdown.signal).map_err(ServerError::SignalSetup)?;
        let listener = Listener::open(&config.listener)?;
        let local_addr = listener.local_addr();

        let (status_tx, status_rx) = watch::channel(ServerStatus::default());
        let event_loop = EventLoop::new(
            interceptor,
            listener,
            Connection::new(config.connection.read_buffer_size),
            ShutdownCounter::new(config.shutdown.event_threshold),
            status_tx,
        );

        tracing::info!(
            address = %local_addr,
            signal = %config.shutdown.signal,
            threshold = config.shutdown.event_threshold,
            "Server listening"
        );

        Ok(Self {
            event_loop,
            local_addr,
            status_rx,
        })
    }

    /// Address the listener is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Subscribe to loop progress.
    pub fn status(&self) -> watch::Receiver<ServerStatus> {
        self.status_rx.clone()
    }

    /// Run until the shutdown threshold is reached.
    pub async fn run(self) -> Result<ServerStatus, ServerError> {
        self.event_loop.run().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn invalid_config_fails_before_binding() {
        let mut config = ServerConfig::default();
        config.shutdown.event_threshold = 0;

        let err = Server::bind(config).err().expect("bind should fail");
        assert!(matches!(err, ServerError::Config(ConfigError::Validation(_))));
        assert_eq!(err.exit_code(), 2);
    }

    #[tokio::test]
    async fn occupied_port_is_a_setup_error() {
        let holder = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let mut config = ServerConfig::default();
        config.listener.bind_address = holder.local_addr().unwrap().to_string();

        let err = Server::bind(config).err().expect("bind should fail");
        assert!(matches!(err, ServerError::Listener(_)));
        assert_ne!(err.exit_code(), 0);
    }

    #[tokio::test]
    async fn starts_draining_with_no_events() {
        let mut config = ServerConfig::default();
        config.listener.bind_address = "127.0.0.1:0".into();

        let server = Server::bind(config).unwrap();
        let status = server.status().borrow().clone();
        assert_eq!(status.state, LoopState::Draining);
        assert_eq!(status.shutdown_events, 0);
        assert_ne!(server.local_addr().port(), 0);
    }
}
