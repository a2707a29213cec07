//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::time::Duration;

use solo_server::config::ShutdownSignal;
use solo_server::net::emitter;
use solo_server::{Server, ServerConfig, ServerError, ServerStatus};
use tokio::sync::watch;
use tokio::task::JoinHandle;

pub const TIMEOUT: Duration = Duration::from_secs(10);

/// Loopback config on an ephemeral port.
pub fn test_config(signal: ShutdownSignal, threshold: u32) -> ServerConfig {
    let mut config = ServerConfig::default();
    config.listener.bind_address = "127.0.0.1:0".into();
    config.shutdown.signal = signal;
    config.shutdown.event_threshold = threshold;
    config
}

/// A server running as a task on the test runtime.
pub struct RunningServer {
    pub addr: SocketAddr,
    pub status: watch::Receiver<ServerStatus>,
    pub handle: JoinHandle<Result<ServerStatus, ServerError>>,
}

impl RunningServer {
    pub fn spawn(server: Server) -> Self {
        let addr = server.local_addr();
        let status = server.status();
        let handle = tokio::spawn(server.run());
        Self {
            addr,
            status,
            handle,
        }
    }

    /// Wait until the loop has published a status matching `f`.
    pub async fn wait_for(&mut self, f: impl FnMut(&ServerStatus) -> bool) -> ServerStatus {
        tokio::time::timeout(TIMEOUT, self.status.wait_for(f))
            .await
            .expect("server never reached the expected status")
            .expect("server dropped its status channel")
            .clone()
    }

    /// Send one payload and wait for the server to count the disconnect.
    pub async fn emit_and_wait(&mut self, payload: &[u8]) -> ServerStatus {
        let before = self.status.borrow().disconnects;
        emitter::emit(self.addr, payload).await.unwrap();
        self.wait_for(|s| s.disconnects > before).await
    }

    /// Wait for the loop to exit and return its final status.
    pub async fn finish(self) -> ServerStatus {
        tokio::time::timeout(TIMEOUT, self.handle)
            .await
            .expect("server did not terminate")
            .expect("server task panicked")
            .expect("server returned an error")
    }
}

/// Deliver `signal` to this process.
pub fn raise(signal: ShutdownSignal) {
    signal_hook::low_level::raise(signal.as_raw()).unwrap();
}
