//! The event loop and its shutdown state machine.
//!
//! # Iteration
//! ```text
//! select! (biased, no timeout)
//!     signal wake   → consume flag → count Signal
//!     listener      → accept → admission policy
//!     connection    → one read → on close: disconnect, count Disconnect
//! publish status
//! counter ≥ threshold → restore signals, close listener, close connection
//! ```
//!
//! The `select!` is the only place the loop suspends. When several sources
//! are ready at once they are handled one per iteration in the order above,
//! and the terminal check always follows the handling of that source.

use std::io;
use std::net::SocketAddr;

use tokio::net::TcpStream;
use tokio::sync::watch;

use crate::lifecycle::{ShutdownCounter, ShutdownEvent, SignalError, SignalInterceptor};
use crate::net::{Admission, CloseReason, Connection, Listener, ListenerError, ReadOutcome};
use crate::observability::metrics;
use crate::server::{LoopState, ServerError, ServerStatus};

/// Why the loop woke up.
enum Wake {
    Signal(Result<(), SignalError>),
    Accept(Result<(TcpStream, SocketAddr), ListenerError>),
    Readable(io::Result<()>),
}

/// Loop-owned state; nothing here is shared with signal context.
pub(crate) struct EventLoop {
    interceptor: SignalInterceptor,
    listener: Listener,
    connection: Connection,
    counter: ShutdownCounter,
    accepted: u64,
    rejected: u64,
    bytes_received: u64,
    status_tx: watch::Sender<ServerStatus>,
}

impl EventLoop {
    pub(crate) fn new(
        interceptor: SignalInterceptor,
        listener: Listener,
        connection: Connection,
        counter: ShutdownCounter,
        status_tx: watch::Sender<ServerStatus>,
    ) -> Self {
        Self {
            interceptor,
            listener,
            connection,
            counter,
            accepted: 0,
            rejected: 0,
            bytes_received: 0,
            status_tx,
        }
    }

    pub(crate) async fn run(mut self) -> Result<ServerStatus, ServerError> {
        tracing::debug!(
            threshold = self.counter.threshold(),
            signal = %self.interceptor.signal(),
            "Event loop started"
        );

        loop {
            let wake = {
                let Self {
                    interceptor,
                    listener,
                    connection,
                    ..
                } = &self;

                // Biased: pending connection attempts are served ahead of
                // reads on the active client. A flood of rejected clients
                // delays those reads until the accept queue is empty.
                tokio::select! {
                    biased;
                    res = interceptor.wait() => Wake::Signal(res),
                    res = listener.accept() => Wake::Accept(res),
                    res = connection.readable(), if connection.is_present() => Wake::Readable(res),
                }
            };

            match wake {
                Wake::Signal(Ok(())) => self.on_signal(),
                Wake::Signal(Err(e)) => {
                    tracing::error!(error = %e, "Event loop wait failed");
                    self.publish(LoopState::Terminated);
                    return Err(ServerError::Wait(e));
                }
                Wake::Accept(Ok((stream, peer))) => self.on_accept(stream, peer),
                Wake::Accept(Err(e)) => on_accept_error(e),
                Wake::Readable(Ok(())) => self.on_readable(),
                Wake::Readable(Err(e)) => {
                    self.on_closed(CloseReason::Error(e.kind()));
                }
            }

            if self.counter.is_reached() {
                return Ok(self.terminate());
            }
            self.publish(self.state());
        }
    }

    fn on_signal(&mut self) {
        if !self.interceptor.consume() {
            // Woken for a delivery an earlier consume already counted.
            tracing::trace!("Signal wake without pending flag");
            return;
        }
        tracing::info!(signal = %self.interceptor.signal(), "Shutdown signal received");
        self.record(ShutdownEvent::Signal);
    }

    fn on_accept(&mut self, stream: TcpStream, peer: SocketAddr) {
        match self.listener.admit(&mut self.connection, stream, peer) {
            Admission::Admitted(_) => {
                self.accepted += 1;
                metrics::record_accepted();
            }
            Admission::Rejected => {
                self.rejected += 1;
                metrics::record_rejected();
            }
        }
    }

    fn on_readable(&mut self) {
        match self.connection.read_available() {
            ReadOutcome::Data(n) => {
                self.bytes_received += n as u64;
                metrics::record_bytes(n);
            }
            ReadOutcome::Closed(reason) => self.on_closed(reason),
            ReadOutcome::Transient => {}
        }
    }

    fn on_closed(&mut self, reason: CloseReason) {
        if let Some(closed) = self.connection.disconnect() {
            tracing::info!(
                connection_id = %closed.id,
                peer_addr = %closed.peer,
                bytes_received = closed.bytes_received,
                duration_ms = closed.duration.as_millis() as u64,
                reason = ?reason,
                "Client disconnected"
            );
            metrics::record_disconnected();
            self.record(ShutdownEvent::Disconnect);
        }
    }

    fn record(&mut self, event: ShutdownEvent) {
        self.counter.record(event);
        metrics::record_shutdown_event(event);
        tracing::info!(
            kind = event.as_str(),
            events = self.counter.total(),
            remaining = self.counter.remaining(),
            threshold = self.counter.threshold(),
            "Shutdown event recorded"
        );
    }

    fn state(&self) -> LoopState {
        if self.connection.is_present() {
            LoopState::Running
        } else {
            LoopState::Draining
        }
    }

    fn snapshot(&self, state: LoopState) -> ServerStatus {
        ServerStatus {
            state,
            shutdown_events: self.counter.total(),
            signals: self.counter.signals(),
            disconnects: self.counter.disconnects(),
            accepted: self.accepted,
            rejected: self.rejected,
            bytes_received: self.bytes_received,
            active_peer: self.connection.peer(),
        }
    }

    fn publish(&self, state: LoopState) {
        self.status_tx.send_replace(self.snapshot(state));
    }

    /// Ordered teardown once the threshold is reached.
    fn terminate(mut self) -> ServerStatus {
        self.interceptor.restore();
        self.listener.close();
        if let Some(closed) = self.connection.disconnect() {
            tracing::info!(
                connection_id = %closed.id,
                peer_addr = %closed.peer,
                bytes_received = closed.bytes_received,
                reason = ?CloseReason::Shutdown,
                "Connection closed during shutdown"
            );
            metrics::record_disconnected();
        }

        let status = self.snapshot(LoopState::Terminated);
        self.status_tx.send_replace(status.clone());

        tracing::info!(
            signals = status.signals,
            disconnects = status.disconnects,
            accepted = status.accepted,
            rejected = status.rejected,
            "Shutdown threshold reached"
        );
        status
    }
}

/// Accept failures never end the loop; they only differ in how loudly
/// they are logged.
fn on_accept_error(e: ListenerError) {
    match &e {
        ListenerError::Accept(source) if source.kind() == io::ErrorKind::Interrupted => {
            tracing::debug!("Accept interrupted");
        }
        e if e.is_transient() => tracing::warn!(error = %e, "Accept failed"),
        e => tracing::error!(error = %e, "Listener error outside accept"),
    }
}
