//! OS signal interception.
//!
//! # Responsibilities
//! - Register the shutdown signal's handler actions
//! - Turn asynchronous delivery into a durable, pollable flag
//! - Expose the signal only inside the event loop's single wait
//!
//! # Design Decisions
//! - The handler does two things, in this order: store `true` into the
//!   shutdown flag, then `send` one byte into a non-blocking socket pair.
//!   Both are async-signal-safe; nothing allocates or locks.
//! - The loop never polls the flag on its own. It waits for the read end of
//!   the socket pair to become readable alongside its sockets, so a delivery
//!   right before the wait starts still leaves a byte behind and wakes it.
//! - Because the flag is stored before the byte is sent, a wake always finds
//!   the flag already set. Bursts before the next `consume` collapse into one
//!   event (the flag is a bool, not a counter).
//! - Installing replaces the signal's default disposition for the lifetime of
//!   the interceptor; `restore` removes both actions again.

use std::io;
use std::os::raw::c_int;
use std::os::unix::net::UnixStream as StdUnixStream;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use signal_hook::consts::{SIGHUP, SIGINT, SIGTERM, SIGUSR1, SIGUSR2};
use signal_hook::SigId;
use thiserror::Error;
use tokio::net::UnixStream;

use crate::config::ShutdownSignal;

/// Error type for signal interception.
#[derive(Debug, Error)]
pub enum SignalError {
    /// Could not create the wake pipe.
    #[error("Failed to create signal wake pipe: {0}")]
    Pipe(#[source] io::Error),

    /// The OS refused the handler registration.
    #[error("Failed to register {signal} handler: {source}")]
    Register {
        signal: ShutdownSignal,
        #[source]
        source: io::Error,
    },

    /// Waiting on the wake pipe failed.
    #[error("Signal wait failed: {0}")]
    Wait(#[source] io::Error),

    /// The write end of the wake pipe is gone (handlers were removed).
    #[error("Signal wake pipe closed")]
    PipeClosed,
}

impl ShutdownSignal {
    /// Raw signal number.
    pub fn as_raw(&self) -> c_int {
        match self {
            ShutdownSignal::Hup => SIGHUP,
            ShutdownSignal::Usr1 => SIGUSR1,
            ShutdownSignal::Usr2 => SIGUSR2,
            ShutdownSignal::Term => SIGTERM,
            ShutdownSignal::Int => SIGINT,
        }
    }
}

/// Intercepts one shutdown signal and hands it to the event loop.
#[derive(Debug)]
pub struct SignalInterceptor {
    signal: ShutdownSignal,
    /// Set from signal context, cleared only by `consume`.
    flag: Arc<AtomicBool>,
    /// Read end of the wake pipe; the write end belongs to the handler.
    wake_rx: UnixStream,
    /// Handler registrations, flag action first.
    registrations: Vec<SigId>,
}

impl SignalInterceptor {
    /// Register the handler actions for `signal`.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn install(signal: ShutdownSignal) -> Result<Self, SignalError> {
        let (wake_rx, wake_tx) = StdUnixStream::pair().map_err(SignalError::Pipe)?;
        wake_rx.set_nonblocking(true).map_err(SignalError::Pipe)?;
        wake_tx.set_nonblocking(true).map_err(SignalError::Pipe)?;
        let wake_rx = UnixStream::from_std(wake_rx).map_err(SignalError::Pipe)?;

        let flag = Arc::new(AtomicBool::new(false));
        let raw = signal.as_raw();

        let flag_id = signal_hook::flag::register(raw, Arc::clone(&flag))
            .map_err(|source| SignalError::Register { signal, source })?;

        let pipe_id = match signal_hook::low_level::pipe::register(raw, wake_tx) {
            Ok(id) => id,
            Err(source) => {
                signal_hook::low_level::unregister(flag_id);
                return Err(SignalError::Register { signal, source });
            }
        };

        tracing::debug!(signal = %signal, "Signal interceptor installed");

        Ok(Self {
            signal,
            flag,
            wake_rx,
            registrations: vec![flag_id, pipe_id],
        })
    }

    /// The intercepted signal.
    pub fn signal(&self) -> ShutdownSignal {
        self.signal
    }

    /// Wait until at least one delivery has been recorded since the last
    /// wake, draining the wake pipe.
    ///
    /// Cancel safe. A wake does not imply the flag is still set: a previous
    /// `consume` may already have taken it.
    pub async fn wait(&self) -> Result<(), SignalError> {
        let mut scratch = [0u8; 64];
        loop {
            self.wake_rx.readable().await.map_err(SignalError::Wait)?;

            let mut drained = false;
            loop {
                match self.wake_rx.try_read(&mut scratch) {
                    Ok(0) => return Err(SignalError::PipeClosed),
                    Ok(_) => drained = true,
                    Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                    Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                    Err(e) => return Err(SignalError::Wait(e)),
                }
            }

            if drained {
                return Ok(());
            }
        }
    }

    /// Test-and-clear the shutdown flag.
    pub fn consume(&self) -> bool {
        self.flag.swap(false, Ordering::SeqCst)
    }

    /// Whether the handler actions are still registered.
    pub fn is_installed(&self) -> bool {
        !self.registrations.is_empty()
    }

    /// Remove the handler actions. Idempotent.
    pub fn restore(&mut self) {
        if self.registrations.is_empty() {
            return;
        }
        for id in self.registrations.drain(..) {
            signal_hook::low_level::unregister(id);
        }
        tracing::debug!(signal = %self.signal, "Signal interceptor removed");
    }
}

#[cfg(test)]
impl SignalInterceptor {
    /// An interceptor with no handler actions whose wake pipe has already
    /// lost its write end. `wait` fails with `PipeClosed`.
    pub(crate) fn detached(signal: ShutdownSignal) -> Result<Self, SignalError> {
        let (wake_rx, wake_tx) = StdUnixStream::pair().map_err(SignalError::Pipe)?;
        drop(wake_tx);
        wake_rx.set_nonblocking(true).map_err(SignalError::Pipe)?;
        let wake_rx = UnixStream::from_std(wake_rx).map_err(SignalError::Pipe)?;

        Ok(Self {
            signal,
            flag: Arc::new(AtomicBool::new(false)),
            wake_rx,
            registrations: Vec::new(),
        })
    }
}

impl Drop for SignalInterceptor {
    fn drop(&mut self) {
        self.restore();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    // Every test in this module owns its own signal so parallel tests never
    // observe each other's deliveries.

    #[tokio::test]
    async fn bursts_coalesce_into_one_event() {
        let interceptor = SignalInterceptor::install(ShutdownSignal::Usr1).unwrap();

        for _ in 0..5 {
            signal_hook::low_level::raise(SIGUSR1).unwrap();
        }

        tokio::time::timeout(Duration::from_secs(5), interceptor.wait())
            .await
            .expect("wake pipe never became readable")
            .unwrap();
        assert!(interceptor.consume());
        assert!(!interceptor.consume());
    }

    #[tokio::test]
    async fn delivery_before_wait_is_not_lost() {
        let interceptor = SignalInterceptor::install(ShutdownSignal::Usr2).unwrap();
        assert!(!interceptor.flag.load(Ordering::SeqCst));

        // Raised before anyone waits.
        signal_hook::low_level::raise(SIGUSR2).unwrap();
        assert!(interceptor.flag.load(Ordering::SeqCst));

        tokio::time::timeout(Duration::from_secs(5), interceptor.wait())
            .await
            .expect("delivery before wait was lost")
            .unwrap();
        assert!(interceptor.consume());

        // A second round works the same way.
        signal_hook::low_level::raise(SIGUSR2).unwrap();
        tokio::time::timeout(Duration::from_secs(5), interceptor.wait())
            .await
            .expect("second delivery was lost")
            .unwrap();
        assert!(interceptor.consume());
    }

    #[tokio::test]
    async fn restore_is_idempotent() {
        let mut interceptor = SignalInterceptor::install(ShutdownSignal::Hup).unwrap();
        assert!(interceptor.is_installed());

        interceptor.restore();
        interceptor.restore();
        assert!(!interceptor.is_installed());
        assert!(!interceptor.consume());
    }

    #[tokio::test]
    async fn lost_write_end_fails_the_wait() {
        let interceptor = SignalInterceptor::detached(ShutdownSignal::Hup).unwrap();
        assert!(!interceptor.is_installed());

        let res = tokio::time::timeout(Duration::from_secs(5), interceptor.wait())
            .await
            .expect("closed pipe never became readable");
        assert!(matches!(res, Err(SignalError::PipeClosed)));
    }

    #[test]
    fn raw_numbers() {
        assert_eq!(ShutdownSignal::Hup.as_raw(), SIGHUP);
        assert_eq!(ShutdownSignal::Term.as_raw(), SIGTERM);
    }
}
