//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Signals (signals.rs):
//!     shutdown signal → flag + wake byte → observed at the loop's wait
//!
//! Shutdown (shutdown.rs):
//!     consumed signal | client disconnect → counter → threshold → exit 0
//! ```
//!
//! # Design Decisions
//! - Signals never terminate the process directly; each one is a counted event
//! - Ordered shutdown: remove signal actions, close listener, close connection

pub mod shutdown;
pub mod signals;

pub use shutdown::{ShutdownCounter, ShutdownEvent};
pub use signals::{SignalError, SignalInterceptor};
