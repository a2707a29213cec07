//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → listener.rs (accept, admission policy)
//!     → connection.rs (single active client, bounded reads)
//!     → byte counts reported to the event loop
//!
//! Connection States:
//!     Absent → Present → Absent (EOF, read error, or shutdown)
//! ```
//!
//! # Design Decisions
//! - Exactly one client at a time; extra clients are closed on arrival
//! - No protocol: bytes are counted, never parsed
//! - emitter.rs is the matching one-shot client

pub mod connection;
pub mod emitter;
pub mod listener;

pub use connection::{CloseReason, ClosedConnection, Connection, ConnectionId, ReadOutcome};
pub use listener::{Admission, Listener, ListenerError};
