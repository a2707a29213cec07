//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Listener, Connection, Event Loop produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (counters, gauges)
//!
//! Consumers:
//!     → stdout (pretty or JSON lines)
//!     → Metrics endpoint (Prometheus scrape, optional)
//! ```
//!
//! # Design Decisions
//! - Fatal conditions log at error, transient ones at debug/warn
//! - Metrics are cheap (atomic increments) and off the wire by default

pub mod logging;
pub mod metrics;
