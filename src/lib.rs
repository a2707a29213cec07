//! Single-connection TCP server with a bounded graceful-shutdown policy.

pub mod config;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod server;

pub use config::ServerConfig;
pub use server::{LoopState, Server, ServerError, ServerStatus};
