//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! built-in defaults (port 8080, backlog 10, threshold 3, SIGHUP)
//!     → optional TOML file (loader.rs)
//!     → command-line overrides (main.rs)
//!     → validation.rs (semantic checks)
//!     → ServerConfig (validated, immutable)
//! ```
//!
//! # Design Decisions
//! - Config is read once at startup; there is no reload path
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{
    ConnectionConfig, ListenerConfig, LogFormat, ObservabilityConfig, ServerConfig,
    ShutdownConfig, ShutdownSignal,
};
pub use validation::{validate_config, ValidationError};
