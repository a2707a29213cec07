//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the server.
//! All types derive Serde traits for deserialization from config files, and
//! every default reproduces the server's built-in startup constants.

use serde::{Deserialize, Serialize};

/// Root configuration for the server.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    /// Listener configuration (bind address, backlog).
    pub listener: ListenerConfig,

    /// Active connection settings.
    pub connection: ConnectionConfig,

    /// Shutdown policy (signal, event threshold).
    pub shutdown: ShutdownConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Pending-connection queue length passed to `listen(2)`.
    pub backlog: u32,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            backlog: 10,
        }
    }
}

/// Settings for the single active connection.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ConnectionConfig {
    /// Maximum bytes taken from the socket per read.
    pub read_buffer_size: usize,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            read_buffer_size: 1024,
        }
    }
}

/// Graceful shutdown policy.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ShutdownConfig {
    /// Signal that counts as a shutdown request.
    pub signal: ShutdownSignal,

    /// Number of qualifying events (consumed signals plus client
    /// disconnects, in any mix) after which the server exits.
    pub event_threshold: u32,
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            signal: ShutdownSignal::Hup,
            event_threshold: 3,
        }
    }
}

/// Signals that may be used as the shutdown request.
///
/// Config files and the command line accept the same names: `hup`, `usr1`,
/// `usr2`, `term`, `int`, optionally prefixed with `sig`, in any case.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Hash, Default)]
#[serde(try_from = "String", rename_all = "lowercase")]
pub enum ShutdownSignal {
    /// SIGHUP.
    #[default]
    Hup,
    /// SIGUSR1.
    Usr1,
    /// SIGUSR2.
    Usr2,
    /// SIGTERM.
    Term,
    /// SIGINT.
    Int,
}

impl ShutdownSignal {
    /// Conventional signal name, for logs.
    pub fn name(&self) -> &'static str {
        match self {
            ShutdownSignal::Hup => "SIGHUP",
            ShutdownSignal::Usr1 => "SIGUSR1",
            ShutdownSignal::Usr2 => "SIGUSR2",
            ShutdownSignal::Term => "SIGTERM",
            ShutdownSignal::Int => "SIGINT",
        }
    }
}

impl std::fmt::Display for ShutdownSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for ShutdownSignal {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.to_ascii_lowercase();
        match lower.strip_prefix("sig").unwrap_or(&lower) {
            "hup" => Ok(ShutdownSignal::Hup),
            "usr1" => Ok(ShutdownSignal::Usr1),
            "usr2" => Ok(ShutdownSignal::Usr2),
            "term" => Ok(ShutdownSignal::Term),
            "int" => Ok(ShutdownSignal::Int),
            _ => Err(format!("unsupported shutdown signal: {}", s)),
        }
    }
}

impl TryFrom<String> for ShutdownSignal {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Default log filter when `RUST_LOG` is not set.
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Enable the Prometheus metrics exporter.
    pub metrics_enabled: bool,

    /// Metrics endpoint address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}

/// Log line format.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Pretty,
    /// One JSON object per line.
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pretty" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            _ => Err(format!("unknown log format: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_startup_constants() {
        let config = ServerConfig::default();
        assert_eq!(config.listener.bind_address, "0.0.0.0:8080");
        assert_eq!(config.listener.backlog, 10);
        assert_eq!(config.connection.read_buffer_size, 1024);
        assert_eq!(config.shutdown.event_threshold, 3);
        assert_eq!(config.shutdown.signal, ShutdownSignal::Hup);
        assert!(!config.observability.metrics_enabled);
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config: ServerConfig = toml::from_str(
            r#"
            [shutdown]
            event_threshold = 5
            signal = "usr1"
            "#,
        )
        .unwrap();

        assert_eq!(config.shutdown.event_threshold, 5);
        assert_eq!(config.shutdown.signal, ShutdownSignal::Usr1);
        assert_eq!(config.listener, ListenerConfig::default());
    }

    #[test]
    fn shutdown_section_defaults_to_sighup() {
        let shutdown = ShutdownConfig::default();
        assert_eq!(shutdown.signal, ShutdownSignal::Hup);
        assert_eq!(shutdown.signal.name(), "SIGHUP");
        assert_eq!(shutdown.event_threshold, 3);
    }

    #[test]
    fn toml_and_cli_accept_the_same_signal_names() {
        #[derive(serde::Deserialize)]
        struct Wrapper {
            signal: ShutdownSignal,
        }

        for name in ["hup", "SIGUSR1", "sigusr2", "Term", "int"] {
            let from_toml: Wrapper = toml::from_str(&format!("signal = {:?}", name)).unwrap();
            assert_eq!(Ok(from_toml.signal), name.parse::<ShutdownSignal>());
        }
        for name in ["hangup", "sigsighup", "kill"] {
            assert!(toml::from_str::<Wrapper>(&format!("signal = {:?}", name)).is_err());
            assert!(name.parse::<ShutdownSignal>().is_err());
        }
    }

    #[test]
    fn signal_serializes_lowercase() {
        let shutdown = ShutdownConfig::default();
        let rendered = toml::to_string(&shutdown).unwrap();
        assert!(rendered.contains("signal = \"hup\""));
    }

    #[test]
    fn signal_names_parse() {
        assert_eq!("SIGHUP".parse::<ShutdownSignal>(), Ok(ShutdownSignal::Hup));
        assert_eq!("usr2".parse::<ShutdownSignal>(), Ok(ShutdownSignal::Usr2));
        assert_eq!("Term".parse::<ShutdownSignal>(), Ok(ShutdownSignal::Term));
        assert!("kill".parse::<ShutdownSignal>().is_err());
    }
}
