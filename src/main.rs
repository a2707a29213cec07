//! solo-server
//!
//! Accepts one TCP client at a time, counts the bytes it sends, and exits
//! cleanly after a fixed number of shutdown events.
//!
//! # Architecture Overview
//!
//! ```text
//!                 ┌──────────────────────────────────────────────┐
//!                 │                 EVENT LOOP                   │
//!   Client ───────┼─▶ listener ──admit──▶ connection ──read──┐   │
//!   (1 at a time) │      │ (extra clients closed)           │   │
//!                 │      ▼                                  ▼   │
//!   SIGHUP ───────┼─▶ interceptor ──consume──▶ shutdown counter  │
//!                 │                                  │          │
//!                 │                     threshold ───┘→ exit 0  │
//!                 └──────────────────────────────────────────────┘
//! ```
//!
//! # Exit Status
//! - `0`: shutdown threshold reached
//! - `1`: signal or listener setup failed
//! - `2`: invalid configuration
//! - `3`: the event loop's wait failed

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use solo_server::config::{load_config, validate_config, ConfigError, LogFormat, ShutdownSignal};
use solo_server::observability::{logging, metrics};
use solo_server::{Server, ServerConfig, ServerError};

#[derive(Parser)]
#[command(name = "solo-server")]
#[command(about = "Single-client TCP server with a bounded graceful shutdown", long_about = None)]
struct Cli {
    /// TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Bind address, e.g. 0.0.0.0:8080.
    #[arg(long)]
    bind: Option<String>,

    /// Port to listen on (keeps the configured host).
    #[arg(short, long)]
    port: Option<u16>,

    /// listen(2) backlog.
    #[arg(long)]
    backlog: Option<u32>,

    /// Shutdown events (signals + disconnects) before exiting.
    #[arg(short, long)]
    threshold: Option<u32>,

    /// Shutdown signal: hup, usr1, usr2, term or int.
    #[arg(long)]
    signal: Option<ShutdownSignal>,

    /// Log format: pretty or json.
    #[arg(long)]
    log_format: Option<LogFormat>,
}

impl Cli {
    fn into_config(self) -> Result<ServerConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => load_config(path)?,
            None => ServerConfig::default(),
        };

        if let Some(bind) = self.bind {
            config.listener.bind_address = bind;
        }
        if let Some(port) = self.port {
            config.listener.bind_address = with_port(&config.listener.bind_address, port);
        }
        if let Some(backlog) = self.backlog {
            config.listener.backlog = backlog;
        }
        if let Some(threshold) = self.threshold {
            config.shutdown.event_threshold = threshold;
        }
        if let Some(signal) = self.signal {
            config.shutdown.signal = signal;
        }
        if let Some(format) = self.log_format {
            config.observability.log_format = format;
        }

        validate_config(&config).map_err(ConfigError::Validation)?;
        Ok(config)
    }
}

/// Replace the port of `address`, falling back to all interfaces.
fn with_port(address: &str, port: u16) -> String {
    match address.parse::<std::net::SocketAddr>() {
        Ok(mut addr) => {
            addr.set_port(port);
            addr.to_string()
        }
        Err(_) => format!("0.0.0.0:{}", port),
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match cli.into_config() {
        Ok(config) => config,
        Err(e) => {
            logging::init_logging(&Default::default());
            let e = ServerError::from(e);
            tracing::error!(error = %e, "Invalid configuration");
            return ExitCode::from(e.exit_code());
        }
    };

    logging::init_logging(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "solo-server starting");

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => {
                if let Err(e) = metrics::init_metrics(addr) {
                    tracing::error!(error = %e, "Failed to start metrics exporter");
                }
            }
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let server = match Server::bind(config) {
        Ok(server) => server,
        Err(e) => {
            tracing::error!(error = %e, "Startup failed");
            return ExitCode::from(e.exit_code());
        }
    };

    match server.run().await {
        Ok(status) => {
            tracing::info!(
                shutdown_events = status.shutdown_events,
                bytes_received = status.bytes_received,
                "Shutdown complete"
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "Server terminated");
            ExitCode::from(e.exit_code())
        }
    }
}
