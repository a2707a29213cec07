use std::net::SocketAddr;
use std::process::ExitCode;

use clap::Parser;
use solo_server::net::emitter::{self, DEFAULT_ADDRESS, DEFAULT_PAYLOAD};

#[derive(Parser)]
#[command(name = "emitter")]
#[command(about = "Connect to solo-server, send one message, disconnect", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = DEFAULT_ADDRESS)]
    addr: SocketAddr,

    #[arg(short, long, default_value = DEFAULT_PAYLOAD)]
    message: String,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();

    match emitter::emit(cli.addr, cli.message.as_bytes()).await {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Emit failed");
            ExitCode::FAILURE
        }
    }
}
