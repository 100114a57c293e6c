//! Jacques server binary.

mod coalesce;
mod handlers;
mod hook;
mod server;
mod state;
mod ws;

use clap::Parser;
use tracing_subscriber::EnvFilter;

/// Local control plane for AI coding agent sessions.
#[derive(Debug, Parser)]
#[command(name = "jacques-server", version, about)]
struct Args {
    /// Port for the WebSocket and hook endpoints (loopback only).
    #[arg(long, default_value_t = server::DEFAULT_PORT)]
    port: u16,

    /// Emit logs as JSON lines.
    #[arg(long)]
    log_json: bool,
}

fn init_tracing(log_json: bool) {
    let filter = EnvFilter::try_from_env("JACQUES_LOG")
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if log_json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    init_tracing(args.log_json);

    if let Err(e) = server::run(args.port).await {
        tracing::error!(event = "server.fatal", error = %e);
        std::process::exit(1);
    }
}
