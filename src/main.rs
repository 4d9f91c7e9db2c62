//! Controller Gateway
//!
//! Waits for the node's secret and certificates, makes sure it is the only
//! copy running, then serves the controller's RPC surface over TLS until
//! SIGTERM.
//!
//! ```text
//!     remote tools ──HTTPS POST /──▶ ┌──────────────────────────┐
//!                                    │  AuthorizedRpcGateway    │
//!                                    │  (method table, TLS)     │
//!                                    └────────────┬─────────────┘
//!                                                 │ blocking pool
//!                                                 ▼
//!     SIGTERM ──▶ ShutdownCoordinator ──▶ ┌──────────────────────┐
//!                                         │  NodeController      │
//!     Supervisor (restart loop)           │  job_start main loop │
//!                                         └──────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;

use controller_gateway::config::load_or_default;
use controller_gateway::observability::{logging, metrics};
use controller_gateway::NodeController;

/// Controller RPC gateway.
#[derive(Parser, Debug)]
#[command(name = "controller-gateway", version, about = "TLS RPC front-end for the node controller")]
struct Args {
    /// Path to a TOML configuration file. Built-in defaults apply without one.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the configured log level (trace, debug, info, warn, error).
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = load_or_default(args.config.as_deref())?;

    let log_level = args
        .log_level
        .as_deref()
        .unwrap_or(&config.observability.log_level);
    logging::init(log_level);

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "controller-gateway starting");
    tracing::info!(
        secret_file = %config.paths.secret_file.display(),
        cert_file = %config.paths.cert_file.display(),
        address = %config.listener.socket_address(),
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr)?,
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let summary = controller_gateway::run(config, NodeController::new).await?;

    tracing::info!(restarts = summary.crashes, "Shutdown complete");
    Ok(())
}
