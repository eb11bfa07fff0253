//! Action gateway binary.
//!
//! Serves the configured static mounts and users over both transports.
//! Applications embed the library to register their own resources.
//!
//! ```text
//!     HTTP request ──────┐                    ┌─────────────┐
//!                        ├──▶ Registry ──▶ Authorizer ──▶ Handler
//!     Socket message ────┘                    └─────────────┘
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::sync::mpsc;

use action_gateway::config::{load_config, ConfigWatcher, GatewayConfig};
use action_gateway::http::GatewayServer;
use action_gateway::lifecycle::{signals, startup, Shutdown};
use action_gateway::observability::{logging, metrics};

#[derive(Parser)]
#[command(name = "action-gateway")]
#[command(about = "Action dispatch gateway for HTTP and WebSocket clients", long_about = None)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Validate the configuration and exit
    #[arg(long)]
    check: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => GatewayConfig::default(),
    };
    if cli.check {
        println!("configuration ok");
        return Ok(());
    }

    logging::init_logging(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "action-gateway starting");
    tracing::info!(
        bind_address = %config.listener.bind_address,
        api_prefix = %config.http.api_prefix,
        websocket_path = %config.websocket.path,
        request_timeout_secs = config.timeouts.request_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let provider = Arc::new(startup::seed_provider(&config.users));
    let registry = startup::static_registry(&config)?;

    // Keep the watcher alive for the life of the server.
    let (_watcher, config_updates) = match &cli.config {
        Some(path) => {
            let (watcher, updates) = ConfigWatcher::new(path);
            (Some(watcher.run()?), updates)
        }
        None => {
            let (_, updates) = mpsc::unbounded_channel();
            (None, updates)
        }
    };

    let shutdown = Shutdown::new();
    signals::spawn_signal_listener(&shutdown);

    let listener = startup::bind(&config).await?;
    let server = GatewayServer::new(config, registry, provider);
    server.run(listener, config_updates, shutdown.signal()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
