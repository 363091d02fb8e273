//! API gateway entry point.
//!
//! ```text
//!                       ┌──────────────────────────────────────────────┐
//!                       │                 API GATEWAY                  │
//!                       │                                              │
//!     Client Request    │  ┌──────────┐   ┌─────────────┐              │
//!     ──────────────────┼─▶│   http   │──▶│ rate_limit  │ deny → 429   │
//!                       │  │  server  │   │ (admission) │              │
//!                       │  └──────────┘   └──────┬──────┘              │
//!                       │                        │ admit               │
//!                       │                        ▼                     │
//!                       │        ┌──────────────────────────┐          │
//!                       │        │ load_balancer / hash_ring│          │
//!                       │        │   (backend selection)    │          │
//!                       │        └────────────┬─────────────┘          │
//!                       │                     │                        │
//!     Client Response   │  ┌──────────┐       ▼                        │
//!     ◀─────────────────┼──│  hyper   │◀── connection guard ◀──────────┼── Backend
//!                       │  │  client  │    (count in/out)              │
//!                       │  └──────────┘                                │
//!                       │                                              │
//!                       │  config · health checks · observability      │
//!                       └──────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;

use api_gateway::config::{load_config, GatewayConfig};
use api_gateway::lifecycle::Shutdown;
use api_gateway::observability::{logging, metrics};
use api_gateway::HttpServer;

#[derive(Debug, Parser)]
#[command(name = "api-gateway", about = "Rate-limiting, load-balancing API gateway")]
struct Args {
    /// Path to a TOML configuration file.
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    logging::init();

    let args = Args::parse();
    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => {
            tracing::warn!("No config file given; starting with defaults and no backends");
            GatewayConfig::default()
        }
    };

    tracing::info!(
        bind_address = %config.listener.bind_address,
        backends = config.backends.len(),
        strategy = ?config.routing.strategy,
        rate_limit_policy = ?config.rate_limit.policy,
        "Configuration loaded"
    );

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let shutdown = Arc::new(Shutdown::new());
    let sd = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Shutdown signal received");
            sd.trigger();
        }
    });

    let server = HttpServer::new(config);
    server.run(listener, &shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
