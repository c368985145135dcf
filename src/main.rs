//! Edge gateway
//!
//! # Architecture Overview
//!
//! ```text
//!                        ┌──────────────────────────────────────────────────────┐
//!                        │                     EDGE GATEWAY                      │
//!                        │                                                       │
//!   Client (TLS)         │  ┌─────────┐   ┌──────────┐   ┌──────────┐            │
//!   ─────────────────────┼─▶│   net   │──▶│   http   │──▶│ routing  │            │
//!                        │  │listener │   │ head +   │   │  Host →  │            │
//!                        │  │  + tls  │   │ limits   │   │   key    │            │
//!                        │  └─────────┘   └──────────┘   └────┬─────┘            │
//!                        │                                    │ RegistrySwitch   │
//!                        │                                    ▼ ::current()      │
//!   Client response      │                              ┌──────────┐             │
//!   ◀────────────────────┼──────────────────────────────│  tunnel  │◀────────────┼──── Backend
//!                        │                              │ hijack + │             │
//!                        │                              │  relay   │             │
//!                        │                              └──────────┘             │
//!                        │                                                       │
//!                        │  signals / admin / watcher / timer                    │
//!                        │     → reload worker → descriptor loader → install     │
//!                        └──────────────────────────────────────────────────────┘
//! ```

use clap::Parser;

use edge_gateway::cli::Cli;
use edge_gateway::observability::init_logging;
use edge_gateway::Gateway;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = cli.settings()?;

    init_logging(&config.observability);
    tracing::info!("edge-gateway v{} starting", env!("CARGO_PKG_VERSION"));

    tracing::info!(
        https_address = %config.listener.https_address,
        http_address = %config.listener.http_address,
        http_mode = ?config.listener.http_mode,
        apps_dir = %config.apps.dir.display(),
        max_connections = config.listener.max_connections,
        "Configuration loaded"
    );

    let gateway = Gateway::start(config).await?;
    gateway.run_until_signal().await;

    tracing::info!("Shutdown complete");
    Ok(())
}
