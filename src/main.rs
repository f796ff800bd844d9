//! edge-router
//!
//! ```text
//!                 ┌──────────────────────────────────────────────────────┐
//!                 │                     EDGE ROUTER                      │
//!                 │                                                      │
//!   bootstrap ───▶│ config ──▶ lifecycle::startup ──▶ route sources      │
//!   (TOML)        │                                     │                │
//!                 │        ┌────────────────────────────┤                │
//!                 │        ▼                            ▼                │
//!                 │  static provider            rds provider ◀──────────┼── collector
//!                 │  (+ file watcher)           (fetch loop)            │   cluster
//!                 │        │                            │                │
//!                 │        └──────────┬─────────────────┘                │
//!                 │                   ▼                                  │
//!                 │          Arc<RouteConfiguration>                     │
//!                 │                   │                                  │
//!                 │                   ▼                                  │
//!                 │           admin API (/status, /routes, /route_check) │
//!                 └──────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::net::TcpListener;

use edge_router::admin::{setup_admin_router, spawn_admin_server, AdminSource, AdminState};
use edge_router::config::loader::load_config;
use edge_router::lifecycle::signals::shutdown_signal;
use edge_router::lifecycle::{bootstrap, Shutdown};
use edge_router::observability::logging::init_tracing;
use edge_router::observability::metrics::{describe_rds_counters, init_metrics};

#[derive(Parser)]
#[command(name = "edge-router", version, about = "Request routing core of an edge proxy")]
struct Args {
    /// Bootstrap configuration file
    #[arg(short, long, default_value = "edge-router.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config = load_config(&args.config)?;

    init_tracing(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "edge-router starting");

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => {
                init_metrics(addr);
                for source in &config.route_sources {
                    describe_rds_counters(&source.stat_prefix);
                }
            }
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let boot = bootstrap(&config)?;
    tracing::info!(
        sources = boot.sources.len(),
        watchers = boot.watcher_count(),
        "Route sources created"
    );

    boot.init.wait().await;
    tracing::info!("All route sources initialized");

    let shutdown = Shutdown::new();
    let mut admin_server = None;
    if config.admin.enabled {
        let state = AdminState {
            manager: boot.manager.clone(),
            sources: Arc::new(boot.sources.iter().map(AdminSource::from_named).collect()),
            init: boot.init.clone(),
            api_key: Arc::from(config.admin.api_key.as_str()),
        };
        let app = setup_admin_router(
            state,
            Duration::from_secs(config.admin.request_timeout_secs),
        );
        let listener = TcpListener::bind(&config.admin.bind_address).await?;
        tracing::info!(address = %listener.local_addr()?, "Admin listener started");

        admin_server = Some(spawn_admin_server(listener, app, shutdown.wait()));
    }

    shutdown_signal().await;
    shutdown.trigger();

    if let Some(server) = admin_server {
        if let Err(e) = server.await {
            tracing::error!(error = %e, "Admin server task failed");
        }
        tracing::info!("Admin server drained");
    }

    drop(boot);
    tracing::info!("Shutdown complete");
    Ok(())
}
