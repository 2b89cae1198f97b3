//! Gateway daemon entry point.
//!
//! Loads configuration, wires up the driver registry and application
//! state, and serves the `/v1/` HTTP surface until interrupted.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use gateway_core::api::{build_router, AppState};
use gateway_core::config::GatewayConfig;
use gateway_core::drivers::disk::DiskDriver;
use gateway_core::drivers::DriverRegistry;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Path to the INI configuration file.
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the gateway daemon in the foreground.
    Run,
}

fn write_pid_file(path: &str) -> std::io::Result<()> {
    std::fs::write(path, std::process::id().to_string())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = GatewayConfig::load(cli.config.as_deref())?;

    write_pid_file(&config.server.pid_file)?;

    let registry = Arc::new(DriverRegistry::new());
    for name in &config.storage.driver_names {
        if name == "disk" {
            let root = PathBuf::from("gateway-storage").join(name);
            tokio::fs::create_dir_all(&root).await?;
            registry.register(Arc::new(DiskDriver::new(name, root)))?;
        }
    }

    let bind_addr: SocketAddr = config.bind_addr().parse()?;
    let state = AppState::new(config, registry);
    gateway_core::datastore::wal::spawn_drainer(
        state.datastore.wal.clone(),
        state.datastore.registry.clone(),
        state.datastore.write_threshold.clone(),
    );
    let router = build_router(state);

    info!("gateway listening on {bind_addr}");

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => {
            let (shutdown_tx, _) = tokio::sync::watch::channel(());
            let shutdown_rx = shutdown_tx.subscribe();

            tokio::spawn(async move {
                let _ = tokio::signal::ctrl_c().await;
                let _ = shutdown_tx.send(());
            });

            axum::Server::bind(&bind_addr)
                .serve(router.into_make_service())
                .with_graceful_shutdown(async move {
                    let mut rx = shutdown_rx;
                    let _ = rx.changed().await;
                })
                .await?;
        }
    }

    Ok(())
}
