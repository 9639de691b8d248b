//! Warden Daemon
//!
//! Runs reconstruction and real-time moderation for the spaces it is
//! attached to:
//! - periodic verification and raid sweeps
//! - progress and audit event logging
//! - development mode against the in-memory remote service

use anyhow::Context;
use clap::Parser;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use warden_daemon::{CommandSurface, Warden, WardenConfig};
use warden_remote::InMemoryRemote;
use warden_types::{SpaceEventHandler, SpaceId, UserId};

/// Warden Daemon CLI
#[derive(Parser)]
#[command(name = "wardend")]
#[command(about = "Warden Daemon - space reconstruction and moderation", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "WARDEN_CONFIG")]
    config: Option<String>,

    /// Log level, overrides the configured one
    #[arg(long, env = "WARDEN_LOG_LEVEL")]
    log_level: Option<String>,

    /// Enable JSON logging
    #[arg(long, env = "WARDEN_LOG_JSON")]
    json: bool,

    /// Space to attach in development mode (repeatable)
    #[arg(long = "space")]
    spaces: Vec<u64>,

    /// Reconstruct every attached space at startup
    #[arg(long)]
    reconstruct: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let mut config =
        WardenConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;
    if let Some(level) = cli.log_level {
        config.logging.level = level;
    }
    config.logging.json |= cli.json;

    // Initialize tracing
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| config.logging.level.clone().into());

    if config.logging.json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    info!(version = env!("CARGO_PKG_VERSION"), "Starting wardend");

    // The transport to the live service is attached by the embedding
    // process; standalone runs use the in-memory service
    let remote = Arc::new(InMemoryRemote::new());
    let warden = Arc::new(Warden::new(remote.clone(), &config).context("Failed to build core")?);

    // Progress and audit streams
    let mut progress = warden.reconciler().subscribe();
    tokio::spawn(async move {
        while let Ok(event) = progress.recv().await {
            info!(
                space = %event.space,
                deployment_id = %event.deployment_id,
                phase = %event.phase,
                status = ?event.status,
                "{}",
                event.message
            );
        }
    });

    let mut audit = warden.moderation().subscribe_audit();
    tokio::spawn(async move {
        while let Ok(record) = audit.recv().await {
            match serde_json::to_string(&record) {
                Ok(json) => info!(target: "warden::audit", "{}", json),
                Err(err) => error!(error = %err, "Audit record not serializable"),
            }
        }
    });

    // Attach development spaces
    for id in &cli.spaces {
        let space = SpaceId::new(*id);
        remote.add_space(space);
        warden.on_space_join(space).await;
    }

    if cli.reconstruct {
        for id in &cli.spaces {
            let space = SpaceId::new(*id);
            match warden.reconstruct(space, UserId::new(0)).await {
                Ok(summary) => info!(space = %space, "{}", summary.render()),
                Err(err) => error!(space = %space, error = %err, "Reconstruction failed"),
            }
        }
    }

    let sweeps = warden.start_sweeps();

    shutdown_signal().await;
    info!("Warden daemon shutting down");

    sweeps.shutdown();
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                error!(error = %err, "Failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            info!("Received terminate signal, initiating graceful shutdown");
        }
    }
}
