//! Lunar Waves Audio Player (lunar-ap) - Main entry point
//!
//! Runs the mixer (primary playlist channel + ambience layers) headless on the
//! virtual media backend and exposes it over HTTP/SSE.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use lunar_ap::api::{self, AppContext};
use lunar_ap::config::TomlConfig;
use lunar_ap::media::VirtualMediaFactory;
use lunar_ap::Mixer;
use lunar_common::EventBus;
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for lunar-ap
#[derive(Parser, Debug)]
#[command(name = "lunar-ap")]
#[command(about = "Audio player service for Lunar Waves")]
#[command(version)]
struct Args {
    /// Port to listen on (overrides the config file)
    #[arg(short, long, env = "LUNAR_AP_PORT")]
    port: Option<u16>,

    /// Path to the TOML config file
    #[arg(short, long, env = "LUNAR_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Config first: it carries the default log level
    let mut config = TomlConfig::load(args.config.as_deref()).context("Failed to load configuration")?;
    if let Some(port) = args.port {
        config.port = port;
    }

    let default_filter = format!(
        "lunar_ap={level},lunar_common={level},tower_http={level}",
        level = config.logging.level
    );
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Starting Lunar Waves Audio Player v{} ({}) on port {}",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        config.port
    );

    let events = Arc::new(EventBus::default());
    let factory = Arc::new(VirtualMediaFactory::from_config(&config.media));
    let mixer = Arc::new(
        Mixer::start(&config, factory, Arc::clone(&events)).context("Failed to start mixer")?,
    );

    let ctx = AppContext {
        mixer: Arc::clone(&mixer),
        port: config.port,
    };
    api::run(ctx, shutdown_signal())
        .await
        .context("HTTP server failed")?;

    mixer.shutdown().await;
    info!("Shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
