//! Ferryman - Telegram-MAX chat bridge
//!
//! A bot that pairs chats across Telegram and MAX and relays messages
//! between them, preserving formatting, replies, edits, and deletions.

mod bridge;
mod common;
mod config;
mod markup;
mod platform;
mod store;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info, warn};

use bridge::{Bridge, HelpLinks};
use config::env::get_config_path;
use config::load_and_validate;
use platform::{MaxClient, TelegramClient, Uploader};
use store::Store;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    info!("Ferryman v{} starting...", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config_path = get_config_path();
    info!("Loading configuration from {}...", config_path);

    let config = load_and_validate(&config_path).map_err(|e| {
        error!("Failed to load configuration: {}", e);
        error!("Please ensure {} exists and is properly formatted.", config_path);
        e
    })?;

    info!("Configuration loaded successfully");
    info!("  Database: {}", config.storage.path);

    // Open the store before touching the network; an unreachable
    // database is a startup failure
    let store = Arc::new(Store::open(&config.storage.path).context("open store")?);

    let http = reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(10))
        .build()
        .context("build HTTP client")?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let uploader = Uploader::new(
        http.clone(),
        config.max_api_url(),
        config.max.token.as_str(),
        shutdown_rx.clone(),
    );
    let telegram = Arc::new(TelegramClient::new(
        http.clone(),
        config.telegram_api_url(),
        &config.telegram.token,
        config.poll_timeout_secs(),
    ));
    let max = Arc::new(MaxClient::new(
        http,
        config.max_api_url(),
        config.max.token.as_str(),
        config.poll_timeout_secs(),
        uploader,
    ));

    // Identity probes fail fast on bad credentials
    let tg_name = telegram.get_me().await.context("Telegram getMe")?;
    info!("Telegram bot connected: @{}", tg_name);
    let max_name = max.get_me().await.context("MAX bot info")?;
    info!("MAX bot connected: {}", max_name);

    let help = HelpLinks {
        telegram_url: config.telegram_bot_url().to_string(),
        max_url: config.max_bot_url().to_string(),
    };

    let bridge = Bridge::new(telegram, max, store, help, shutdown_rx);
    let mut bridge_task = tokio::spawn(bridge.run());

    let shutdown = tokio::select! {
        biased;
        _ = shutdown_signal() => {
            info!("Shutdown signal received - stopping listeners...");
            true
        }
        _ = &mut bridge_task => {
            warn!("Bridge exited on its own");
            false
        }
    };

    if shutdown {
        // Fire-and-forget: a closed channel means everything already exited
        let _ = shutdown_tx.send(true);

        // Give in-flight sends a moment to finish
        let timeout = Duration::from_secs(5);
        match tokio::time::timeout(timeout, bridge_task).await {
            Ok(Ok(())) => info!("Bridge stopped gracefully"),
            Ok(Err(e)) => warn!("Bridge task panicked: {}", e),
            Err(_) => warn!("Bridge shutdown timed out"),
        }
    }

    info!("Exiting...");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C"),
        _ = terminate => info!("Received SIGTERM"),
    }
}
