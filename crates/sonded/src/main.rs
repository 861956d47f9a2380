//! sonded — Sonde receiver daemon.
//!
//! Binds the listen socket, then validates and acknowledges every packet
//! the probe throws at it until Ctrl-C.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};

use sonde_core::config::SondeConfig;
use sonde_core::Transport;
use sonde_pools::{UdpTransport, ValidatorPool};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    // Load config
    if let Err(e) = SondeConfig::write_default_if_missing() {
        tracing::warn!(error = %e, "failed to write default config");
    }
    let config = SondeConfig::load().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "failed to load config, using defaults");
        SondeConfig::default()
    });

    let listen: SocketAddr = config
        .daemon
        .listen
        .parse()
        .with_context(|| format!("invalid listen address {:?}", config.daemon.listen))?;

    let transport = UdpTransport::bind(listen, config.daemon.recv_buffer_bytes)
        .await
        .context("failed to bind listen socket")?;
    tracing::info!(addr = %transport.local_addr()?, "sonded listening");

    // Shutdown channel
    let (shutdown_tx, _) = tokio::sync::broadcast::channel::<()>(1);
    {
        let shutdown = shutdown_tx.clone();
        tokio::spawn(async move {
            tokio::signal::ctrl_c().await.ok();
            tracing::info!("shutdown signal received");
            let _ = shutdown.send(());
        });
    }

    let pool = ValidatorPool::new(Arc::new(transport), &config.daemon);
    pool.run(shutdown_tx.subscribe()).await
}
