//! sonde-probe — Sonde measurement client.
//!
//! Emits the packet stream, collects acknowledgments, and reports the
//! per-packet outcomes in strict id order followed by the loss summary.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};

use sonde_core::config::SondeConfig;
use sonde_core::{Ack, Transport};
use sonde_pools::{AckAggregator, SenderPool, UdpTransport};

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
    let probe = config.probe;

    let destination: SocketAddr = probe
        .destination
        .parse()
        .with_context(|| format!("invalid destination address {:?}", probe.destination))?;

    let transport = Arc::new(
        UdpTransport::bind("0.0.0.0:0".parse()?, 0)
            .await
            .context("failed to bind probe socket")?,
    );
    tracing::info!(
        local = %transport.local_addr()?,
        %destination,
        total = probe.total_packets,
        workers = probe.workers,
        "probe starting"
    );

    let aggregator = AckAggregator::new(
        probe.total_packets,
        Duration::from_micros(probe.poll_interval_us),
    );
    let sink = aggregator.sink();

    let (stop_tx, _) = tokio::sync::broadcast::channel::<()>(1);
    let aggregator_task = tokio::spawn(aggregator.run(stop_tx.subscribe()));

    // Acknowledgment listener: feeds the sink until the stop signal.
    let ack_listener = {
        let transport = transport.clone();
        let mut stop = stop_tx.subscribe();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = stop.recv() => return,
                    received = transport.recv_from(None) => match received {
                        Ok((data, _)) => match Ack::from_bytes(&data) {
                            Ok(ack) => sink.accept(ack),
                            Err(e) => tracing::trace!(error = %e, "undecodable ack, skipping"),
                        },
                        Err(e) => tracing::trace!(error = %e, "ack receive failed, still listening"),
                    }
                }
            }
        })
    };

    SenderPool::new(transport.clone(), destination, &probe)
        .run()
        .await?;

    tracing::info!(
        grace_ms = probe.grace_period_ms,
        "all packets sent, waiting for in-flight acknowledgments"
    );
    tokio::time::sleep(Duration::from_millis(probe.grace_period_ms)).await;
    let _ = stop_tx.send(());

    let report = aggregator_task.await?;
    ack_listener.await?;

    tracing::info!(
        total = report.summary.total,
        lost = report.summary.lost,
        loss_percentage = report.summary.loss_percentage,
        "measurement complete"
    );
    println!("{}", serde_json::to_string_pretty(&report.summary)?);
    Ok(())
}
