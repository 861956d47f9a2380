//! Sonde integration test harness.
//!
//! Tests drive the real pools over loopback UDP sockets inside one
//! process: a validator pool bound to an ephemeral 127.0.0.1 port, a
//! probe-side socket sending to it, and the ordered aggregator consuming
//! the acknowledgments. No external environment is required.
//!
//! Timings are deliberately generous: loopback delivery is fast, but the
//! pools are asynchronous and the drain window must dominate scheduling
//! jitter for the tests to be deterministic in practice.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::sync::broadcast;

use sonde_core::config::{DaemonConfig, ProbeConfig};
use sonde_core::{unix_nanos, Ack, Packet, Transport};
use sonde_pools::{AckAggregator, SenderPool, UdpTransport, ValidatorPool, Verdict};

// ── Harness ───────────────────────────────────────────────────────────────────

fn loopback() -> SocketAddr {
    "127.0.0.1:0".parse().unwrap()
}

/// A running validator pool on an ephemeral loopback port.
struct Daemon {
    addr: SocketAddr,
    shutdown: broadcast::Sender<()>,
    task: tokio::task::JoinHandle<Result<()>>,
}

async fn start_daemon(workers: usize) -> Result<Daemon> {
    let transport = UdpTransport::bind(loopback(), 0).await?;
    let addr = transport.local_addr()?;
    let config = DaemonConfig {
        workers,
        ..DaemonConfig::default()
    };
    let (shutdown, _) = broadcast::channel(1);
    let pool = ValidatorPool::new(Arc::new(transport), &config);
    let rx = shutdown.subscribe();
    let task = tokio::spawn(async move { pool.run(rx).await });
    Ok(Daemon {
        addr,
        shutdown,
        task,
    })
}

impl Daemon {
    async fn stop(self) -> Result<()> {
        let _ = self.shutdown.send(());
        self.task.await?
    }
}

/// Probe-side wiring: socket, aggregator, and ack listener for `total`
/// packets. Returns the pieces a test needs to drive a run.
struct ProbeSide {
    transport: Arc<UdpTransport>,
    aggregator_task: tokio::task::JoinHandle<sonde_pools::Report>,
    listener: tokio::task::JoinHandle<()>,
    stop: broadcast::Sender<()>,
}

async fn start_probe_side(total: u32) -> Result<ProbeSide> {
    let transport = Arc::new(UdpTransport::bind(loopback(), 0).await?);
    let aggregator = AckAggregator::new(total, Duration::from_micros(50));
    let sink = aggregator.sink();
    let (stop, _) = broadcast::channel(1);

    let aggregator_task = tokio::spawn(aggregator.run(stop.subscribe()));

    let listener = {
        let transport = transport.clone();
        let mut stop_rx = stop.subscribe();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = stop_rx.recv() => return,
                    received = transport.recv_from(None) => {
                        if let Ok((data, _)) = received {
                            if let Ok(ack) = Ack::from_bytes(&data) {
                                sink.accept(ack);
                            }
                        }
                    }
                }
            }
        })
    };

    Ok(ProbeSide {
        transport,
        aggregator_task,
        listener,
        stop,
    })
}

impl ProbeSide {
    /// Wait out the drain window, stop, and collect the report.
    async fn finish(self, drain: Duration) -> Result<sonde_pools::Report> {
        tokio::time::sleep(drain).await;
        let _ = self.stop.send(());
        let report = self.aggregator_task.await?;
        self.listener.await?;
        Ok(report)
    }
}

fn probe_config(total: u32, workers: usize) -> ProbeConfig {
    ProbeConfig {
        total_packets: total,
        workers,
        send_pacing_us: 50,
        ..ProbeConfig::default()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

/// Full pipeline, nothing lost: every id is acknowledged intact and the
/// outcomes come back in strict id order.
#[tokio::test]
async fn end_to_end_all_packets_delivered_intact() -> Result<()> {
    let daemon = start_daemon(4).await?;
    let probe = start_probe_side(50).await?;

    SenderPool::new(probe.transport.clone(), daemon.addr, &probe_config(50, 4))
        .run()
        .await?;

    let report = probe.finish(Duration::from_millis(1500)).await?;
    daemon.stop().await?;

    let ids: Vec<u32> = report.outcomes.iter().map(|o| o.id).collect();
    assert_eq!(ids, (1..=50).collect::<Vec<_>>());
    assert!(report.outcomes.iter().all(|o| o.verdict == Verdict::Ok));
    assert_eq!(report.summary.total, 50);
    assert_eq!(report.summary.lost, 0);
    assert_eq!(report.summary.loss_percentage, 0.0);
    Ok(())
}

/// A packet tampered with after sealing comes back acknowledged but
/// negative, and is classified CORRUPT, not LOST.
#[tokio::test]
async fn corrupted_payload_is_classified_corrupt() -> Result<()> {
    let daemon = start_daemon(2).await?;
    let probe = start_probe_side(3).await?;

    for id in 1..=3u32 {
        let mut packet = Packet::new(id, unix_nanos(), vec![id as u8; 32]);
        if id == 2 {
            packet.payload[7] ^= 0xff;
        }
        probe
            .transport
            .send_to(daemon.addr, &packet.to_bytes())
            .await?;
    }

    let report = probe.finish(Duration::from_millis(1000)).await?;
    daemon.stop().await?;

    let verdicts: Vec<Verdict> = report.outcomes.iter().map(|o| o.verdict).collect();
    assert_eq!(verdicts, vec![Verdict::Ok, Verdict::Corrupt, Verdict::Ok]);
    assert_eq!(report.summary.lost, 0);
    Ok(())
}

/// An id that is never sent is classified LOST in place, and the loss
/// percentage reflects it.
#[tokio::test]
async fn unsent_id_is_classified_lost() -> Result<()> {
    let daemon = start_daemon(2).await?;
    let probe = start_probe_side(5).await?;

    for id in [1u32, 2, 4, 5] {
        let packet = Packet::new(id, unix_nanos(), vec![0xaa; 16]);
        probe
            .transport
            .send_to(daemon.addr, &packet.to_bytes())
            .await?;
    }

    let report = probe.finish(Duration::from_millis(1000)).await?;
    daemon.stop().await?;

    let verdicts: Vec<Verdict> = report.outcomes.iter().map(|o| o.verdict).collect();
    assert_eq!(
        verdicts,
        vec![
            Verdict::Ok,
            Verdict::Ok,
            Verdict::Lost,
            Verdict::Ok,
            Verdict::Ok
        ]
    );
    assert_eq!(report.summary.lost, 1);
    assert!((report.summary.loss_percentage - 20.0).abs() < f64::EPSILON);
    Ok(())
}

/// Garbage datagrams are dropped by the validator without an
/// acknowledgment and without disturbing valid traffic.
#[tokio::test]
async fn garbage_datagrams_are_ignored() -> Result<()> {
    let daemon = start_daemon(2).await?;
    let probe = start_probe_side(1).await?;

    probe.transport.send_to(daemon.addr, b"}{not json").await?;
    probe.transport.send_to(daemon.addr, &[0u8; 40]).await?;
    let packet = Packet::new(1, unix_nanos(), vec![1, 2, 3]);
    probe
        .transport
        .send_to(daemon.addr, &packet.to_bytes())
        .await?;

    let report = probe.finish(Duration::from_millis(1000)).await?;
    daemon.stop().await?;

    assert_eq!(report.outcomes.len(), 1);
    assert_eq!(report.outcomes[0].verdict, Verdict::Ok);
    assert_eq!(report.summary.lost, 0);
    Ok(())
}

/// The wire format agrees with itself across a real socket: what the
/// sender pool emits, the validator decodes and verifies.
#[tokio::test]
async fn wire_format_survives_the_socket() -> Result<()> {
    let receiver = UdpTransport::bind(loopback(), 0).await?;
    let sender = UdpTransport::bind(loopback(), 0).await?;

    let packet = Packet::new(9, unix_nanos(), vec![0x5a; 64]);
    sender
        .send_to(receiver.local_addr()?, &packet.to_bytes())
        .await?;

    let (data, _) = receiver.recv_from(Some(Duration::from_secs(1))).await?;
    let decoded = Packet::from_bytes(&data)?;
    assert_eq!(decoded, packet);
    assert!(decoded.is_valid());
    Ok(())
}
