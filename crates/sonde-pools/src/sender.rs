//! Sender pool — generates and transmits the packet stream.
//!
//! A shared atomic counter hands out ids: a worker claims
//! `fetch_add(1) + 1` and exits once the claim exceeds the target count.
//! Every id in `1..=total` is claimed by exactly one worker, with no locks
//! and no gaps. Packets are fire-and-forget: a send error is traced and
//! the packet will simply be observed as lost.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rand::{Rng, RngCore};

use sonde_core::config::ProbeConfig;
use sonde_core::{unix_nanos, Packet, Transport};

pub struct SenderPool<T> {
    transport: Arc<T>,
    destination: SocketAddr,
    total: u32,
    workers: usize,
    pacing: Duration,
}

impl<T: Transport> SenderPool<T> {
    pub fn new(transport: Arc<T>, destination: SocketAddr, config: &ProbeConfig) -> Self {
        Self {
            transport,
            destination,
            total: config.total_packets,
            workers: config.workers.max(1),
            pacing: Duration::from_micros(config.send_pacing_us),
        }
    }

    /// Run the pool to completion: all ids claimed, all workers joined.
    pub async fn run(self) -> anyhow::Result<()> {
        let counter = Arc::new(AtomicU32::new(0));

        let mut handles = Vec::with_capacity(self.workers);
        for _ in 0..self.workers {
            handles.push(tokio::spawn(worker(
                self.transport.clone(),
                self.destination,
                self.total,
                counter.clone(),
                self.pacing,
            )));
        }
        for handle in handles {
            handle.await?;
        }
        tracing::info!(total = self.total, "sender pool drained");
        Ok(())
    }
}

async fn worker<T: Transport>(
    transport: Arc<T>,
    destination: SocketAddr,
    total: u32,
    counter: Arc<AtomicU32>,
    pacing: Duration,
) {
    loop {
        let id = counter.fetch_add(1, Ordering::Relaxed) + 1;
        if id > total {
            return;
        }

        let bytes = build_packet(id).to_bytes();
        if let Err(e) = transport.send_to(destination, &bytes).await {
            tracing::trace!(id, error = %e, "send failed, packet will be observed as lost");
        }

        if !pacing.is_zero() {
            tokio::time::sleep(pacing).await;
        }
    }
}

/// Payload length for packet `id` is uniform in `[id, 2*id]`: a
/// reproducible, monotonically growing load profile.
fn build_packet(id: u32) -> Packet {
    let mut rng = rand::thread_rng();
    let len = rng.gen_range(id as u64..=2 * id as u64) as usize;
    let mut payload = vec![0u8; len];
    rng.fill_bytes(&mut payload);
    Packet::new(id, unix_nanos(), payload)
}
