//! Validator pool — drains inbound datagrams, checks integrity, and
//! acknowledges.
//!
//! The receive loop feeds a bounded job queue; workers drain it through a
//! shared receiver. The queue's overflow policy is drop, not block: a
//! datagram arriving while the queue is full is discarded so the receive
//! loop never stalls. Malformed datagrams are dropped silently; a checksum
//! mismatch is not an error but a negative acknowledgment.

use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::{broadcast, mpsc, Mutex};

use sonde_core::config::DaemonConfig;
use sonde_core::{unix_nanos, Ack, Packet, Transport};

use crate::diag::{diag_channel, log_lines, DiagLine, DiagSender};

/// One inbound datagram awaiting validation.
#[derive(Debug, Clone)]
pub struct Job {
    pub data: Bytes,
    pub source: SocketAddr,
}

pub struct ValidatorPool<T> {
    transport: Arc<T>,
    workers: usize,
    jobs_tx: mpsc::Sender<Job>,
    jobs_rx: Arc<Mutex<mpsc::Receiver<Job>>>,
    diag_tx: DiagSender,
    diag_rx: mpsc::Receiver<DiagLine>,
}

/// Offer a job to the bounded queue. Returns false if it was dropped
/// because the queue is full (or the pool is gone).
fn offer(jobs_tx: &mpsc::Sender<Job>, job: Job) -> bool {
    match jobs_tx.try_send(job) {
        Ok(()) => true,
        Err(mpsc::error::TrySendError::Full(_)) => {
            tracing::trace!("job queue full, datagram dropped");
            false
        }
        Err(mpsc::error::TrySendError::Closed(_)) => false,
    }
}

impl<T: Transport> ValidatorPool<T> {
    pub fn new(transport: Arc<T>, config: &DaemonConfig) -> Self {
        let workers = if config.workers == 0 {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        } else {
            config.workers
        };
        let (jobs_tx, jobs_rx) = mpsc::channel(config.job_queue_capacity.max(1));
        let (diag_tx, diag_rx) = diag_channel(config.diag_queue_capacity.max(1));
        Self {
            transport,
            workers,
            jobs_tx,
            jobs_rx: Arc::new(Mutex::new(jobs_rx)),
            diag_tx,
            diag_rx,
        }
    }

    /// Offer a job to the bounded queue. Returns false if it was dropped.
    pub fn enqueue(&self, job: Job) -> bool {
        offer(&self.jobs_tx, job)
    }

    /// Receive datagrams into the queue and validate them until the
    /// shutdown signal fires, then drain the workers and join them.
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) -> anyhow::Result<()> {
        let ValidatorPool {
            transport,
            workers,
            jobs_tx,
            jobs_rx,
            diag_tx,
            diag_rx,
        } = self;

        let logger = tokio::spawn(log_lines(diag_rx));

        let mut handles = Vec::with_capacity(workers);
        for _ in 0..workers {
            handles.push(tokio::spawn(worker(
                transport.clone(),
                jobs_rx.clone(),
                diag_tx.clone(),
            )));
        }
        tracing::info!(workers, "validator pool running");

        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    tracing::info!("validator pool shutting down");
                    break;
                }
                received = transport.recv_from(None) => match received {
                    Ok((data, source)) => {
                        offer(&jobs_tx, Job { data: Bytes::from(data), source });
                    }
                    Err(e) => {
                        tracing::trace!(error = %e, "receive failed, skipping datagram");
                    }
                }
            }
        }

        // Close the queue: workers finish what is buffered, then exit.
        drop(jobs_tx);
        drop(diag_tx);
        for handle in handles {
            handle.await?;
        }
        logger.await?;
        Ok(())
    }
}

async fn worker<T: Transport>(
    transport: Arc<T>,
    jobs: Arc<Mutex<mpsc::Receiver<Job>>>,
    diag: DiagSender,
) {
    loop {
        // The lock covers only the dequeue; validation and the ack send
        // run outside it.
        let job = { jobs.lock().await.recv().await };
        let Some(job) = job else { return };

        let packet = match Packet::from_bytes(&job.data) {
            Ok(p) => p,
            Err(e) => {
                tracing::trace!(error = %e, "undecodable datagram, dropping");
                continue;
            }
        };

        let received_at = unix_nanos();
        let ok = packet.is_valid();

        diag.emit(DiagLine {
            id: packet.id,
            sent_at: packet.timestamp,
            received_at,
            valid: ok,
        });

        let ack = Ack {
            id: packet.id,
            ok,
            received_at,
        };
        if let Err(e) = transport.send_to(job.source, &ack.to_bytes()).await {
            tracing::trace!(id = packet.id, error = %e, "ack send failed, dropping");
        }
    }
}
