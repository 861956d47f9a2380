//! Ordered result aggregator — replays out-of-order acknowledgments in
//! strict id order and computes the final loss summary.
//!
//! Arrival order is whatever the network produced; reporting order is
//! `1, 2, ..., total`. Arriving acks land in a concurrent pending map via
//! [`AckSink`]; a single reporting task repeatedly tries to remove the
//! entry for the next unreported id. `DashMap::remove` is the atomic
//! check-membership-and-remove step, and only the reporting task advances
//! the cursor, so an id can never be reported twice.
//!
//! The cursor idles with a bounded sleep between polls rather than
//! blocking on a wake signal. The interval is a tunable
//! (`probe.poll_interval_us`).

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::broadcast;

use sonde_core::Ack;

/// Terminal classification for one packet id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Verdict {
    /// Acknowledged with a matching checksum.
    Ok,
    /// Acknowledged with a checksum mismatch.
    Corrupt,
    /// No acknowledgment observed within the measurement window.
    Lost,
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Verdict::Ok => "OK",
            Verdict::Corrupt => "CORRUPT",
            Verdict::Lost => "LOST",
        })
    }
}

/// One reported classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Outcome {
    pub id: u32,
    pub verdict: Verdict,
}

/// Final loss summary for a run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Summary {
    pub total: u32,
    pub lost: u32,
    pub loss_percentage: f64,
}

impl Summary {
    pub fn new(total: u32, lost: u32) -> Self {
        let loss_percentage = if total == 0 {
            0.0
        } else {
            lost as f64 / total as f64 * 100.0
        };
        Self {
            total,
            lost,
            loss_percentage,
        }
    }
}

/// Everything a finished run produced: the ordered outcome sequence and
/// the summary.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub outcomes: Vec<Outcome>,
    pub summary: Summary,
}

/// Clonable insert handle for arriving acknowledgments.
///
/// Ids outside `1..=total` are ignored (the protocol does not authenticate
/// id validity), as are ids the cursor has already passed, so a
/// re-delivered ack cannot re-enter the map behind the cursor.
#[derive(Clone)]
pub struct AckSink {
    pending: Arc<DashMap<u32, Ack>>,
    cursor: Arc<AtomicU64>,
    total: u32,
}

impl AckSink {
    pub fn accept(&self, ack: Ack) {
        if ack.id == 0 || ack.id > self.total {
            tracing::trace!(id = ack.id, "out-of-range ack ignored");
            return;
        }
        if (ack.id as u64) < self.cursor.load(Ordering::Relaxed) {
            tracing::trace!(id = ack.id, "ack for already-reported id ignored");
            return;
        }
        self.pending.insert(ack.id, ack);
    }
}

pub struct AckAggregator {
    pending: Arc<DashMap<u32, Ack>>,
    /// Next id to report. u64 so `total + 1` cannot wrap.
    cursor: Arc<AtomicU64>,
    total: u32,
    poll_interval: Duration,
    outcomes: Vec<Outcome>,
    lost: u32,
}

impl AckAggregator {
    pub fn new(total: u32, poll_interval: Duration) -> Self {
        Self {
            pending: Arc::new(DashMap::new()),
            cursor: Arc::new(AtomicU64::new(1)),
            total,
            poll_interval,
            outcomes: Vec::with_capacity(total as usize),
            lost: 0,
        }
    }

    /// Insert handle for the acknowledgment receive path.
    pub fn sink(&self) -> AckSink {
        AckSink {
            pending: self.pending.clone(),
            cursor: self.cursor.clone(),
            total: self.total,
        }
    }

    /// Replay acknowledgments in order until every id is classified or the
    /// stop signal fires, then finalize the stragglers and report.
    pub async fn run(mut self, mut stop: broadcast::Receiver<()>) -> Report {
        loop {
            let next = self.cursor.load(Ordering::Relaxed);
            if next > self.total as u64 {
                break;
            }
            if self.step() {
                continue;
            }
            tokio::select! {
                _ = stop.recv() => break,
                _ = tokio::time::sleep(self.poll_interval) => {}
            }
        }
        self.finalize();
        Report {
            summary: self.summary(),
            outcomes: self.outcomes,
        }
    }

    /// Try to report the id at the cursor. Returns false if its ack has
    /// not arrived yet.
    fn step(&mut self) -> bool {
        let next = self.cursor.load(Ordering::Relaxed) as u32;
        match self.pending.remove(&next) {
            Some((_, ack)) => {
                let verdict = if ack.ok { Verdict::Ok } else { Verdict::Corrupt };
                self.report(next, verdict);
                self.cursor.fetch_add(1, Ordering::Relaxed);
                true
            }
            None => false,
        }
    }

    /// Classify every id the cursor has not reached: from its pending ack
    /// if one arrived, otherwise `LOST`. Idempotent: a second call walks
    /// an empty range and changes nothing.
    pub fn finalize(&mut self) {
        let next = self.cursor.load(Ordering::Relaxed);
        for id in next..=self.total as u64 {
            let id = id as u32;
            let verdict = match self.pending.remove(&id) {
                Some((_, ack)) if ack.ok => Verdict::Ok,
                Some(_) => Verdict::Corrupt,
                None => {
                    self.lost += 1;
                    Verdict::Lost
                }
            };
            self.report(id, verdict);
        }
        self.cursor.store(self.total as u64 + 1, Ordering::Relaxed);
    }

    /// Summary over what has been classified so far.
    pub fn summary(&self) -> Summary {
        Summary::new(self.total, self.lost)
    }

    fn report(&mut self, id: u32, verdict: Verdict) {
        tracing::info!(id, %verdict, "packet reported");
        self.outcomes.push(Outcome { id, verdict });
    }
}
