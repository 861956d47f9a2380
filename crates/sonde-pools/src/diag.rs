//! Best-effort per-packet diagnostics.
//!
//! Validator workers push one line per validated packet into a bounded
//! channel; a single logger task drains it. The push never blocks: when
//! the channel is full the line is dropped. Diagnostics must not apply
//! backpressure to packet processing.

use tokio::sync::mpsc;

/// One diagnostic record, emitted per validated packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiagLine {
    pub id: u32,
    /// Sender's capture instant, from the packet.
    pub sent_at: u64,
    /// Daemon's observation instant.
    pub received_at: u64,
    pub valid: bool,
}

/// Non-blocking producer half of the diagnostic channel.
#[derive(Clone)]
pub struct DiagSender(mpsc::Sender<DiagLine>);

impl DiagSender {
    /// Offer a line. Returns false if the channel was full (line dropped)
    /// or the logger is gone.
    pub fn emit(&self, line: DiagLine) -> bool {
        self.0.try_send(line).is_ok()
    }
}

/// Create the bounded diagnostic channel.
pub fn diag_channel(capacity: usize) -> (DiagSender, mpsc::Receiver<DiagLine>) {
    let (tx, rx) = mpsc::channel(capacity);
    (DiagSender(tx), rx)
}

/// Drain diagnostic lines into the log until all senders are dropped.
pub async fn log_lines(mut rx: mpsc::Receiver<DiagLine>) {
    while let Some(line) = rx.recv().await {
        tracing::info!(
            id = line.id,
            sent_ns = line.sent_at,
            received_ns = line.received_at,
            valid = line.valid,
            "packet validated"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(id: u32) -> DiagLine {
        DiagLine {
            id,
            sent_at: 1,
            received_at: 2,
            valid: true,
        }
    }

    #[tokio::test]
    async fn emit_drops_on_full_instead_of_blocking() {
        let (tx, _rx) = diag_channel(2);
        assert!(tx.emit(line(1)));
        assert!(tx.emit(line(2)));
        // Channel full: the third line is dropped, and emit returns
        // immediately rather than waiting for the logger.
        assert!(!tx.emit(line(3)));
    }

    #[tokio::test]
    async fn lines_arrive_in_emit_order() {
        let (tx, mut rx) = diag_channel(8);
        tx.emit(line(1));
        tx.emit(line(2));
        assert_eq!(rx.recv().await.unwrap().id, 1);
        assert_eq!(rx.recv().await.unwrap().id, 2);
    }

    #[tokio::test]
    async fn logger_exits_when_senders_drop() {
        let (tx, rx) = diag_channel(4);
        tx.emit(line(9));
        drop(tx);
        // Must terminate: recv yields the buffered line then None.
        log_lines(rx).await;
    }
}
