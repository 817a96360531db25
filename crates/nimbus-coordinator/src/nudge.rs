//! The supervisor nudge channel: a single-slot, non-blocking wakeup
//! signal, not a work-item queue. The supervisor always re-scans
//! the store on each wakeup, so deduplicating pending nudges into one slot
//! is sufficient and cheaper than a real queue.

use tokio::sync::mpsc;

/// The sending half, held by the [`crate::Coordinator`] and cloned freely
/// (it is just an `mpsc::Sender<()>` with capacity 1).
#[derive(Clone)]
pub struct NudgeSender {
    tx: mpsc::Sender<()>,
}

impl NudgeSender {
    /// Enqueues a wakeup if the single slot is empty. A full slot means a
    /// wakeup is already pending, so this is a no-op, never a block and
    /// never an error surfaced to the caller.
    pub fn nudge(&self) {
        match self.tx.try_send(()) {
            Ok(()) | Err(mpsc::error::TrySendError::Full(())) => {}
            Err(mpsc::error::TrySendError::Closed(())) => {
                tracing::warn!("supervisor nudge channel has no receiver; dropping wakeup");
            }
        }
    }
}

/// The receiving half, held by the supervisor (external to this crate; a
/// test or demo binary plays that role here).
pub struct NudgeReceiver {
    rx: mpsc::Receiver<()>,
}

impl NudgeReceiver {
    /// Waits for the next wakeup. Returns `None` once every sender has been
    /// dropped.
    pub async fn recv(&mut self) -> Option<()> {
        self.rx.recv().await
    }

    /// Drains any pending wakeup without blocking. The supervisor calls
    /// this before each scan so a stale nudge from a prior scan is not
    /// mistaken for a fresh one.
    pub fn try_recv(&mut self) -> bool {
        self.rx.try_recv().is_ok()
    }
}

/// Builds a fresh single-slot nudge channel.
#[must_use]
pub fn channel() -> (NudgeSender, NudgeReceiver) {
    let (tx, rx) = mpsc::channel(1);
    (NudgeSender { tx }, NudgeReceiver { rx })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn repeated_nudges_before_a_drain_collapse_to_one_wakeup() {
        let (tx, mut rx) = channel();
        tx.nudge();
        tx.nudge();
        tx.nudge();

        assert!(rx.try_recv());
        assert!(!rx.try_recv(), "slot should be empty after one drain");
    }

    #[tokio::test]
    async fn recv_observes_a_nudge_sent_after_the_wait_begins() {
        let (tx, mut rx) = channel();
        tx.nudge();
        let woken = rx.recv().await;
        assert_eq!(woken, Some(()));
    }
}
