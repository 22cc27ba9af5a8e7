//! 📒 DrainLedger: all the shared mutable state of one drain, in one place, for one run.
//!
//! In-flight counter (inside the limiter), success counter, start time, and the error
//! latch. Built when `run` starts, dropped when it returns. Two drains in the same process
//! get two ledgers and never hear about each other.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use tokio::sync::Notify;
use tracing::warn;

use crate::drain::limiter::InFlightLimiter;
use crate::drain::{DrainError, DrainSummary};

#[derive(Debug)]
pub(crate) struct DrainLedger {
    pub(crate) limiter: Arc<InFlightLimiter>,
    pub(crate) latch: ErrorLatch,
    written: AtomicU64,
    started: Instant,
}

impl DrainLedger {
    pub(crate) fn new(max_in_flight: usize) -> Self {
        Self {
            limiter: Arc::new(InFlightLimiter::new(max_in_flight)),
            latch: ErrorLatch::default(),
            written: AtomicU64::new(0),
            started: Instant::now(),
        }
    }

    /// ✅ One more record confirmed written. Returns the new total.
    pub(crate) fn record_success(&self) -> u64 {
        self.written.fetch_add(1, Ordering::AcqRel) + 1
    }

    pub(crate) fn written(&self) -> u64 {
        self.written.load(Ordering::Acquire)
    }

    /// 📈 Records per second since the ledger was opened.
    pub(crate) fn rate(&self, count: u64) -> f64 {
        let elapsed = self.started.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            count as f64 / elapsed
        } else {
            0.0
        }
    }

    pub(crate) fn summary(&self) -> DrainSummary {
        let count = self.written();
        DrainSummary {
            count,
            elapsed: self.started.elapsed(),
            rate: self.rate(count),
        }
    }
}

/// 🔒 Write-once error holder. The first `trip` wins; everyone after gets a log line.
#[derive(Debug, Default)]
pub(crate) struct ErrorLatch {
    tripped: AtomicBool,
    first: Mutex<Option<DrainError>>,
    notify: Notify,
}

impl ErrorLatch {
    /// Returns `true` when this call was the one that latched.
    pub(crate) fn trip(&self, error: DrainError) -> bool {
        if self
            .tripped
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            warn!("⚠️ discarding error after the first one was latched: {error:#}");
            return false;
        }
        *self.first.lock().unwrap_or_else(PoisonError::into_inner) = Some(error);
        self.notify.notify_waiters();
        true
    }

    pub(crate) fn is_tripped(&self) -> bool {
        self.tripped.load(Ordering::Acquire)
    }

    /// ⏳ Resolves as soon as any error has been latched.
    pub(crate) async fn tripped(&self) {
        loop {
            let notified = self.notify.notified();
            if self.is_tripped() {
                return;
            }
            notified.await;
        }
    }

    /// 🎁 Hands over the latched error. The latch stays tripped afterwards.
    pub(crate) fn take(&self) -> Option<DrainError> {
        self.first
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn the_one_where_first_error_wins() {
        let latch = ErrorLatch::default();
        assert!(latch.trip(DrainError::Cancelled));
        assert!(!latch.trip(DrainError::Aborted));
        assert!(matches!(latch.take(), Some(DrainError::Cancelled)));
        // 🧪 taken, but still tripped. a latch does not un-latch.
        assert!(latch.is_tripped());
        assert!(!latch.trip(DrainError::Aborted));
        assert!(latch.take().is_none());
    }

    #[tokio::test]
    async fn the_one_where_waiters_hear_the_trip() {
        let latch = Arc::new(ErrorLatch::default());
        let waiter = {
            let latch = Arc::clone(&latch);
            tokio::spawn(async move { latch.tripped().await })
        };
        latch.trip(DrainError::Cancelled);
        tokio::time::timeout(std::time::Duration::from_millis(500), waiter)
            .await
            .expect("💀 the latch tripped and nobody noticed")
            .unwrap();
    }

    #[test]
    fn the_one_where_successes_add_up() {
        let ledger = DrainLedger::new(4);
        assert_eq!(ledger.record_success(), 1);
        assert_eq!(ledger.record_success(), 2);
        assert_eq!(ledger.summary().count, 2);
    }
}
