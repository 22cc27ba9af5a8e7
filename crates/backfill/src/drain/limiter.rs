//! 🚦 InFlightLimiter: the bouncer at the door of the object store.
//!
//! A semaphore decides who gets in; an atomic counter keeps score. Admission suspends the
//! caller until a seat frees up, so a firehose producer ends up waiting politely in line
//! instead of piling ten million pending PUTs into RAM.
//!
//! 🧠 Knowledge graph:
//! - [`InFlightLimiter::admit`] → [`InFlightPermit`] (semaphore permit + counter +1)
//! - dropping the permit → [`InFlightLimiter::release`] (counter −1) → seat handed back
//! - counter hits 0 → [`InFlightLimiter::drained`] waiters wake up
//! - `high_water` remembers the worst moment, for tests and for bragging
//!
//! ⚠️ Releasing below zero is not an error you handle. It is a bug you fix. It panics.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::{AcquireError, Notify, OwnedSemaphorePermit, Semaphore};
use tracing::trace;

#[derive(Debug)]
pub struct InFlightLimiter {
    max_in_flight: usize,
    seats: Arc<Semaphore>,
    in_flight: AtomicUsize,
    high_water: AtomicUsize,
    drained: Notify,
}

/// 🎟️ Proof of admission. Hold it for the duration of the write; drop it to release.
///
/// The counter is decremented in `Drop::drop` before the semaphore permit field drops,
/// so the next admission can never observe a count above the ceiling.
#[derive(Debug)]
pub struct InFlightPermit {
    limiter: Arc<InFlightLimiter>,
    _seat: OwnedSemaphorePermit,
}

impl Drop for InFlightPermit {
    fn drop(&mut self) {
        self.limiter.release();
    }
}

impl InFlightLimiter {
    pub fn new(max_in_flight: usize) -> Self {
        Self {
            max_in_flight,
            seats: Arc::new(Semaphore::new(max_in_flight)),
            in_flight: AtomicUsize::new(0),
            high_water: AtomicUsize::new(0),
            drained: Notify::new(),
        }
    }

    /// 🎫 Wait for a seat, then take it.
    ///
    /// Only fails once the limiter has been [`close`](Self::close)d, which happens when a
    /// drain is aborted and nobody should be issuing writes anymore.
    pub async fn admit(self: &Arc<Self>) -> Result<InFlightPermit, AcquireError> {
        let seat = Arc::clone(&self.seats).acquire_owned().await?;
        let now = self.in_flight.fetch_add(1, Ordering::AcqRel) + 1;
        self.high_water.fetch_max(now, Ordering::AcqRel);
        trace!("🎫 admitted write, {now}/{} in flight", self.max_in_flight);
        Ok(InFlightPermit {
            limiter: Arc::clone(self),
            _seat: seat,
        })
    }

    /// 🔓 One write settled. Normally called by [`InFlightPermit`]'s `Drop`.
    ///
    /// # Panics
    /// When nothing is in flight. Somebody released a permit they never had.
    pub fn release(&self) {
        let previous = self
            .in_flight
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1));
        match previous {
            Ok(1) => self.drained.notify_waiters(),
            Ok(_) => {}
            Err(_) => panic!(
                "💀 InFlightLimiter::release called with zero writes in flight. \
                 More releases than admissions means the bookkeeping is broken."
            ),
        }
    }

    pub fn is_drained(&self) -> bool {
        self.in_flight() == 0
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Acquire)
    }

    pub fn high_water(&self) -> usize {
        self.high_water.load(Ordering::Acquire)
    }

    /// ⏳ Resolves once nothing is in flight.
    pub async fn drained(&self) {
        loop {
            // -- 🔔 register before checking, or a release in between goes unheard
            let notified = self.drained.notified();
            if self.is_drained() {
                return;
            }
            notified.await;
        }
    }

    /// 🧨 No more admissions, ever. Pending `admit` calls fail immediately.
    pub fn close(&self) {
        self.seats.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn the_one_where_permits_count_up_and_back_down() {
        let limiter = Arc::new(InFlightLimiter::new(2));
        let first = limiter.admit().await.unwrap();
        let second = limiter.admit().await.unwrap();
        assert_eq!(limiter.in_flight(), 2);
        assert!(!limiter.is_drained());

        drop(first);
        drop(second);
        assert!(limiter.is_drained());
        assert_eq!(limiter.high_water(), 2);
    }

    #[tokio::test]
    async fn the_one_where_the_third_guest_waits_outside() {
        let limiter = Arc::new(InFlightLimiter::new(2));
        let first = limiter.admit().await.unwrap();
        let _second = limiter.admit().await.unwrap();

        // 🧪 at the ceiling: admission must not resolve
        let blocked = tokio::time::timeout(Duration::from_millis(50), limiter.admit()).await;
        assert!(blocked.is_err(), "a third permit slipped past a ceiling of 2");

        drop(first);
        let third = tokio::time::timeout(Duration::from_millis(500), limiter.admit())
            .await
            .expect("💀 seat freed but admission never resolved")
            .unwrap();
        assert_eq!(limiter.in_flight(), 2);
        assert_eq!(limiter.high_water(), 2);
        drop(third);
    }

    #[tokio::test]
    async fn the_one_where_drained_wakes_up_on_the_last_release() {
        let limiter = Arc::new(InFlightLimiter::new(4));
        let permit = limiter.admit().await.unwrap();

        let waiter = {
            let limiter = Arc::clone(&limiter);
            tokio::spawn(async move { limiter.drained().await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        drop(permit);
        tokio::time::timeout(Duration::from_millis(500), waiter)
            .await
            .expect("💀 drained() never woke up")
            .unwrap();
    }

    #[tokio::test]
    async fn the_one_where_closing_turns_everyone_away() {
        let limiter = Arc::new(InFlightLimiter::new(1));
        limiter.close();
        assert!(limiter.admit().await.is_err());
    }

    #[test]
    #[should_panic(expected = "zero writes in flight")]
    fn the_one_where_releasing_nothing_is_a_bug() {
        let limiter = InFlightLimiter::new(1);
        limiter.release();
    }
}
