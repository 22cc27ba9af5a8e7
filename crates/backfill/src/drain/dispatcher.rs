//! 📬 WriteDispatcher: turns one record into one in-flight PUT.
//!
//! Derive the path, serialize the body, wait for a seat, spawn the write. The write task
//! holds its [`InFlightPermit`](crate::drain::limiter::InFlightPermit) for as long as it
//! runs, so success, failure, and getting aborted all give the seat back exactly once.
//!
//! 🧠 Knowledge graph:
//! - path: [`KeyDeriver::derive`]
//! - seat: [`InFlightLimiter::admit`](crate::drain::limiter::InFlightLimiter::admit)
//! - bookkeeping: [`DrainLedger`] (success counter + error latch)
//! - tasks: a `JoinSet`, reaped as we go and joined at the end

use std::panic;
use std::sync::Arc;

use tokio::task::{JoinError, JoinSet};
use tracing::{debug, trace};

use crate::backends::{ObjectStore, PutOptions};
use crate::common::Record;
use crate::drain::DrainError;
use crate::drain::ledger::DrainLedger;
use crate::keys::KeyDeriver;
use crate::progress::ProgressReporter;

pub(crate) struct WriteDispatcher {
    deriver: KeyDeriver,
    store: Arc<dyn ObjectStore>,
    bucket: Arc<str>,
    options: Arc<PutOptions>,
    ledger: Arc<DrainLedger>,
    reporter: Arc<dyn ProgressReporter>,
    writes: JoinSet<()>,
}

impl WriteDispatcher {
    pub(crate) fn new(
        deriver: KeyDeriver,
        store: Arc<dyn ObjectStore>,
        bucket: &str,
        options: PutOptions,
        ledger: Arc<DrainLedger>,
        reporter: Arc<dyn ProgressReporter>,
    ) -> Self {
        Self {
            deriver,
            store,
            bucket: Arc::from(bucket),
            options: Arc::new(options),
            ledger,
            reporter,
            writes: JoinSet::new(),
        }
    }

    /// 📬 Issue the write for `record`. Returns once the write has been spawned, not once
    /// it has landed.
    ///
    /// Waits for admission first. Cancelling this future while it waits is safe: nothing
    /// was admitted and nothing was spawned. Fails only when the limiter was closed.
    pub(crate) async fn dispatch(&mut self, record: Record) -> Result<(), DrainError> {
        self.reap_finished();

        let path = self.deriver.derive(&record);
        let body = match serde_json::to_vec(&record) {
            Ok(body) => body,
            Err(err) => {
                // -- 💀 no write issued; the latch ends the scan on the next turn
                self.ledger.latch.trip(DrainError::SinkWrite {
                    path: path.to_string(),
                    source: err.into(),
                });
                return Ok(());
            }
        };

        let permit = self
            .ledger
            .limiter
            .admit()
            .await
            .map_err(|_| DrainError::Aborted)?;

        let store = Arc::clone(&self.store);
        let bucket = Arc::clone(&self.bucket);
        let options = Arc::clone(&self.options);
        let ledger = Arc::clone(&self.ledger);
        let reporter = Arc::clone(&self.reporter);
        self.writes.spawn(async move {
            // -- 🎟️ the permit lives exactly as long as this task
            let _permit = permit;
            match store.put(&bucket, &path, body, &options).await {
                Ok(()) => {
                    let count = ledger.record_success();
                    trace!("✅ wrote {path} ({count} so far)");
                    reporter.on_write(count, ledger.rate(count));
                }
                Err(source) => {
                    // -- 🔒 latched while the permit is still held: the engine learns about
                    // the failure before the seat frees up for anyone else
                    ledger.latch.trip(DrainError::SinkWrite {
                        path: path.to_string(),
                        source,
                    });
                    let count = ledger.written();
                    reporter.on_write(count, ledger.rate(count));
                }
            }
        });
        Ok(())
    }

    /// ⏳ Wait for every write issued so far. A panic inside a write is re-raised here.
    pub(crate) async fn drain(&mut self) {
        debug!("⏳ waiting on {} outstanding writes", self.writes.len());
        while let Some(joined) = self.writes.join_next().await {
            settle(joined);
        }
    }

    /// 🧨 Abandon every outstanding write. Their permits drop as the tasks are torn down.
    pub(crate) fn abort_all(&mut self) {
        debug!("🧨 aborting {} outstanding writes", self.writes.len());
        self.writes.abort_all();
    }

    /// 🧹 Collect finished tasks so the set only holds writes that are still running.
    fn reap_finished(&mut self) {
        while let Some(joined) = self.writes.try_join_next() {
            settle(joined);
        }
    }
}

fn settle(joined: Result<(), JoinError>) {
    if let Err(err) = joined {
        if err.is_panic() {
            panic::resume_unwind(err.into_panic());
        }
        // -- 🧨 cancelled on purpose by abort_all, nothing to report
    }
}
