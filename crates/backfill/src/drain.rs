//! 🚰➡️🪣 The drain engine: a table scan goes in one end, objects come out the other.
//!
//! 🎬 COLD OPEN. INT. SERVER ROOM, NIGHT
//!
//! The scan produces rows faster than the store can swallow them. Left alone, it would fill
//! the heap with a million pending PUTs and the OOM killer would write the ending. Instead,
//! the engine reads one record, waits for a seat under the in-flight ceiling, issues the
//! write, and only then reads the next. While it waits, the channel fills up, and the
//! producer waits too. That chain is all the backpressure there is.
//!
//! 🧠 Knowledge graph:
//! - [`DrainEngine::run`] walks `Idle → Scanning → Draining → Finalizing → Completed | Failed`
//! - the producer: a `SourceWorker` task feeding a bounded `async_channel`
//! - the writes: a `WriteDispatcher`, gated by the [`InFlightLimiter`]
//! - the shared state: one `DrainLedger` per run (limiter, success counter, error latch)
//! - the exits: [`ShutdownHandle::stop`] (finish in-flight writes, then `Cancelled`) and
//!   [`ShutdownHandle::abort`] (walk away now, `Aborted`)
//!
//! ⚠️ First error wins. Later errors are logged and dropped. No aggregation, no regrets.

use std::fmt;
use std::panic;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, info};

use crate::backends::{ObjectStore, RecordSource};
use crate::common::Record;
use crate::keys::{KeyDeriver, KeySchema};
use crate::progress::{NoProgress, ProgressReporter};

mod config;
mod dispatcher;
mod error;
mod ledger;
pub mod limiter;
mod workers;

pub use config::DrainConfig;
pub use error::DrainError;
pub use limiter::{InFlightLimiter, InFlightPermit};

use dispatcher::WriteDispatcher;
use ledger::DrainLedger;
use workers::{SourceWorker, Worker};

// ============================================================
//  📊 DrainSummary: what a good run leaves behind
// ============================================================

/// 📊 The happy ending: how many records landed, and how long it took.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrainSummary {
    /// ✅ successful writes
    pub count: u64,
    pub elapsed: Duration,
    /// 📈 records per second over the whole run
    pub rate: f64,
}

impl DrainSummary {
    pub fn elapsed_ms(&self) -> u128 {
        self.elapsed.as_millis()
    }
}

impl fmt::Display for DrainSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} records in {} ms ({:.1} records/s)",
            self.count,
            self.elapsed_ms(),
            self.rate
        )
    }
}

// ============================================================
//  🚦 DrainPhase: the state machine, and its one rulebook
// ============================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainPhase {
    /// 💤 built and validated, nothing consumed yet
    Idle,
    /// 🚰 pulling records and issuing writes
    Scanning,
    /// 🏁 the source is exhausted; no more records are coming
    Draining,
    /// ⏳ waiting for the writes already issued
    Finalizing,
    Completed,
    Failed,
}

impl DrainPhase {
    fn can_become(self, next: DrainPhase) -> bool {
        use DrainPhase::*;
        matches!(
            (self, next),
            (Idle, Scanning)
                | (Idle, Failed)
                | (Scanning, Draining)
                | (Scanning, Finalizing)
                | (Draining, Finalizing)
                | (Finalizing, Completed)
                | (Finalizing, Failed)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, DrainPhase::Completed | DrainPhase::Failed)
    }
}

// ============================================================
//  🛑 ShutdownHandle: the big red buttons
// ============================================================

/// How hard somebody asked us to quit. Only ever escalates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum ShutdownMode {
    Running,
    Stop,
    Abort,
}

/// 🛑 Cloneable remote control for a [`DrainEngine`]. Hand it to a signal handler.
///
/// `stop()` stops admitting records, lets in-flight writes finish, and ends the run with
/// [`DrainError::Cancelled`]. `abort()` also abandons those in-flight writes and ends it
/// with [`DrainError::Aborted`]. Calling `stop()` after `abort()` changes nothing.
#[derive(Debug, Clone)]
pub struct ShutdownHandle(Arc<watch::Sender<ShutdownMode>>);

impl ShutdownHandle {
    pub fn stop(&self) {
        self.escalate(ShutdownMode::Stop);
    }

    pub fn abort(&self) {
        self.escalate(ShutdownMode::Abort);
    }

    fn escalate(&self, mode: ShutdownMode) {
        self.0.send_if_modified(|current| {
            if mode > *current {
                *current = mode;
                true
            } else {
                false
            }
        });
    }
}

async fn requested(shutdown: &mut watch::Receiver<ShutdownMode>, at_least: ShutdownMode) {
    // -- the engine keeps a sender alive for its whole life, so this only errs if it is gone
    if shutdown.wait_for(|mode| *mode >= at_least).await.is_err() {
        std::future::pending::<()>().await;
    }
}

// ============================================================
//  🚰 DrainEngine
// ============================================================

/// 🚰 Drains a [`RecordSource`] into an [`ObjectStore`] with at most `max_in_flight` writes
/// outstanding at any moment.
pub struct DrainEngine {
    config: DrainConfig,
    store: Arc<dyn ObjectStore>,
    reporter: Arc<dyn ProgressReporter>,
    phase: DrainPhase,
    shutdown: Arc<watch::Sender<ShutdownMode>>,
}

impl fmt::Debug for DrainEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DrainEngine")
            .field("config", &self.config)
            .field("store", &self.store)
            .field("phase", &self.phase)
            .finish()
    }
}

/// Why the scan loop stopped pulling.
enum ScanExit {
    Exhausted,
    Latched,
    ShutdownRequested,
}

impl DrainEngine {
    /// 🚀 Validates the config up front. A bad destination fails here, before any source
    /// method has been called.
    pub fn new(config: DrainConfig, store: Arc<dyn ObjectStore>) -> Result<Self, DrainError> {
        config.validate()?;
        let (shutdown, _) = watch::channel(ShutdownMode::Running);
        Ok(Self {
            config,
            store,
            reporter: Arc::new(NoProgress),
            phase: DrainPhase::Idle,
            shutdown: Arc::new(shutdown),
        })
    }

    pub fn with_reporter(mut self, reporter: Arc<dyn ProgressReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    pub fn phase(&self) -> DrainPhase {
        self.phase
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle(Arc::clone(&self.shutdown))
    }

    fn transition(&mut self, next: DrainPhase) {
        assert!(
            self.phase.can_become(next),
            "💀 illegal drain phase transition {:?} -> {:?}",
            self.phase,
            next
        );
        debug!("🚦 drain phase {:?} -> {:?}", self.phase, next);
        self.phase = next;
    }

    /// 🚰 Run the drain to completion. Exactly one outcome: a summary or the first error.
    ///
    /// # Panics
    /// When called on an engine that already ran, or when a write task panicked.
    pub async fn run<S>(&mut self, mut source: S) -> Result<DrainSummary, DrainError>
    where
        S: RecordSource + 'static,
    {
        assert_eq!(
            self.phase,
            DrainPhase::Idle,
            "💀 a DrainEngine runs once; build a new one for the next drain"
        );

        let declared = match source.key_fields().await {
            Ok(declared) => declared,
            Err(err) => return self.fail_early(DrainError::Producer(err)),
        };
        let schema = match KeySchema::new(declared) {
            Ok(schema) => schema,
            Err(err) => return self.fail_early(err),
        };
        info!(
            "🚀 draining '{}' into {}/{} with up to {} writes in flight, key fields {:?}",
            self.config.source_name,
            self.config.destination_bucket,
            self.config.destination_prefix,
            self.config.max_in_flight,
            schema.fields()
        );

        let ledger = Arc::new(DrainLedger::new(self.config.max_in_flight));
        let mut dispatcher = WriteDispatcher::new(
            KeyDeriver::new(
                self.config.destination_prefix.as_str(),
                self.config.source_name.as_str(),
                schema,
            ),
            Arc::clone(&self.store),
            &self.config.destination_bucket,
            self.config.put_options(),
            Arc::clone(&ledger),
            Arc::clone(&self.reporter),
        );
        let (tx, rx) = async_channel::bounded::<Record>(self.config.queue_capacity);
        let producer = SourceWorker::new(source, tx, Arc::clone(&ledger)).start();
        let mut shutdown = self.shutdown.subscribe();

        self.transition(DrainPhase::Scanning);
        let exit = loop {
            let record = tokio::select! {
                biased;
                _ = ledger.latch.tripped() => break ScanExit::Latched,
                _ = requested(&mut shutdown, ShutdownMode::Stop) => break ScanExit::ShutdownRequested,
                received = rx.recv() => match received {
                    Ok(record) => record,
                    Err(_) => break ScanExit::Exhausted,
                },
            };
            // -- 🎫 while admission waits, nobody reads the channel. that is the backpressure.
            let dispatched = tokio::select! {
                biased;
                _ = ledger.latch.tripped() => break ScanExit::Latched,
                _ = requested(&mut shutdown, ShutdownMode::Stop) => break ScanExit::ShutdownRequested,
                dispatched = dispatcher.dispatch(record) => dispatched,
            };
            if let Err(err) = dispatched {
                ledger.latch.trip(err);
                break ScanExit::Latched;
            }
        };

        // -- 🚪 no more records accepted, whatever the reason
        rx.close();
        match exit {
            ScanExit::Exhausted => self.transition(DrainPhase::Draining),
            ScanExit::Latched => debug!("🔒 scan stopped by a latched error"),
            ScanExit::ShutdownRequested => {
                info!("🛑 stop requested, letting in-flight writes finish");
                ledger.latch.trip(DrainError::Cancelled);
            }
        }
        if !producer.is_finished() {
            producer.abort();
        }
        if let Err(err) = producer.await {
            if err.is_panic() {
                panic::resume_unwind(err.into_panic());
            }
        }

        self.transition(DrainPhase::Finalizing);
        let aborted = tokio::select! {
            biased;
            _ = requested(&mut shutdown, ShutdownMode::Abort) => true,
            _ = async {
                dispatcher.drain().await;
                ledger.limiter.drained().await;
            } => false,
        };
        if aborted {
            info!(
                "🧨 abort requested, abandoning {} in-flight writes",
                ledger.limiter.in_flight()
            );
            dispatcher.abort_all();
            ledger.limiter.close();
            // -- a real failure latched earlier still wins; a polite stop does not
            let err = match ledger.latch.take() {
                Some(DrainError::Cancelled) | None => DrainError::Aborted,
                Some(err) => err,
            };
            return self.fail(ledger.summary(), err);
        }

        assert!(
            ledger.limiter.is_drained(),
            "💀 every write was joined but {} are still counted in flight",
            ledger.limiter.in_flight()
        );

        match ledger.latch.take() {
            Some(err) => {
                info!(
                    "💀 drain failed after {} successful writes: {err}",
                    ledger.written()
                );
                self.fail(ledger.summary(), err)
            }
            None => {
                self.transition(DrainPhase::Completed);
                let summary = ledger.summary();
                info!("🏁 drain complete: {summary}");
                self.reporter.on_finish(&summary);
                Ok(summary)
            }
        }
    }

    /// 💀 Nothing was consumed yet, so the reporter hears about an empty run.
    fn fail_early(&mut self, err: DrainError) -> Result<DrainSummary, DrainError> {
        let nothing = DrainSummary {
            count: 0,
            elapsed: Duration::ZERO,
            rate: 0.0,
        };
        self.fail(nothing, err)
    }

    fn fail(&mut self, summary: DrainSummary, err: DrainError) -> Result<DrainSummary, DrainError> {
        self.transition(DrainPhase::Failed);
        self.reporter.on_fail(&summary, &err);
        Err(err)
    }
}
