use std::sync::Arc;

use anyhow::Result;
use async_channel::Sender;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use crate::backends::RecordSource;
use crate::common::Record;
use crate::drain::DrainError;
use crate::drain::ledger::DrainLedger;
use crate::drain::workers::Worker;

/// 🚰 Pulls records from the source and pushes them into the channel, one at a time.
///
/// `send` waits while the channel is full, which is how a slow store ends up slowing the
/// scan. If the engine closes the receiver the worker just goes home. If the source
/// breaks, the worker latches [`DrainError::Producer`] on the ledger itself and quits.
pub(crate) struct SourceWorker<S> {
    source: S,
    tx: Sender<Record>,
    ledger: Arc<DrainLedger>,
}

impl<S: RecordSource + 'static> SourceWorker<S> {
    pub(crate) fn new(source: S, tx: Sender<Record>, ledger: Arc<DrainLedger>) -> Self {
        Self { source, tx, ledger }
    }

    async fn pump(&mut self) -> Result<u64> {
        let mut sent = 0u64;
        while let Some(record) = self.source.next_record().await? {
            if self.tx.send(record).await.is_err() {
                // -- 🚪 receiver closed: the engine stopped listening, so we stop talking
                debug!("🚪 SourceWorker: channel closed after {sent} records, leaving quietly");
                return Ok(sent);
            }
            sent += 1;
            trace!("🚰 SourceWorker queued record #{sent}");
        }
        Ok(sent)
    }
}

impl<S: RecordSource + 'static> Worker for SourceWorker<S> {
    fn start(mut self) -> JoinHandle<()> {
        tokio::spawn(async move {
            debug!("🚀 SourceWorker started");
            match self.pump().await {
                Ok(sent) => debug!("🏁 SourceWorker finished, {sent} records queued"),
                Err(err) => {
                    debug!("💀 SourceWorker: the source failed: {err:#}");
                    // -- 🔒 latch before the sender drops, so the engine sees the error
                    // before it sees a closed channel
                    self.ledger.latch.trip(DrainError::Producer(err));
                }
            }
            // -- 📦 self (and tx) drop here; a closed, empty channel means end-of-sequence
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::InMemorySource;
    use anyhow::anyhow;
    use async_trait::async_trait;
    use serde_json::json;

    fn rows(n: usize) -> Vec<Record> {
        (0..n)
            .map(|i| {
                let mut row = Record::new();
                row.insert("id".to_string(), json!(i));
                row
            })
            .collect()
    }

    #[derive(Debug)]
    struct BrokenAfterOne {
        served: bool,
    }

    #[async_trait]
    impl RecordSource for BrokenAfterOne {
        async fn key_fields(&mut self) -> Result<Vec<String>> {
            Ok(vec!["id".to_string()])
        }

        async fn next_record(&mut self) -> Result<Option<Record>> {
            if self.served {
                return Err(anyhow!("scan cursor expired"));
            }
            self.served = true;
            Ok(rows(1).pop())
        }
    }

    #[tokio::test]
    async fn the_one_where_every_record_makes_it_through_the_pipe() {
        let ledger = Arc::new(DrainLedger::new(4));
        let (tx, rx) = async_channel::bounded(2);
        let worker = SourceWorker::new(
            InMemorySource::new(vec!["id".to_string()], rows(5)),
            tx,
            Arc::clone(&ledger),
        );
        let handle = worker.start();

        let mut received = 0;
        while rx.recv().await.is_ok() {
            received += 1;
        }
        handle.await.unwrap();
        assert_eq!(received, 5);
        assert!(!ledger.latch.is_tripped());
    }

    #[tokio::test]
    async fn the_one_where_the_source_breaks_and_the_latch_knows() {
        let ledger = Arc::new(DrainLedger::new(4));
        let (tx, rx) = async_channel::bounded(2);
        let handle =
            SourceWorker::new(BrokenAfterOne { served: false }, tx, Arc::clone(&ledger)).start();

        assert!(rx.recv().await.is_ok());
        assert!(rx.recv().await.is_err());
        handle.await.unwrap();
        assert!(matches!(ledger.latch.take(), Some(DrainError::Producer(_))));
    }

    #[tokio::test]
    async fn the_one_where_nobody_is_listening_anymore() {
        let ledger = Arc::new(DrainLedger::new(4));
        let (tx, rx) = async_channel::bounded(1);
        rx.close();
        let handle = SourceWorker::new(
            InMemorySource::new(vec!["id".to_string()], rows(100)),
            tx,
            Arc::clone(&ledger),
        )
        .start();
        // 🧪 a closed receiver is not a producer failure
        handle.await.unwrap();
        assert!(!ledger.latch.is_tripped());
    }
}
