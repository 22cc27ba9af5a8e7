//! 🔌 Backends: where the real I/O happens.
//!
//! 🚰 Record sources pour rows, object stores swallow them one PUT at a time.
//! And in between, the drain engine keeps everybody honest.
//!
//! 🎭 This module is the casting agency. Need rows from a newline-delimited table export?
//! From a Vec in a test? Need them written to S3, to a directory, to a HashMap that only
//! lives as long as your test does? We've got a backend for that.
//!
//! # Knowledge Graph 🧠
//! - Pattern: trait → concrete impls → backend enum that dispatches (`SourceBackend`, `StoreBackend`)
//! - Configs live next to the backend that reads them (`FileSourceConfig` in `file_source.rs`, etc.)
//! - Sources and stores are pure I/O. Keys, limits and latches belong to the drain engine.
//!
//! 🦆 The duck is here because every file must have one.

use anyhow::Result;
use async_trait::async_trait;

use crate::app_config::{SinkConfig, SourceConfig};
use crate::common::{DestinationPath, Record};

pub mod file;
pub mod in_mem;
pub mod s3;

pub use file::{FileSource, FileSourceConfig, LocalDirStore, LocalDirStoreConfig};
pub use in_mem::{InMemorySource, InMemorySourceConfig, InMemoryStore, StoredObject};
pub use s3::{S3Store, S3StoreConfig};

// ===== Source Trait and Backend Enum =====

/// 🚰 A scan that produces records, one at a time, forward only, exactly once.
///
/// # Contract 📜
/// - `key_fields` reports the table's key field names as declared. Order is irrelevant;
///   the engine sorts them.
/// - `next_record` returns `Ok(Some(record))` while rows flow, `Ok(None)` at the end, and
///   `Err(..)` when the scan itself broke. Either of the last two is the final event.
/// - Not restartable. Once it said `None`, it means it.
#[async_trait]
pub trait RecordSource: std::fmt::Debug + Send {
    /// 🔑 The declared key fields of the table (hash, range, whatever it calls them)
    async fn key_fields(&mut self) -> Result<Vec<String>>;
    /// 📄 The next row, or `None` when the well is dry
    async fn next_record(&mut self) -> Result<Option<Record>>;
}

/// 🎭 The many faces of a RecordSource.
#[derive(Debug)]
pub enum SourceBackend {
    InMemory(InMemorySource),
    File(FileSource),
}

impl SourceBackend {
    /// 🏭 Config in, source out. Opening a file can fail, hence async + Result.
    pub async fn from_config(config: SourceConfig) -> Result<Self> {
        Ok(match config {
            SourceConfig::InMemory(cfg) => {
                SourceBackend::InMemory(InMemorySource::from_config(cfg))
            }
            SourceConfig::File(cfg) => SourceBackend::File(FileSource::new(cfg).await?),
        })
    }
}

#[async_trait]
impl RecordSource for SourceBackend {
    async fn key_fields(&mut self) -> Result<Vec<String>> {
        match self {
            SourceBackend::InMemory(source) => source.key_fields().await,
            SourceBackend::File(source) => source.key_fields().await,
        }
    }

    async fn next_record(&mut self) -> Result<Option<Record>> {
        match self {
            SourceBackend::InMemory(source) => source.next_record().await,
            SourceBackend::File(source) => source.next_record().await,
        }
    }
}

// ===== Store Trait and Backend Enum =====

/// 🔒 Per-put pass-through options. The engine fills these from config and never looks inside.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PutOptions {
    /// e.g. `AES256` or `aws:kms`
    pub server_side_encryption: String,
    pub kms_key_id: Option<String>,
}

/// 🕳️ An object store that accepts whole objects by path.
///
/// # Contract 📜
/// - `put` overwrites whatever lives at `bucket/path`. Writing the same thing twice is fine.
/// - Retries, backoff and timeouts are the store's business. An `Err` here means it already
///   gave up, and the engine will treat it as final.
/// - Shared across many concurrent writes through an `Arc`, hence `&self` and `Sync`.
#[async_trait]
pub trait ObjectStore: std::fmt::Debug + Send + Sync {
    /// 📡 Write `body` to `bucket/path`. I/O only. No questions asked.
    async fn put(
        &self,
        bucket: &str,
        path: &DestinationPath,
        body: Vec<u8>,
        options: &PutOptions,
    ) -> Result<()>;
}

/// 🎭 The many faces of an ObjectStore.
#[derive(Debug)]
pub enum StoreBackend {
    InMemory(InMemoryStore),
    LocalDir(LocalDirStore),
    S3(S3Store),
}

impl StoreBackend {
    /// 🏭 Config in, store out. S3 needs to load AWS config first, hence async.
    pub async fn from_config(config: SinkConfig) -> Result<Self> {
        Ok(match config {
            SinkConfig::InMemory => StoreBackend::InMemory(InMemoryStore::new()),
            SinkConfig::LocalDir(cfg) => StoreBackend::LocalDir(LocalDirStore::new(cfg)),
            SinkConfig::S3(cfg) => StoreBackend::S3(S3Store::new(cfg).await?),
        })
    }
}

#[async_trait]
impl ObjectStore for StoreBackend {
    async fn put(
        &self,
        bucket: &str,
        path: &DestinationPath,
        body: Vec<u8>,
        options: &PutOptions,
    ) -> Result<()> {
        match self {
            StoreBackend::InMemory(store) => store.put(bucket, path, body, options).await,
            StoreBackend::LocalDir(store) => store.put(bucket, path, body, options).await,
            StoreBackend::S3(store) => store.put(bucket, path, body, options).await,
        }
    }
}
