//! # Previously, on Backfill...
//!
//! 🎬 The rows were trapped in a table. The bucket was far away. Someone had to write a
//! backend so simple it lives entirely in RAM, gone the moment you blink.
//!
//! That someone was this module.
//!
//! `in_mem` provides an in-memory [`RecordSource`] and [`ObjectStore`] for tests, demos and
//! dry runs. The [`InMemorySource`] hands out a fixed list of records exactly once. The
//! [`InMemoryStore`] keeps every object behind an `Arc<Mutex<...>>` so callers can inspect
//! what arrived. Great for assertions, great for trust issues, great for both.
//!
//! ⚠️ This is NOT durable. If the process exits, so does your backup. 🦆

use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;

use crate::backends::{ObjectStore, PutOptions, RecordSource};
use crate::common::{DestinationPath, Record};

/// 🔧 Rows inline in the config. For demos and for people who like very small tables.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct InMemorySourceConfig {
    pub key_fields: Vec<String>,
    #[serde(default)]
    pub records: Vec<Record>,
}

/// 📦 The world's most predictable table scan.
#[derive(Debug, Default)]
pub struct InMemorySource {
    key_fields: Vec<String>,
    records: VecDeque<Record>,
}

impl InMemorySource {
    pub fn new(key_fields: Vec<String>, records: Vec<Record>) -> Self {
        Self {
            key_fields,
            records: records.into(),
        }
    }

    pub fn from_config(config: InMemorySourceConfig) -> Self {
        Self::new(config.key_fields, config.records)
    }
}

#[async_trait]
impl RecordSource for InMemorySource {
    async fn key_fields(&mut self) -> Result<Vec<String>> {
        Ok(self.key_fields.clone())
    }

    async fn next_record(&mut self) -> Result<Option<Record>> {
        // -- 🎯 pop from the front: first in, first scanned, never scanned again
        Ok(self.records.pop_front())
    }
}

/// 🗃️ What a put left behind: the bytes and the options it came with.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredObject {
    pub body: Vec<u8>,
    pub options: PutOptions,
}

/// 📦 A store that never forgets (until it is dropped).
///
/// Keys are `{bucket}/{path}`. A `BTreeMap` so listing is sorted and tests stay boring.
/// Clone-able, and clones share the same map, so a test can keep a handle while the
/// engine owns another.
#[derive(Debug, Default, Clone)]
pub struct InMemoryStore {
    objects: Arc<tokio::sync::Mutex<BTreeMap<String, StoredObject>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 📋 A snapshot of everything stored so far.
    pub async fn objects(&self) -> BTreeMap<String, StoredObject> {
        self.objects.lock().await.clone()
    }

    pub async fn get(&self, bucket: &str, path: &str) -> Option<StoredObject> {
        self.objects
            .lock()
            .await
            .get(&format!("{bucket}/{path}"))
            .cloned()
    }

    pub async fn len(&self) -> usize {
        self.objects.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.objects.lock().await.is_empty()
    }
}

#[async_trait]
impl ObjectStore for InMemoryStore {
    async fn put(
        &self,
        bucket: &str,
        path: &DestinationPath,
        body: Vec<u8>,
        options: &PutOptions,
    ) -> Result<()> {
        // -- 🔒 overwrite on purpose: same path, same record, same outcome
        self.objects.lock().await.insert(
            format!("{bucket}/{path}"),
            StoredObject {
                body,
                options: options.clone(),
            },
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn options() -> PutOptions {
        PutOptions {
            server_side_encryption: "AES256".to_string(),
            kms_key_id: None,
        }
    }

    #[tokio::test]
    async fn the_one_where_the_source_gives_everything_exactly_once() -> Result<()> {
        let mut row = Record::new();
        row.insert("id".to_string(), json!("a"));
        let mut source = InMemorySource::new(vec!["id".to_string()], vec![row.clone()]);

        assert_eq!(source.key_fields().await?, vec!["id".to_string()]);
        assert_eq!(source.next_record().await?, Some(row));
        assert_eq!(source.next_record().await?, None);
        assert_eq!(source.next_record().await?, None);
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_a_second_put_overwrites_the_first() -> Result<()> {
        let store = InMemoryStore::new();
        let path = DestinationPath::from_segments("p", "t", "abc");
        store.put("bucket", &path, b"one".to_vec(), &options()).await?;
        store.put("bucket", &path, b"two".to_vec(), &options()).await?;

        assert_eq!(store.len().await, 1);
        let stored = store.get("bucket", "p/t/abc").await.expect("💀 object vanished");
        assert_eq!(stored.body, b"two");
        Ok(())
    }
}
