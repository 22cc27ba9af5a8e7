//! 🔧 DrainConfig: where the records go and how many may be in the air at once.
//!
//! 🧠 Knowledge graph:
//! - `destination_bucket` / `destination_prefix` / `source_name`: required. Empty means missing.
//! - `max_in_flight`: the write ceiling. 1000 unless you have opinions.
//! - `queue_capacity`: how many scanned records may wait between the source and the engine.
//! - `server_side_encryption` / `kms_key_id`: passed through to every put, untouched.
//!
//! Everything has a serde default so a half-written TOML still parses, and then
//! [`DrainConfig::validate`] tells you which half is missing. 🦆

use serde::Deserialize;

use crate::backends::PutOptions;
use crate::drain::DrainError;

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct DrainConfig {
    /// 🪣 The bucket (or container, or directory) every record lands in
    #[serde(default)]
    pub destination_bucket: String,
    /// 📁 Path prefix inside the bucket
    #[serde(default)]
    pub destination_prefix: String,
    /// 🏷️ The table name. Second segment of every destination path.
    #[serde(default)]
    pub source_name: String,
    /// 🚦 Max writes issued but not yet completed
    #[serde(default = "default_max_in_flight")]
    pub max_in_flight: usize,
    /// 📦 Max scanned records buffered ahead of admission
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    /// 🔒 Server-side encryption mode for every put
    #[serde(default = "default_server_side_encryption")]
    pub server_side_encryption: String,
    /// 🔑 Optional KMS key id, only meaningful with `aws:kms`
    #[serde(default)]
    pub kms_key_id: Option<String>,
}

fn default_max_in_flight() -> usize {
    1000
}

// -- 📦 same as the stream high-water mark the old writer used. a thousand rows, no more.
fn default_queue_capacity() -> usize {
    1000
}

fn default_server_side_encryption() -> String {
    "AES256".to_string()
}

impl Default for DrainConfig {
    fn default() -> Self {
        Self {
            destination_bucket: String::new(),
            destination_prefix: String::new(),
            source_name: String::new(),
            max_in_flight: default_max_in_flight(),
            queue_capacity: default_queue_capacity(),
            server_side_encryption: default_server_side_encryption(),
            kms_key_id: None,
        }
    }
}

impl DrainConfig {
    /// 🚀 The three things nobody can default for you. Everything else is pre-filled.
    pub fn new(
        destination_bucket: impl Into<String>,
        destination_prefix: impl Into<String>,
        source_name: impl Into<String>,
    ) -> Self {
        Self {
            destination_bucket: destination_bucket.into(),
            destination_prefix: destination_prefix.into(),
            source_name: source_name.into(),
            ..Self::default()
        }
    }

    pub fn with_max_in_flight(mut self, max_in_flight: usize) -> Self {
        self.max_in_flight = max_in_flight;
        self
    }

    pub fn with_queue_capacity(mut self, queue_capacity: usize) -> Self {
        self.queue_capacity = queue_capacity;
        self
    }

    /// 🔒 Fail fast, fail loud, fail before the scan starts.
    pub fn validate(&self) -> Result<(), DrainError> {
        let mut missing = Vec::new();
        if self.destination_bucket.trim().is_empty() {
            missing.push("destination_bucket");
        }
        if self.destination_prefix.trim_matches('/').trim().is_empty() {
            missing.push("destination_prefix");
        }
        if self.source_name.trim().is_empty() {
            missing.push("source_name");
        }
        if !missing.is_empty() {
            return Err(DrainError::Configuration(format!(
                "💀 Must provide a bucket and prefix for the backfill destination. Missing: {}",
                missing.join(", ")
            )));
        }
        if self.max_in_flight == 0 {
            return Err(DrainError::Configuration(
                "💀 max_in_flight is 0. A drain that may never write is just a very slow no-op."
                    .to_string(),
            ));
        }
        if self.queue_capacity == 0 {
            return Err(DrainError::Configuration(
                "💀 queue_capacity is 0. The channel needs at least one seat.".to_string(),
            ));
        }
        Ok(())
    }

    pub(crate) fn put_options(&self) -> PutOptions {
        PutOptions {
            server_side_encryption: self.server_side_encryption.clone(),
            kms_key_id: self.kms_key_id.clone(),
        }
    }
}
