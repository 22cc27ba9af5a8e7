//! 💀 DrainError: the one bad news a drain is allowed to deliver.
//!
//! A run ends with exactly one of these or a summary, never both. Writes that fail after
//! the first one are logged and dropped on the floor. First error wins. No trophies for
//! second place.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DrainError {
    /// 🔧 Bad destination or key schema. Raised before a single record is consumed.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// 🚰 The scan blew up. Reported after the writes already in flight have settled.
    #[error("the record source failed")]
    Producer(#[source] anyhow::Error),

    /// 🪣 A write failed after the store's own retries gave up.
    #[error("write to '{path}' failed")]
    SinkWrite {
        path: String,
        #[source]
        source: anyhow::Error,
    },

    /// 🛑 Someone asked us to stop. We stopped admitting, let the writes land, and left.
    #[error("drain was stopped before the source was exhausted")]
    Cancelled,

    /// 🧨 Someone asked us to leave NOW. Outstanding writes were abandoned.
    #[error("drain was aborted while writes were still in flight")]
    Aborted,
}
