//! 🚰➡️🪣 backfill: drain every row of a table into an object store, one object per row,
//! without ever having more than `max_in_flight` writes in the air.
//!
//! 🧠 Knowledge graph:
//! - [`app_config`]: figment-loaded [`AppConfig`](app_config::AppConfig)
//! - [`backends`]: record sources (in-memory, NDJSON file) and object stores (in-memory,
//!   local directory, S3)
//! - [`keys`]: record → deterministic [`DestinationPath`](common::DestinationPath)
//! - [`drain`]: the engine, its limiter, its dispatcher, its one error
//! - [`progress`]: somebody to tell about every write
//!
//! [`run`] wires them together for the CLI. Library users can build a
//! [`DrainEngine`](drain::DrainEngine) directly. 🦆

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, warn};

pub mod app_config;
pub mod backends;
pub mod common;
pub mod drain;
pub mod keys;
pub mod progress;

use crate::app_config::AppConfig;
use crate::backends::{SourceBackend, StoreBackend};
use crate::drain::{DrainEngine, DrainSummary, ShutdownHandle};

/// 🚀 Config in, summary out.
///
/// The drain settings are validated before any backend is built, so a missing bucket
/// fails before a file is opened or an AWS client is configured. Ctrl-C once stops
/// gracefully; Ctrl-C twice walks away from whatever is still in flight.
pub async fn run(app_config: AppConfig) -> Result<DrainSummary> {
    app_config
        .drain
        .validate()
        .context("💀 The [drain] section of the config is not usable")?;

    let store = StoreBackend::from_config(app_config.sink_config)
        .await
        .context("💀 Could not build the object store")?;
    let source = SourceBackend::from_config(app_config.source_config)
        .await
        .context("💀 Could not open the record source")?;

    let reporter = app_config
        .progress
        .reporter_for(&app_config.drain.source_name);
    let mut engine = DrainEngine::new(app_config.drain, Arc::new(store))?.with_reporter(reporter);

    let signals = tokio::spawn(forward_ctrl_c(engine.shutdown_handle()));
    let outcome = engine.run(source).await;
    signals.abort();

    outcome.context("💀 The drain did not complete")
}

async fn forward_ctrl_c(shutdown: ShutdownHandle) {
    if tokio::signal::ctrl_c().await.is_err() {
        warn!("⚠️ could not listen for Ctrl-C; the drain can only end on its own");
        return;
    }
    info!("🛑 Ctrl-C: no new writes, waiting for in-flight ones. Press again to abandon them.");
    shutdown.stop();
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("🧨 Ctrl-C again: abandoning in-flight writes");
        shutdown.abort();
    }
}
