//! 🔧 App Configuration: the sacred TOML-to-struct pipeline.
//!
//! 📡 "Config not found: We looked everywhere. Under the couch. Behind the fridge.
//! In the junk drawer. Nothing." (every developer at 3am) 🦆
//!
//! 🏗️ Powered by Figment, layered lowest to highest:
//! 1. the legacy `ServerSideEncryption` / `SSEKMSKeyId` variables the old backfill job read
//! 2. `BFL_*` variables, nested with `__` (`BFL_DRAIN__MAX_IN_FLIGHT=200`)
//! 3. the TOML file, if one was given. TOML wins.

use std::path::Path;

use anyhow::Context;
use figment::{
    Figment,
    providers::{Env, Format, Toml},
};
use serde::Deserialize;
use tracing::info;

use crate::backends::{FileSourceConfig, InMemorySourceConfig, LocalDirStoreConfig, S3StoreConfig};
use crate::drain::DrainConfig;
use crate::progress::ProgressConfig;

/// 📦 One struct to rule them all: where the rows come from, where they go, and how.
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    /// 🚰 Which table scan feeds the drain
    pub source_config: SourceConfig,
    /// 🪣 Which object store swallows it
    pub sink_config: SinkConfig,
    #[serde(default)]
    pub drain: DrainConfig,
    #[serde(default)]
    pub progress: ProgressConfig,
}

/// 🚰 `[source_config.File]` or `[source_config.InMemory]`.
#[derive(Debug, Deserialize, Clone)]
pub enum SourceConfig {
    InMemory(InMemorySourceConfig),
    File(FileSourceConfig),
}

/// 🪣 `sink_config = "InMemory"`, `[sink_config.LocalDir]` or `[sink_config.S3]`.
#[derive(Debug, Deserialize, Clone)]
pub enum SinkConfig {
    InMemory,
    LocalDir(LocalDirStoreConfig),
    S3(S3StoreConfig),
}

/// The variables the previous generation of this job was configured with. Still honored.
const LEGACY_SSE: &str = "ServerSideEncryption";
const LEGACY_KMS_KEY: &str = "SSEKMSKeyId";

fn legacy_env() -> Env {
    Env::raw().only(&[LEGACY_SSE, LEGACY_KMS_KEY]).map(|key| {
        if key.as_str().eq_ignore_ascii_case(LEGACY_SSE) {
            "drain.server_side_encryption".into()
        } else {
            "drain.kms_key_id".into()
        }
    })
}

/// 🚀 Load the config: from a file, from env vars, or from the sheer power of hoping.
///
/// - `None` → env vars only. No file. No assumptions.
/// - `Some(path)` → env vars + TOML file, merged. TOML wins on conflicts.
///
/// 💀 An unparseable config is an error with the file name in it. Validation of the drain
/// settings happens later, in [`DrainConfig::validate`], so the message can say exactly
/// which field is missing.
pub fn load_config(config_file_name: Option<&Path>) -> anyhow::Result<AppConfig> {
    info!(
        "🔧 Loading configuration: {:#?}",
        config_file_name.unwrap_or(Path::new(""))
    );

    let config = Figment::new()
        .merge(legacy_env())
        .merge(Env::prefixed("BFL_").split("__"));

    let config = match config_file_name {
        Some(file_name) => config.merge(Toml::file(file_name)),
        None => config,
    };

    let context_msg = match config_file_name {
        Some(path) => format!(
            "💀 Failed to parse configuration from file '{}' and environment variables (BFL_*). \
             The file exists in our hearts, but apparently not on disk, or not as valid TOML.",
            path.display()
        ),
        None => "💀 Failed to parse configuration from environment variables (BFL_*). \
                 No file was provided, so this one's all on the environment. Classic."
            .to_string(),
    };

    config.extract().context(context_msg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    const MINIMAL: &str = r#"
        sink_config = "InMemory"

        [source_config.File]
        file_name = "users.ndjson"
        key_fields = ["id"]
    "#;

    #[test]
    fn the_one_where_a_full_file_becomes_a_full_config() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "backfill.toml",
                r#"
                [source_config.File]
                file_name = "users.ndjson"
                key_fields = ["tenant", "id"]

                [sink_config.S3]
                region = "eu-west-1"
                endpoint_url = "http://localhost:9000"
                force_path_style = true

                [drain]
                destination_bucket = "backups"
                destination_prefix = "dynamo"
                source_name = "users"
                max_in_flight = 250

                [progress]
                mode = "log"
                every = 500
                "#,
            )?;

            let app_config =
                load_config(Some(Path::new("backfill.toml"))).map_err(|e| format!("{e:#}"))?;

            assert_eq!(app_config.drain.destination_bucket, "backups");
            assert_eq!(app_config.drain.max_in_flight, 250);
            assert_eq!(app_config.drain.queue_capacity, 1000);
            assert_eq!(app_config.progress, ProgressConfig::Log { every: 500 });
            match app_config.sink_config {
                SinkConfig::S3(s3) => {
                    assert_eq!(s3.region, "eu-west-1");
                    assert!(s3.force_path_style);
                    assert_eq!(s3.max_attempts, 11);
                }
                honestly_who_knows => panic!(
                    "💀 Expected an S3 sink, serde took us to {honestly_who_knows:?}. Plot twist energy."
                ),
            }
            match app_config.source_config {
                SourceConfig::File(file) => assert_eq!(file.key_fields, vec!["tenant", "id"]),
                other => panic!("💀 Expected a File source, got {other:?}"),
            }
            Ok(())
        });
    }

    #[test]
    fn the_one_where_env_fills_the_gaps_and_toml_has_the_last_word() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "backfill.toml",
                &format!("{MINIMAL}\n[drain]\nmax_in_flight = 42\n"),
            )?;
            jail.set_env("BFL_DRAIN__DESTINATION_BUCKET", "from-env");
            jail.set_env("BFL_DRAIN__MAX_IN_FLIGHT", "7");

            let app_config =
                load_config(Some(Path::new("backfill.toml"))).map_err(|e| format!("{e:#}"))?;

            assert_eq!(app_config.drain.destination_bucket, "from-env");
            assert_eq!(app_config.drain.max_in_flight, 42);
            Ok(())
        });
    }

    #[test]
    fn the_one_where_the_old_encryption_variables_still_work() {
        Jail::expect_with(|jail| {
            jail.create_file("backfill.toml", MINIMAL)?;
            jail.set_env("ServerSideEncryption", "aws:kms");
            jail.set_env("SSEKMSKeyId", "alias/backups");

            let app_config =
                load_config(Some(Path::new("backfill.toml"))).map_err(|e| format!("{e:#}"))?;

            assert_eq!(app_config.drain.server_side_encryption, "aws:kms");
            assert_eq!(app_config.drain.kms_key_id.as_deref(), Some("alias/backups"));
            Ok(())
        });
    }

    #[test]
    fn the_one_where_defaults_show_up_uninvited_but_helpful() {
        Jail::expect_with(|jail| {
            jail.create_file("backfill.toml", MINIMAL)?;
            let app_config =
                load_config(Some(Path::new("backfill.toml"))).map_err(|e| format!("{e:#}"))?;

            assert_eq!(app_config.drain.server_side_encryption, "AES256");
            assert_eq!(app_config.drain.kms_key_id, None);
            assert_eq!(app_config.progress, ProgressConfig::None);
            assert!(matches!(app_config.sink_config, SinkConfig::InMemory));
            Ok(())
        });
    }

    #[test]
    fn the_one_where_garbage_toml_names_the_file() {
        Jail::expect_with(|jail| {
            jail.create_file("broken.toml", "this is = = not toml")?;
            let err = load_config(Some(Path::new("broken.toml")))
                .expect_err("💀 garbage parsed. the parser is too forgiving.");
            assert!(format!("{err}").contains("broken.toml"));
            Ok(())
        });
    }
}
