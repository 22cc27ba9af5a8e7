use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use aws_sdk_s3::config::retry::RetryConfig;
use aws_sdk_s3::config::timeout::TimeoutConfig;
use aws_sdk_s3::config::{BehaviorVersion, Region};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::ServerSideEncryption;
use serde::Deserialize;
use tracing::{debug, trace};

use crate::backends::{ObjectStore, PutOptions};
use crate::common::DestinationPath;

// ============================================================
//  🔧 S3StoreConfig: knobs, dials, and a region
// ============================================================

/// 🔧 Configuration for the S3 store backend.
///
/// 📐 Everything is optional. Credentials come from the usual AWS chain (env vars,
/// `~/.aws/config`, instance role, hope). `endpoint_url` + `force_path_style` exist for
/// MinIO, LocalStack and other S3 impersonators.
#[derive(Debug, Deserialize, Clone)]
pub struct S3StoreConfig {
    /// 🌎 AWS region: defaults to "us-east-1" because that's where data goes to retire
    #[serde(default = "default_s3_region")]
    pub region: String,
    /// 📡 Custom endpoint, e.g. `http://localhost:9000`
    #[serde(default)]
    pub endpoint_url: Option<String>,
    /// 🛣️ `/{bucket}/{key}` addressing instead of virtual-hosted buckets
    #[serde(default)]
    pub force_path_style: bool,
    /// 🔄 Total attempts per put, first try included
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// ⏱️ TCP connect timeout
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    /// ⏱️ Per-attempt timeout for a single put
    #[serde(default = "default_attempt_timeout_ms")]
    pub attempt_timeout_ms: u64,
}

fn default_s3_region() -> String {
    // -- 🏖️ If you don't choose a region, the region chooses you.
    "us-east-1".to_string()
}

// -- 🔄 ten retries on top of the first attempt. S3 throttles; we persist.
fn default_max_attempts() -> u32 {
    11
}

fn default_connect_timeout_ms() -> u64 {
    4_000
}

fn default_attempt_timeout_ms() -> u64 {
    10_000
}

impl Default for S3StoreConfig {
    fn default() -> Self {
        Self {
            region: default_s3_region(),
            endpoint_url: None,
            force_path_style: false,
            max_attempts: default_max_attempts(),
            connect_timeout_ms: default_connect_timeout_ms(),
            attempt_timeout_ms: default_attempt_timeout_ms(),
        }
    }
}

// ============================================================
//  🪣 S3Store: one PutObject per record
// ============================================================

/// 🪣 S3Store: writes each record as its own object.
///
/// The client is cheap to share: the SDK keeps the connection pool inside, and `put` only
/// needs `&self`, so a thousand concurrent writes share one store behind an `Arc`.
#[derive(Debug, Clone)]
pub struct S3Store {
    client: aws_sdk_s3::Client,
}

impl S3Store {
    /// 🚀 Loads AWS config from the environment and layers our retry/timeout policy on top.
    pub async fn new(config: S3StoreConfig) -> Result<Self> {
        let shared = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .load()
            .await;

        let mut builder = aws_sdk_s3::config::Builder::from(&shared)
            .retry_config(RetryConfig::standard().with_max_attempts(config.max_attempts))
            .timeout_config(
                TimeoutConfig::builder()
                    .connect_timeout(Duration::from_millis(config.connect_timeout_ms))
                    .operation_attempt_timeout(Duration::from_millis(config.attempt_timeout_ms))
                    .build(),
            );
        if let Some(endpoint_url) = &config.endpoint_url {
            builder = builder.endpoint_url(endpoint_url);
        }
        if config.force_path_style {
            builder = builder.force_path_style(true);
        }

        debug!(
            "🪣 S3Store ready: region={}, endpoint={:?}, max_attempts={}",
            config.region, config.endpoint_url, config.max_attempts
        );
        Ok(Self::from_client(aws_sdk_s3::Client::from_conf(builder.build())))
    }

    /// 🔧 Bring your own client. Tests point one at a mock server.
    pub fn from_client(client: aws_sdk_s3::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    async fn put(
        &self,
        bucket: &str,
        path: &DestinationPath,
        body: Vec<u8>,
        options: &PutOptions,
    ) -> Result<()> {
        let mut request = self
            .client
            .put_object()
            .bucket(bucket)
            .key(path.as_str())
            .server_side_encryption(ServerSideEncryption::from(
                options.server_side_encryption.as_str(),
            ))
            .body(ByteStream::from(body));
        if let Some(kms_key_id) = &options.kms_key_id {
            request = request.ssekms_key_id(kms_key_id);
        }

        request.send().await.with_context(|| {
            format!(
                "💀 PutObject to s3://{bucket}/{path} failed after the SDK ran out of retries. \
                 Check: bucket name, region, credentials, KMS key access, and whether S3 is \
                 having a day."
            )
        })?;
        trace!("🪣 landed s3://{bucket}/{path}");
        Ok(())
    }
}

// ============================================================
//  🧪 Tests: "trust but verify" is for diplomats.
//  Engineers say "trust nothing, test everything, blame DNS."
// ============================================================
