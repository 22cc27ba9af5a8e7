use std::path::PathBuf;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::trace;

use crate::backends::{ObjectStore, PutOptions};
use crate::common::DestinationPath;

// -- 🚰 LocalDirStoreConfig: cousin of the S3 config, equally traumatized by disk full errors.
#[derive(Debug, Deserialize, Clone)]
pub struct LocalDirStoreConfig {
    /// 📁 Directory that plays the role of "all buckets"
    pub root: String,
}

/// 🗄️ LocalDirStore: an object store that is secretly a directory tree.
///
/// `put(bucket, path)` writes `{root}/{bucket}/{path}`, creating parents as needed and
/// overwriting whatever was there. Encryption options are accepted and ignored; the disk
/// is as encrypted as your laptop is.
#[derive(Debug, Clone)]
pub struct LocalDirStore {
    root: PathBuf,
}

impl LocalDirStore {
    pub fn new(config: LocalDirStoreConfig) -> Self {
        Self {
            root: PathBuf::from(config.root),
        }
    }

    fn object_path(&self, bucket: &str, path: &DestinationPath) -> PathBuf {
        let mut full = self.root.join(bucket);
        // -- 🔒 split on '/' so the path nests as directories on every platform
        for segment in path.as_str().split('/').filter(|s| !s.is_empty()) {
            full.push(segment);
        }
        full
    }
}

#[async_trait]
impl ObjectStore for LocalDirStore {
    async fn put(
        &self,
        bucket: &str,
        path: &DestinationPath,
        body: Vec<u8>,
        _options: &PutOptions,
    ) -> Result<()> {
        let target = self.object_path(bucket, path);
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await.with_context(|| {
                format!(
                    "💀 Could not create '{}'. The directory refused to be born.",
                    parent.display()
                )
            })?;
        }
        tokio::fs::write(&target, body).await.with_context(|| {
            format!(
                "💀 Writing '{}' failed. Disk full? Permissions? Both? Check the usual suspects.",
                target.display()
            )
        })?;
        trace!("🗄️ wrote {}", target.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn the_one_where_objects_nest_under_bucket_and_path() -> Result<()> {
        let root = tempfile::tempdir()?;
        let store = LocalDirStore::new(LocalDirStoreConfig {
            root: root.path().display().to_string(),
        });
        let path = DestinationPath::from_segments("backups", "users", "abc123");
        let options = PutOptions {
            server_side_encryption: "AES256".to_string(),
            kms_key_id: None,
        };

        store.put("bucket", &path, b"{\"id\":1}".to_vec(), &options).await?;
        store.put("bucket", &path, b"{\"id\":2}".to_vec(), &options).await?;

        let written = tokio::fs::read(root.path().join("bucket/backups/users/abc123")).await?;
        assert_eq!(written, b"{\"id\":2}");
        Ok(())
    }
}
