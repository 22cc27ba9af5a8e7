use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader, Lines};
use tracing::{debug, trace};

use crate::backends::RecordSource;
use crate::common::Record;

// -- 📂 FileSourceConfig: "It's just a file", said no sysadmin ever before the disk filled up.
// KNOWLEDGE GRAPH: config lives co-located with the backend that uses it.
// An NDJSON export does not know its own key schema, so the config has to tell us.
#[derive(Debug, Deserialize, Clone)]
pub struct FileSourceConfig {
    /// 📄 Path to the NDJSON export, one record per line
    pub file_name: String,
    /// 🔑 The table's key fields, as the table declares them
    pub key_fields: Vec<String>,
}

/// 📂 FileSource: reads a table export line by line and hands out one [`Record`] per line.
///
/// Blank lines are skipped. A line that is not a JSON object ends the scan with an error
/// that names the file and the line, because "invalid JSON" alone at 3am helps nobody.
pub struct FileSource {
    lines: Lines<BufReader<File>>,
    source_config: FileSourceConfig,
    line_number: u64,
}

// 🐛 the line reader does not impl Debug, and nobody debugging a FileSource wants its buffer anyway
impl std::fmt::Debug for FileSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileSource")
            .field("source_config", &self.source_config)
            .field("line_number", &self.line_number)
            .finish()
    }
}

impl FileSource {
    /// 🚀 Opens the export and wraps it in a BufReader.
    ///
    /// If the file doesn't exist: 💀 anyhow will tell you with *theatrical flair*.
    pub async fn new(source_config: FileSourceConfig) -> Result<Self> {
        let file = File::open(&source_config.file_name).await.with_context(|| {
            format!(
                "💀 The table export '{}' refused to open. We stared at the path. The path stared \
                 back. Check that it exists and that we are allowed to read it.",
                source_config.file_name
            )
        })?;
        debug!("📂 FileSource opened '{}'", source_config.file_name);
        Ok(Self {
            lines: BufReader::new(file).lines(),
            source_config,
            line_number: 0,
        })
    }
}

#[async_trait]
impl RecordSource for FileSource {
    async fn key_fields(&mut self) -> Result<Vec<String>> {
        Ok(self.source_config.key_fields.clone())
    }

    async fn next_record(&mut self) -> Result<Option<Record>> {
        loop {
            let line = self.lines.next_line().await.with_context(|| {
                format!(
                    "💀 Reading '{}' failed after line {}. The disk had a moment.",
                    self.source_config.file_name, self.line_number
                )
            })?;
            let Some(line) = line else {
                debug!(
                    "🏁 FileSource reached the end of '{}' after {} lines",
                    self.source_config.file_name, self.line_number
                );
                return Ok(None);
            };
            self.line_number += 1;

            // -- 🧹 blank lines are not records, they are just vibes
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            let record: Record = serde_json::from_str(trimmed).with_context(|| {
                format!(
                    "💀 Line {} of '{}' is not a JSON object. Half-written export? Stray log line?",
                    self.line_number, self.source_config.file_name
                )
            })?;
            trace!("📄 line {} parsed into a record", self.line_number);
            return Ok(Some(record));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn export_with(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().expect("💀 no temp file for us");
        file.write_all(contents.as_bytes())
            .expect("💀 the temp file refused our bytes");
        file
    }

    fn config_for(file: &tempfile::NamedTempFile) -> FileSourceConfig {
        FileSourceConfig {
            file_name: file.path().display().to_string(),
            key_fields: vec!["id".to_string()],
        }
    }

    #[tokio::test]
    async fn the_one_where_lines_become_records_and_blanks_are_ignored() -> Result<()> {
        let export = export_with("{\"id\":\"a\"}\n\n   \n{\"id\":\"b\",\"n\":2}\n");
        let mut source = FileSource::new(config_for(&export)).await?;

        assert_eq!(source.key_fields().await?, vec!["id".to_string()]);
        let first = source.next_record().await?.expect("💀 first record missing");
        assert_eq!(first["id"], "a");
        let second = source.next_record().await?.expect("💀 second record missing");
        assert_eq!(second["n"], 2);
        assert!(source.next_record().await?.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_a_broken_line_names_itself() -> Result<()> {
        let export = export_with("{\"id\":\"a\"}\n{\"id\":\n");
        let mut source = FileSource::new(config_for(&export)).await?;

        assert!(source.next_record().await?.is_some());
        let err = source
            .next_record()
            .await
            .expect_err("💀 half a JSON object should not parse");
        assert!(format!("{err}").contains("Line 2"));
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_the_file_does_not_exist() {
        let result = FileSource::new(FileSourceConfig {
            file_name: "/definitely/not/here.ndjson".to_string(),
            key_fields: vec!["id".to_string()],
        })
        .await;
        assert!(result.is_err());
    }
}
