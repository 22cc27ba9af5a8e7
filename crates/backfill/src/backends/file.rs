//! 📂 Previously, on "Things That Could Go Wrong With A File"...
//!
//! The disk was quiet. Too quiet. A lone process had been tasked with reading a table
//! export, one JSON object per line. Simple, they said. What could go wrong?
//!
//! The file didn't exist. A line was half a JSON object because someone hit Ctrl-C on
//! the export. And on the other side, a directory that was supposed to pretend to be a
//! bucket had the wrong permissions.
//!
//! This module handles the disk-shaped backends:
//! - [`FileSource`]: NDJSON table export → records, line by line
//! - [`LocalDirStore`]: `{root}/{bucket}/{path}` on the local filesystem, S3 cosplay for dev boxes
//!
//! 💀 Disk full → your problem now
//! 🦆 (mandatory, no notes)

mod file_source;
mod local_dir_store;

pub use file_source::{FileSource, FileSourceConfig};
pub use local_dir_store::{LocalDirStore, LocalDirStoreConfig};
