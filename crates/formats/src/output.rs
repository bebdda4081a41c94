//! Output format selection by file extension

use crate::jsonl::write_jsonl;
use crate::parquet_writer::write_parquet;
use crate::{Error, Result};
use markerprep_core::Table;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::info;

/// On-disk table format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableFormat {
    /// JSON Lines, gzip-compressed when the name ends in `.gz`
    Jsonl,
    Parquet,
}

impl TableFormat {
    pub fn from_path(path: &Path) -> Result<Self> {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_lowercase();

        if name.ends_with(".parquet") {
            Ok(TableFormat::Parquet)
        } else if [".jsonl", ".jsonl.gz", ".json", ".ndjson"]
            .iter()
            .any(|ext| name.ends_with(ext))
        {
            Ok(TableFormat::Jsonl)
        } else {
            Err(Error::UnsupportedFormat(format!(
                "{:?} (expected .jsonl, .jsonl.gz or .parquet)",
                path
            )))
        }
    }
}

/// Write a table in the format implied by `path`.
pub fn write_table<T: Serialize>(path: &Path, table: &Table<T>) -> Result<usize> {
    let written = match TableFormat::from_path(path)? {
        TableFormat::Jsonl => write_jsonl(path, table)?,
        TableFormat::Parquet => write_parquet(path, table)?,
    };
    info!("Wrote {} {} rows to {:?}", written, table.name(), path);
    Ok(written)
}

/// Sibling path `<stem>.removed.jsonl` used for the removed-marker report.
pub fn removed_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("output");
    let stem = [".jsonl.gz", ".parquet", ".jsonl", ".ndjson", ".json"]
        .iter()
        .find_map(|ext| name.strip_suffix(ext))
        .unwrap_or(name);
    path.with_file_name(format!("{}.removed.jsonl", stem))
}
