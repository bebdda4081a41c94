//! Table readers and writers for markerprep
//!
//! Inputs are JSON Lines, optionally gzip-compressed. Outputs are JSON Lines
//! or Parquet, chosen by file extension.

pub mod error;
pub mod jsonl;
pub mod output;
pub mod parquet_writer;
pub mod record;

pub use error::{Error, Result};
pub use jsonl::{count_records, read_table, write_jsonl, JsonlReader, JsonlWriter};
pub use output::{removed_path, write_table, TableFormat};
pub use parquet_writer::write_parquet;
pub use record::Record;
