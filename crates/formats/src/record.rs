//! Raw JSON line with its position in the source file

use serde::de::DeserializeOwned;
use serde_json::Value;

/// A single parsed line of a JSONL file
#[derive(Debug, Clone)]
pub struct Record {
    /// The JSON data for this line
    pub data: Value,
    /// 1-based line number in the source
    pub source_line: usize,
}

impl Record {
    pub fn new(data: Value, source_line: usize) -> Self {
        Self { data, source_line }
    }

    /// Convert into a typed row.
    pub fn decode<T: DeserializeOwned>(self) -> serde_json::Result<T> {
        serde_json::from_value(self.data)
    }
}
