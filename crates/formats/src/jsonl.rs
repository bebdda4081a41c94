//! Streaming JSONL (JSON Lines) reading and writing
//!
//! Files ending in `.gz` are transparently gzip-decompressed on read and
//! compressed on write.

use crate::{Error, Record, Result};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use markerprep_core::Table;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Read, Write};
use std::path::Path;
use tracing::{debug, info, warn};

const BUFFER_SIZE: usize = 64 * 1024;

fn is_gzip(path: &Path) -> bool {
    path.extension().and_then(|e| e.to_str()) == Some("gz")
}

/// Streaming JSONL reader that processes files line-by-line
pub struct JsonlReader<R: Read> {
    reader: BufReader<R>,
    line_number: usize,
    bytes_read: u64,
    skipped: usize,
}

impl JsonlReader<Box<dyn Read>> {
    /// Open a JSONL file, auto-detecting gzip compression
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;

        let reader: Box<dyn Read> = if is_gzip(path) {
            debug!("Opening gzip-compressed JSONL file: {:?}", path);
            Box::new(GzDecoder::new(file))
        } else {
            debug!("Opening plain JSONL file: {:?}", path);
            Box::new(file)
        };
        Ok(Self::new(reader))
    }
}

impl<R: Read> JsonlReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader: BufReader::with_capacity(BUFFER_SIZE, reader),
            line_number: 0,
            bytes_read: 0,
            skipped: 0,
        }
    }

    /// Get the number of lines processed
    pub fn lines_processed(&self) -> usize {
        self.line_number
    }

    /// Get the number of bytes read
    pub fn bytes_processed(&self) -> u64 {
        self.bytes_read
    }

    /// Lines skipped as malformed so far
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    /// Read every line as a `T`, skipping lines that do not decode.
    pub fn read_rows<T: DeserializeOwned>(&mut self) -> Result<Vec<T>> {
        let mut rows = Vec::new();
        while let Some(record) = self.next() {
            let record = record?;
            let line = record.source_line;
            match record.decode() {
                Ok(row) => rows.push(row),
                Err(e) => {
                    warn!("Skipping line {}: {}", line, e);
                    self.skipped += 1;
                }
            }
        }
        Ok(rows)
    }
}

impl<R: Read> Iterator for JsonlReader<R> {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut line = String::new();

        loop {
            line.clear();
            match self.reader.read_line(&mut line) {
                Ok(0) => return None,
                Ok(n) => {
                    self.bytes_read += n as u64;
                    self.line_number += 1;

                    let trimmed = line.trim();
                    if trimmed.is_empty() {
                        continue;
                    }

                    match serde_json::from_str::<Value>(trimmed) {
                        Ok(value) => return Some(Ok(Record::new(value, self.line_number))),
                        Err(e) => {
                            warn!(
                                "Failed to parse JSON at line {}: {} - Error: {}",
                                self.line_number, trimmed, e
                            );
                            self.skipped += 1;
                            continue;
                        }
                    }
                }
                Err(e) => {
                    return Some(Err(Error::Io(e)));
                }
            }
        }
    }
}

/// Load a JSONL file into a named table.
pub fn read_table<T, P>(path: P, name: &str) -> Result<Table<T>>
where
    T: DeserializeOwned,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    let mut reader = JsonlReader::open(path)?;
    let rows: Vec<T> = reader.read_rows()?;

    info!(
        "Loaded {} {} rows from {:?} ({} lines skipped)",
        rows.len(),
        name,
        path,
        reader.skipped()
    );
    Ok(Table::new(name, rows))
}

/// Count well-formed JSON lines without decoding them into rows.
pub fn count_records<P: AsRef<Path>>(path: P) -> Result<usize> {
    let mut count = 0;
    for record in JsonlReader::open(path)? {
        record?;
        count += 1;
    }
    Ok(count)
}

enum Sink {
    Plain(BufWriter<File>),
    Gzip(GzEncoder<BufWriter<File>>),
}

impl Sink {
    fn as_write(&mut self) -> &mut dyn Write {
        match self {
            Sink::Plain(w) => w,
            Sink::Gzip(w) => w,
        }
    }
}

/// Line-by-line JSONL writer
pub struct JsonlWriter {
    sink: Sink,
    written: usize,
}

impl JsonlWriter {
    /// Create `path`, gzip-compressing when it ends in `.gz`.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = BufWriter::with_capacity(BUFFER_SIZE, File::create(path)?);
        let sink = if is_gzip(path) {
            Sink::Gzip(GzEncoder::new(file, Compression::default()))
        } else {
            Sink::Plain(file)
        };
        Ok(Self { sink, written: 0 })
    }

    pub fn write<T: Serialize>(&mut self, row: &T) -> Result<()> {
        let out = self.sink.as_write();
        serde_json::to_writer(&mut *out, row)?;
        out.write_all(b"\n")?;
        self.written += 1;
        Ok(())
    }

    pub fn written(&self) -> usize {
        self.written
    }

    /// Finish the gzip stream if any and flush. Must be called for the
    /// output to be complete.
    pub fn finish(self) -> Result<usize> {
        match self.sink {
            Sink::Plain(mut w) => w.flush()?,
            Sink::Gzip(w) => w.finish()?.flush()?,
        }
        Ok(self.written)
    }
}

/// Write every row of `rows` to `path` as JSONL.
pub fn write_jsonl<'a, T, I, P>(path: P, rows: I) -> Result<usize>
where
    T: Serialize + 'a,
    I: IntoIterator<Item = &'a T>,
    P: AsRef<Path>,
{
    let mut writer = JsonlWriter::create(path)?;
    for row in rows {
        writer.write(row)?;
    }
    writer.finish()
}
