//! Parquet table writer
//!
//! Rows are serialised through serde into JSON objects, the Arrow schema is
//! inferred from the whole table at once and the rows are written in
//! batches. Inferring from every row keeps a column's type stable across
//! batches.

use crate::{Error, Result};
use arrow::array::*;
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;
use serde::Serialize;
use serde_json::{Map, Value};
use std::fs::File;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

const DEFAULT_BATCH_SIZE: usize = 4096;

/// Write `rows` to a Parquet file at `path`.
///
/// Returns the number of rows written. An empty input produces a valid file
/// with an empty schema.
pub fn write_parquet<'a, T, I, P>(path: P, rows: I) -> Result<usize>
where
    T: Serialize + 'a,
    I: IntoIterator<Item = &'a T>,
    P: AsRef<Path>,
{
    let records = rows
        .into_iter()
        .map(to_object)
        .collect::<Result<Vec<_>>>()?;
    write_objects(path.as_ref(), &records, DEFAULT_BATCH_SIZE)
}

fn to_object<T: Serialize>(row: &T) -> Result<Map<String, Value>> {
    match serde_json::to_value(row)? {
        Value::Object(map) => Ok(map),
        other => Err(Error::UnsupportedFormat(format!(
            "only JSON objects can be written as Parquet rows, got {}",
            other
        ))),
    }
}

fn write_objects(path: &Path, records: &[Map<String, Value>], batch_size: usize) -> Result<usize> {
    let schema = infer_schema(records);
    let file = File::create(path)?;
    let props = WriterProperties::builder()
        .set_compression(Compression::SNAPPY)
        .build();
    let mut writer = ArrowWriter::try_new(file, schema.clone(), Some(props))?;

    for chunk in records.chunks(batch_size.max(1)) {
        let batch = records_to_batch(chunk, &schema)?;
        writer.write(&batch)?;
    }
    writer.close()?;

    debug!(
        "Wrote {} rows with {} columns to {:?}",
        records.len(),
        schema.fields().len(),
        path
    );
    Ok(records.len())
}

/// Infer an Arrow schema from a slice of JSON records.
///
/// Field order follows insertion order of the first record, with any
/// additional fields from subsequent records appended.
fn infer_schema(records: &[Map<String, Value>]) -> Arc<Schema> {
    let mut field_names: Vec<String> = Vec::new();
    for record in records {
        for key in record.keys() {
            if !field_names.contains(key) {
                field_names.push(key.clone());
            }
        }
    }

    let fields: Vec<Field> = field_names
        .iter()
        .map(|name| {
            let dtype = infer_field_type(records, name);
            Field::new(name, dtype, true /* nullable */)
        })
        .collect();

    Arc::new(Schema::new(fields))
}

/// Choose the Arrow DataType for a JSON field by scanning a slice of records.
///
/// Rules (in priority order):
/// - Any string value → `Utf8`
/// - Any complex value (array/object) → `Utf8` (stringified)
/// - Float-only numbers → `Float64`
/// - Int-only numbers → `Int64`
/// - Bool-only → `Boolean`
/// - Mixed or all-null → `Utf8`
fn infer_field_type(records: &[Map<String, Value>], field: &str) -> DataType {
    let mut has_float = false;
    let mut has_int = false;
    let mut has_bool = false;
    let mut has_string = false;

    for record in records {
        match record.get(field) {
            Some(Value::Bool(_)) => has_bool = true,
            Some(Value::Number(n)) => {
                // serde_json represents 1.0 as f64 but also matches is_i64/is_u64.
                // Treat as float only if it has a fractional component.
                if n.is_f64() && !n.is_i64() && !n.is_u64() {
                    has_float = true;
                } else {
                    has_int = true;
                }
            }
            Some(Value::String(_)) => has_string = true,
            Some(Value::Null) | None => {}
            _ => has_string = true, // arrays, objects → stringify
        }
    }

    if has_string {
        return DataType::Utf8;
    }
    if has_float && !has_int && !has_bool {
        return DataType::Float64;
    }
    if has_int && !has_float && !has_bool {
        return DataType::Int64;
    }
    if has_bool && !has_int && !has_float {
        return DataType::Boolean;
    }
    // Mixed numeric/bool types or all-null → stringify
    DataType::Utf8
}

/// Convert a slice of JSON records to an Arrow `RecordBatch` using `schema`.
fn records_to_batch(records: &[Map<String, Value>], schema: &Arc<Schema>) -> Result<RecordBatch> {
    let num_rows = records.len();
    let mut columns: Vec<Arc<dyn Array>> = Vec::with_capacity(schema.fields().len());

    for field in schema.fields() {
        let col = build_column(records, field.name(), field.data_type(), num_rows)?;
        columns.push(col);
    }

    RecordBatch::try_new(schema.clone(), columns).map_err(Error::Arrow)
}

fn build_column(
    records: &[Map<String, Value>],
    field_name: &str,
    dtype: &DataType,
    num_rows: usize,
) -> Result<Arc<dyn Array>> {
    match dtype {
        DataType::Boolean => {
            let mut b = BooleanBuilder::with_capacity(num_rows);
            for rec in records {
                match rec.get(field_name) {
                    Some(Value::Bool(v)) => b.append_value(*v),
                    _ => b.append_null(),
                }
            }
            Ok(Arc::new(b.finish()))
        }
        DataType::Int64 => {
            let mut b = Int64Builder::with_capacity(num_rows);
            for rec in records {
                match rec.get(field_name) {
                    Some(Value::Number(n)) => match n.as_i64() {
                        Some(i) => b.append_value(i),
                        None => b.append_null(),
                    },
                    _ => b.append_null(),
                }
            }
            Ok(Arc::new(b.finish()))
        }
        DataType::Float64 => {
            let mut b = Float64Builder::with_capacity(num_rows);
            for rec in records {
                match rec.get(field_name) {
                    Some(Value::Number(n)) => match n.as_f64() {
                        Some(f) => b.append_value(f),
                        None => b.append_null(),
                    },
                    _ => b.append_null(),
                }
            }
            Ok(Arc::new(b.finish()))
        }
        _ => {
            // Utf8 and any unrecognised type: store as string.
            let mut b = StringBuilder::with_capacity(num_rows, num_rows * 64);
            for rec in records {
                match rec.get(field_name) {
                    Some(Value::String(s)) => b.append_value(s),
                    Some(Value::Null) | None => b.append_null(),
                    Some(other) => b.append_value(&other.to_string()),
                }
            }
            Ok(Arc::new(b.finish()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use markerprep_core::{EnrichedEdge, FollowerRecord, Id};
    use parquet::file::reader::{FileReader, SerializedFileReader};
    use tempfile::TempDir;

    fn edge(marker: i64, follower: &str, retained: usize) -> EnrichedEdge {
        EnrichedEdge {
            marker_id: Id::Int(marker),
            follower_id: Id::from(follower),
            twitter_name: Some(format!("marker_{}", marker)),
            category: Some("newspapers".to_string()),
            coarse_category: None,
            marker_followers: Some(1_000),
            retained_followers: retained,
        }
    }

    #[test]
    fn test_schema_from_enriched_edges() {
        let rows = vec![edge(1, "a", 2), edge(2, "b", 1)];
        let records: Vec<_> = rows.iter().map(|r| to_object(r).unwrap()).collect();
        let schema = infer_schema(&records);

        let field = |name: &str| schema.field_with_name(name).unwrap().data_type().clone();
        assert_eq!(field("marker_id"), DataType::Int64);
        assert_eq!(field("follower_id"), DataType::Utf8);
        assert_eq!(field("type"), DataType::Utf8);
        assert_eq!(field("type2"), DataType::Utf8);
        assert_eq!(field("retained_followers"), DataType::Int64);
    }

    #[test]
    fn test_write_parquet_row_count() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("edges.parquet");
        let rows: Vec<_> = (0..10).map(|i| edge(i, "f", 3)).collect();

        let written = write_objects(
            &path,
            &rows.iter().map(|r| to_object(r).unwrap()).collect::<Vec<_>>(),
            4,
        )
        .unwrap();
        assert_eq!(written, 10);

        let reader = SerializedFileReader::new(File::open(&path).unwrap()).unwrap();
        let metadata = reader.metadata();
        assert_eq!(metadata.file_metadata().num_rows(), 10);
        assert_eq!(metadata.num_row_groups(), 1);
    }

    #[test]
    fn test_follower_columns() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("followers.parquet");

        let mut follower = FollowerRecord::new(7);
        follower.tweets = Some(120);
        follower.language = Some("fr".to_string());
        follower.language_confidence = Some(0.87);
        follower.in_target_country = Some(true);

        assert_eq!(write_parquet(&path, [&follower]).unwrap(), 1);

        let reader = SerializedFileReader::new(File::open(&path).unwrap()).unwrap();
        let schema = reader.metadata().file_metadata().schema_descr();
        let names: Vec<_> = schema.columns().iter().map(|c| c.name().to_string()).collect();
        assert!(names.contains(&"language_confidence".to_string()));
        assert!(names.contains(&"in_target_country".to_string()));
    }

    #[test]
    fn test_empty_table() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("empty.parquet");
        let rows: Vec<EnrichedEdge> = Vec::new();
        assert_eq!(write_parquet(&path, &rows).unwrap(), 0);
        assert!(path.exists());
    }
}
