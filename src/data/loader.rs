use std::path::Path;

use anyhow::{bail, Context, Result};
use arrow::array::{Array, ArrayRef, AsArray};
use arrow::compute::cast;
use arrow::datatypes::{
    DataType, Date32Type, Float32Type, Float64Type, Int32Type, Int64Type, TimeUnit,
};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use serde_json::Value as JsonValue;

use crate::config::DashboardConfig;

use super::index::DatasetIndex;
use super::model::{FieldValue, RawRecord};

// ---------------------------------------------------------------------------
// Public entry-points
// ---------------------------------------------------------------------------

/// Read a record file and index it.
pub fn load_file(path: &Path, config: &DashboardConfig) -> Result<DatasetIndex> {
    let raw = read_records(path)?;
    let index = DatasetIndex::load(raw, config)
        .with_context(|| format!("indexing records from {}", path.display()))?;
    log::info!("Loaded {} records from {}", index.dataset.len(), path.display());
    Ok(index)
}

/// Read raw records from a file.  Dispatch by extension.
///
/// Supported formats:
/// * `.json`    – `[{ "t": "2024-01-01T10:00:00Z", "value": 3, "name": "x" }, ...]`
/// * `.csv`     – header row, one record per line
/// * `.parquet` – flat scalar columns, one record per row
pub fn read_records(path: &Path) -> Result<Vec<RawRecord>> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    match ext.as_str() {
        "json" => read_json(path),
        "csv" => read_csv(path),
        "parquet" | "pq" => read_parquet(path),
        other => bail!("Unsupported file extension: .{other}"),
    }
}

// ---------------------------------------------------------------------------
// JSON reader
// ---------------------------------------------------------------------------

fn read_json(path: &Path) -> Result<Vec<RawRecord>> {
    let text = std::fs::read_to_string(path).context("reading JSON file")?;
    let root: JsonValue = serde_json::from_str(&text).context("parsing JSON")?;

    let rows = root.as_array().context("Expected top-level JSON array")?;

    rows.iter()
        .enumerate()
        .map(|(i, row)| {
            let obj = row
                .as_object()
                .with_context(|| format!("Row {i} is not a JSON object"))?;
            Ok(obj
                .iter()
                .map(|(key, val)| (key.clone(), json_to_field(val)))
                .collect())
        })
        .collect()
}

fn json_to_field(val: &JsonValue) -> FieldValue {
    match val {
        JsonValue::String(s) => FieldValue::String(s.clone()),
        JsonValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                FieldValue::Integer(i)
            } else if let Some(f) = n.as_f64() {
                FieldValue::Float(f)
            } else {
                FieldValue::String(n.to_string())
            }
        }
        JsonValue::Bool(b) => FieldValue::Bool(*b),
        JsonValue::Null => FieldValue::Null,
        other => FieldValue::String(other.to_string()),
    }
}

// ---------------------------------------------------------------------------
// CSV reader
// ---------------------------------------------------------------------------

/// Every column becomes a field; cell types are guessed.
fn read_csv(path: &Path) -> Result<Vec<RawRecord>> {
    let mut reader = csv::Reader::from_path(path).context("opening CSV")?;
    let headers: Vec<String> = reader
        .headers()
        .context("reading CSV headers")?
        .iter()
        .map(|h| h.to_string())
        .collect();

    let mut records = Vec::new();
    for (row_no, result) in reader.records().enumerate() {
        let row = result.with_context(|| format!("CSV row {row_no}"))?;
        records.push(
            headers
                .iter()
                .zip(row.iter())
                .map(|(name, cell)| (name.clone(), guess_field_type(cell)))
                .collect(),
        );
    }
    Ok(records)
}

fn guess_field_type(s: &str) -> FieldValue {
    if s.is_empty() {
        return FieldValue::Null;
    }
    if let Ok(i) = s.parse::<i64>() {
        return FieldValue::Integer(i);
    }
    if let Ok(f) = s.parse::<f64>() {
        return FieldValue::Float(f);
    }
    if s == "true" || s == "false" {
        return FieldValue::Bool(s == "true");
    }
    FieldValue::String(s.to_string())
}

// ---------------------------------------------------------------------------
// Parquet reader
// ---------------------------------------------------------------------------

/// Load a Parquet file with flat scalar columns.
///
/// Timestamp and Date32 columns are converted to epoch milliseconds so the
/// index can coerce them like any other numeric timestamp.
fn read_parquet(path: &Path) -> Result<Vec<RawRecord>> {
    let file = std::fs::File::open(path).context("opening parquet file")?;
    let builder =
        ParquetRecordBatchReaderBuilder::try_new(file).context("reading parquet metadata")?;
    let reader = builder.build().context("building parquet reader")?;

    let mut records = Vec::new();

    for batch_result in reader {
        let batch = batch_result.context("reading parquet record batch")?;
        let schema = batch.schema();

        let mut columns = Vec::with_capacity(batch.num_columns());
        for (field, col) in schema.fields().iter().zip(batch.columns()) {
            let values = column_values(col)
                .with_context(|| format!("reading column '{}'", field.name()))?;
            columns.push((field.name().clone(), values));
        }

        for row in 0..batch.num_rows() {
            records.push(
                columns
                    .iter()
                    .map(|(name, values)| (name.clone(), values[row].clone()))
                    .collect(),
            );
        }
    }

    Ok(records)
}

// -- Parquet / Arrow helpers --

/// Convert a whole Arrow column into field values.
fn column_values(col: &ArrayRef) -> Result<Vec<FieldValue>> {
    let values = match col.data_type() {
        DataType::Utf8 => {
            let arr = col.as_string::<i32>();
            (0..arr.len())
                .map(|i| non_null(arr, i, || FieldValue::String(arr.value(i).to_string())))
                .collect()
        }
        DataType::LargeUtf8 => {
            let arr = col.as_string::<i64>();
            (0..arr.len())
                .map(|i| non_null(arr, i, || FieldValue::String(arr.value(i).to_string())))
                .collect()
        }
        DataType::Int32 => {
            let arr = col.as_primitive::<Int32Type>();
            (0..arr.len())
                .map(|i| non_null(arr, i, || FieldValue::Integer(i64::from(arr.value(i)))))
                .collect()
        }
        DataType::Int64 => {
            let arr = col.as_primitive::<Int64Type>();
            (0..arr.len())
                .map(|i| non_null(arr, i, || FieldValue::Integer(arr.value(i))))
                .collect()
        }
        DataType::Float32 => {
            let arr = col.as_primitive::<Float32Type>();
            (0..arr.len())
                .map(|i| non_null(arr, i, || FieldValue::Float(f64::from(arr.value(i)))))
                .collect()
        }
        DataType::Float64 => {
            let arr = col.as_primitive::<Float64Type>();
            (0..arr.len())
                .map(|i| non_null(arr, i, || FieldValue::Float(arr.value(i))))
                .collect()
        }
        DataType::Boolean => {
            let arr = col.as_boolean();
            (0..arr.len())
                .map(|i| non_null(arr, i, || FieldValue::Bool(arr.value(i))))
                .collect()
        }
        DataType::Date32 => {
            let arr = col.as_primitive::<Date32Type>();
            (0..arr.len())
                .map(|i| {
                    non_null(arr, i, || FieldValue::Integer(i64::from(arr.value(i)) * 86_400_000))
                })
                .collect()
        }
        DataType::Timestamp(unit, _) => {
            let per_ms: f64 = match unit {
                TimeUnit::Second => 1e-3,
                TimeUnit::Millisecond => 1.0,
                TimeUnit::Microsecond => 1e3,
                TimeUnit::Nanosecond => 1e6,
            };
            let raw = cast(col, &DataType::Int64).context("casting timestamp column")?;
            let arr = raw.as_primitive::<Int64Type>();
            (0..arr.len())
                .map(|i| {
                    non_null(arr, i, || {
                        FieldValue::Integer((arr.value(i) as f64 / per_ms).round() as i64)
                    })
                })
                .collect()
        }
        _ => {
            let text = cast(col, &DataType::Utf8).context("casting column to text")?;
            let arr = text.as_string::<i32>();
            (0..arr.len())
                .map(|i| non_null(arr, i, || FieldValue::String(arr.value(i).to_string())))
                .collect()
        }
    };
    Ok(values)
}

fn non_null(arr: &dyn Array, i: usize, value: impl FnOnce() -> FieldValue) -> FieldValue {
    if arr.is_null(i) {
        FieldValue::Null
    } else {
        value()
    }
}
