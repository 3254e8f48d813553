//! CSV export. Every file is UTF-8 with a byte-order mark so spreadsheet tools
//! pick the right encoding for accented headers.

use serde::Serialize;
use crate::error::AppError;
use crate::models::Dataset;
use super::aggregator::AggregationResult;
use super::profiler::ColumnProfile;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

fn writer() -> csv::Writer<Vec<u8>> {
    csv::Writer::from_writer(UTF8_BOM.to_vec())
}

fn finish(writer: csv::Writer<Vec<u8>>) -> Result<Vec<u8>, AppError> {
    writer
        .into_inner()
        .map_err(|e| AppError::ExportError(format!("Failed to flush CSV: {}", e)))
}

const PROFILE_FIELDS: [&str; 6] = [
    "name",
    "data_type",
    "missing_count",
    "missing_pct",
    "distinct_count",
    "filled_count",
];

/// Tabular projection of `ColumnProfile`; field names must stay identical to it.
#[derive(Serialize)]
struct ProfileRow<'a> {
    name: &'a str,
    data_type: &'a str,
    missing_count: usize,
    missing_pct: f64,
    distinct_count: usize,
    filled_count: usize,
}

/// Same field names as `CountEntry`; the key is written as display text.
#[derive(Serialize)]
struct CountRow {
    key: String,
    count: usize,
    percent: f64,
}

/// Quality table in the order given.
pub fn profile_csv(columns: &[ColumnProfile]) -> Result<Vec<u8>, AppError> {
    let mut wtr = writer();
    if columns.is_empty() {
        wtr.write_record(PROFILE_FIELDS)?;
    }
    for c in columns {
        wtr.serialize(ProfileRow {
            name: &c.name,
            data_type: &c.data_type,
            missing_count: c.missing_count,
            missing_pct: c.missing_pct,
            distinct_count: c.distinct_count,
            filled_count: c.filled_count,
        })?;
    }
    finish(wtr)
}

/// Counts table with one row per `CountEntry`; a missing key is an empty field.
pub fn aggregation_csv(result: &AggregationResult) -> Result<Vec<u8>, AppError> {
    let mut wtr = writer();
    if result.entries.is_empty() {
        wtr.write_record(["key", "count", "percent"])?;
    }
    for entry in &result.entries {
        wtr.serialize(CountRow {
            key: entry.key.to_string(),
            count: entry.count,
            percent: entry.percent,
        })?;
    }
    finish(wtr)
}

/// Rows of a dataset under its own column names; missing cells are empty fields.
pub fn dataset_csv(dataset: &Dataset) -> Result<Vec<u8>, AppError> {
    let mut wtr = writer();
    wtr.write_record(dataset.columns().iter().map(|c| c.name.as_str()))?;
    for row in dataset.rows() {
        wtr.write_record(row.iter().map(|v| v.to_string()))?;
    }
    finish(wtr)
}
