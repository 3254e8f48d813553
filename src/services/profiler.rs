//! Column and table quality statistics.

use rayon::prelude::*;
use serde::Serialize;
use smallvec::SmallVec;
use std::collections::HashSet;
use crate::models::{Column, Dataset, Value};
use super::view::QualitySort;

pub const SAMPLE_SIZE: usize = 3;
pub const CRITICAL_MISSING_PCT: f64 = 50.0;
const HISTOGRAM_BINS: usize = 40;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Completeness {
    Complete,
    Partial,
    Empty,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Zero,
    Low,
    Medium,
    High,
}

impl Severity {
    pub fn from_pct(pct: f64) -> Self {
        match pct {
            p if p <= 0.0 => Severity::Zero,
            p if p < 20.0 => Severity::Low,
            p if p < CRITICAL_MISSING_PCT => Severity::Medium,
            _ => Severity::High,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ColumnProfile {
    pub name: String,
    pub data_type: String,
    pub missing_count: usize,
    pub missing_pct: f64,
    pub distinct_count: usize,
    pub filled_count: usize,
    pub completeness: Completeness,
    pub severity: Severity,
    pub sample_values: SmallVec<[String; SAMPLE_SIZE]>,
    pub min_value: Option<String>,
    pub max_value: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DuplicateReport {
    pub column: String,
    pub duplicate_count: usize,
    pub distinct_count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct TableProfile {
    pub row_count: usize,
    pub column_count: usize,
    pub missing_cells: usize,
    pub global_missing_pct: f64,
    pub complete_columns: usize,
    pub partial_columns: usize,
    pub empty_columns: usize,
    pub critical_columns: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProfileReport {
    pub table: TableProfile,
    pub duplicates: Option<DuplicateReport>,
    pub columns: Vec<ColumnProfile>,
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// `part / whole * 100` rounded to two decimals; zero when `whole` is zero.
pub fn percent(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    round2(part as f64 / whole as f64 * 100.0)
}

/// Like `percent`, but a non-zero share never rounds down to zero.
fn missing_percent(missing: usize, rows: usize) -> f64 {
    let pct = percent(missing, rows);
    if missing > 0 && pct == 0.0 {
        0.01
    } else {
        pct
    }
}

fn update_min_max(min_max: &mut (Option<Value>, Option<Value>), value: &Value) {
    let less = |a: &Value, b: &Value| match (a, b) {
        (Value::Number(x), Value::Number(y)) => x < y,
        (Value::Timestamp(x), Value::Timestamp(y)) => x < y,
        (Value::Bool(x), Value::Bool(y)) => x < y,
        _ => a.to_string() < b.to_string(),
    };

    match &min_max.0 {
        Some(min_val) if !less(value, min_val) => {}
        _ => min_max.0 = Some(value.clone()),
    }
    match &min_max.1 {
        Some(max_val) if !less(max_val, value) => {}
        _ => min_max.1 = Some(value.clone()),
    }
}

pub fn profile_column(dataset: &Dataset, idx: usize) -> ColumnProfile {
    let column = &dataset.columns()[idx];
    let rows = dataset.row_count();

    let mut missing = 0;
    let mut seen: HashSet<&Value> = HashSet::new();
    let mut min_max = (None, None);
    let mut sample_values = SmallVec::<[String; SAMPLE_SIZE]>::new();

    for value in dataset.column_values(idx) {
        if value.is_null() {
            missing += 1;
            continue;
        }
        if seen.insert(value) && sample_values.len() < SAMPLE_SIZE {
            sample_values.push(value.to_string());
        }
        update_min_max(&mut min_max, value);
    }

    let completeness = match missing {
        0 => Completeness::Complete,
        m if m == rows => Completeness::Empty,
        _ => Completeness::Partial,
    };
    let missing_pct = missing_percent(missing, rows);

    ColumnProfile {
        name: column.name.clone(),
        data_type: column.data_type.to_string(),
        missing_count: missing,
        missing_pct,
        distinct_count: seen.len(),
        filled_count: rows - missing,
        completeness,
        severity: Severity::from_pct(missing_pct),
        sample_values,
        min_value: min_max.0.map(|v| v.to_string()),
        max_value: min_max.1.map(|v| v.to_string()),
    }
}

pub fn profile_columns(dataset: &Dataset) -> Vec<ColumnProfile> {
    (0..dataset.column_count())
        .into_par_iter()
        .map(|idx| profile_column(dataset, idx))
        .collect()
}

pub fn summarize(dataset: &Dataset, columns: &[ColumnProfile]) -> TableProfile {
    let rows = dataset.row_count();
    let cols = dataset.column_count();
    let missing_cells: usize = columns.iter().map(|c| c.missing_count).sum();
    let count = |kind: Completeness| columns.iter().filter(|c| c.completeness == kind).count();

    TableProfile {
        row_count: rows,
        column_count: cols,
        missing_cells,
        global_missing_pct: percent(missing_cells, rows * cols),
        complete_columns: count(Completeness::Complete),
        partial_columns: count(Completeness::Partial),
        empty_columns: count(Completeness::Empty),
        critical_columns: columns.iter().filter(|c| c.missing_pct >= CRITICAL_MISSING_PCT).count(),
    }
}

/// Counts rows whose value in `id_column` already appeared in an earlier row.
pub fn duplicate_report(dataset: &Dataset, id_column: &Column) -> Option<DuplicateReport> {
    let idx = dataset.column_index(&id_column.name)?;
    let mut seen: HashSet<&Value> = HashSet::new();
    let duplicate_count = dataset.column_values(idx).filter(|v| !seen.insert(*v)).count();
    let distinct_count = seen.iter().filter(|v| !v.is_null()).count();

    Some(DuplicateReport {
        column: id_column.name.clone(),
        duplicate_count,
        distinct_count,
    })
}

pub fn sort_profiles(columns: &mut [ColumnProfile], sort: QualitySort) {
    match sort {
        QualitySort::MissingDesc => columns.sort_by(|a, b| b.missing_pct.total_cmp(&a.missing_pct)),
        QualitySort::MissingAsc => columns.sort_by(|a, b| a.missing_pct.total_cmp(&b.missing_pct)),
        QualitySort::Name => columns.sort_by(|a, b| a.name.cmp(&b.name)),
        QualitySort::Type => columns.sort_by(|a, b| a.data_type.cmp(&b.data_type)),
    }
}

/// Full quality report. `id_column` is optional; without it no duplicate report is produced.
pub fn profile(dataset: &Dataset, id_column: Option<&Column>, sort: QualitySort) -> ProfileReport {
    let start = std::time::Instant::now();
    let mut columns = profile_columns(dataset);
    let table = summarize(dataset, &columns);
    let duplicates = id_column.and_then(|c| duplicate_report(dataset, c));
    sort_profiles(&mut columns, sort);

    tracing::debug!(
        "Profiled {} columns x {} rows in {:?}",
        table.column_count,
        table.row_count,
        start.elapsed()
    );

    ProfileReport { table, duplicates, columns }
}

#[derive(Debug, Clone, Serialize)]
pub struct HistogramBin {
    pub lower: f64,
    pub upper: f64,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct NumericSummary {
    pub column: String,
    pub count: usize,
    pub min: f64,
    pub mean: f64,
    pub max: f64,
    pub median: f64,
    pub histogram: Vec<HistogramBin>,
}

fn histogram(sorted: &[f64], min: f64, max: f64) -> Vec<HistogramBin> {
    if min == max {
        return vec![HistogramBin { lower: min, upper: max, count: sorted.len() }];
    }
    let width = (max - min) / HISTOGRAM_BINS as f64;
    let mut bins: Vec<HistogramBin> = (0..HISTOGRAM_BINS)
        .map(|i| HistogramBin {
            lower: min + width * i as f64,
            upper: if i + 1 == HISTOGRAM_BINS { max } else { min + width * (i + 1) as f64 },
            count: 0,
        })
        .collect();
    for v in sorted {
        let slot = (((v - min) / width) as usize).min(HISTOGRAM_BINS - 1);
        bins[slot].count += 1;
    }
    bins
}

/// Distribution of a numeric column; `None` for non-numeric or all-missing columns.
pub fn numeric_summary(dataset: &Dataset, column: &Column) -> Option<NumericSummary> {
    if !column.data_type.is_numeric() {
        return None;
    }
    let idx = dataset.column_index(&column.name)?;
    let mut values: Vec<f64> = dataset.column_values(idx).filter_map(Value::as_number).collect();
    if values.is_empty() {
        return None;
    }
    values.sort_by(|a, b| a.total_cmp(b));

    let count = values.len();
    let min = values[0];
    let max = values[count - 1];
    let mean = values.iter().sum::<f64>() / count as f64;
    let median = if count % 2 == 0 {
        (values[count / 2 - 1] + values[count / 2]) / 2.0
    } else {
        values[count / 2]
    };

    Some(NumericSummary {
        column: column.name.clone(),
        count,
        min,
        mean,
        max,
        median,
        histogram: histogram(&values, min, max),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::fixtures::{col, operations, text};
    use crate::models::ColumnType;

    #[test]
    fn test_duplicate_count_counts_repeat_rows() {
        let ds = Dataset::new(
            vec![col("id", ColumnType::String)],
            ["A", "A", "B", "A", "C"].iter().map(|s| vec![text(s)]).collect(),
        );
        let report = duplicate_report(&ds, &ds.columns()[0]).unwrap();
        assert_eq!(report.duplicate_count, 2);
        assert_eq!(report.distinct_count, 3);
    }

    #[test]
    fn test_missing_counts_are_conserved() {
        let ds = operations();
        let report = profile(&ds, None, QualitySort::Name);
        let cell_nulls = ds.rows().iter().flatten().filter(|v| v.is_null()).count();
        assert_eq!(report.table.missing_cells, cell_nulls);
        assert_eq!(report.columns.iter().map(|c| c.missing_count).sum::<usize>(), cell_nulls);
    }

    #[test]
    fn test_column_profile_values() {
        let ds = operations();
        let status = profile_column(&ds, 1);
        assert_eq!(status.missing_count, 1);
        assert_eq!(status.missing_pct, 20.0);
        assert_eq!(status.distinct_count, 3);
        assert_eq!(status.filled_count, 4);
        assert_eq!(status.completeness, Completeness::Partial);
        assert_eq!(status.severity, Severity::Medium);
        assert_eq!(status.sample_values.as_slice(), ["Novo", "Encerrado", "Cancelado"]);

        let amount = profile_column(&ds, 3);
        assert_eq!(amount.min_value.as_deref(), Some("5"));
        assert_eq!(amount.max_value.as_deref(), Some("20.5"));
    }

    #[test]
    fn test_table_level_counts() {
        let ds = operations();
        let report = profile(&ds, ds.columns().first(), QualitySort::MissingDesc);
        // 4 nulls over 25 cells
        assert_eq!(report.table.missing_cells, 4);
        assert_eq!(report.table.global_missing_pct, 16.0);
        assert_eq!(report.table.complete_columns, 1);
        assert_eq!(report.table.partial_columns, 4);
        assert_eq!(report.table.empty_columns, 0);
        assert_eq!(report.table.critical_columns, 0);
        assert_eq!(report.duplicates.unwrap().duplicate_count, 2);
        assert_eq!(report.columns[0].missing_pct, 20.0);
        assert_eq!(report.columns.last().unwrap().name, "Operação");
    }

    #[test]
    fn test_empty_dataset_is_all_zero() {
        let ds = Dataset::empty(vec![col("a", ColumnType::Empty), col("b", ColumnType::Empty)]);
        let report = profile(&ds, None, QualitySort::MissingDesc);
        assert_eq!(report.table.global_missing_pct, 0.0);
        assert_eq!(report.table.empty_columns, 0);
        for c in &report.columns {
            assert_eq!(c.missing_pct, 0.0);
            assert_eq!(c.distinct_count, 0);
        }
    }

    #[test]
    fn test_fully_missing_column_is_empty_and_critical() {
        let ds = Dataset::new(
            vec![col("a", ColumnType::String), col("b", ColumnType::Empty)],
            vec![vec![text("x"), Value::Null], vec![text("y"), Value::Null]],
        );
        let report = profile(&ds, None, QualitySort::MissingDesc);
        assert_eq!(report.columns[0].name, "b");
        assert_eq!(report.columns[0].missing_pct, 100.0);
        assert_eq!(report.columns[0].completeness, Completeness::Empty);
        assert_eq!(report.table.empty_columns, 1);
        assert_eq!(report.table.critical_columns, 1);
        assert_eq!(report.table.global_missing_pct, 50.0);
    }

    #[test]
    fn test_tiny_missing_share_stays_nonzero() {
        let mut rows: Vec<Vec<Value>> = (0..40_000).map(|_| vec![text("x")]).collect();
        rows[7] = vec![Value::Null];
        let ds = Dataset::new(vec![col("a", ColumnType::String)], rows);
        let p = profile_column(&ds, 0);
        assert!(p.missing_pct > 0.0);
        assert!(p.missing_pct <= 100.0);
    }

    #[test]
    fn test_numeric_summary() {
        let ds = operations();
        let summary = numeric_summary(&ds, &ds.columns()[3]).unwrap();
        assert_eq!(summary.count, 4);
        assert_eq!(summary.min, 5.0);
        assert_eq!(summary.max, 20.5);
        assert_eq!(summary.median, 8.625);
        assert_eq!(summary.histogram.len(), 40);
        assert_eq!(summary.histogram.iter().map(|b| b.count).sum::<usize>(), 4);
        assert!(numeric_summary(&ds, &ds.columns()[1]).is_none());
    }
}
