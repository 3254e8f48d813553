//! Grouped counts and time-bucketed series.

use chrono::{Datelike, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use crate::models::{Column, Dataset, Value};
use super::profiler::percent;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CountEntry {
    /// `null` is the bucket of rows with a missing value.
    pub key: Value,
    pub count: usize,
    pub percent: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregationResult {
    pub column: String,
    pub total: usize,
    pub entries: Vec<CountEntry>,
}

impl AggregationResult {
    /// Keeps the first `n` entries; `total` still refers to the full grouping.
    pub fn head(mut self, n: usize) -> Self {
        self.entries.truncate(n);
        self
    }

    pub fn distinct_keys(&self) -> usize {
        self.entries.iter().filter(|e| !e.key.is_null()).count()
    }
}

/// Groups by value of `column_idx`, yielding `(value, count)` by descending count,
/// ties in first-seen order.
fn ranked_counts(dataset: &Dataset, column_idx: usize) -> Vec<(&Value, usize)> {
    let mut slots: HashMap<&Value, usize> = HashMap::new();
    let mut groups: Vec<(&Value, usize)> = Vec::new();

    for value in dataset.column_values(column_idx) {
        match slots.get(value) {
            Some(&slot) => groups[slot].1 += 1,
            None => {
                slots.insert(value, groups.len());
                groups.push((value, 1));
            }
        }
    }

    // stable sort keeps first-seen order among equal counts
    groups.sort_by(|a, b| b.1.cmp(&a.1));
    groups
}

pub fn count_by(dataset: &Dataset, column: &Column) -> Option<AggregationResult> {
    let idx = dataset.column_index(&column.name)?;
    let total = dataset.row_count();
    let entries = ranked_counts(dataset, idx)
        .into_iter()
        .map(|(key, count)| CountEntry {
            key: key.clone(),
            count,
            percent: percent(count, total),
        })
        .collect();

    Some(AggregationResult {
        column: column.name.clone(),
        total,
        entries,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    Hour,
    Month,
}

impl Granularity {
    pub fn bucket(&self, ts: NaiveDateTime) -> NaiveDateTime {
        match self {
            Granularity::Hour => ts
                .with_minute(0)
                .and_then(|t| t.with_second(0))
                .and_then(|t| t.with_nanosecond(0))
                .unwrap_or(ts),
            Granularity::Month => ts
                .date()
                .with_day(1)
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .unwrap_or(ts),
        }
    }

    pub fn label(&self, bucket: NaiveDateTime) -> String {
        match self {
            Granularity::Hour => bucket.format("%Y-%m-%d %H:00").to_string(),
            Granularity::Month => bucket.format("%Y-%m").to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesPoint {
    pub bucket: NaiveDateTime,
    pub label: String,
    /// Absent when the series has no category dimension; `null` for missing categories.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<Value>,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeSeries {
    pub time_column: String,
    pub granularity: Granularity,
    pub category_column: Option<String>,
    pub points: Vec<SeriesPoint>,
    /// Rows with no timestamp; they belong to no bucket.
    pub unbucketed: usize,
    /// Rows left out because their category is outside the top-N.
    pub excluded: usize,
}

impl TimeSeries {
    pub fn bucketed_total(&self) -> usize {
        self.points.iter().map(|p| p.count).sum()
    }
}

#[derive(Debug, Clone, Default)]
pub struct SeriesRequest<'a> {
    pub category: Option<&'a Column>,
    /// Restrict the category dimension to its `n` most frequent values.
    pub top_n: Option<usize>,
}

/// Counts rows per time bucket (and per category, when one is given).
///
/// Buckets are ascending; categories inside a bucket follow the category's overall
/// frequency ranking. Returns `None` when a named column is not part of the dataset.
pub fn time_series(
    dataset: &Dataset,
    time_column: &Column,
    granularity: Granularity,
    request: SeriesRequest<'_>,
) -> Option<TimeSeries> {
    let time_idx = dataset.column_index(&time_column.name)?;
    let category_idx = match request.category {
        Some(c) => Some(dataset.column_index(&c.name)?),
        None => None,
    };

    // category -> rank in the overall frequency ordering
    let ranking: Option<HashMap<&Value, usize>> = category_idx.map(|idx| {
        let ranked = ranked_counts(dataset, idx);
        let keep = request.top_n.unwrap_or(ranked.len());
        ranked
            .into_iter()
            .take(keep)
            .enumerate()
            .map(|(rank, (value, _))| (value, rank))
            .collect()
    });

    let mut buckets: BTreeMap<(NaiveDateTime, usize), (Option<&Value>, usize)> = BTreeMap::new();
    let mut unbucketed = 0;
    let mut excluded = 0;

    for row in dataset.rows() {
        let Some(ts) = row[time_idx].as_timestamp() else {
            unbucketed += 1;
            continue;
        };
        let (rank, category) = match (category_idx, &ranking) {
            (Some(idx), Some(ranking)) => match ranking.get(&row[idx]) {
                Some(&rank) => (rank, Some(&row[idx])),
                None => {
                    excluded += 1;
                    continue;
                }
            },
            _ => (0, None),
        };
        buckets
            .entry((granularity.bucket(ts), rank))
            .or_insert((category, 0))
            .1 += 1;
    }

    let points = buckets
        .into_iter()
        .map(|((bucket, _), (category, count))| SeriesPoint {
            bucket,
            label: granularity.label(bucket),
            category: category.cloned(),
            count,
        })
        .collect();

    Some(TimeSeries {
        time_column: time_column.name.clone(),
        granularity,
        category_column: request.category.map(|c| c.name.clone()),
        points,
        unbucketed,
        excluded,
    })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupSizeStats {
    pub groups: usize,
    pub mean: f64,
    pub max: usize,
    pub min: usize,
}

/// Mean / max / min of group sizes, ignoring the missing-value bucket.
pub fn group_size_stats(counts: &AggregationResult) -> Option<GroupSizeStats> {
    let sizes: Vec<usize> = counts
        .entries
        .iter()
        .filter(|e| !e.key.is_null())
        .map(|e| e.count)
        .collect();
    if sizes.is_empty() {
        return None;
    }
    Some(GroupSizeStats {
        groups: sizes.len(),
        mean: sizes.iter().sum::<usize>() as f64 / sizes.len() as f64,
        max: sizes.iter().copied().max().unwrap_or(0),
        min: sizes.iter().copied().min().unwrap_or(0),
    })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeSpan {
    pub column: String,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub seconds: i64,
}

/// Earliest and latest timestamp of a temporal column.
pub fn time_span(dataset: &Dataset, column: &Column) -> Option<TimeSpan> {
    let idx = dataset.column_index(&column.name)?;
    let mut timestamps = dataset.column_values(idx).filter_map(Value::as_timestamp);
    let first = timestamps.next()?;
    let (start, end) = timestamps.fold((first, first), |(lo, hi), ts| (lo.min(ts), hi.max(ts)));

    Some(TimeSpan {
        column: column.name.clone(),
        start,
        end,
        seconds: (end - start).num_seconds(),
    })
}

/// Rows whose `column` renders exactly as `key`.
pub fn rows_for_key(dataset: &Dataset, column: &Column, key: &str) -> Option<Dataset> {
    let idx = dataset.column_index(&column.name)?;
    Some(dataset.select_rows(|row| !row[idx].is_null() && row[idx].to_string() == key))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::fixtures::{col, operations, text, ts};
    use crate::models::ColumnType;

    #[test]
    fn test_count_by_orders_by_count_then_first_seen() {
        let ds = operations();
        let counts = count_by(&ds, &ds.columns()[1]).unwrap();
        let keys: Vec<String> = counts.entries.iter().map(|e| e.key.to_string()).collect();
        assert_eq!(keys, vec!["Novo", "Encerrado", "", "Cancelado"]);
        assert_eq!(counts.entries[0].count, 2);
        assert_eq!(counts.entries[0].percent, 40.0);
        assert!(counts.entries[2].key.is_null());
        assert_eq!(counts.distinct_keys(), 3);
    }

    #[test]
    fn test_counts_sum_to_row_count() {
        let ds = operations();
        for column in ds.columns() {
            let counts = count_by(&ds, column).unwrap();
            assert_eq!(counts.entries.iter().map(|e| e.count).sum::<usize>(), ds.row_count());
        }
    }

    #[test]
    fn test_monthly_buckets_ascending() {
        let ds = Dataset::new(
            vec![col("when", ColumnType::Datetime)],
            vec![
                vec![ts(2024, 2, 1, 0)],
                vec![ts(2024, 1, 5, 0)],
                vec![ts(2024, 1, 20, 0)],
            ],
        );
        let series = time_series(&ds, &ds.columns()[0], Granularity::Month, SeriesRequest::default()).unwrap();
        let got: Vec<(String, usize)> = series.points.iter().map(|p| (p.label.clone(), p.count)).collect();
        assert_eq!(got, vec![("2024-01".to_string(), 2), ("2024-02".to_string(), 1)]);
        assert!(series.points[0].category.is_none());
    }

    #[test]
    fn test_hourly_by_category_with_top_n() {
        let ds = Dataset::new(
            vec![col("when", ColumnType::Datetime), col("task", ColumnType::String)],
            vec![
                vec![ts(2024, 3, 1, 9), text("ExecuteSLA")],
                vec![ts(2024, 3, 1, 9), text("CheckSLAGoal")],
                vec![ts(2024, 3, 1, 9), text("ExecuteSLA")],
                vec![ts(2024, 3, 1, 10), text("CheckSLADeadline")],
                vec![Value::Null, text("ExecuteSLA")],
            ],
        );
        let task = ds.columns()[1].clone();
        let series = time_series(
            &ds,
            &ds.columns()[0],
            Granularity::Hour,
            SeriesRequest { category: Some(&task), top_n: Some(2) },
        )
        .unwrap();

        assert_eq!(series.unbucketed, 1);
        assert_eq!(series.excluded, 1);
        assert_eq!(series.points.len(), 2);
        assert_eq!(series.points[0].label, "2024-03-01 09:00");
        assert_eq!(series.points[0].category, Some(text("ExecuteSLA")));
        assert_eq!(series.points[0].count, 2);
        assert_eq!(series.bucketed_total() + series.unbucketed + series.excluded, ds.row_count());

        // without truncation every timestamped row lands in a bucket
        let full = time_series(
            &ds,
            &ds.columns()[0],
            Granularity::Hour,
            SeriesRequest { category: Some(&task), top_n: None },
        )
        .unwrap();
        assert_eq!(full.bucketed_total() + full.unbucketed, ds.row_count());
    }

    #[test]
    fn test_empty_dataset_aggregations_are_empty() {
        let ds = Dataset::empty(vec![col("when", ColumnType::Datetime)]);
        assert!(count_by(&ds, &ds.columns()[0]).unwrap().entries.is_empty());
        let series = time_series(&ds, &ds.columns()[0], Granularity::Month, SeriesRequest::default()).unwrap();
        assert!(series.points.is_empty());
        assert!(time_span(&ds, &ds.columns()[0]).is_none());
    }

    #[test]
    fn test_group_size_stats_and_span() {
        let ds = operations();
        let per_op = count_by(&ds, &ds.columns()[0]).unwrap();
        let stats = group_size_stats(&per_op).unwrap();
        assert_eq!(stats.groups, 3);
        assert_eq!(stats.max, 3);
        assert_eq!(stats.min, 1);
        assert!((stats.mean - 5.0 / 3.0).abs() < 1e-9);

        let span = time_span(&ds, &ds.columns()[2]).unwrap();
        assert_eq!(span.start, ts(2024, 1, 5, 9).as_timestamp().unwrap());
        assert_eq!(span.end, ts(2024, 2, 14, 8).as_timestamp().unwrap());
    }

    #[test]
    fn test_rows_for_key() {
        let ds = operations();
        let drill = rows_for_key(&ds, &ds.columns()[0], "P-1").unwrap();
        assert_eq!(drill.row_count(), 3);
        assert!(rows_for_key(&ds, &col("nope", ColumnType::String), "P-1").is_none());
    }
}
