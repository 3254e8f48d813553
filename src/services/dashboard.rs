//! The two analysis views of a CRM export: operation records and operation history.
//!
//! Both views are assembled from profiler and aggregator output. Sections that depend
//! on a heuristically located column are reported as unavailable when the column is
//! missing instead of failing the whole view.

use serde::{Deserialize, Serialize};
use crate::models::{Column, Dataset};
use super::aggregator::{
    count_by, group_size_stats, rows_for_key, time_series, time_span, AggregationResult, Granularity,
    GroupSizeStats, SeriesRequest, TimeSeries, TimeSpan,
};
use super::detect::{self, FilterCandidate, HistoryColumns};
use super::profiler::{self, NumericSummary, ProfileReport};
use super::view::ViewConfig;

const TOP_NAMES: usize = 15;
const TOP_OPERATIONS: usize = 30;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Section<T> {
    Available { data: T },
    Unavailable { reason: String },
}

impl<T> Section<T> {
    fn from_option(value: Option<T>, reason: impl Into<String>) -> Self {
        match value {
            Some(data) => Section::Available { data },
            None => Section::Unavailable { reason: reason.into() },
        }
    }

    #[cfg(test)]
    pub(crate) fn data(&self) -> Option<&T> {
        match self {
            Section::Available { data } => Some(data),
            Section::Unavailable { .. } => None,
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, Section::Available { .. })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DashboardMode {
    #[default]
    Operations,
    History,
}

#[derive(Debug, Clone, Serialize)]
pub struct OperationsDashboard {
    pub profile: ProfileReport,
    pub id_column: Option<String>,
    pub status_column: Option<String>,
    pub date_column: Option<String>,
    pub period: Section<TimeSpan>,
    pub unique_ids: Option<usize>,
    pub status_counts: Section<AggregationResult>,
    pub monthly: Section<TimeSeries>,
    pub monthly_by_status: Section<TimeSeries>,
    pub top_names: Section<AggregationResult>,
    pub operation_types: Section<AggregationResult>,
    pub numeric: Vec<NumericSummary>,
    pub filter_candidates: Vec<FilterCandidate>,
}

pub fn operations_dashboard(dataset: &Dataset, config: &ViewConfig, default_top_n: usize) -> OperationsDashboard {
    let id_col = detect::resolve(dataset, config.id_column.as_deref(), detect::find_id_column);
    let status_col = detect::resolve(dataset, config.status_column.as_deref(), detect::find_status_column);
    let date_col = detect::resolve(dataset, config.date_column.as_deref(), detect::find_date_column);
    let top_n = config.top_n_or(default_top_n);

    let profile = profiler::profile(dataset, id_col, config.sort);
    let unique_ids = profile.duplicates.as_ref().map(|d| d.distinct_count);

    let monthly = date_col.and_then(|d| time_series(dataset, d, Granularity::Month, SeriesRequest::default()));
    let monthly_by_status = match (date_col, status_col) {
        (Some(d), Some(s)) => time_series(
            dataset,
            d,
            Granularity::Month,
            SeriesRequest { category: Some(s), top_n: Some(top_n) },
        ),
        _ => None,
    };

    let top_names = detect::find_name_column(dataset)
        .and_then(|c| count_by(dataset, c))
        .filter(|counts| counts.distinct_keys() > 1)
        .map(|counts| counts.head(TOP_NAMES));

    let numeric = detect::useful_numeric_columns(dataset)
        .into_iter()
        .filter_map(|c| profiler::numeric_summary(dataset, c))
        .collect();

    OperationsDashboard {
        id_column: id_col.map(|c| c.name.clone()),
        status_column: status_col.map(|c| c.name.clone()),
        date_column: date_col.map(|c| c.name.clone()),
        period: Section::from_option(date_col.and_then(|d| time_span(dataset, d)), "no date column detected"),
        unique_ids,
        status_counts: Section::from_option(status_col.and_then(|s| count_by(dataset, s)), "no status column detected"),
        monthly: Section::from_option(monthly, "no date column detected"),
        monthly_by_status: Section::from_option(monthly_by_status, "needs both a date and a status column"),
        top_names: Section::from_option(top_names, "no name column with more than one value"),
        operation_types: Section::from_option(
            detect::find_operation_type_column(dataset).and_then(|c| count_by(dataset, c)),
            "no operation type column detected",
        ),
        numeric,
        filter_candidates: detect::filter_candidates(dataset),
        profile,
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct OperationActivity {
    pub stats: GroupSizeStats,
    /// Largest operations first, capped for charting.
    pub top: AggregationResult,
}

#[derive(Debug, Clone, Serialize)]
pub struct HistoryDashboard {
    pub layout: HistoryColumns,
    pub profile: ProfileReport,
    pub operations_referenced: Option<usize>,
    pub per_operation: Section<OperationActivity>,
    pub period: Section<TimeSpan>,
    pub tasks: Section<AggregationResult>,
    pub hourly_by_task: Section<TimeSeries>,
    pub executors: Section<AggregationResult>,
    pub case_types: Section<AggregationResult>,
    pub empty_columns: Vec<String>,
}

fn column_named<'a>(dataset: &'a Dataset, name: &Option<String>) -> Option<&'a Column> {
    name.as_deref().and_then(|n| dataset.column(n))
}

pub fn history_dashboard(dataset: &Dataset, config: &ViewConfig) -> HistoryDashboard {
    let layout = HistoryColumns::locate(dataset);
    let operation = column_named(dataset, &layout.operation);
    let task = column_named(dataset, &layout.task);
    let created_at = column_named(dataset, &layout.created_at);

    let profile = profiler::profile(dataset, None, config.sort);
    let empty_columns = profile
        .columns
        .iter()
        .filter(|c| c.completeness == profiler::Completeness::Empty)
        .map(|c| c.name.clone())
        .collect();

    let per_operation_counts = operation.and_then(|c| count_by(dataset, c));
    let operations_referenced = per_operation_counts.as_ref().map(|c| c.distinct_keys());
    let per_operation = per_operation_counts.and_then(|counts| {
        group_size_stats(&counts).map(|stats| OperationActivity { stats, top: counts.head(TOP_OPERATIONS) })
    });

    let hourly_by_task = match (created_at, task) {
        (Some(d), Some(t)) => time_series(dataset, d, Granularity::Hour, SeriesRequest { category: Some(t), top_n: None }),
        _ => None,
    };

    HistoryDashboard {
        operations_referenced,
        per_operation: Section::from_option(per_operation, "no operation column"),
        period: Section::from_option(created_at.and_then(|d| time_span(dataset, d)), "creation time column is not temporal"),
        tasks: Section::from_option(task.and_then(|c| count_by(dataset, c)), "no task column"),
        hourly_by_task: Section::from_option(hourly_by_task, "needs a temporal creation column and a task column"),
        executors: Section::from_option(
            column_named(dataset, &layout.executor).and_then(|c| count_by(dataset, c)),
            "no executor column",
        ),
        case_types: Section::from_option(
            column_named(dataset, &layout.case_type).and_then(|c| count_by(dataset, c)),
            "no case type column",
        ),
        empty_columns,
        profile,
        layout,
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct OperationDetail {
    pub operation: String,
    pub records: usize,
    pub span: Option<TimeSpan>,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<crate::models::Value>>,
}

/// All history rows of one operation, limited to the operation, task, time and executor columns.
pub fn operation_detail(dataset: &Dataset, operation: &str) -> Option<OperationDetail> {
    let layout = HistoryColumns::locate(dataset);
    let op_col = column_named(dataset, &layout.operation)?;
    let subset = rows_for_key(dataset, op_col, operation)?;

    let shown: Vec<String> = [&layout.operation, &layout.task, &layout.created_at, &layout.executor]
        .into_iter()
        .flatten()
        .cloned()
        .collect();
    let projected = subset.project(&shown);
    let span = column_named(&subset, &layout.created_at).and_then(|c| time_span(&subset, c));

    Some(OperationDetail {
        operation: operation.to_string(),
        records: subset.row_count(),
        span,
        columns: projected.columns().iter().map(|c| c.name.clone()).collect(),
        rows: projected.rows().to_vec(),
    })
}
