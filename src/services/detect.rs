//! Heuristic column lookups. Every lookup returns `Option` so callers decide
//! what "not found" means for their section.

use serde::Serialize;
use std::collections::HashSet;
use crate::models::{Column, ColumnType, Dataset, Value};

const MAX_FILTER_COLUMNS: usize = 8;
const MAX_FILTER_OPTIONS: usize = 50;
const USEFUL_NUMERIC_MIN_DISTINCT: usize = 5;
const USEFUL_NUMERIC_MIN_PRESENT: usize = 50;

fn name_contains(column: &Column, needle: &str) -> bool {
    column.name.to_lowercase().contains(needle)
}

/// Resolves an explicitly configured column, or falls back to `detect`.
///
/// A configured name that does not exist yields `None`; it never silently
/// switches to the heuristic.
pub fn resolve<'a, F>(dataset: &'a Dataset, configured: Option<&str>, detect: F) -> Option<&'a Column>
where
    F: FnOnce(&'a Dataset) -> Option<&'a Column>,
{
    match configured {
        Some(name) => dataset.column(name),
        None => detect(dataset),
    }
}

pub fn find_status_column(dataset: &Dataset) -> Option<&Column> {
    dataset.columns().iter().find(|c| name_contains(c, "status"))
}

pub fn find_date_column(dataset: &Dataset) -> Option<&Column> {
    dataset.columns().iter().find(|c| c.data_type == ColumnType::Datetime)
}

pub fn find_id_column(dataset: &Dataset) -> Option<&Column> {
    dataset.columns().first()
}

pub fn find_name_column(dataset: &Dataset) -> Option<&Column> {
    dataset
        .columns()
        .iter()
        .find(|c| name_contains(c, "nome") || name_contains(c, "fantasia"))
}

pub fn find_operation_type_column(dataset: &Dataset) -> Option<&Column> {
    dataset
        .columns()
        .iter()
        .find(|c| name_contains(c, "tipo") && name_contains(c, "opera"))
}

/// Positional layout of an operation-history export.
#[derive(Debug, Clone, Default, Serialize)]
pub struct HistoryColumns {
    pub operation: Option<String>,
    pub identifier: Option<String>,
    pub task: Option<String>,
    pub created_at: Option<String>,
    pub executor: Option<String>,
    pub case_type: Option<String>,
    pub elapsed: Option<String>,
}

impl HistoryColumns {
    /// History exports have mangled headers, so columns are taken by position.
    /// The creation time only counts when that column actually holds timestamps.
    pub fn locate(dataset: &Dataset) -> Self {
        let at = |idx: usize| dataset.columns().get(idx).map(|c| c.name.clone());
        let created_at = dataset
            .columns()
            .get(3)
            .filter(|c| c.data_type == ColumnType::Datetime)
            .map(|c| c.name.clone());

        Self {
            operation: at(0),
            identifier: at(1),
            task: at(2),
            created_at,
            executor: at(4),
            case_type: at(5),
            elapsed: at(6),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FilterCandidate {
    pub column: String,
    pub options: Vec<String>,
}

/// String columns with a small, non-trivial set of values, with their sorted options.
pub fn filter_candidates(dataset: &Dataset) -> Vec<FilterCandidate> {
    dataset
        .columns()
        .iter()
        .enumerate()
        .filter(|(_, c)| c.data_type == ColumnType::String)
        .filter_map(|(idx, c)| {
            let distinct: HashSet<String> = dataset
                .column_values(idx)
                .filter(|v| !v.is_null())
                .map(Value::to_string)
                .collect();
            if distinct.len() <= 1 || distinct.len() > MAX_FILTER_OPTIONS {
                return None;
            }
            let mut options: Vec<String> = distinct.into_iter().collect();
            options.sort();
            Some(FilterCandidate { column: c.name.clone(), options })
        })
        .take(MAX_FILTER_COLUMNS)
        .collect()
}

/// Numeric columns worth a distribution chart.
pub fn useful_numeric_columns(dataset: &Dataset) -> Vec<&Column> {
    dataset
        .columns()
        .iter()
        .enumerate()
        .filter(|(_, c)| c.data_type.is_numeric())
        .filter(|(idx, _)| {
            let present: Vec<&Value> = dataset.column_values(*idx).filter(|v| !v.is_null()).collect();
            let distinct: HashSet<&Value> = present.iter().copied().collect();
            distinct.len() > USEFUL_NUMERIC_MIN_DISTINCT && present.len() > USEFUL_NUMERIC_MIN_PRESENT
        })
        .map(|(_, c)| c)
        .collect()
}
