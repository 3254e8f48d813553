//! Row filtering: categorical multi-select, inclusive date range and free-text search.
//!
//! Filtering always produces a new `Dataset`; the source is never touched, and
//! applying the same `FilterSet` twice selects the same rows as applying it once.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use crate::error::AppError;
use crate::models::{Dataset, Value};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryFilter {
    pub column: String,
    /// Accepted values, compared against each cell's display text.
    #[serde(default)]
    pub values: Vec<String>,
    /// Whether rows with a missing value in `column` pass.
    #[serde(default)]
    pub include_missing: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub column: String,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterSet {
    #[serde(default)]
    pub categories: Vec<CategoryFilter>,
    #[serde(default)]
    pub date_range: Option<DateRange>,
    #[serde(default)]
    pub search: Option<String>,
}

impl FilterSet {
    /// True when no filter would restrict any row.
    pub fn is_empty(&self) -> bool {
        self.categories.iter().all(|c| c.values.is_empty() && !c.include_missing)
            && self.date_range.is_none()
            && self.search.as_deref().map_or(true, |s| s.trim().is_empty())
    }
}

enum Predicate {
    Category { idx: usize, values: Vec<String>, include_missing: bool },
    Date { idx: usize, start: Option<NaiveDate>, end: Option<NaiveDate> },
    Search(String),
}

impl Predicate {
    fn matches(&self, row: &[Value]) -> bool {
        match self {
            Predicate::Category { idx, values, include_missing } => match &row[*idx] {
                Value::Null => *include_missing,
                v => {
                    let rendered = v.to_string();
                    values.iter().any(|accepted| *accepted == rendered)
                }
            },
            Predicate::Date { idx, start, end } => match row[*idx].as_timestamp() {
                Some(ts) => {
                    let day = ts.date();
                    start.map_or(true, |s| day >= s) && end.map_or(true, |e| day <= e)
                }
                None => false,
            },
            Predicate::Search(needle) => row
                .iter()
                .filter(|v| !v.is_null())
                .any(|v| v.to_string().to_lowercase().contains(needle.as_str())),
        }
    }
}

fn compile(dataset: &Dataset, filters: &FilterSet) -> Result<Vec<Predicate>, AppError> {
    let mut predicates = Vec::new();

    if let Some(range) = &filters.date_range {
        let idx = dataset
            .column_index(&range.column)
            .ok_or_else(|| AppError::ColumnNotFound(range.column.clone()))?;
        predicates.push(Predicate::Date { idx, start: range.start, end: range.end });
    }

    for category in &filters.categories {
        // an empty selection means "no restriction", as with an untouched multi-select
        if category.values.is_empty() && !category.include_missing {
            continue;
        }
        let idx = dataset
            .column_index(&category.column)
            .ok_or_else(|| AppError::ColumnNotFound(category.column.clone()))?;
        predicates.push(Predicate::Category {
            idx,
            values: category.values.clone(),
            include_missing: category.include_missing,
        });
    }

    if let Some(term) = filters.search.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
        predicates.push(Predicate::Search(term.to_lowercase()));
    }

    Ok(predicates)
}

/// Returns the subset of rows matching every active predicate.
///
/// Columns named by the filters must exist; an unknown name is a caller error.
pub fn filter(dataset: &Dataset, filters: &FilterSet) -> Result<Dataset, AppError> {
    if filters.is_empty() {
        return Ok(dataset.clone());
    }
    let predicates = compile(dataset, filters)?;

    let filtered = dataset.select_rows(|row| predicates.iter().all(|p| p.matches(row)));
    tracing::debug!(
        "Filter kept {} of {} rows ({} predicates)",
        filtered.row_count(),
        dataset.row_count(),
        predicates.len()
    );
    Ok(filtered)
}
