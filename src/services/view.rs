use serde::{Deserialize, Serialize};
use super::filter::FilterSet;

/// Ordering of the per-column quality table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualitySort {
    #[default]
    MissingDesc,
    MissingAsc,
    Name,
    Type,
}

/// Everything a view needs to recompute its results, passed in explicitly.
///
/// Column overrides replace the name heuristics; a `None` override means "detect".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewConfig {
    pub filters: FilterSet,
    pub id_column: Option<String>,
    pub status_column: Option<String>,
    pub date_column: Option<String>,
    pub top_n: Option<usize>,
    pub sort: QualitySort,
    /// Columns to keep in filtered output; empty keeps all.
    pub columns: Vec<String>,
}

impl ViewConfig {
    pub fn top_n_or(&self, default: usize) -> usize {
        self.top_n.filter(|n| *n > 0).unwrap_or(default)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_partial_config() {
        let config: ViewConfig = serde_json::from_str(r#"{"top_n": 3, "sort": "name"}"#).unwrap();
        assert_eq!(config.top_n_or(7), 3);
        assert_eq!(config.sort, QualitySort::Name);
        assert!(config.filters.is_empty());
    }

    #[test]
    fn test_zero_top_n_falls_back() {
        let config = ViewConfig { top_n: Some(0), ..Default::default() };
        assert_eq!(config.top_n_or(7), 7);
    }
}
