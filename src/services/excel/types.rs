use serde::Serialize;
use crate::models::Dataset;

#[derive(Debug, Clone)]
pub struct Sheet {
    pub name: String,
    pub dataset: Dataset,
}

#[derive(Debug, Clone, Serialize)]
pub struct SheetSummary {
    pub name: String,
    pub row_count: usize,
    pub column_count: usize,
}

/// All sheets of one uploaded workbook, keyed by the hash of the uploaded bytes.
#[derive(Debug, Clone)]
pub struct Workbook {
    pub id: String,
    pub sheets: Vec<Sheet>,
}

impl Workbook {
    /// The sheet with the most rows; the earliest one wins a tie.
    pub fn primary_sheet(&self) -> Option<&Sheet> {
        self.sheets.iter().fold(None, |best: Option<&Sheet>, sheet| match best {
            Some(b) if b.dataset.row_count() >= sheet.dataset.row_count() => Some(b),
            _ => Some(sheet),
        })
    }

    pub fn sheet(&self, name: &str) -> Option<&Sheet> {
        self.sheets.iter().find(|s| s.name == name)
    }

    pub fn summaries(&self) -> Vec<SheetSummary> {
        self.sheets
            .iter()
            .map(|s| SheetSummary {
                name: s.name.clone(),
                row_count: s.dataset.row_count(),
                column_count: s.dataset.column_count(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::fixtures::{col, text};
    use crate::models::ColumnType;

    fn sheet(name: &str, rows: usize) -> Sheet {
        Sheet {
            name: name.to_string(),
            dataset: Dataset::new(
                vec![col("a", ColumnType::String)],
                (0..rows).map(|i| vec![text(&i.to_string())]).collect(),
            ),
        }
    }

    #[test]
    fn test_primary_sheet_prefers_most_rows_then_first() {
        let wb = Workbook {
            id: "x".into(),
            sheets: vec![sheet("Resumo", 2), sheet("Dados", 10), sheet("Copia", 10)],
        };
        assert_eq!(wb.primary_sheet().unwrap().name, "Dados");
    }

    #[test]
    fn test_primary_sheet_of_empty_workbook() {
        let wb = Workbook { id: "x".into(), sheets: vec![] };
        assert!(wb.primary_sheet().is_none());
    }
}
