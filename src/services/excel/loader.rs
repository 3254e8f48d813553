use super::types::*;
use super::utils::*;
use std::io::Cursor;
use bytes::Bytes;
use calamine::{Data, Reader, open_workbook_auto_from_rs};
use std::collections::HashSet;
use rayon::prelude::*;
use crate::error::AppError;
use crate::models::{Column, Dataset, Value};

pub struct ExcelLoader;

impl ExcelLoader {
    /// Parses every sheet of a workbook. Fails only when the bytes are not a readable workbook.
    pub fn load_from_bytes(&self, id: &str, file_data: Bytes) -> Result<Workbook, AppError> {
        let start = std::time::Instant::now();
        tracing::info!("Opening workbook {} ({}KB)", id, file_data.len() / 1024);

        let cursor = Cursor::new(file_data);
        let mut workbook = open_workbook_auto_from_rs(cursor)
            .map_err(|e| {
                tracing::error!("Failed to open workbook: {}", e);
                AppError::FileProcessingError(format!("Failed to open workbook: {}", e))
            })?;

        let worksheets = workbook.worksheets();
        tracing::info!("Found {} sheets", worksheets.len());

        let sheets: Vec<Sheet> = worksheets
            .into_iter()
            .map(|(name, range)| {
                let rows: Vec<Vec<Data>> = range.rows().map(|row| row.to_vec()).collect();
                let dataset = self.build_dataset(&rows);
                tracing::debug!(
                    "Sheet {}: {} rows x {} columns",
                    name,
                    dataset.row_count(),
                    dataset.column_count()
                );
                Sheet { name, dataset }
            })
            .collect();

        if sheets.is_empty() {
            return Err(AppError::FileProcessingError("No sheets found in workbook".to_string()));
        }

        tracing::info!("Workbook {} loaded in {:?}", id, start.elapsed());
        Ok(Workbook { id: id.to_string(), sheets })
    }

    /// Turns raw sheet rows (header first) into a typed dataset.
    pub fn build_dataset(&self, rows: &[Vec<Data>]) -> Dataset {
        let width = rows.iter().map(|r| r.len()).max().unwrap_or(0);

        let mut existing_names = HashSet::new();
        let header = rows.first();
        let names: Vec<String> = (0..width)
            .map(|idx| {
                let raw = header
                    .and_then(|row| row.get(idx))
                    .map(|cell| cell.to_string())
                    .unwrap_or_default();
                unique_column_name(&raw, idx, &mut existing_names)
            })
            .collect();

        let body = rows.get(1..).unwrap_or(&[]);

        let typed_columns: Vec<(Column, Vec<Value>)> = names
            .into_par_iter()
            .enumerate()
            .map(|(idx, name)| {
                let raw: Vec<RawCell> = body
                    .iter()
                    .map(|row| row.get(idx).map(decode_cell).unwrap_or(RawCell::Empty))
                    .collect();
                let data_type = detect_column_type(&raw);
                let values: Vec<Value> = raw.iter().map(|cell| coerce_cell(cell, data_type)).collect();

                let dropped = raw
                    .iter()
                    .zip(&values)
                    .filter(|(r, v)| !matches!(r, RawCell::Empty) && v.is_null())
                    .count();
                if dropped > 0 {
                    tracing::warn!(
                        "Column {} ({}): {} cells did not match the column type and were loaded as missing",
                        name,
                        data_type,
                        dropped
                    );
                }

                (Column { name, data_type }, values)
            })
            .collect();

        let (columns, column_values): (Vec<Column>, Vec<Vec<Value>>) = typed_columns.into_iter().unzip();
        let mut column_iters: Vec<std::vec::IntoIter<Value>> =
            column_values.into_iter().map(|c| c.into_iter()).collect();
        let dataset_rows: Vec<Vec<Value>> = (0..body.len())
            .map(|_| {
                column_iters
                    .iter_mut()
                    .map(|it| it.next().unwrap_or(Value::Null))
                    .collect()
            })
            .collect();

        Dataset::new(columns, dataset_rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ColumnType;

    fn s(v: &str) -> Data {
        Data::String(v.to_string())
    }

    #[test]
    fn test_build_dataset_infers_types_and_nulls_mismatches() {
        let mut rows = vec![vec![s("ID"), s("Valor"), s("Criado em"), s("")]];
        for i in 0..9 {
            rows.push(vec![
                s(&format!("P-{}", i)),
                Data::Float(i as f64 + 0.5),
                s(&format!("0{}/01/2024", i + 1)),
                Data::Empty,
            ]);
        }
        rows.push(vec![s("P-9"), s("n/a")]);

        let ds = ExcelLoader.build_dataset(&rows);
        assert_eq!(ds.row_count(), 10);
        let types: Vec<ColumnType> = ds.columns().iter().map(|c| c.data_type).collect();
        assert_eq!(
            types,
            vec![ColumnType::String, ColumnType::Float, ColumnType::Datetime, ColumnType::Empty]
        );
        assert_eq!(ds.columns()[3].name, "Unnamed: 3");
        // malformed numeric cell and the short row's missing cells
        assert_eq!(ds.rows()[9][1], Value::Null);
        assert_eq!(ds.rows()[9][2], Value::Null);
        assert_eq!(ds.rows()[0][0], Value::Text("P-0".into()));
    }

    #[test]
    fn test_build_dataset_header_only() {
        let ds = ExcelLoader.build_dataset(&[vec![s("a"), s("a")]]);
        assert_eq!(ds.row_count(), 0);
        assert_eq!(ds.columns()[1].name, "a.1");
        assert_eq!(ds.columns()[0].data_type, ColumnType::Empty);
    }

    #[test]
    fn test_build_dataset_empty_sheet() {
        let ds = ExcelLoader.build_dataset(&[]);
        assert_eq!(ds.column_count(), 0);
        assert_eq!(ds.row_count(), 0);
    }

    #[test]
    fn test_load_rejects_non_workbook_bytes() {
        let result = ExcelLoader.load_from_bytes("abc", Bytes::from_static(b"not a spreadsheet"));
        assert!(matches!(result, Err(AppError::FileProcessingError(_))));
    }
}
