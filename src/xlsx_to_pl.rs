use calamine::{open_workbook, Data, Reader, Xlsx};
use polars::prelude::*;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

fn cell_to_any(cell: &Data) -> AnyValue<'static> {
    match cell {
        Data::Empty => AnyValue::Null,
        Data::Int(i) => AnyValue::Int64(*i),
        Data::Float(f) => AnyValue::Float64(*f),
        Data::Bool(b) => AnyValue::Boolean(*b),
        other => AnyValue::StringOwned(other.to_string().into()),
    }
}

fn sheet_to_dataframe(
    workbook: &mut Xlsx<BufReader<File>>,
    sheet: Option<String>,
) -> Result<DataFrame, color_eyre::eyre::Error> {
    let sheet_name = sheet.unwrap_or_else(|| workbook.sheet_names()[0].clone());
    let range = workbook.worksheet_range(&sheet_name)?;

    // First row is the header, everything below is data.
    let mut header_row: Vec<String> = Vec::new();
    let mut data_rows: Vec<Vec<AnyValue>> = Vec::new();
    for (row_idx, row) in range.rows().enumerate() {
        if row_idx == 0 {
            header_row = row.iter().map(|cell| cell.to_string()).collect();
        } else {
            data_rows.push(row.iter().map(cell_to_any).collect());
        }
    }

    let mut columns: Vec<Column> = Vec::new();
    for (col_idx, col_name) in header_row.iter().enumerate() {
        let column_data: Vec<AnyValue> = data_rows
            .iter()
            .map(|row| row.get(col_idx).cloned().unwrap_or(AnyValue::Null))
            .collect();
        let series = Series::from_any_values(col_name.as_str().into(), column_data.as_ref(), false)?;
        columns.push(series.into_column());
    }

    Ok(DataFrame::new(columns)?)
}

/// Reads one worksheet of an `.xlsx` workbook into a polars `DataFrame`.
/// Defaults to the first sheet.
pub struct ExcelReader {
    workbook: Xlsx<BufReader<File>>,
    sheet: Option<String>,
}

impl ExcelReader {
    pub fn new<P: AsRef<Path>>(file_path: P) -> Result<Self, color_eyre::eyre::Error> {
        let workbook: Xlsx<BufReader<File>> = open_workbook(file_path)?;
        Ok(ExcelReader {
            workbook,
            sheet: None,
        })
    }
    pub fn with_sheet<T: Into<String>>(mut self, sheet: Option<T>) -> Self {
        self.sheet = sheet.map(|t| t.into());
        self
    }
    pub fn sheet_names(&self) -> Vec<String> {
        self.workbook.sheet_names()
    }
    pub fn finish(&mut self) -> Result<DataFrame, color_eyre::eyre::Error> {
        sheet_to_dataframe(&mut self.workbook, self.sheet.clone())
    }
}
