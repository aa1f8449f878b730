use crate::xlsx_to_pl::ExcelReader;
use polars::prelude::*;
use std::path::Path;

pub const COVERAGE_FILE: &str = "cleaned_coverage_data.xlsx";
pub const INCIDENCE_FILE: &str = "cleaned_incidence_rate_data.xlsx";
pub const REPORTED_FILE: &str = "cleaned_reported_cases_data.xlsx";
pub const INTRODUCTION_FILE: &str = "cleaned_vaccine_introduction_data.xlsx";
pub const SCHEDULE_FILE: &str = "cleaned_vaccine_schedule_data.xlsx";

/// Loads one source spreadsheet, or `None` when the file is missing or
/// unreadable. A failed source is skipped for the rest of the run, it never
/// aborts it.
pub fn read_source(base: &Path, file: &str) -> Option<DataFrame> {
    let path = base.join(file);
    if !path.exists() {
        println!("missing file: {file} (skipping)");
        return None;
    }
    let mut reader = match ExcelReader::new(&path) {
        Ok(reader) => reader,
        Err(err) => {
            println!("could not open {file}: {err}. skipping.");
            return None;
        }
    };
    match reader.finish() {
        Ok(df) => Some(df),
        Err(err) => {
            println!("could not read {file}: {err}. skipping.");
            None
        }
    }
}
