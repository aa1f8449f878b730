use crate::catalog::choose;
use crate::coerce::{normalize_str, to_dec, to_int};
use crate::db::{placeholders, SqlStore, SqlValue};
use crate::lookup::LookupMaps;
use color_eyre::Result;
use indexmap::IndexMap;
use polars::prelude::*;
use std::collections::HashSet;

/// Per-table outcome of a fact load. Partial, best-effort loading with visible
/// counts: source data is known to be inconsistent and the operator needs to
/// see how much of it was usable.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LoadReport {
    pub inserted: usize,
    pub skipped: usize,
}

/// How one target column is filled from the source row.
#[derive(Debug, Clone, Copy)]
enum Field {
    CountryId,
    VaccineId,
    DiseaseId,
    Int(&'static str),
    Dec(&'static str),
    Text(&'static str),
}

/// Resolved ids for one source row: country plus, depending on the table, a
/// vaccine or disease.
type ResolvedKeys = (i64, Option<i64>, Option<i64>);

/// Ordered target-column → source-field plan, restricted to columns that
/// actually exist in the target table.
fn build_plan(
    colset: &HashSet<String>,
    wanted: &[(&[&str], Field)],
) -> IndexMap<String, Field> {
    let mut plan = IndexMap::new();
    for (candidates, field) in wanted {
        if let Some(target) = choose(colset, candidates) {
            plan.insert(target, *field);
        }
    }
    plan
}

fn cell<'a>(df: &'a DataFrame, name: &str, row: usize) -> AnyValue<'a> {
    df.column(name)
        .ok()
        .and_then(|c| c.as_materialized_series().get(row).ok())
        .unwrap_or(AnyValue::Null)
}

fn row_values(
    df: &DataFrame,
    row: usize,
    plan: &IndexMap<String, Field>,
    keys: ResolvedKeys,
) -> Vec<SqlValue> {
    let (country_id, vaccine_id, disease_id) = keys;
    plan.values()
        .map(|field| match field {
            Field::CountryId => SqlValue::Int(country_id),
            Field::VaccineId => vaccine_id.into(),
            Field::DiseaseId => disease_id.into(),
            Field::Int(source) => to_int(&cell(df, source, row)).into(),
            Field::Dec(source) => to_dec(&cell(df, source, row)).into(),
            Field::Text(source) => normalize_str(&cell(df, source, row)).into(),
        })
        .collect()
}

/// Shared row loop: resolve foreign keys, insert what resolves, count the
/// rest. One commit per table.
fn load_fact(
    store: &SqlStore,
    df: &DataFrame,
    table: &'static str,
    plan: IndexMap<String, Field>,
    resolve: impl Fn(usize) -> Option<ResolvedKeys>,
) -> Result<LoadReport> {
    let mut report = LoadReport::default();
    if plan.is_empty() {
        println!("{table}: no matching columns, nothing loaded");
        return Ok(report);
    }
    let sql = format!(
        "INSERT INTO {} ({}) VALUES ({})",
        table,
        plan.keys().cloned().collect::<Vec<_>>().join(", "),
        placeholders(plan.len())
    );
    let mut tx = store.begin()?;
    for row in 0..df.height() {
        let Some(keys) = resolve(row) else {
            report.skipped += 1;
            continue;
        };
        let values = row_values(df, row, &plan, keys);
        match store.execute_in(&mut tx, &sql, values) {
            Ok(_) => report.inserted += 1,
            Err(err) => {
                eprintln!("skipped row {row} in {table}: {err}");
                report.skipped += 1;
            }
        }
    }
    store.commit(tx)?;
    println!(
        "{table}: inserted {}, skipped {}",
        report.inserted, report.skipped
    );
    Ok(report)
}

pub fn load_coverage(store: &SqlStore, df: &DataFrame, maps: &LookupMaps) -> Result<LoadReport> {
    let plan = build_plan(
        &store.table_columns("coverage_data")?,
        &[
            (&["country_id"], Field::CountryId),
            (&["vaccine_id"], Field::VaccineId),
            (&["year"], Field::Int("YEAR")),
            (&["coverage_category"], Field::Text("COVERAGE_CATEGORY")),
            (
                &["coverage_category_description"],
                Field::Text("COVERAGE_CATEGORY_DESCRIPTION"),
            ),
            (&["target_number"], Field::Int("TARGET_NUMBER")),
            (&["doses"], Field::Int("DOSES")),
            (&["coverage"], Field::Dec("COVERAGE")),
        ],
    );
    load_fact(store, df, "coverage_data", plan, |row| {
        let iso = normalize_str(&cell(df, "CODE", row))?;
        let country_id = maps.country_id(&iso)?;
        let vaccine_id = maps.vaccine_id(
            normalize_str(&cell(df, "ANTIGEN", row)).as_deref(),
            normalize_str(&cell(df, "ANTIGEN_DESCRIPTION", row)).as_deref(),
        )?;
        Some((country_id, Some(vaccine_id), None))
    })
}

pub fn load_incidence(store: &SqlStore, df: &DataFrame, maps: &LookupMaps) -> Result<LoadReport> {
    let plan = build_plan(
        &store.table_columns("incidence_rate_data")?,
        &[
            (&["country_id"], Field::CountryId),
            (&["disease_id"], Field::DiseaseId),
            (&["year"], Field::Int("YEAR")),
            (&["denominator"], Field::Text("DENOMINATOR")),
            (&["incidence_rate"], Field::Dec("INCIDENCE_RATE")),
        ],
    );
    load_fact(store, df, "incidence_rate_data", plan, |row| {
        let iso = normalize_str(&cell(df, "CODE", row))?;
        let country_id = maps.country_id(&iso)?;
        let disease_id = maps.disease_id(normalize_str(&cell(df, "DISEASE", row)).as_deref())?;
        Some((country_id, None, Some(disease_id)))
    })
}

pub fn load_reported_cases(
    store: &SqlStore,
    df: &DataFrame,
    maps: &LookupMaps,
) -> Result<LoadReport> {
    let plan = build_plan(
        &store.table_columns("reported_cases_data")?,
        &[
            (&["country_id"], Field::CountryId),
            (&["disease_id"], Field::DiseaseId),
            (&["year"], Field::Int("YEAR")),
            (&["cases", "reported_cases"], Field::Int("CASES")),
        ],
    );
    load_fact(store, df, "reported_cases_data", plan, |row| {
        let iso = normalize_str(&cell(df, "CODE", row))?;
        let country_id = maps.country_id(&iso)?;
        let disease_id = maps.disease_id(normalize_str(&cell(df, "DISEASE", row)).as_deref())?;
        Some((country_id, None, Some(disease_id)))
    })
}

pub fn load_schedule(store: &SqlStore, df: &DataFrame, maps: &LookupMaps) -> Result<LoadReport> {
    let plan = build_plan(
        &store.table_columns("vaccine_schedule_data")?,
        &[
            (&["country_id"], Field::CountryId),
            (&["vaccine_id"], Field::VaccineId),
            (&["year"], Field::Int("YEAR")),
            (&["schedulerounds"], Field::Text("SCHEDULEROUNDS")),
            (&["targetpop"], Field::Text("TARGETPOP")),
            (
                &["targetpop_description"],
                Field::Text("TARGETPOP_DESCRIPTION"),
            ),
            (&["geoarea", "geo_area", "geo"], Field::Text("GEOAREA")),
            (
                &["ageadministered", "age_administered", "age"],
                Field::Text("AGEADMINISTERED"),
            ),
            (
                &["sourcecomment", "source_comment", "source"],
                Field::Text("SOURCECOMMENT"),
            ),
        ],
    );
    load_fact(store, df, "vaccine_schedule_data", plan, |row| {
        let iso = normalize_str(&cell(df, "ISO_3_CODE", row))?;
        let country_id = maps.country_id(&iso)?;
        let vaccine_id = maps.vaccine_id(
            normalize_str(&cell(df, "VACCINECODE", row)).as_deref(),
            normalize_str(&cell(df, "VACCINE_DESCRIPTION", row)).as_deref(),
        )?;
        Some((country_id, Some(vaccine_id), None))
    })
}
