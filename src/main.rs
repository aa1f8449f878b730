use color_eyre::Result;
use db_vaccination::clean::clean_table;
use db_vaccination::db::SqlStore;
use db_vaccination::facts::{load_coverage, load_incidence, load_reported_cases, load_schedule};
use db_vaccination::lookup::{build_lookup_maps, KeyPolicy};
use db_vaccination::masters::{upsert_countries, upsert_diseases, upsert_vaccines};
use db_vaccination::sources::{
    read_source, COVERAGE_FILE, INCIDENCE_FILE, INTRODUCTION_FILE, REPORTED_FILE, SCHEDULE_FILE,
};
use polars::prelude::*;
use std::env;
use std::path::Path;

fn load_clean(base: &Path, file: &str) -> Result<Option<DataFrame>> {
    match read_source(base, file) {
        Some(df) => Ok(Some(clean_table(df)?)),
        None => Ok(None),
    }
}

fn main() -> Result<()> {
    color_eyre::install()?;
    let mut args = env::args().skip(1);
    let base = args.next().unwrap_or_else(|| ".".to_string());
    let db_path = args.next().unwrap_or_else(|| "vaccination.db".to_string());
    let base = Path::new(&base);

    // Connection failure is fatal before any file is touched.
    let store = SqlStore::connect(db_path)?;

    let coverage = load_clean(base, COVERAGE_FILE)?;
    let incidence = load_clean(base, INCIDENCE_FILE)?;
    let reported = load_clean(base, REPORTED_FILE)?;
    let introduction = load_clean(base, INTRODUCTION_FILE)?;
    let schedule = load_clean(base, SCHEDULE_FILE)?;

    // Masters first, so every fact row can resolve its foreign keys.
    if let Some(df) = &introduction {
        upsert_countries(&store, df)?;
    }
    if incidence.is_some() || reported.is_some() {
        upsert_diseases(&store, incidence.as_ref(), reported.as_ref())?;
    }
    if let Some(df) = &coverage {
        upsert_vaccines(&store, df)?;
    }

    let maps = build_lookup_maps(&store, KeyPolicy::LastWins)?;

    if let Some(df) = &coverage {
        load_coverage(&store, df, &maps)?;
    }
    if let Some(df) = &incidence {
        load_incidence(&store, df, &maps)?;
    }
    if let Some(df) = &reported {
        load_reported_cases(&store, df, &maps)?;
    }
    if let Some(df) = &schedule {
        load_schedule(&store, df, &maps)?;
    }

    println!("done. skipped counts above point at missing foreign-key matches.");
    Ok(())
}
