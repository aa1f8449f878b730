use db_vaccination::catalog::choose;
use db_vaccination::clean::clean_table;
use db_vaccination::coerce::{normalize_str, to_dec, to_int};
use db_vaccination::db::SqlStore;
use db_vaccination::facts::{load_coverage, load_incidence, load_reported_cases, load_schedule};
use db_vaccination::lookup::{build_lookup_maps, KeyPolicy};
use db_vaccination::masters::{upsert_countries, upsert_diseases, upsert_vaccines};
use db_vaccination::sources::read_source;
use polars::prelude::*;
use std::collections::HashSet;
use std::path::Path;

/// In-memory store with the pre-created vaccination schema the pipeline
/// expects to find.
fn demo_store() -> SqlStore {
    let store = SqlStore::open_in_memory().unwrap();
    for sql in [
        "CREATE TABLE countries (id INTEGER PRIMARY KEY AUTOINCREMENT, iso_code TEXT UNIQUE, country_name TEXT, who_region TEXT)",
        "CREATE TABLE diseases (id INTEGER PRIMARY KEY AUTOINCREMENT, disease_code TEXT UNIQUE, disease_description TEXT)",
        "CREATE TABLE vaccines (id INTEGER PRIMARY KEY AUTOINCREMENT, vaccine_code TEXT UNIQUE, vaccine_description TEXT)",
        "CREATE TABLE coverage_data (id INTEGER PRIMARY KEY AUTOINCREMENT, country_id INTEGER, vaccine_id INTEGER, year INTEGER, coverage_category TEXT, coverage_category_description TEXT, target_number INTEGER, doses INTEGER, coverage REAL)",
        "CREATE TABLE incidence_rate_data (id INTEGER PRIMARY KEY AUTOINCREMENT, country_id INTEGER, disease_id INTEGER, year INTEGER, denominator TEXT, incidence_rate REAL)",
        "CREATE TABLE reported_cases_data (id INTEGER PRIMARY KEY AUTOINCREMENT, country_id INTEGER, disease_id INTEGER, year INTEGER, cases INTEGER)",
        "CREATE TABLE vaccine_schedule_data (id INTEGER PRIMARY KEY AUTOINCREMENT, country_id INTEGER, vaccine_id INTEGER, year INTEGER, schedulerounds TEXT, targetpop TEXT, targetpop_description TEXT, geoarea TEXT, ageadministered TEXT, sourcecomment TEXT)",
    ] {
        store.execute_sql(sql).unwrap();
    }
    store
}

#[test]
fn test_choose_first_matching_candidate() {
    let cols: HashSet<String> = ["id", "iso_code", "country_name"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    assert_eq!(choose(&cols, &["ISO_CODE", "iso3"]), Some("iso_code".into()));
    assert_eq!(
        choose(&cols, &["iso3", "country_name"]),
        Some("country_name".into())
    );
    assert_eq!(choose(&cols, &["iso3", "code"]), None);
}

#[test]
fn test_coercions_never_fail() {
    assert_eq!(to_int(&AnyValue::String("12.7")), Some(12));
    assert_eq!(to_int(&AnyValue::String("2020")), Some(2020));
    assert_eq!(to_int(&AnyValue::String("")), None);
    assert_eq!(to_int(&AnyValue::String("abc")), None);
    assert_eq!(to_int(&AnyValue::Null), None);
    assert_eq!(to_int(&AnyValue::Float64(f64::NAN)), None);
    assert_eq!(to_dec(&AnyValue::String("87.5")), Some(87.5));
    assert_eq!(to_dec(&AnyValue::Int64(3)), Some(3.0));
    assert_eq!(normalize_str(&AnyValue::String("  BCG ")), Some("BCG".into()));
    assert_eq!(normalize_str(&AnyValue::String("nan")), None);
    assert_eq!(normalize_str(&AnyValue::String("   ")), None);
    assert_eq!(normalize_str(&AnyValue::Null), None);
}

#[test]
fn test_clean_table_trims_and_dedups() -> Result<(), color_eyre::eyre::Error> {
    let df = df!(
        " ANTIGEN " => [" BCG ", "BCG ", "DTP3"],
        "YEAR" => [2020i64, 2020, 2021],
    )?;
    let cleaned = clean_table(df)?;
    assert!(cleaned.get_column_names_str().contains(&"ANTIGEN"));
    assert_eq!(cleaned.height(), 2);
    let antigens = cleaned.column("ANTIGEN")?.as_materialized_series().clone();
    assert_eq!(antigens.str()?.get(0), Some("BCG"));
    Ok(())
}

#[test]
fn test_read_source_missing_file_is_skipped() {
    assert!(read_source(Path::new("."), "no_such_source.xlsx").is_none());
}

#[test]
fn test_upsert_countries_is_idempotent() -> Result<(), color_eyre::eyre::Error> {
    let store = demo_store();
    let intro = df!(
        "ISO_3_CODE" => ["USA", "USA", "MEX"],
        "COUNTRYNAME" => ["United States", "United States", "Mexico"],
        "WHO_REGION" => ["AMR", "AMR", "AMR"],
    )?;
    assert_eq!(upsert_countries(&store, &intro)?, 2);
    assert_eq!(upsert_countries(&store, &intro)?, 0);
    assert_eq!(store.fetch_scalar("SELECT COUNT(*) FROM countries")?, 2);
    Ok(())
}

#[test]
fn test_upsert_countries_requires_business_key_column() -> Result<(), color_eyre::eyre::Error> {
    let store = SqlStore::open_in_memory()?;
    store.execute_sql("CREATE TABLE countries (id INTEGER PRIMARY KEY, country_name TEXT)")?;
    let intro = df!("ISO_3_CODE" => ["USA"], "COUNTRYNAME" => ["United States"])?;
    assert!(upsert_countries(&store, &intro).is_err());
    Ok(())
}

#[test]
fn test_upsert_diseases_unions_both_sources() -> Result<(), color_eyre::eyre::Error> {
    let store = demo_store();
    let incidence = df!("DISEASE" => ["MEASLES", "POLIO"])?;
    let reported = df!(
        "DISEASE" => ["POLIO", "DIPHTHERIA"],
        "DISEASE_DESCRIPTION" => ["Poliomyelitis", "Diphtheria"],
    )?;
    let inserted = upsert_diseases(&store, Some(&incidence), Some(&reported))?;
    assert_eq!(inserted, 3);
    assert_eq!(store.fetch_scalar("SELECT COUNT(*) FROM diseases")?, 3);
    Ok(())
}

#[test]
fn test_vaccine_key_falls_back_to_description() -> Result<(), color_eyre::eyre::Error> {
    let store = demo_store();
    let coverage = df!(
        "ANTIGEN" => ["BCG", ""],
        "ANTIGEN_DESCRIPTION" => ["Bacille Calmette-Guerin", "Measles-containing"],
    )?;
    assert_eq!(upsert_vaccines(&store, &coverage)?, 2);
    assert_eq!(
        store.fetch_scalar(
            "SELECT COUNT(*) FROM vaccines WHERE vaccine_code = 'Measles-containing'"
        )?,
        1
    );
    Ok(())
}

#[test]
fn test_lookup_key_policy() -> Result<(), color_eyre::eyre::Error> {
    let store = demo_store();
    store.execute_sql("INSERT INTO countries (iso_code, country_name) VALUES ('USA', 'United States')")?;
    // Two codes that collapse onto the same normalized key.
    store.execute_sql("INSERT INTO vaccines (vaccine_code, vaccine_description) VALUES ('bcg', 'one')")?;
    store.execute_sql("INSERT INTO vaccines (vaccine_code, vaccine_description) VALUES ('BCG ', 'two')")?;

    assert!(build_lookup_maps(&store, KeyPolicy::Reject).is_err());

    let first_id = store.fetch_scalar("SELECT id FROM vaccines WHERE vaccine_code = 'bcg'")?;
    let last_id = store.fetch_scalar("SELECT id FROM vaccines WHERE vaccine_code = 'BCG '")?;
    let maps = build_lookup_maps(&store, KeyPolicy::FirstWins)?;
    assert_eq!(maps.vaccine_id(Some("BCG"), None), Some(first_id));
    let maps = build_lookup_maps(&store, KeyPolicy::LastWins)?;
    assert_eq!(maps.vaccine_id(Some("bcg"), None), Some(last_id));
    Ok(())
}

#[test]
fn test_load_coverage_end_to_end() -> Result<(), color_eyre::eyre::Error> {
    let store = demo_store();
    let intro = df!(
        "ISO_3_CODE" => ["USA", "MEX"],
        "COUNTRYNAME" => ["United States", "Mexico"],
        "WHO_REGION" => ["AMR", "AMR"],
    )?;
    upsert_countries(&store, &intro)?;
    let coverage = df!(
        "CODE" => ["USA", "MEX", "ZZZ"],
        "ANTIGEN" => ["BCG", "BCG", "BCG"],
        "ANTIGEN_DESCRIPTION" => ["Bacille Calmette-Guerin", "Bacille Calmette-Guerin", "Bacille Calmette-Guerin"],
        "YEAR" => [2020i64, 2021, 2020],
        "COVERAGE_CATEGORY" => ["OFFICIAL", "OFFICIAL", "OFFICIAL"],
        "TARGET_NUMBER" => [100i64, 200, 300],
        "DOSES" => [90i64, 150, 250],
        "COVERAGE" => [90.0, 75.0, 83.3],
    )?;
    upsert_vaccines(&store, &coverage)?;
    let maps = build_lookup_maps(&store, KeyPolicy::LastWins)?;

    // ZZZ has no matching country, so exactly one row is skipped.
    let report = load_coverage(&store, &coverage, &maps)?;
    assert_eq!(report.inserted, 2);
    assert_eq!(report.skipped, 1);
    assert_eq!(store.fetch_scalar("SELECT COUNT(*) FROM coverage_data")?, 2);

    let usa_id = store.fetch_scalar("SELECT id FROM countries WHERE iso_code = 'USA'")?;
    let usa_year = store.fetch_scalar(&format!(
        "SELECT year FROM coverage_data WHERE country_id = {usa_id}"
    ))?;
    assert_eq!(usa_year, 2020);
    Ok(())
}

#[test]
fn test_load_incidence_coerces_measures() -> Result<(), color_eyre::eyre::Error> {
    let store = demo_store();
    store.execute_sql("INSERT INTO countries (iso_code, country_name) VALUES ('USA', 'United States')")?;
    let incidence = df!(
        "CODE" => ["USA"],
        "DISEASE" => ["MEASLES"],
        "YEAR" => ["2018"],
        "DENOMINATOR" => ["per 1,000,000 total population"],
        "INCIDENCE_RATE" => ["3.5"],
    )?;
    upsert_diseases(&store, Some(&incidence), None)?;
    let maps = build_lookup_maps(&store, KeyPolicy::LastWins)?;

    let report = load_incidence(&store, &incidence, &maps)?;
    assert_eq!(report.inserted, 1);
    // String-typed measures still land as numbers.
    assert_eq!(
        store.fetch_scalar("SELECT year FROM incidence_rate_data")?,
        2018
    );
    assert_eq!(
        store.fetch_scalar("SELECT COUNT(*) FROM incidence_rate_data WHERE incidence_rate = 3.5")?,
        1
    );
    Ok(())
}

#[test]
fn test_reported_cases_skips_unresolved_disease() -> Result<(), color_eyre::eyre::Error> {
    let store = demo_store();
    store.execute_sql("INSERT INTO countries (iso_code, country_name) VALUES ('USA', 'United States')")?;
    let incidence = df!("DISEASE" => ["MEASLES"])?;
    upsert_diseases(&store, Some(&incidence), None)?;
    let maps = build_lookup_maps(&store, KeyPolicy::LastWins)?;

    let reported = df!(
        "CODE" => ["USA", "USA"],
        "DISEASE" => ["MEASLES", "UNKNOWN"],
        "YEAR" => [2019i64, 2019],
        "CASES" => [12i64, 5],
    )?;
    let report = load_reported_cases(&store, &reported, &maps)?;
    assert_eq!(report.inserted, 1);
    assert_eq!(report.skipped, 1);
    assert_eq!(
        store.fetch_scalar("SELECT cases FROM reported_cases_data")?,
        12
    );
    Ok(())
}

#[test]
fn test_schedule_resolves_vaccine_by_description() -> Result<(), color_eyre::eyre::Error> {
    let store = demo_store();
    store.execute_sql("INSERT INTO countries (iso_code, country_name) VALUES ('USA', 'United States')")?;
    let coverage = df!(
        "ANTIGEN" => ["BCG"],
        "ANTIGEN_DESCRIPTION" => ["Bacille Calmette-Guerin"],
    )?;
    upsert_vaccines(&store, &coverage)?;
    let maps = build_lookup_maps(&store, KeyPolicy::LastWins)?;

    // No vaccine code in the schedule row; resolution goes through the
    // display-name map.
    let schedule = df!(
        "ISO_3_CODE" => ["USA"],
        "VACCINECODE" => [""],
        "VACCINE_DESCRIPTION" => ["Bacille Calmette-Guerin"],
        "YEAR" => [2022i64],
        "SCHEDULEROUNDS" => ["1"],
        "TARGETPOP" => ["infants"],
        "GEOAREA" => ["NATIONAL"],
    )?;
    let report = load_schedule(&store, &schedule, &maps)?;
    assert_eq!(report.inserted, 1);
    assert_eq!(report.skipped, 0);
    assert_eq!(
        store.fetch_scalar("SELECT COUNT(*) FROM vaccine_schedule_data WHERE vaccine_id IS NOT NULL")?,
        1
    );
    Ok(())
}
