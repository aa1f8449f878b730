use crate::catalog::choose;
use crate::coerce::{normalize_str, value_at};
use crate::db::{placeholders, SqlStore, SqlValue};
use crate::errors::ImportError;
use color_eyre::Result;
use polars::prelude::*;

fn distinct_rows(df: &DataFrame, select: Vec<Expr>) -> PolarsResult<DataFrame> {
    df.clone()
        .lazy()
        .select(select)
        .unique_stable(None, UniqueKeepStrategy::First)
        .collect()
}

/// Inserts the distinct countries of the introduction source. Conflict-ignore
/// on the ISO code keeps re-runs idempotent. Returns the number of new rows.
pub fn upsert_countries(store: &SqlStore, introduction: &DataFrame) -> Result<usize> {
    let cols = store.table_columns("countries")?;
    let iso_col = choose(&cols, &["iso_code", "iso3", "code", "iso_3_code"]);
    let name_col = choose(&cols, &["country_name", "name"]);
    let reg_col = choose(&cols, &["who_region", "region"]);
    let (iso_col, name_col) = match (iso_col, name_col) {
        (Some(iso), Some(name)) => (iso, name),
        _ => {
            return Err(ImportError::SchemaMismatch {
                table: "countries",
                needed: "iso_code & country_name",
            }
            .into())
        }
    };

    let names = introduction.get_column_names_str();
    if !names.contains(&"ISO_3_CODE") || !names.contains(&"COUNTRYNAME") {
        println!("introduction file lacks ISO_3_CODE/COUNTRYNAME; skipping countries insert.");
        return Ok(0);
    }
    let region_target = if names.contains(&"WHO_REGION") {
        reg_col
    } else {
        None
    };
    let with_region = region_target.is_some();

    let mut select = vec![col("ISO_3_CODE"), col("COUNTRYNAME")];
    if with_region {
        select.push(col("WHO_REGION"));
    }
    let distinct = distinct_rows(introduction, select)?;
    println!("upserting {} countries...", distinct.height());

    let mut targets = vec![iso_col, name_col];
    if let Some(reg) = region_target {
        targets.push(reg);
    }
    let sql = format!(
        "INSERT OR IGNORE INTO countries ({}) VALUES ({})",
        targets.join(", "),
        placeholders(targets.len())
    );

    let iso = distinct.column("ISO_3_CODE").ok();
    let name = distinct.column("COUNTRYNAME").ok();
    let region = distinct.column("WHO_REGION").ok();
    let mut tx = store.begin()?;
    let mut inserted = 0;
    for i in 0..distinct.height() {
        let Some(key) = normalize_str(&value_at(iso, i)) else {
            continue;
        };
        let mut values = vec![
            SqlValue::Text(key),
            SqlValue::from(normalize_str(&value_at(name, i))),
        ];
        if with_region {
            values.push(SqlValue::from(normalize_str(&value_at(region, i))));
        }
        inserted += store.execute_in(&mut tx, &sql, values)? as usize;
    }
    store.commit(tx)?;
    Ok(inserted)
}

/// Inserts the distinct diseases mentioned across the incidence and
/// reported-cases sources.
pub fn upsert_diseases(
    store: &SqlStore,
    incidence: Option<&DataFrame>,
    reported: Option<&DataFrame>,
) -> Result<usize> {
    let cols = store.table_columns("diseases")?;
    let key_col = choose(&cols, &["disease_code", "disease", "name"]).ok_or(
        ImportError::SchemaMismatch {
            table: "diseases",
            needed: "disease_code/disease/name",
        },
    )?;
    let desc_col = choose(&cols, &["disease_description", "description"]);

    let mut frames = Vec::new();
    for df in [incidence, reported].into_iter().flatten() {
        let names = df.get_column_names_str();
        if !names.contains(&"DISEASE") {
            continue;
        }
        // Sources without a description column contribute a null one so the
        // union keeps a single schema.
        let desc = if names.contains(&"DISEASE_DESCRIPTION") {
            col("DISEASE_DESCRIPTION")
        } else {
            lit(NULL).cast(DataType::String).alias("DISEASE_DESCRIPTION")
        };
        frames.push(df.clone().lazy().select([col("DISEASE"), desc]));
    }
    if frames.is_empty() {
        return Ok(0);
    }
    let distinct = concat(frames, UnionArgs::default())?
        .unique_stable(None, UniqueKeepStrategy::First)
        .collect()?;
    println!("upserting {} diseases...", distinct.height());

    let sql = match &desc_col {
        Some(desc) => format!("INSERT OR IGNORE INTO diseases ({key_col}, {desc}) VALUES (?, ?)"),
        None => format!("INSERT OR IGNORE INTO diseases ({key_col}) VALUES (?)"),
    };
    let key = distinct.column("DISEASE").ok();
    let desc = distinct.column("DISEASE_DESCRIPTION").ok();
    let mut tx = store.begin()?;
    let mut inserted = 0;
    for i in 0..distinct.height() {
        let Some(key_val) = normalize_str(&value_at(key, i)) else {
            continue;
        };
        let mut values = vec![SqlValue::Text(key_val)];
        if desc_col.is_some() {
            values.push(SqlValue::from(normalize_str(&value_at(desc, i))));
        }
        inserted += store.execute_in(&mut tx, &sql, values)? as usize;
    }
    store.commit(tx)?;
    Ok(inserted)
}

/// Inserts the distinct antigens of the coverage source. The business key
/// prefers the antigen code and falls back to the description; the display
/// value goes the other way.
pub fn upsert_vaccines(store: &SqlStore, coverage: &DataFrame) -> Result<usize> {
    let cols = store.table_columns("vaccines")?;
    let key_col = choose(&cols, &["vaccine_code", "vaccine_name", "vaccine"]).ok_or(
        ImportError::SchemaMismatch {
            table: "vaccines",
            needed: "vaccine_code/vaccine_name/vaccine",
        },
    )?;
    let desc_col = choose(&cols, &["vaccine_description", "description"]);

    let names = coverage.get_column_names_str();
    let mut select = Vec::new();
    for source in ["ANTIGEN", "ANTIGEN_DESCRIPTION"] {
        if names.contains(&source) {
            select.push(col(source));
        }
    }
    if select.is_empty() {
        return Ok(0);
    }
    let distinct = distinct_rows(coverage, select)?;
    println!("upserting {} vaccines...", distinct.height());

    let sql = match &desc_col {
        Some(desc) => format!("INSERT OR IGNORE INTO vaccines ({key_col}, {desc}) VALUES (?, ?)"),
        None => format!("INSERT OR IGNORE INTO vaccines ({key_col}) VALUES (?)"),
    };
    let code = distinct.column("ANTIGEN").ok();
    let desc = distinct.column("ANTIGEN_DESCRIPTION").ok();
    let mut tx = store.begin()?;
    let mut inserted = 0;
    for i in 0..distinct.height() {
        let code_val = normalize_str(&value_at(code, i));
        let desc_val = normalize_str(&value_at(desc, i));
        let Some(key_val) = code_val.clone().or_else(|| desc_val.clone()) else {
            continue;
        };
        let mut values = vec![SqlValue::Text(key_val)];
        if desc_col.is_some() {
            values.push(SqlValue::from(desc_val.or(code_val)));
        }
        inserted += store.execute_in(&mut tx, &sql, values)? as usize;
    }
    store.commit(tx)?;
    Ok(inserted)
}
