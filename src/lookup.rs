use crate::catalog::choose;
use crate::db::SqlStore;
use crate::errors::ImportError;
use color_eyre::Result;
use std::collections::HashMap;

/// What to do when two master rows collapse onto the same normalized key.
/// `LastWins` mirrors the legacy loader.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum KeyPolicy {
    FirstWins,
    #[default]
    LastWins,
    Reject,
}

/// In-memory business-key → surrogate-id maps, rebuilt fresh after the master
/// upserts commit so fact loading never sees stale ids. Keys are trimmed and
/// uppercased.
#[derive(Debug, Default)]
pub struct LookupMaps {
    pub countries: HashMap<String, i64>,
    pub vaccines_by_code: HashMap<String, i64>,
    pub vaccines_by_name: HashMap<String, i64>,
    pub diseases_by_code: HashMap<String, i64>,
    pub diseases_by_name: HashMap<String, i64>,
}

fn norm(key: &str) -> String {
    key.trim().to_uppercase()
}

impl LookupMaps {
    pub fn country_id(&self, iso: &str) -> Option<i64> {
        self.countries.get(&norm(iso)).copied()
    }

    /// Code map first, display-name map as fallback.
    pub fn vaccine_id(&self, code: Option<&str>, name: Option<&str>) -> Option<i64> {
        code.and_then(|c| self.vaccines_by_code.get(&norm(c)))
            .or_else(|| name.and_then(|n| self.vaccines_by_name.get(&norm(n))))
            .copied()
    }

    /// The source carries a single field that may be either the disease code
    /// or its name; try both maps.
    pub fn disease_id(&self, key: Option<&str>) -> Option<i64> {
        key.and_then(|k| {
            let k = norm(k);
            self.diseases_by_code
                .get(&k)
                .or_else(|| self.diseases_by_name.get(&k))
        })
        .copied()
    }
}

fn insert_key(
    map: &mut HashMap<String, i64>,
    table: &'static str,
    key: &str,
    id: i64,
    policy: KeyPolicy,
) -> Result<()> {
    let key = norm(key);
    if key.is_empty() {
        return Ok(());
    }
    match policy {
        KeyPolicy::LastWins => {
            map.insert(key, id);
        }
        KeyPolicy::FirstWins => {
            map.entry(key).or_insert(id);
        }
        KeyPolicy::Reject => {
            if map.insert(key.clone(), id).is_some() {
                return Err(ImportError::DuplicateKey { table, key }.into());
            }
        }
    }
    Ok(())
}

fn fill_map(
    store: &SqlStore,
    map: &mut HashMap<String, i64>,
    table: &'static str,
    id_col: &str,
    key_col: &str,
    policy: KeyPolicy,
) -> Result<()> {
    for (id, key) in store.fetch_id_pairs(table, id_col, key_col)? {
        if let Some(key) = key {
            insert_key(map, table, &key, id, policy)?;
        }
    }
    Ok(())
}

/// Reads every master table back into lookup maps. Countries must expose an id
/// and ISO code column; a vaccines/diseases table without a recognizable id
/// column just leaves its maps empty (every dependent fact row then skips).
pub fn build_lookup_maps(store: &SqlStore, policy: KeyPolicy) -> Result<LookupMaps> {
    let mut maps = LookupMaps::default();

    let c_cols = store.table_columns("countries")?;
    let c_id = choose(&c_cols, &["country_id", "id"]);
    let c_iso = choose(&c_cols, &["iso_code", "iso3", "code", "iso_3_code"]);
    let (Some(c_id), Some(c_iso)) = (c_id, c_iso) else {
        return Err(ImportError::SchemaMismatch {
            table: "countries",
            needed: "id & iso_code",
        }
        .into());
    };
    fill_map(store, &mut maps.countries, "countries", &c_id, &c_iso, policy)?;

    let v_cols = store.table_columns("vaccines")?;
    if let Some(v_id) = choose(&v_cols, &["vaccine_id", "id"]) {
        if let Some(code) = choose(&v_cols, &["vaccine_code"]) {
            fill_map(store, &mut maps.vaccines_by_code, "vaccines", &v_id, &code, policy)?;
        }
        if let Some(name) = choose(&v_cols, &["vaccine_name", "vaccine", "vaccine_description"]) {
            fill_map(store, &mut maps.vaccines_by_name, "vaccines", &v_id, &name, policy)?;
        }
    }

    let d_cols = store.table_columns("diseases")?;
    if let Some(d_id) = choose(&d_cols, &["disease_id", "id"]) {
        if let Some(code) = choose(&d_cols, &["disease_code"]) {
            fill_map(store, &mut maps.diseases_by_code, "diseases", &d_id, &code, policy)?;
        }
        if let Some(name) = choose(&d_cols, &["disease", "name"]) {
            fill_map(store, &mut maps.diseases_by_name, "diseases", &d_id, &name, policy)?;
        }
    }

    Ok(maps)
}
