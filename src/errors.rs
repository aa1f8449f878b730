use thiserror::Error;

#[derive(Debug, Error)]
pub enum ImportError {
    /// A master table is missing the minimum business-key/name columns.
    /// Fatal: no insert statement can be built against it.
    #[error("table `{table}` must have at least the {needed} columns (or synonyms)")]
    SchemaMismatch {
        table: &'static str,
        needed: &'static str,
    },
    /// Two master rows collapse onto the same normalized business key and the
    /// lookup maps were built with `KeyPolicy::Reject`.
    #[error("duplicate business key `{key}` in `{table}` after normalization")]
    DuplicateKey { table: &'static str, key: String },
}
