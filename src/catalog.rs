use std::collections::HashSet;

/// Picks the first candidate column present in `colset`, case-insensitively.
/// Target schemas name the same logical field differently across environments
/// (`iso_code` vs `iso3` vs `code`), so every insert is built from whatever
/// columns actually exist.
pub fn choose(colset: &HashSet<String>, candidates: &[&str]) -> Option<String> {
    candidates
        .iter()
        .map(|c| c.to_lowercase())
        .find(|c| colset.contains(c))
}
