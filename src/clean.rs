use polars::prelude::*;

pub fn trim_cols(column: &Column) -> Expr {
    col(column.name().as_str()).str().strip_chars(lit(" "))
}

/// Trims column names, trims every string cell and drops exact-duplicate rows.
pub fn clean_table(mut df: DataFrame) -> PolarsResult<DataFrame> {
    let trimmed: Vec<String> = df
        .get_column_names_str()
        .iter()
        .map(|name| name.trim().to_string())
        .collect();
    df.set_column_names(trimmed)?;

    let trims: Vec<Expr> = df
        .get_columns()
        .iter()
        .filter(|c| c.dtype() == &DataType::String)
        .map(trim_cols)
        .collect();

    df.lazy()
        .with_columns(trims)
        .unique_stable(None, UniqueKeepStrategy::First)
        .collect()
}
