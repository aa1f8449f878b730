use polars::prelude::*;

/// Blank, missing and NaN cells become `None`; everything else is its trimmed
/// string form. The upstream pandas cleaning pass spells missing values as
/// "nan", so that string counts as absent too.
pub fn normalize_str(value: &AnyValue) -> Option<String> {
    match value {
        AnyValue::Null => None,
        AnyValue::Float64(f) if f.is_nan() => None,
        AnyValue::Float32(f) if f.is_nan() => None,
        _ => {
            let s = value.str_value().trim().to_string();
            if s.is_empty() || s.eq_ignore_ascii_case("nan") {
                None
            } else {
                Some(s)
            }
        }
    }
}

/// Parses a cell as a number and truncates to an integer. Unparsable cells
/// degrade to `None`, they never fail the row.
pub fn to_int(value: &AnyValue) -> Option<i64> {
    match value {
        AnyValue::Null => None,
        AnyValue::Int64(i) => Some(*i),
        AnyValue::Int32(i) => Some(*i as i64),
        AnyValue::Float64(f) if f.is_nan() => None,
        AnyValue::Float64(f) => Some(*f as i64),
        AnyValue::Boolean(_) => None,
        other => parse_num(other).map(|f| f as i64),
    }
}

/// Like [`to_int`] but keeps the fractional part.
pub fn to_dec(value: &AnyValue) -> Option<f64> {
    match value {
        AnyValue::Null => None,
        AnyValue::Int64(i) => Some(*i as f64),
        AnyValue::Int32(i) => Some(*i as f64),
        AnyValue::Float64(f) if f.is_nan() => None,
        AnyValue::Float64(f) => Some(*f),
        AnyValue::Boolean(_) => None,
        other => parse_num(other),
    }
}

fn parse_num(value: &AnyValue) -> Option<f64> {
    let s = value.str_value();
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    s.parse::<f64>().ok().filter(|f| !f.is_nan())
}

/// Cell of a column that may not exist in the source, as an `AnyValue`.
pub fn value_at<'a>(column: Option<&'a Column>, row: usize) -> AnyValue<'a> {
    column
        .and_then(|c| c.as_materialized_series().get(row).ok())
        .unwrap_or(AnyValue::Null)
}
