//! Shared helpers for reading and rebuilding polars columns.

use polars::prelude::*;

use crate::types::ColumnKind;

// =============================================================================
// Data Type Utilities
// =============================================================================

/// Check if a DataType is numeric (integer or float).
#[inline]
pub fn is_numeric_dtype(dtype: &DataType) -> bool {
    is_integer_dtype(dtype) || matches!(dtype, DataType::Float32 | DataType::Float64)
}

#[inline]
pub fn is_integer_dtype(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
    )
}

/// Map a dtype onto the coarse kinds the cleaning steps care about.
pub fn column_kind(dtype: &DataType) -> ColumnKind {
    if is_numeric_dtype(dtype) {
        ColumnKind::Numeric
    } else if matches!(
        dtype,
        DataType::String | DataType::Categorical(_, _) | DataType::Boolean
    ) {
        ColumnKind::Categorical
    } else {
        ColumnKind::Other
    }
}

#[inline]
pub fn is_text_dtype(dtype: &DataType) -> bool {
    matches!(dtype, DataType::String | DataType::Categorical(_, _))
}

// =============================================================================
// Column Access
// =============================================================================

/// Borrow a column as a materialized Series.
pub fn column_series<'a>(df: &'a DataFrame, name: &str) -> PolarsResult<&'a Series> {
    Ok(df.column(name)?.as_materialized_series())
}

/// Numeric view of a series; NaN is treated as missing.
pub fn numeric_values(series: &Series) -> PolarsResult<Vec<Option<f64>>> {
    let casted = series.cast(&DataType::Float64)?;
    Ok(casted
        .f64()?
        .into_iter()
        .map(|v| v.filter(|x| !x.is_nan()))
        .collect())
}

/// Textual view of a series, one entry per row.
pub fn string_values(series: &Series) -> PolarsResult<Vec<Option<String>>> {
    let casted = series.cast(&DataType::String)?;
    Ok(casted
        .str()?
        .into_iter()
        .map(|v| v.map(str::to_string))
        .collect())
}

/// Per-row missing flags: null, or NaN in float columns.
pub fn missing_mask(series: &Series) -> PolarsResult<Vec<bool>> {
    if matches!(series.dtype(), DataType::Float32 | DataType::Float64) {
        return Ok(numeric_values(series)?.iter().map(Option::is_none).collect());
    }
    Ok(series.is_null().into_iter().map(|v| v.unwrap_or(true)).collect())
}

pub fn missing_count(series: &Series) -> PolarsResult<usize> {
    Ok(missing_mask(series)?.into_iter().filter(|m| *m).count())
}

/// JSON number for a float; non-finite values become null.
pub fn json_number(value: f64) -> serde_json::Value {
    serde_json::Number::from_f64(value)
        .map(serde_json::Value::Number)
        .unwrap_or(serde_json::Value::Null)
}

// =============================================================================
// Column Rebuilding
// =============================================================================

/// Build a Float64 series from optional values.
pub fn float_series(name: &str, values: Vec<Option<f64>>) -> Series {
    Series::new(name.into(), values)
}

/// Keep rows whose mask entry is true.
pub fn keep_rows(df: &DataFrame, keep: &[bool]) -> PolarsResult<DataFrame> {
    let mask = BooleanChunked::from_slice("mask".into(), keep);
    df.filter(&mask)
}

/// Replace nulls with the value found at `source_row`, preserving dtype.
pub fn fill_nulls_from_row(series: &Series, source_row: usize) -> PolarsResult<Series> {
    let nulls = series.is_null();
    let indices: Vec<IdxSize> = nulls
        .into_iter()
        .enumerate()
        .map(|(i, is_null)| {
            if is_null.unwrap_or(false) {
                source_row as IdxSize
            } else {
                i as IdxSize
            }
        })
        .collect();
    let idx = IdxCa::from_vec("idx".into(), indices);
    series.take(&idx)
}

/// Count rows where two equally long columns differ (null-aware).
pub fn count_changed(before: &[Option<f64>], after: &[Option<f64>]) -> usize {
    before
        .iter()
        .zip(after.iter())
        .filter(|(a, b)| match (a, b) {
            (Some(x), Some(y)) => x != y,
            (None, None) => false,
            _ => true,
        })
        .count()
}

// =============================================================================
// Tests
// =============================================================================
