//! Typed column access shared by the pipeline stages
//!
//! Stages read columns as plain Rust vectors of options, so every operation
//! sees one representation of "missing" regardless of the stored dtype.

use crate::{DataFrame, Result, TracedashError};
use polars::prelude::*;

/// Time unit used for every timestamp column
pub const TIME_UNIT: TimeUnit = TimeUnit::Microseconds;

/// The timestamp dtype produced by the normalizer
pub fn timestamp_dtype() -> DataType {
    DataType::Datetime(TIME_UNIT, None)
}

/// Look up a column, naming the available ones on failure
pub fn column<'a>(df: &'a DataFrame, name: &str) -> Result<&'a Series> {
    df.column(name)
        .map(|c| c.as_materialized_series())
        .map_err(|_| {
            let available: Vec<String> = df
                .get_column_names()
                .iter()
                .map(|s| s.to_string())
                .collect();
            TracedashError::ValidationError(format!(
                "Column '{}' not found. Available columns: {}",
                name,
                available.join(", ")
            ))
        })
}

/// Column values as optional strings (non-string dtypes are cast)
pub fn string_values(df: &DataFrame, name: &str) -> Result<Vec<Option<String>>> {
    let series = column(df, name)?;
    let cast = series
        .cast(&DataType::String)
        .map_err(|e| TracedashError::DataError(format!("Failed to read '{}' as text: {}", name, e)))?;
    let ca = cast
        .str()
        .map_err(|e| TracedashError::DataError(format!("Failed to read '{}' as text: {}", name, e)))?;
    Ok(ca.into_iter().map(|v| v.map(str::to_string)).collect())
}

/// Column values as optional floats (non-numeric values become missing)
pub fn float_values(df: &DataFrame, name: &str) -> Result<Vec<Option<f64>>> {
    let series = column(df, name)?;
    let cast = series
        .cast(&DataType::Float64)
        .map_err(|e| TracedashError::DataError(format!("Failed to read '{}' as number: {}", name, e)))?;
    let ca = cast
        .f64()
        .map_err(|e| TracedashError::DataError(format!("Failed to read '{}' as number: {}", name, e)))?;
    Ok(ca.into_iter().collect())
}

/// Look up a column that must hold dates or timestamps
pub fn timestamp_column<'a>(df: &'a DataFrame, name: &str) -> Result<&'a Series> {
    let series = column(df, name)?;
    if !matches!(series.dtype(), DataType::Datetime(_, _) | DataType::Date) {
        return Err(TracedashError::ValidationError(format!(
            "Column '{}' is {} and not a timestamp",
            name,
            series.dtype()
        )));
    }
    Ok(series)
}

/// Timestamp column values as microseconds since the epoch
pub fn timestamp_values(df: &DataFrame, name: &str) -> Result<Vec<Option<i64>>> {
    let series = timestamp_column(df, name)?;
    let cast = series.cast(&timestamp_dtype()).map_err(|e| {
        TracedashError::DataError(format!("Failed to read '{}' as timestamp: {}", name, e))
    })?;
    let ca = cast.datetime().map_err(|e| {
        TracedashError::DataError(format!("Failed to read '{}' as timestamp: {}", name, e))
    })?;
    Ok(ca.phys.iter().collect())
}

/// Build a timestamp series from microseconds since the epoch
pub fn timestamp_series(name: &str, values: Vec<Option<i64>>) -> Result<Series> {
    Series::new(name.into(), values)
        .cast(&timestamp_dtype())
        .map_err(|e| TracedashError::DataError(format!("Timestamp cast failed: {}", e)))
}


/// Keep the rows where `mask` is true
pub fn filter_rows(df: &DataFrame, mask: &[bool]) -> Result<DataFrame> {
    let mask = BooleanChunked::from_slice(PlSmallStr::EMPTY, mask);
    df.filter(&mask)
        .map_err(|e| TracedashError::DataError(format!("Failed to filter rows: {}", e)))
}

/// Run a lazy query
pub fn collect(lf: LazyFrame, what: &str) -> Result<DataFrame> {
    lf.collect()
        .map_err(|e| TracedashError::DataError(format!("Failed to compute {}: {}", what, e)))
}

/// Assemble a DataFrame from finished series
pub fn frame(columns: Vec<Series>) -> Result<DataFrame> {
    DataFrame::new(columns.into_iter().map(|s| s.into_column()).collect())
        .map_err(|e| TracedashError::DataError(format!("Failed to create DataFrame: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_column_lists_available() {
        let df = df! { "a" => &[1i64], "b" => &["x"] }.unwrap();
        let err = column(&df, "z").unwrap_err();
        assert!(err.to_string().contains("Column 'z' not found"));
        assert!(err.to_string().contains("a, b"));
    }

    #[test]
    fn test_string_values_casts_numbers() {
        let df = df! { "id" => &[Some(1i64), None, Some(3)] }.unwrap();
        assert_eq!(
            string_values(&df, "id").unwrap(),
            vec![Some("1".to_string()), None, Some("3".to_string())]
        );
    }

    #[test]
    fn test_timestamp_round_trip() {
        let s = timestamp_series("t", vec![Some(1_000_000), None]).unwrap();
        let df = frame(vec![s]).unwrap();
        assert_eq!(
            timestamp_values(&df, "t").unwrap(),
            vec![Some(1_000_000), None]
        );
    }

    #[test]
    fn test_timestamp_values_rejects_text() {
        let df = df! { "t" => &["2024-01-01"] }.unwrap();
        assert!(timestamp_values(&df, "t").is_err());
    }

    #[test]
    fn test_filter_rows() {
        let df = df! { "a" => &[1i64, 2, 3] }.unwrap();
        let out = filter_rows(&df, &[true, false, true]).unwrap();
        assert_eq!(out.height(), 2);
    }
}
