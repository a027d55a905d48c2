//! Schema normalization
//!
//! Guarantees expected fields exist and carry the expected types before any
//! join, filter or aggregate touches them.
//!
//! - [`ensure_column`] materializes an absent column from a typed default
//! - [`coerce`] converts columns leniently: unparseable values become missing
//!
//! Both operations are idempotent.

mod schema;

pub use schema::{normalize, CollectionSchema, FieldSpec, SchemaReport};

use crate::frame::{self, timestamp_dtype};
use crate::{DataFrame, Result, TracedashError};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use polars::prelude::*;
use tracing::debug;

/// Value used to fill a column that the remote records did not carry
///
/// The missing variants produce typed nulls, so an absent number, an absent
/// date and an absent text stay distinguishable from each other and from zero.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnDefault {
    /// Null text
    MissingText,
    /// Null number (`Float64`)
    MissingNumber,
    /// Null timestamp ("unknown date")
    MissingDate,
    /// Constant text
    Text(String),
    /// Constant number
    Number(f64),
}

impl ColumnDefault {
    fn materialize(&self, name: &str, height: usize) -> Result<Series> {
        let series = match self {
            ColumnDefault::MissingText => Series::full_null(name.into(), height, &DataType::String),
            ColumnDefault::MissingNumber => {
                Series::full_null(name.into(), height, &DataType::Float64)
            }
            ColumnDefault::MissingDate => Series::full_null(name.into(), height, &timestamp_dtype()),
            ColumnDefault::Text(value) => {
                Series::new(name.into(), vec![value.as_str(); height])
            }
            ColumnDefault::Number(value) => Series::new(name.into(), vec![*value; height]),
        };
        Ok(series)
    }
}

/// How a field is coerced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoercionRule {
    /// Lenient timestamp parse into `Datetime(µs)`
    Timestamp,
    /// Lenient numeric parse into `Float64`
    Number,
    /// Text key: trimmed and case-folded
    Identifier,
    /// Free text: trimmed, blank becomes missing
    Text,
}

/// Ensure `name` exists, adding it filled with `default` when absent
///
/// An existing column is left untouched.
pub fn ensure_column(df: &DataFrame, name: &str, default: &ColumnDefault) -> Result<DataFrame> {
    if df.get_column_names().iter().any(|c| c.as_str() == name) {
        return Ok(df.clone());
    }

    let series = default.materialize(name, df.height())?;
    let mut out = df.clone();
    out.with_column(series)
        .map_err(|e| TracedashError::DataError(format!("Failed to add column '{}': {}", name, e)))?;
    Ok(out)
}

/// Apply coercion rules to the named columns
///
/// Columns that are absent are skipped; run [`ensure_column`] first.
pub fn coerce(df: &DataFrame, rules: &[(&str, CoercionRule)]) -> Result<DataFrame> {
    let mut out = df.clone();

    for (name, rule) in rules {
        let Ok(column) = out.column(name) else {
            debug!(column = name, "skipping coercion of absent column");
            continue;
        };
        let series = column.as_materialized_series().clone();

        let coerced = match rule {
            CoercionRule::Timestamp => coerce_timestamp(&series)?,
            CoercionRule::Number => coerce_number(&series)?,
            CoercionRule::Identifier => coerce_text(&series, normalize_identifier)?,
            CoercionRule::Text => coerce_text(&series, normalize_text)?,
        };

        out.with_column(coerced)
            .map_err(|e| TracedashError::DataError(format!("Failed to replace '{}': {}", name, e)))?;
    }

    Ok(out)
}

/// Trim and case-fold a join key
pub fn normalize_identifier(value: &str) -> Option<String> {
    Some(value.trim().to_lowercase())
}

/// Trim free text; blank text is missing
pub fn normalize_text(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn coerce_text(series: &Series, f: fn(&str) -> Option<String>) -> Result<Series> {
    let name = series.name().clone();
    let cast = series
        .cast(&DataType::String)
        .map_err(|e| TracedashError::DataError(format!("Text cast failed for '{}': {}", name, e)))?;
    let ca = cast
        .str()
        .map_err(|e| TracedashError::DataError(format!("Text cast failed for '{}': {}", name, e)))?;

    let values: Vec<Option<String>> = ca.into_iter().map(|v| v.and_then(f)).collect();
    Ok(Series::new(name, values))
}

/// Parse a number leniently; non-finite or malformed input is missing
pub fn parse_number(value: &str) -> Option<f64> {
    value
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|n| n.is_finite())
}

fn coerce_number(series: &Series) -> Result<Series> {
    let name = series.name().clone();
    match series.dtype() {
        DataType::Float64 => Ok(series.clone()),
        DataType::String => {
            let ca = series.str().map_err(|e| {
                TracedashError::DataError(format!("Number parse failed for '{}': {}", name, e))
            })?;
            let values: Vec<Option<f64>> =
                ca.into_iter().map(|v| v.and_then(parse_number)).collect();
            Ok(Series::new(name, values))
        }
        dtype if dtype.is_numeric() || dtype.is_bool() => {
            series.cast(&DataType::Float64).map_err(|e| {
                TracedashError::DataError(format!("Number cast failed for '{}': {}", name, e))
            })
        }
        _ => Ok(Series::full_null(name, series.len(), &DataType::Float64)),
    }
}

/// Parse a timestamp leniently into microseconds since the epoch (UTC)
///
/// Accepts RFC 3339 (with offset), ISO date-times with or without fractional
/// seconds, space-separated date-times and bare dates. Anything else is missing.
pub fn parse_timestamp(value: &str) -> Option<i64> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.timestamp_micros());
    }
    if let Ok(dt) = DateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S%.f%#z") {
        return Some(dt.timestamp_micros());
    }

    const NAIVE_FORMATS: [&str; 4] = [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M",
    ];
    for fmt in NAIVE_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, fmt) {
            return Some(dt.and_utc().timestamp_micros());
        }
    }

    for fmt in ["%Y-%m-%d", "%Y/%m/%d", "%d.%m.%Y"] {
        if let Ok(date) = NaiveDate::parse_from_str(value, fmt) {
            return date
                .and_hms_opt(0, 0, 0)
                .map(|dt| dt.and_utc().timestamp_micros());
        }
    }

    None
}

fn coerce_timestamp(series: &Series) -> Result<Series> {
    let name = series.name().clone();
    match series.dtype() {
        DataType::Datetime(_, _) | DataType::Date => series.cast(&timestamp_dtype()).map_err(|e| {
            TracedashError::DataError(format!("Timestamp cast failed for '{}': {}", name, e))
        }),
        DataType::String => {
            let ca = series.str().map_err(|e| {
                TracedashError::DataError(format!("Timestamp parse failed for '{}': {}", name, e))
            })?;
            let values: Vec<Option<i64>> =
                ca.into_iter().map(|v| v.and_then(parse_timestamp)).collect();
            frame::timestamp_series(name.as_str(), values)
        }
        // Bare numbers carry no unit; treat them as unparseable
        _ => Ok(Series::full_null(name, series.len(), &timestamp_dtype())),
    }
}
