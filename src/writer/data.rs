//! DataFrame to JSON conversion
//!
//! Tables become arrays of row objects. Dates are written as `YYYY-MM-DD`,
//! timestamps as ISO-8601 in UTC, and nulls as JSON `null`.

use crate::{DataFrame, Result, TracedashError};
use polars::prelude::*;
use serde_json::{json, Map, Value};

/// Convert a DataFrame to an array of row objects
pub fn dataframe_to_values(df: &DataFrame) -> Result<Vec<Value>> {
    let mut values = Vec::with_capacity(df.height());
    let columns = df.get_columns();

    for row_idx in 0..df.height() {
        let mut row_obj = Map::new();
        for column in columns {
            let value = series_value_at(column.as_materialized_series(), row_idx)?;
            row_obj.insert(column.name().to_string(), value);
        }
        values.push(Value::Object(row_obj));
    }

    Ok(values)
}

fn writer_error(kind: &str, e: PolarsError) -> TracedashError {
    TracedashError::WriterError(format!("Failed to cast to {}: {}", kind, e))
}

/// Get a single value from a series at a given index as JSON Value
fn series_value_at(series: &Series, idx: usize) -> Result<Value> {
    use DataType::*;

    let value = match series.dtype() {
        Int32 => series.i32().map_err(|e| writer_error("i32", e))?.get(idx).map(|v| json!(v)),
        Int64 => series.i64().map_err(|e| writer_error("i64", e))?.get(idx).map(|v| json!(v)),
        UInt32 => series.u32().map_err(|e| writer_error("u32", e))?.get(idx).map(|v| json!(v)),
        UInt64 => series.u64().map_err(|e| writer_error("u64", e))?.get(idx).map(|v| json!(v)),
        Float64 => series
            .f64()
            .map_err(|e| writer_error("f64", e))?
            .get(idx)
            .filter(|v| v.is_finite())
            .map(|v| json!(v)),
        Boolean => series.bool().map_err(|e| writer_error("bool", e))?.get(idx).map(|v| json!(v)),
        String => series.str().map_err(|e| writer_error("string", e))?.get(idx).map(|v| json!(v)),
        Date => {
            let ca = series.date().map_err(|e| writer_error("date", e))?;
            ca.phys.get(idx).and_then(|days| {
                chrono::DateTime::from_timestamp(days as i64 * 86_400, 0)
                    .map(|dt| json!(dt.date_naive().format("%Y-%m-%d").to_string()))
            })
        }
        Datetime(time_unit, _) => {
            let ca = series.datetime().map_err(|e| writer_error("datetime", e))?;
            ca.phys.get(idx).and_then(|timestamp| {
                let micros = match time_unit {
                    TimeUnit::Microseconds => timestamp,
                    TimeUnit::Milliseconds => timestamp * 1_000,
                    TimeUnit::Nanoseconds => timestamp / 1_000,
                };
                chrono::DateTime::from_timestamp_micros(micros)
                    .map(|dt| json!(dt.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()))
            })
        }
        _ => {
            // Fallback: convert to string
            let cast = series.cast(&DataType::String).map_err(|e| writer_error("string", e))?;
            cast.str()
                .map_err(|e| writer_error("string", e))?
                .get(idx)
                .map(|v| json!(v))
        }
    };

    Ok(value.unwrap_or(Value::Null))
}
