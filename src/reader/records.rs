//! Record-to-DataFrame conversion
//!
//! Remote records arrive as JSON objects whose fields may be absent or carry
//! inconsistent types. Each column is typed from the values it actually holds.

use crate::reader::Record;
use crate::{DataFrame, Result, TracedashError};
use polars::prelude::*;
use serde_json::Value;
use std::collections::HashSet;

/// Inferred storage for one column
#[derive(Debug, Clone, Copy, PartialEq)]
enum ColumnKind {
    Boolean,
    Int,
    Float,
    Text,
}

/// Helper struct for building typed columns from records
enum ColumnBuilder {
    Boolean(Vec<Option<bool>>),
    Int(Vec<Option<i64>>),
    Float(Vec<Option<f64>>),
    Text(Vec<Option<String>>),
}

impl ColumnBuilder {
    fn new(kind: ColumnKind, capacity: usize) -> Self {
        match kind {
            ColumnKind::Boolean => ColumnBuilder::Boolean(Vec::with_capacity(capacity)),
            ColumnKind::Int => ColumnBuilder::Int(Vec::with_capacity(capacity)),
            ColumnKind::Float => ColumnBuilder::Float(Vec::with_capacity(capacity)),
            ColumnKind::Text => ColumnBuilder::Text(Vec::with_capacity(capacity)),
        }
    }

    fn add_value(&mut self, value: Option<&Value>) {
        let value = value.filter(|v| !v.is_null());
        match self {
            ColumnBuilder::Boolean(values) => values.push(value.and_then(Value::as_bool)),
            ColumnBuilder::Int(values) => values.push(value.and_then(Value::as_i64)),
            ColumnBuilder::Float(values) => values.push(value.and_then(Value::as_f64)),
            ColumnBuilder::Text(values) => values.push(value.map(value_to_text)),
        }
    }

    fn build(self, column_name: &str) -> Series {
        match self {
            ColumnBuilder::Boolean(values) => Series::new(column_name.into(), values),
            ColumnBuilder::Int(values) => Series::new(column_name.into(), values),
            ColumnBuilder::Float(values) => Series::new(column_name.into(), values),
            ColumnBuilder::Text(values) => Series::new(column_name.into(), values),
        }
    }
}

/// Render a non-null JSON value as column text
fn value_to_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Pick the narrowest kind that holds every non-null value of a column
fn infer_kind<'a>(values: impl Iterator<Item = &'a Value>) -> ColumnKind {
    let mut kind: Option<ColumnKind> = None;

    for value in values {
        let this = match value {
            Value::Null => continue,
            Value::Bool(_) => ColumnKind::Boolean,
            Value::Number(n) if n.is_i64() => ColumnKind::Int,
            Value::Number(n) if n.as_f64().is_some() => ColumnKind::Float,
            _ => return ColumnKind::Text,
        };

        kind = Some(match (kind, this) {
            (None, k) => k,
            (Some(a), b) if a == b => a,
            (Some(ColumnKind::Int), ColumnKind::Float) | (Some(ColumnKind::Float), ColumnKind::Int) => {
                ColumnKind::Float
            }
            _ => return ColumnKind::Text,
        });
    }

    // All-null columns carry no type information; text coerces to anything
    kind.unwrap_or(ColumnKind::Text)
}

/// Assemble records into a DataFrame
///
/// Columns appear in order of first occurrence across records (or in
/// `columns` order when a projection was requested). A record lacking a
/// field contributes a null. With no records, the projected columns are
/// still materialized as empty text columns.
pub fn records_to_dataframe(records: &[Record], columns: &[&str]) -> Result<DataFrame> {
    let mut names: Vec<String> = columns.iter().map(|c| c.to_string()).collect();
    let mut seen: HashSet<String> = names.iter().cloned().collect();

    for record in records {
        for key in record.keys() {
            if seen.insert(key.clone()) {
                names.push(key.clone());
            }
        }
    }

    let mut series = Vec::with_capacity(names.len());
    for name in &names {
        let kind = infer_kind(records.iter().filter_map(|r| r.get(name)));
        let mut builder = ColumnBuilder::new(kind, records.len());
        for record in records {
            builder.add_value(record.get(name));
        }
        series.push(builder.build(name).into_column());
    }

    DataFrame::new(series)
        .map_err(|e| TracedashError::DataError(format!("Failed to create DataFrame: {}", e)))
}
