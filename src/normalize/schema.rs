//! Collection schema contracts
//!
//! Each remote collection has one contract naming the fields the pipeline
//! relies on, the default used when a field is absent and the coercion rule
//! applied to it. Drift in the remote shape surfaces here, in the
//! [`SchemaReport`], and nowhere downstream.

use super::{coerce, ensure_column, CoercionRule, ColumnDefault};
use crate::{DataFrame, Result};
use serde::Serialize;
use tracing::warn;

/// One expected field of a collection
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub rule: CoercionRule,
    pub default: ColumnDefault,
}

impl FieldSpec {
    pub fn new(name: &'static str, rule: CoercionRule, default: ColumnDefault) -> Self {
        Self {
            name,
            rule,
            default,
        }
    }
}

/// Expected shape of a remote collection
#[derive(Debug, Clone, PartialEq)]
pub struct CollectionSchema {
    pub collection: &'static str,
    pub fields: Vec<FieldSpec>,
}

impl CollectionSchema {
    /// Delivery records
    pub fn traceability() -> Self {
        Self {
            collection: "traceability",
            fields: vec![
                FieldSpec::new("farmer_id", CoercionRule::Identifier, ColumnDefault::MissingText),
                FieldSpec::new("purchase_date", CoercionRule::Timestamp, ColumnDefault::MissingDate),
                FieldSpec::new("net_weight_kg", CoercionRule::Number, ColumnDefault::MissingNumber),
                FieldSpec::new("exporter", CoercionRule::Text, ColumnDefault::MissingText),
                FieldSpec::new("certification", CoercionRule::Text, ColumnDefault::MissingText),
            ],
        }
    }

    /// Quota status records
    pub fn quota_view() -> Self {
        Self {
            collection: "quota_view",
            fields: vec![
                FieldSpec::new("quota_status", CoercionRule::Text, ColumnDefault::MissingText),
                FieldSpec::new("quota_used_pct", CoercionRule::Number, ColumnDefault::MissingNumber),
            ],
        }
    }

    /// Farmer reference records
    pub fn farmers() -> Self {
        Self {
            collection: "farmers",
            fields: vec![
                FieldSpec::new("farmer_id", CoercionRule::Identifier, ColumnDefault::MissingText),
                FieldSpec::new("area_ha", CoercionRule::Number, ColumnDefault::MissingNumber),
            ],
        }
    }

    pub fn field_names(&self) -> Vec<&'static str> {
        self.fields.iter().map(|f| f.name).collect()
    }

    fn rules(&self) -> Vec<(&'static str, CoercionRule)> {
        self.fields.iter().map(|f| (f.name, f.rule)).collect()
    }
}

/// What normalization had to repair
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SchemaReport {
    pub collection: String,
    /// Expected fields absent from the fetched table, filled with defaults
    pub filled: Vec<String>,
}

impl SchemaReport {
    pub fn is_clean(&self) -> bool {
        self.filled.is_empty()
    }
}

/// Bring a fetched table in line with its collection contract
///
/// Absent fields are added from their defaults, then every contract field is
/// coerced. Extra fields pass through untouched.
pub fn normalize(df: &DataFrame, schema: &CollectionSchema) -> Result<(DataFrame, SchemaReport)> {
    let present: Vec<String> = df
        .get_column_names()
        .iter()
        .map(|s| s.to_string())
        .collect();

    let mut report = SchemaReport {
        collection: schema.collection.to_string(),
        filled: Vec::new(),
    };

    let mut out = df.clone();
    for field in &schema.fields {
        if !present.iter().any(|p| p == field.name) {
            report.filled.push(field.name.to_string());
        }
        out = ensure_column(&out, field.name, &field.default)?;
    }

    if !report.is_clean() {
        warn!(
            collection = schema.collection,
            fields = ?report.filled,
            "fields missing from fetched records, filled with defaults"
        );
    }

    let out = coerce(&out, &schema.rules())?;
    Ok((out, report))
}
