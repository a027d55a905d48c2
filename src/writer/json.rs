//! JSON report writer

use super::data::dataframe_to_values;
use super::Writer;
use crate::pipeline::{Prepared, Summary};
use crate::{DataFrame, Result, TracedashError, VERSION};
use serde_json::{json, Map, Value};

/// Writes a selection's outcome as one JSON document
///
/// ```json
/// {
///   "version": "0.1.0",
///   "status": "ready",
///   "message": null,
///   "area_range": {"min": 1.5, "max": 2.5},
///   "applied_min_area": 1.5,
///   "exporters": ["Acme", "Beta Co"],
///   "schema": [{"collection": "farmers", "filled": []}],
///   "summary": { "total_net_weight_kg": 2500.5, ... }
/// }
/// ```
#[derive(Debug, Clone, Default)]
pub struct JsonWriter {
    include_rows: bool,
    pretty: bool,
}

impl JsonWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Also write the working table under `rows`
    pub fn with_rows(mut self, include_rows: bool) -> Self {
        self.include_rows = include_rows;
        self
    }

    pub fn pretty(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }

    fn table(df: &DataFrame) -> Result<Value> {
        Ok(Value::Array(dataframe_to_values(df)?))
    }

    fn summary_value(summary: &Summary) -> Result<Value> {
        Ok(json!({
            "total_net_weight_kg": summary.total_net_weight_kg,
            "total_deliveries": summary.total_deliveries,
            "total_area_ha": summary.total_area_ha,
            "record_counts": to_value(&summary.record_counts)?,
            "coverage": to_value(&summary.coverage)?,
            "weight_over_time": Self::table(&summary.weight_over_time)?,
            "quota_status": Self::table(&summary.quota_status)?,
            "top_farmers": Self::table(&summary.top_farmers)?,
            "certification_share": Self::table(&summary.certification_share)?,
            "certified_volumes": Self::table(&summary.certified_volumes)?,
        }))
    }
}

fn to_value<T: serde::Serialize>(value: &T) -> Result<Value> {
    serde_json::to_value(value).map_err(|e| TracedashError::WriterError(e.to_string()))
}

impl Writer for JsonWriter {
    fn write(&self, prepared: &Prepared, summary: Option<&Summary>) -> Result<String> {
        let data = prepared.data();
        let mut report = Map::new();

        report.insert("version".into(), json!(VERSION));
        report.insert("status".into(), to_value(&prepared.status())?);
        report.insert("message".into(), json!(prepared.status().message()));
        report.insert("area_range".into(), to_value(&prepared.area_range())?);
        report.insert("applied_min_area".into(), json!(prepared.applied_min_area()));
        report.insert("exporters".into(), json!(data.exporters()));
        report.insert("schema".into(), to_value(&data.schema_reports())?);

        let summary = match summary {
            Some(summary) => Self::summary_value(summary)?,
            None => Value::Null,
        };
        report.insert("summary".into(), summary);

        if self.include_rows {
            report.insert("rows".into(), Self::table(prepared.working())?);
        }

        let report = Value::Object(report);
        let output = if self.pretty {
            serde_json::to_string_pretty(&report)
        } else {
            serde_json::to_string(&report)
        };
        output.map_err(|e| TracedashError::WriterError(format!("Failed to serialize report: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{DashboardData, Selection, SummaryOptions};
    use polars::prelude::*;

    fn data() -> DashboardData {
        let traceability = df! {
            "farmer_id" => &["a", "b"],
            "exporter" => &["Acme", "Beta"],
            "net_weight_kg" => &[10.0f64, 20.0],
            "certification" => &["RA", "RA"],
        }
        .unwrap();
        let traceability = traceability
            .hstack(&[crate::frame::timestamp_series("purchase_date", vec![Some(0), Some(0)])
                .unwrap()
                .into_column()])
            .unwrap();
        let quota = df! { "quota_status" => &["within"] }.unwrap();
        let farmers = df! { "farmer_id" => &["a"], "area_ha" => &[1.0f64] }.unwrap();
        DashboardData::from_tables(traceability, quota, farmers, Vec::new()).unwrap()
    }

    fn parse(output: &str) -> Value {
        serde_json::from_str(output).unwrap()
    }

    #[test]
    fn test_empty_status_has_message_and_no_summary() {
        let data = data();
        let prepared = data.prepare(&Selection::new().with_exporters(["Zeta"])).unwrap();
        let summary = prepared.summarize(&SummaryOptions::default()).unwrap();

        let report = parse(&JsonWriter::new().write(&prepared, summary.as_ref()).unwrap());
        assert_eq!(report["status"], "no_rows_for_exporters");
        assert!(report["message"].is_string());
        assert_eq!(report["summary"], Value::Null);
        assert!(report.get("rows").is_none());
    }

    #[test]
    fn test_rows_are_optional() {
        let data = data();
        let prepared = data.prepare(&Selection::new()).unwrap();
        let summary = prepared
            .summarize(&SummaryOptions {
                since_year: None,
                top_n: 5,
            })
            .unwrap();

        let writer = JsonWriter::new().with_rows(true).pretty(true);
        let report = parse(&writer.write(&prepared, summary.as_ref()).unwrap());

        let rows = report["rows"].as_array().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["farmer_id"], "a");
        assert_eq!(rows[0]["area_ha"], 1.0);
        assert_eq!(report["exporters"], json!(["Acme", "Beta"]));
        assert_eq!(report["summary"]["weight_over_time"][0]["purchase_date"], "1970-01-01");
        assert_eq!(report["summary"]["certified_volumes"][0]["volume_t"], 0.01);
    }
}
