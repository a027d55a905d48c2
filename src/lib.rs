/*!
# tracedash - Traceability Dashboard Data Layer

Loads delivery, quota and farmer records from a remote record store, normalizes
and joins them, applies the dashboard's filters and derives the aggregates the
reporting front end displays.

## Example

```rust,ignore
use tracedash::pipeline::{DashboardData, LoadOptions, Selection, SummaryOptions};
use tracedash::reader::{InMemoryStore, TableCache};

let store = InMemoryStore::new();
let mut cache = TableCache::new();
let data = DashboardData::load(&store, &mut cache, &LoadOptions::default())?;

let prepared = data.prepare(&Selection::new().with_exporters(["Acme"]))?;
if let Some(summary) = prepared.summarize(&SummaryOptions::default())? {
    println!("{} deliveries", summary.total_deliveries);
}
```

## Architecture

Data flows one way through the stages:
- **Reader** → pages records out of a [`reader::RecordStore`] into a DataFrame
- **Normalizer** → fills missing fields and coerces types per collection contract
- **Join** → dedups the farmer table and brings `area_ha` onto deliveries
- **Filter** → exporter tag filter, then minimum-area filter
- **Aggregate** → sums, counts, coverage, rankings and distributions
- **Writer** → hands tables and scalars to a presentation layer as JSON

## Core Components

- [`reader`] - Record store abstraction, pagination and caching
- [`normalize`] - Schema contracts and column coercion
- [`join`] - Deduplication and left join
- [`filter`] - Multi-valued tag filter and numeric thresholds
- [`aggregate`] - Summary aggregates
- [`pipeline`] - The dashboard flow tying the stages together
- [`writer`] - Output format abstraction layer
*/

pub mod aggregate;
pub mod config;
pub mod filter;
pub mod frame;
pub mod join;
pub mod normalize;
pub mod pipeline;
pub mod reader;
pub mod writer;

pub use aggregate::Percentage;
pub use pipeline::{DashboardData, FilterStatus, Prepared, Selection, Summary};

// DataFrame abstraction (wraps Polars)
pub use polars::prelude::DataFrame;

/// Main library error type
#[derive(thiserror::Error, Debug)]
pub enum TracedashError {
    #[error("Fetch error for collection '{collection}' at offset {offset}: {source}")]
    FetchError {
        collection: String,
        offset: usize,
        #[source]
        source: Box<TracedashError>,
    },

    #[error("Data source error: {0}")]
    ReaderError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Data error: {0}")]
    DataError(String),

    #[error("Output generation error: {0}")]
    WriterError(String),
}

pub type Result<T> = std::result::Result<T, TracedashError>;

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod integration_tests {
    use super::*;
    use crate::pipeline::{LoadOptions, SummaryOptions};
    use crate::reader::{InMemoryStore, TableCache};
    use crate::writer::{JsonWriter, Writer};
    use serde_json::json;

    fn sample_store() -> InMemoryStore {
        let mut store = InMemoryStore::new();
        store.insert(
            "traceability",
            vec![
                json!({"id": 1, "farmer_id": "  F1 ", "purchase_date": "2024-03-01", "net_weight_kg": "1200", "exporter": "Acme, Beta Co", "certification": "RA"}),
                json!({"id": 2, "farmer_id": "f2", "purchase_date": "2024-03-01T09:30:00Z", "net_weight_kg": 800, "exporter": "Beta Co", "certification": "FT"}),
                json!({"id": 3, "farmer_id": "F3", "purchase_date": "not a date", "net_weight_kg": "n/a", "exporter": "Gamma", "certification": "RA"}),
                json!({"id": 4, "farmer_id": "f1", "purchase_date": "2023-12-30", "net_weight_kg": 500.5, "exporter": "Acme", "certification": null}),
                json!({"id": 5, "farmer_id": "F4", "purchase_date": "2024-03-02", "net_weight_kg": 300, "exporter": "  ", "certification": "RA"}),
            ],
        );
        store.insert(
            "quota_view",
            vec![
                json!({"quota_status": "within", "quota_used_pct": "45.5"}),
                json!({"quota_status": "within", "quota_used_pct": 80}),
                json!({"quota_status": "exceeded", "quota_used_pct": 120}),
                json!({"quota_status": null, "quota_used_pct": null}),
            ],
        );
        store.insert(
            "farmers",
            vec![
                json!({"farmer_id": "F1", "area_ha": 2.5}),
                json!({"farmer_id": " f1", "area_ha": 9.0}),
                json!({"farmer_id": "F2", "area_ha": "1.5"}),
                json!({"farmer_id": "F3"}),
                json!({"farmer_id": "F5", "area_ha": 4.0}),
            ],
        );
        store
    }

    fn load(store: &InMemoryStore) -> DashboardData {
        let mut cache = TableCache::new();
        let options = LoadOptions {
            page_size: 2,
            ..LoadOptions::default()
        };
        DashboardData::load(store, &mut cache, &options).unwrap()
    }

    #[test]
    fn test_end_to_end_without_selection() {
        let data = load(&sample_store());

        let exporters: Vec<&str> = data.exporters().iter().map(|s| s.as_str()).collect();
        assert_eq!(exporters, vec!["Acme", "Beta Co", "Gamma"]);

        let prepared = data.prepare(&Selection::new()).unwrap();
        assert_eq!(prepared.status(), FilterStatus::Ready);

        // Area range comes from the joined table: f1 -> 2.5 (first occurrence), f2 -> 1.5
        let range = prepared.area_range().unwrap();
        assert_eq!(range.min, 1.5);
        assert_eq!(range.max, 2.5);

        // Default threshold is the range minimum, so rows without area drop out
        assert_eq!(prepared.working().height(), 3);

        let summary = prepared.summarize(&SummaryOptions::default()).unwrap().unwrap();
        assert_eq!(summary.total_deliveries, 3);
        assert!((summary.total_net_weight_kg - 2500.5).abs() < 1e-9);
        assert!((summary.total_area_ha - 6.5).abs() < 1e-9);
        assert_eq!(summary.record_counts.total, 5);
        assert_eq!(summary.record_counts.filtered, 3);

        // f1, f2, f3, f4 in deliveries; f1, f2, f3, f5 in farmers
        assert_eq!(summary.coverage.farmers_in_traceability, 4);
        assert_eq!(summary.coverage.farmers_in_register, 4);
        assert_eq!(summary.coverage.percentage, Percentage::Value(100.0));

        // 2023 delivery is excluded from the trend
        assert_eq!(summary.weight_over_time.height(), 1);

        let top = summary.top_farmers.column("farmer_id").unwrap();
        assert_eq!(top.str().unwrap().get(0), Some("f1"));
        assert_eq!(top.str().unwrap().get(1), Some("f2"));
    }

    #[test]
    fn test_end_to_end_exporter_selection_uses_substring_match() {
        let data = load(&sample_store());
        let prepared = data
            .prepare(&Selection::new().with_exporters(["Acme"]))
            .unwrap();

        let exporters = prepared.working().column("exporter").unwrap();
        let values: Vec<Option<&str>> = exporters.str().unwrap().into_iter().collect();
        assert_eq!(values, vec![Some("Acme, Beta Co"), Some("Acme")]);
    }

    #[test]
    fn test_end_to_end_exporter_filter_empties_table() {
        let data = load(&sample_store());
        let prepared = data
            .prepare(&Selection::new().with_exporters(["Nobody"]))
            .unwrap();

        assert_eq!(prepared.status(), FilterStatus::NoRowsForExporters);
        assert!(prepared
            .summarize(&SummaryOptions::default())
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_end_to_end_area_filter_empties_table() {
        let data = load(&sample_store());
        let prepared = data
            .prepare(&Selection::new().with_min_area(100.0))
            .unwrap();

        assert_eq!(prepared.status(), FilterStatus::NoRowsForArea);
        assert!(prepared
            .summarize(&SummaryOptions::default())
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_end_to_end_coverage_not_applicable_without_farmers() {
        let mut store = sample_store();
        store.insert("farmers", Vec::new());
        let data = load(&store);

        let prepared = data.prepare(&Selection::new()).unwrap();
        // No area data: the area filter is disabled, not applied
        assert!(prepared.area_range().is_none());
        assert_eq!(prepared.status(), FilterStatus::Ready);
        assert_eq!(prepared.working().height(), 5);

        let summary = prepared.summarize(&SummaryOptions::default()).unwrap().unwrap();
        assert_eq!(summary.coverage.farmers_in_register, 0);
        assert_eq!(summary.coverage.percentage, Percentage::NotApplicable);
        assert_eq!(summary.coverage.percentage.to_string(), "N/A");
    }

    #[test]
    fn test_end_to_end_fetch_error_aborts_load() {
        let store = sample_store().fail_at("farmers", 2, "connection reset");
        let mut cache = TableCache::new();
        let options = LoadOptions {
            page_size: 2,
            ..LoadOptions::default()
        };

        let err = DashboardData::load(&store, &mut cache, &options).unwrap_err();
        match err {
            TracedashError::FetchError {
                collection, offset, ..
            } => {
                assert_eq!(collection, "farmers");
                assert_eq!(offset, 2);
            }
            other => panic!("Expected FetchError, got {:?}", other),
        }
    }

    #[test]
    fn test_end_to_end_json_report() {
        let data = load(&sample_store());
        let prepared = data.prepare(&Selection::new()).unwrap();
        let summary = prepared.summarize(&SummaryOptions::default()).unwrap();

        let writer = JsonWriter::new();
        let json_str = writer.write(&prepared, summary.as_ref()).unwrap();
        let report: serde_json::Value = serde_json::from_str(&json_str).unwrap();

        assert_eq!(report["status"], "ready");
        assert_eq!(report["summary"]["total_deliveries"], 3);
        assert_eq!(report["summary"]["coverage"]["percentage"], 100.0);
        assert_eq!(
            report["summary"]["weight_over_time"][0]["purchase_date"],
            "2024-03-01"
        );
        assert_eq!(report["summary"]["top_farmers"][0]["farmer_id"], "f1");
    }
}
