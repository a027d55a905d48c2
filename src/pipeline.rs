//! The dashboard flow
//!
//! [`DashboardData::load`] fetches and normalizes the three collections once.
//! [`DashboardData::prepare`] applies a [`Selection`] and yields a [`Prepared`]
//! working table together with the [`FilterStatus`] of the filter stages.
//! [`Prepared::summarize`] derives the aggregates shown on the dashboard.
//!
//! ```text
//! traceability ─ exporter filter ─┐
//!                                 ├─ left join area_ha ─ area filter ─ working table
//! farmers ─────── dedup by id ────┘
//! ```

use crate::aggregate::{self, Percentage, RecordCounts};
use crate::config::DEFAULT_PAGE_SIZE;
use crate::filter::{self, NumericRange};
use crate::frame::{self, float_values, string_values};
use crate::join::{dedup_by_key, left_join};
use crate::normalize::{normalize, CollectionSchema, SchemaReport};
use crate::reader::{fetch_all, RecordStore, TableCache};
use crate::{DataFrame, Result};
use polars::prelude::*;
use serde::Serialize;
use std::collections::BTreeSet;
use tracing::{info, warn};

pub const FARMER_ID: &str = "farmer_id";
pub const PURCHASE_DATE: &str = "purchase_date";
pub const NET_WEIGHT_KG: &str = "net_weight_kg";
pub const EXPORTER: &str = "exporter";
pub const CERTIFICATION: &str = "certification";
pub const QUOTA_STATUS: &str = "quota_status";
pub const AREA_HA: &str = "area_ha";
pub const VOLUME_T: &str = "volume_t";

/// How the three collections are pulled from the store
#[derive(Debug, Clone)]
pub struct LoadOptions {
    /// Rows per page request
    pub page_size: usize,
    /// Drop cached tables and fetch again
    pub refresh: bool,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            refresh: false,
        }
    }
}

/// The normalized collections behind the dashboard
#[derive(Debug, Clone)]
pub struct DashboardData {
    traceability: DataFrame,
    quota: DataFrame,
    farmers: DataFrame,
    exporters: BTreeSet<String>,
    reports: Vec<SchemaReport>,
}

impl DashboardData {
    /// Fetch (through the cache) and normalize traceability, quota_view and
    /// farmers, in that order
    ///
    /// # Errors
    ///
    /// Any fetch failure aborts the load with the `FetchError` of the first
    /// collection that failed.
    pub fn load(
        store: &dyn RecordStore,
        cache: &mut TableCache,
        options: &LoadOptions,
    ) -> Result<Self> {
        if options.refresh {
            cache.invalidate();
        }

        let (traceability, trace_report) =
            load_collection(store, cache, CollectionSchema::traceability(), options.page_size)?;
        let (quota, quota_report) =
            load_collection(store, cache, CollectionSchema::quota_view(), options.page_size)?;
        let (farmers, farmers_report) =
            load_collection(store, cache, CollectionSchema::farmers(), options.page_size)?;

        Self::from_tables(
            traceability,
            quota,
            farmers,
            vec![trace_report, quota_report, farmers_report],
        )
    }

    /// Assemble from already normalized tables
    pub fn from_tables(
        traceability: DataFrame,
        quota: DataFrame,
        farmers: DataFrame,
        reports: Vec<SchemaReport>,
    ) -> Result<Self> {
        let exporters = filter::distinct_tags(&traceability, EXPORTER)?;
        Ok(Self {
            traceability,
            quota,
            farmers,
            exporters,
            reports,
        })
    }

    pub fn traceability(&self) -> &DataFrame {
        &self.traceability
    }

    pub fn quota(&self) -> &DataFrame {
        &self.quota
    }

    pub fn farmers(&self) -> &DataFrame {
        &self.farmers
    }

    /// Every exporter name found in the traceability table
    pub fn exporters(&self) -> &BTreeSet<String> {
        &self.exporters
    }

    /// Schema gaps repaired while loading, one report per collection
    pub fn schema_reports(&self) -> &[SchemaReport] {
        &self.reports
    }

    /// Apply a selection and build the working table
    pub fn prepare(&self, selection: &Selection) -> Result<Prepared<'_>> {
        let by_exporter = filter::filter_by_tags(&self.traceability, EXPORTER, &selection.exporters)?;

        let farmers = dedup_by_key(&self.farmers, FARMER_ID)?;
        let joined = left_join(&by_exporter, &farmers, FARMER_ID, &[AREA_HA])?;

        if joined.height() == 0 {
            warn!(exporters = ?selection.exporters, "exporter filter left no rows");
            return Ok(Prepared {
                data: self,
                working: joined,
                status: FilterStatus::NoRowsForExporters,
                area_range: None,
                min_area: None,
            });
        }

        let area_range = filter::numeric_range(&joined, AREA_HA)?;
        let (working, min_area) = match area_range {
            Some(range) => {
                let threshold = selection.min_area.unwrap_or(range.min);
                (filter::filter_at_least(&joined, AREA_HA, threshold)?, Some(threshold))
            }
            None => {
                warn!("no area data available, area filter disabled");
                (joined, None)
            }
        };

        let status = if working.height() == 0 {
            warn!(min_area = ?min_area, "area filter left no rows");
            FilterStatus::NoRowsForArea
        } else {
            FilterStatus::Ready
        };

        Ok(Prepared {
            data: self,
            working,
            status,
            area_range,
            min_area,
        })
    }
}

fn load_collection(
    store: &dyn RecordStore,
    cache: &mut TableCache,
    schema: CollectionSchema,
    page_size: usize,
) -> Result<(DataFrame, SchemaReport)> {
    let raw = cache.get_or_fetch(schema.collection, || {
        fetch_all(store, schema.collection, &[], page_size)
    })?;
    let (df, report) = normalize(&raw, &schema)?;
    info!(collection = schema.collection, rows = df.height(), "loaded");
    Ok((df, report))
}

/// User-selected filter parameters
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Selection {
    /// Exporter tags; empty selects every row
    pub exporters: Vec<String>,
    /// Minimum farm area in hectares; `None` uses the smallest area present
    pub min_area: Option<f64>,
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Blank names are dropped, so `[""]` selects every exporter
    pub fn with_exporters<I, S>(mut self, exporters: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exporters = exporters
            .into_iter()
            .map(Into::into)
            .filter(|name: &String| !name.trim().is_empty())
            .collect();
        self
    }

    pub fn with_min_area(mut self, min_area: f64) -> Self {
        self.min_area = Some(min_area);
        self
    }
}

/// Outcome of the filter stages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterStatus {
    /// The working table holds at least one row
    Ready,
    /// The exporter selection matched nothing
    NoRowsForExporters,
    /// The minimum-area threshold removed every remaining row
    NoRowsForArea,
}

impl FilterStatus {
    pub fn is_ready(&self) -> bool {
        matches!(self, FilterStatus::Ready)
    }

    /// Message for the presentation layer
    pub fn message(&self) -> Option<&'static str> {
        match self {
            FilterStatus::Ready => None,
            FilterStatus::NoRowsForExporters => {
                Some("No traceability data for the selected exporter(s).")
            }
            FilterStatus::NoRowsForArea => Some("No data left after applying area filter."),
        }
    }
}

/// A filtered working table ready to be summarized
#[derive(Debug, Clone)]
pub struct Prepared<'a> {
    data: &'a DashboardData,
    working: DataFrame,
    status: FilterStatus,
    area_range: Option<NumericRange>,
    min_area: Option<f64>,
}

impl<'a> Prepared<'a> {
    pub fn working(&self) -> &DataFrame {
        &self.working
    }

    pub fn status(&self) -> FilterStatus {
        self.status
    }

    /// Area range of the exporter-filtered table; `None` disables the area filter
    pub fn area_range(&self) -> Option<NumericRange> {
        self.area_range
    }

    /// The area threshold actually applied
    pub fn applied_min_area(&self) -> Option<f64> {
        self.min_area
    }

    pub fn data(&self) -> &'a DashboardData {
        self.data
    }

    /// Derive the dashboard aggregates
    ///
    /// Returns `None` unless the status is [`FilterStatus::Ready`]. Record
    /// counts and coverage read the unfiltered tables; everything else reads
    /// the working table.
    pub fn summarize(&self, options: &SummaryOptions) -> Result<Option<Summary>> {
        if !self.status.is_ready() {
            return Ok(None);
        }
        let working = &self.working;
        let data = self.data;

        let farmers_in_traceability = aggregate::count_distinct(&data.traceability, FARMER_ID)?;
        let farmers_in_register = aggregate::count_distinct(&data.farmers, FARMER_ID)?;

        Ok(Some(Summary {
            total_net_weight_kg: aggregate::sum(working, NET_WEIGHT_KG)?,
            total_deliveries: aggregate::count_rows(working),
            total_area_ha: aggregate::sum(working, AREA_HA)?,
            record_counts: aggregate::record_counts(&data.traceability, working),
            coverage: Coverage {
                farmers_in_traceability,
                farmers_in_register,
                percentage: aggregate::percentage(farmers_in_traceability, farmers_in_register),
            },
            weight_over_time: aggregate::daily_sum(
                working,
                PURCHASE_DATE,
                NET_WEIGHT_KG,
                options.since_year,
            )?,
            quota_status: aggregate::value_distribution(&data.quota, QUOTA_STATUS)?,
            top_farmers: aggregate::top_n_by_sum(working, FARMER_ID, NET_WEIGHT_KG, options.top_n)?,
            certification_share: aggregate::value_distribution(working, CERTIFICATION)?,
            certified_volumes: certified_volumes(working)?,
        }))
    }
}

/// Net weight per certification in metric tonnes, rounded to 2 decimals
fn certified_volumes(working: &DataFrame) -> Result<DataFrame> {
    let by_cert = aggregate::sum_by_group(working, CERTIFICATION, NET_WEIGHT_KG)?;
    let tonnes: Vec<Option<f64>> = float_values(&by_cert, NET_WEIGHT_KG)?
        .into_iter()
        .map(|kg| kg.map(|kg| (kg / 10.0).round() / 100.0))
        .collect();
    let certs = string_values(&by_cert, CERTIFICATION)?;

    frame::frame(vec![
        Series::new(CERTIFICATION.into(), certs),
        Series::new(VOLUME_T.into(), tonnes),
    ])
}

/// Parameters of the summary aggregates
#[derive(Debug, Clone, PartialEq)]
pub struct SummaryOptions {
    /// First year shown in the weight trend; `None` shows every year
    pub since_year: Option<i32>,
    /// Number of farmers in the ranking
    pub top_n: usize,
}

impl Default for SummaryOptions {
    fn default() -> Self {
        Self {
            since_year: Some(2024),
            top_n: 10,
        }
    }
}

/// Distinct farmers delivering versus registered
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Coverage {
    pub farmers_in_traceability: usize,
    pub farmers_in_register: usize,
    pub percentage: Percentage,
}

/// Everything the dashboard displays for one selection
#[derive(Debug, Clone)]
pub struct Summary {
    pub total_net_weight_kg: f64,
    pub total_deliveries: usize,
    pub total_area_ha: f64,
    pub record_counts: RecordCounts,
    pub coverage: Coverage,
    /// `purchase_date` (date), `net_weight_kg`
    pub weight_over_time: DataFrame,
    /// `quota_status`, `count`, `percentage`
    pub quota_status: DataFrame,
    /// `farmer_id`, `net_weight_kg`
    pub top_farmers: DataFrame,
    /// `certification`, `count`, `percentage`
    pub certification_share: DataFrame,
    /// `certification`, `volume_t`
    pub certified_volumes: DataFrame,
}
