//! Summary aggregates over the working table
//!
//! Pure functions: each reads the table it is given and nothing else. Callers
//! choose deliberately between the filtered working table and an unfiltered
//! one (see [`record_counts`] and the coverage computation in the pipeline).
//!
//! Missing values are skipped by sums and excluded from distribution
//! denominators. Grouped results drop rows whose group key is missing.

use crate::frame::{self, float_values, string_values};
use crate::{DataFrame, Result};
use polars::prelude::*;
use serde::{Serialize, Serializer};
use std::collections::HashSet;
use std::fmt;

/// A percentage that may be undefined
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Percentage {
    Value(f64),
    /// Denominator was zero
    NotApplicable,
}

impl Percentage {
    pub fn value(&self) -> Option<f64> {
        match self {
            Percentage::Value(v) => Some(*v),
            Percentage::NotApplicable => None,
        }
    }
}

impl fmt::Display for Percentage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Percentage::Value(v) => write!(f, "{:.1}%", v),
            Percentage::NotApplicable => write!(f, "N/A"),
        }
    }
}

impl Serialize for Percentage {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Percentage::Value(v) => serializer.serialize_f64(*v),
            Percentage::NotApplicable => serializer.serialize_none(),
        }
    }
}

/// `numerator / denominator * 100`, not applicable for a zero denominator
pub fn percentage(numerator: usize, denominator: usize) -> Percentage {
    if denominator == 0 {
        Percentage::NotApplicable
    } else {
        Percentage::Value(numerator as f64 / denominator as f64 * 100.0)
    }
}

/// Sum of a numeric column, skipping missing values
pub fn sum(df: &DataFrame, column: &str) -> Result<f64> {
    Ok(float_values(df, column)?.into_iter().flatten().sum())
}

/// Number of rows
pub fn count_rows(df: &DataFrame) -> usize {
    df.height()
}

/// Number of distinct non-missing values of a column
pub fn count_distinct(df: &DataFrame, column: &str) -> Result<usize> {
    let values = string_values(df, column)?;
    Ok(values.iter().flatten().collect::<HashSet<_>>().len())
}

/// Row counts of the whole collection and of the filtered subset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RecordCounts {
    pub total: usize,
    pub filtered: usize,
}

/// Compare an unfiltered table against its filtered subset
pub fn record_counts(unfiltered: &DataFrame, filtered: &DataFrame) -> RecordCounts {
    RecordCounts {
        total: count_rows(unfiltered),
        filtered: count_rows(filtered),
    }
}

/// Per-group sums of `value`, largest first and ties by key ascending
///
/// Keys are read as text and values as floats; rows with a missing key are
/// dropped before grouping.
fn ranked_sums(df: &DataFrame, group: &str, value: &str) -> Result<LazyFrame> {
    frame::column(df, group)?;
    frame::column(df, value)?;

    Ok(df
        .clone()
        .lazy()
        .select([
            col(group).cast(DataType::String),
            col(value).cast(DataType::Float64),
        ])
        .filter(col(group).is_not_null())
        .group_by([col(group)])
        .agg([col(value).sum()])
        .sort_by_exprs(
            [col(value), col(group)],
            SortMultipleOptions::default().with_order_descending_multi([true, false]),
        ))
}

/// Sum `value` per `group`, largest first (ties by key ascending)
///
/// Output columns: `group` (text) and `value` (float), named after the inputs.
pub fn sum_by_group(df: &DataFrame, group: &str, value: &str) -> Result<DataFrame> {
    frame::collect(ranked_sums(df, group, value)?, "group sums")
}

/// The `n` groups with the largest summed `value`
///
/// Sorted descending; ties are broken by group key ascending so the result is
/// deterministic. Returns `min(n, groups)` rows.
pub fn top_n_by_sum(df: &DataFrame, group: &str, value: &str, n: usize) -> Result<DataFrame> {
    let n = IdxSize::try_from(n).unwrap_or(IdxSize::MAX);
    frame::collect(ranked_sums(df, group, value)?.limit(n), "top groups")
}

/// Counts and percentages of each value of a categorical column
///
/// Output columns: `column`, `count`, `percentage`. Ordered by count
/// descending, then value ascending. Missing values are excluded from both the
/// rows and the denominator, so percentages sum to 100 when any value exists.
pub fn value_distribution(df: &DataFrame, column: &str) -> Result<DataFrame> {
    frame::column(df, column)?;

    let share = col("count").cast(DataType::Float64) / col("count").sum().cast(DataType::Float64)
        * lit(100.0);
    let lf = df
        .clone()
        .lazy()
        .select([col(column).cast(DataType::String)])
        .filter(col(column).is_not_null())
        .group_by([col(column)])
        .agg([len().cast(DataType::UInt64).alias("count")])
        .with_column(share.alias("percentage"))
        .sort_by_exprs(
            [col("count"), col(column)],
            SortMultipleOptions::default().with_order_descending_multi([true, false]),
        );

    frame::collect(lf, "value distribution")
}

/// Daily sums of `value`, ascending by day
///
/// Rows with a missing timestamp are skipped, as are days before
/// `since_year` when given. Output columns: `date` (as a `Date`) and `value`.
pub fn daily_sum(
    df: &DataFrame,
    date: &str,
    value: &str,
    since_year: Option<i32>,
) -> Result<DataFrame> {
    frame::timestamp_column(df, date)?;
    frame::column(df, value)?;

    let mut lf = df
        .clone()
        .lazy()
        .select([
            col(date).cast(DataType::Date),
            col(value).cast(DataType::Float64),
        ])
        .filter(col(date).is_not_null());
    if let Some(year) = since_year {
        lf = lf.filter(col(date).dt().year().gt_eq(lit(year)));
    }
    let lf = lf
        .group_by([col(date)])
        .agg([col(value).sum()])
        .sort_by_exprs([col(date)], SortMultipleOptions::default());

    frame::collect(lf, "daily sums")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percentage() {
        assert_eq!(percentage(40, 100), Percentage::Value(40.0));
        assert_eq!(percentage(40, 0), Percentage::NotApplicable);
        assert_eq!(percentage(40, 100).to_string(), "40.0%");
        assert_eq!(percentage(1, 3).to_string(), "33.3%");
        assert_eq!(percentage(0, 0).to_string(), "N/A");
    }

    #[test]
    fn test_percentage_serializes_as_number_or_null() {
        assert_eq!(serde_json::to_value(percentage(1, 4)).unwrap(), 25.0);
        assert_eq!(
            serde_json::to_value(Percentage::NotApplicable).unwrap(),
            serde_json::Value::Null
        );
    }

    #[test]
    fn test_sum_skips_missing() {
        let df = df! { "w" => &[Some(1.5f64), None, Some(2.0)] }.unwrap();
        assert_eq!(sum(&df, "w").unwrap(), 3.5);

        let empty = df! { "w" => Vec::<f64>::new() }.unwrap();
        assert_eq!(sum(&empty, "w").unwrap(), 0.0);
    }

    #[test]
    fn test_count_distinct_ignores_missing() {
        let df = df! { "farmer_id" => &[Some("f1"), Some("f2"), Some("f1"), None] }.unwrap();
        assert_eq!(count_distinct(&df, "farmer_id").unwrap(), 2);
        assert_eq!(count_rows(&df), 4);
    }

    #[test]
    fn test_coverage_scenario() {
        let farmers = df! {
            "farmer_id" => (0..100).map(|i| format!("f{}", i)).collect::<Vec<_>>()
        }
        .unwrap();
        let deliveries = df! {
            "farmer_id" => (0..80).map(|i| format!("f{}", i % 40)).collect::<Vec<_>>()
        }
        .unwrap();

        let coverage = percentage(
            count_distinct(&deliveries, "farmer_id").unwrap(),
            count_distinct(&farmers, "farmer_id").unwrap(),
        );
        assert_eq!(coverage, Percentage::Value(40.0));
        assert_eq!(coverage.to_string(), "40.0%");
    }

    #[test]
    fn test_record_counts() {
        let all = df! { "a" => &[1i64, 2, 3] }.unwrap();
        let some = df! { "a" => &[2i64] }.unwrap();
        assert_eq!(
            record_counts(&all, &some),
            RecordCounts {
                total: 3,
                filtered: 1
            }
        );
    }

    #[test]
    fn test_top_n_limits_and_orders() {
        // g{i} sums to i; an extra row lifts g03 to 13, tying it with g13
        let mut keys = Vec::new();
        let mut weights = Vec::new();
        for i in 0..15 {
            keys.push(format!("g{:02}", i));
            weights.push(i as f64);
        }
        keys.push("g03".to_string());
        weights.push(10.0);

        let df = df! { "farmer_id" => keys, "net_weight_kg" => weights }.unwrap();
        let top = top_n_by_sum(&df, "farmer_id", "net_weight_kg", 10).unwrap();

        assert_eq!(top.height(), 10);
        let sums = float_values(&top, "net_weight_kg").unwrap();
        assert!(sums.windows(2).all(|w| w[0] >= w[1]));

        let ids = string_values(&top, "farmer_id").unwrap();
        assert_eq!(ids[0], Some("g14".to_string()));
        // g03 (3 + 10) ties with g13 and sorts first by key
        assert_eq!(ids[1], Some("g03".to_string()));
        assert_eq!(ids[2], Some("g13".to_string()));
    }

    #[test]
    fn test_top_n_fewer_groups_than_n() {
        let df = df! { "k" => &["a", "b"], "v" => &[1.0f64, 2.0] }.unwrap();
        let top = top_n_by_sum(&df, "k", "v", 10).unwrap();
        assert_eq!(top.height(), 2);
    }

    #[test]
    fn test_top_n_ties_by_key() {
        let df = df! { "k" => &["b", "c", "a"], "v" => &[5.0f64, 5.0, 5.0] }.unwrap();
        let top = top_n_by_sum(&df, "k", "v", 2).unwrap();
        assert_eq!(
            string_values(&top, "k").unwrap(),
            vec![Some("a".to_string()), Some("b".to_string())]
        );
    }

    #[test]
    fn test_grouping_skips_missing_keys() {
        let df = df! {
            "k" => &[Some("a"), None, Some("a")],
            "v" => &[Some(1.0f64), Some(50.0), None],
        }
        .unwrap();
        let out = sum_by_group(&df, "k", "v").unwrap();
        assert_eq!(out.height(), 1);
        assert_eq!(float_values(&out, "v").unwrap(), vec![Some(1.0)]);
    }

    #[test]
    fn test_grouping_reads_keys_as_text_and_values_as_floats() {
        let df = df! { "k" => &[1i64, 2, 1], "v" => &[2i64, 5, 4] }.unwrap();
        let out = sum_by_group(&df, "k", "v").unwrap();

        assert_eq!(out.column("k").unwrap().dtype(), &DataType::String);
        assert_eq!(
            string_values(&out, "k").unwrap(),
            vec![Some("1".to_string()), Some("2".to_string())]
        );
        assert_eq!(float_values(&out, "v").unwrap(), vec![Some(6.0), Some(5.0)]);
    }

    #[test]
    fn test_grouping_unknown_column_is_validation_error() {
        let df = df! { "k" => &["a"], "v" => &[1.0f64] }.unwrap();
        let err = sum_by_group(&df, "k", "weight").unwrap_err();
        assert!(matches!(err, crate::TracedashError::ValidationError(_)));
    }

    #[test]
    fn test_value_distribution_sums_to_hundred() {
        let df = df! {
            "certification" => &[Some("RA"), Some("FT"), Some("RA"), None, Some("ORG"), Some("RA")]
        }
        .unwrap();
        let dist = value_distribution(&df, "certification").unwrap();

        assert_eq!(
            string_values(&dist, "certification").unwrap(),
            vec![Some("RA".into()), Some("FT".into()), Some("ORG".into())]
        );
        let counts: Vec<Option<u64>> = dist.column("count").unwrap().u64().unwrap().into_iter().collect();
        assert_eq!(counts, vec![Some(3), Some(1), Some(1)]);

        let total: f64 = float_values(&dist, "percentage").unwrap().into_iter().flatten().sum();
        assert!((total - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_value_distribution_all_missing() {
        let df = df! { "quota_status" => &[None::<&str>, None] }.unwrap();
        let dist = value_distribution(&df, "quota_status").unwrap();
        assert_eq!(dist.height(), 0);
    }

    #[test]
    fn test_daily_sum_since_year() {
        let stamps = vec![
            crate::normalize::parse_timestamp("2023-12-31T23:00:00"),
            crate::normalize::parse_timestamp("2024-01-02T08:00:00"),
            crate::normalize::parse_timestamp("2024-01-01T10:00:00"),
            crate::normalize::parse_timestamp("2024-01-02"),
            None,
        ];
        let df = frame::frame(vec![
            frame::timestamp_series("purchase_date", stamps).unwrap(),
            Series::new("net_weight_kg".into(), &[1.0f64, 2.0, 3.0, 4.0, 5.0]),
        ])
        .unwrap();

        let out = daily_sum(&df, "purchase_date", "net_weight_kg", Some(2024)).unwrap();
        assert_eq!(out.column("purchase_date").unwrap().dtype(), &DataType::Date);
        assert_eq!(
            float_values(&out, "net_weight_kg").unwrap(),
            vec![Some(3.0), Some(6.0)]
        );

        let all = daily_sum(&df, "purchase_date", "net_weight_kg", None).unwrap();
        assert_eq!(all.height(), 3);
    }
}
