//! Row filters for the working table
//!
//! - Multi-valued tag filter: a field such as `exporter` may hold several
//!   comma-separated names. The tag vocabulary is built from the fragments,
//!   but matching is a substring test against the raw value, so selecting
//!   `"AB"` also matches `"CABLE"`. Partial and compound names match too.
//! - Numeric threshold filter used for the minimum farm area.

use crate::frame::{filter_rows, float_values, string_values};
use crate::{DataFrame, Result};
use regex::Regex;
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::OnceLock;

/// Separator between tags: a comma and any whitespace after it
fn tag_separator() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r",\s*").expect("Invalid tag separator regex"))
}

/// Split a raw multi-valued field into its tags
///
/// Fragments are trimmed; empty and whitespace-only fragments are dropped.
pub fn split_tags(raw: &str) -> Vec<&str> {
    tag_separator()
        .split(raw)
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect()
}

/// Distinct tags across every row of `field` (case-sensitive, sorted)
pub fn distinct_tags(df: &DataFrame, field: &str) -> Result<BTreeSet<String>> {
    let values = string_values(df, field)?;
    Ok(values
        .iter()
        .flatten()
        .flat_map(|raw| split_tags(raw))
        .map(str::to_string)
        .collect())
}

/// Whether any selected tag occurs inside the raw value
fn matches_any<S: AsRef<str>>(raw: &str, selected: &[S]) -> bool {
    selected.iter().any(|tag| raw.contains(tag.as_ref()))
}

/// Keep rows whose `field` contains any selected tag as a substring
///
/// Blank and whitespace-only tags are ignored. An empty selection selects
/// everything and returns the table unchanged. Rows with a missing value never
/// match a non-empty selection.
pub fn filter_by_tags<S: AsRef<str>>(
    df: &DataFrame,
    field: &str,
    selected: &[S],
) -> Result<DataFrame> {
    let selected: Vec<&str> = selected
        .iter()
        .map(AsRef::as_ref)
        .filter(|tag| !tag.trim().is_empty())
        .collect();

    if selected.is_empty() {
        // Still validate the field exists
        string_values(df, field)?;
        return Ok(df.clone());
    }

    let mask: Vec<bool> = string_values(df, field)?
        .iter()
        .map(|v| v.as_deref().is_some_and(|raw| matches_any(raw, &selected)))
        .collect();

    filter_rows(df, &mask)
}

/// Closed range of a numeric column
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct NumericRange {
    pub min: f64,
    pub max: f64,
}

/// Min and max of a numeric column, or `None` when it holds no values
pub fn numeric_range(df: &DataFrame, field: &str) -> Result<Option<NumericRange>> {
    let range = float_values(df, field)?
        .into_iter()
        .flatten()
        .fold(None, |acc: Option<NumericRange>, v| {
            Some(match acc {
                None => NumericRange { min: v, max: v },
                Some(r) => NumericRange {
                    min: r.min.min(v),
                    max: r.max.max(v),
                },
            })
        });
    Ok(range)
}

/// Keep rows where `field >= threshold`; missing values are dropped
pub fn filter_at_least(df: &DataFrame, field: &str, threshold: f64) -> Result<DataFrame> {
    let mask: Vec<bool> = float_values(df, field)?
        .iter()
        .map(|v| v.is_some_and(|v| v >= threshold))
        .collect();

    filter_rows(df, &mask)
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::prelude::*;

    fn exporters() -> DataFrame {
        df! {
            "exporter" => &[
                Some("Acme, Beta Co"),
                Some("Beta Co"),
                Some("CABLE Ltd"),
                None,
                Some("Gamma,Delta ,  , "),
            ]
        }
        .unwrap()
    }

    fn exporter_values(df: &DataFrame) -> Vec<Option<String>> {
        string_values(df, "exporter").unwrap()
    }

    #[test]
    fn test_split_tags() {
        assert_eq!(split_tags("Acme, Beta Co"), vec!["Acme", "Beta Co"]);
        assert_eq!(split_tags("Acme,Beta"), vec!["Acme", "Beta"]);
        assert_eq!(split_tags(" , ,"), Vec::<&str>::new());
        assert_eq!(split_tags("Solo"), vec!["Solo"]);
    }

    #[test]
    fn test_distinct_tags_vocabulary() {
        let tags = distinct_tags(&exporters(), "exporter").unwrap();
        let tags: Vec<&str> = tags.iter().map(|s| s.as_str()).collect();
        assert_eq!(
            tags,
            vec!["Acme", "Beta Co", "CABLE Ltd", "Delta", "Gamma"]
        );
    }

    #[test]
    fn test_distinct_tags_case_sensitive() {
        let df = df! { "exporter" => &["acme", "Acme"] }.unwrap();
        assert_eq!(distinct_tags(&df, "exporter").unwrap().len(), 2);
    }

    #[test]
    fn test_distinct_tags_order_independent() {
        let a = df! { "exporter" => &["x, y", "z"] }.unwrap();
        let b = df! { "exporter" => &["z", "y,x"] }.unwrap();
        assert_eq!(
            distinct_tags(&a, "exporter").unwrap(),
            distinct_tags(&b, "exporter").unwrap()
        );
    }

    #[test]
    fn test_empty_selection_returns_everything() {
        let df = exporters();
        let out = filter_by_tags::<&str>(&df, "exporter", &[]).unwrap();
        assert!(out.equals_missing(&df));
    }

    #[test]
    fn test_blank_tags_are_ignored() {
        let df = exporters();
        let out = filter_by_tags(&df, "exporter", &["", "  "]).unwrap();
        assert!(out.equals_missing(&df));

        let out = filter_by_tags(&df, "exporter", &["", "Acme"]).unwrap();
        assert_eq!(exporter_values(&out), vec![Some("Acme, Beta Co".to_string())]);
    }

    #[test]
    fn test_substring_match_on_compound_value() {
        let out = filter_by_tags(&exporters(), "exporter", &["Acme"]).unwrap();
        assert_eq!(exporter_values(&out), vec![Some("Acme, Beta Co".to_string())]);
    }

    #[test]
    fn test_substring_false_positive_is_kept() {
        let out = filter_by_tags(&exporters(), "exporter", &["AB"]).unwrap();
        assert_eq!(exporter_values(&out), vec![Some("CABLE Ltd".to_string())]);
    }

    #[test]
    fn test_missing_value_never_matches() {
        let out = filter_by_tags(&exporters(), "exporter", &["Beta Co", "Gamma"]).unwrap();
        assert_eq!(out.height(), 3);
        assert!(exporter_values(&out).iter().all(Option::is_some));
    }

    #[test]
    fn test_superset_selection_is_monotonic() {
        let df = exporters();
        let selections: [&[&str]; 4] = [
            &["Beta"],
            &["Beta", "Gamma"],
            &["Beta", "Gamma", "AB"],
            &["Beta", "Gamma", "AB", "Acme"],
        ];

        let mut previous: Vec<Option<String>> = Vec::new();
        for selection in selections {
            let current = exporter_values(&filter_by_tags(&df, "exporter", selection).unwrap());
            assert!(previous.iter().all(|row| current.contains(row)));
            assert!(current.len() >= previous.len());
            previous = current;
        }
    }

    #[test]
    fn test_unknown_field_is_error_even_without_selection() {
        let df = exporters();
        assert!(filter_by_tags::<&str>(&df, "nope", &[]).is_err());
    }

    #[test]
    fn test_numeric_range() {
        let df = df! { "area_ha" => &[Some(2.5f64), None, Some(0.5), Some(9.0)] }.unwrap();
        assert_eq!(
            numeric_range(&df, "area_ha").unwrap(),
            Some(NumericRange { min: 0.5, max: 9.0 })
        );
    }

    #[test]
    fn test_numeric_range_all_missing() {
        let df = df! { "area_ha" => &[None::<f64>, None] }.unwrap();
        assert_eq!(numeric_range(&df, "area_ha").unwrap(), None);
    }

    #[test]
    fn test_filter_at_least_drops_missing() {
        let df = df! { "area_ha" => &[Some(2.5f64), None, Some(0.5), Some(1.0)] }.unwrap();
        let out = filter_at_least(&df, "area_ha", 1.0).unwrap();
        assert_eq!(
            float_values(&out, "area_ha").unwrap(),
            vec![Some(2.5), Some(1.0)]
        );
    }
}
