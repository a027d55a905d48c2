//! Deduplication and left join
//!
//! Keys are compared exactly as stored: normalize both sides (see
//! [`crate::normalize`]) before calling anything here.

use crate::frame::{column, string_values};
use crate::{DataFrame, Result, TracedashError};
use polars::prelude::*;
use std::collections::{HashMap, HashSet};

/// Keep one row per distinct value of `key`
///
/// The first occurrence of each key wins and row order is preserved. Missing
/// keys count as one distinct value.
pub fn dedup_by_key(df: &DataFrame, key: &str) -> Result<DataFrame> {
    let keys = string_values(df, key)?;

    let mut seen: HashSet<Option<&str>> = HashSet::with_capacity(keys.len());
    let indices: Vec<IdxSize> = keys
        .iter()
        .enumerate()
        .filter(|(_, k)| seen.insert(k.as_deref()))
        .map(|(i, _)| i as IdxSize)
        .collect();

    if indices.len() == df.height() {
        return Ok(df.clone());
    }

    let idx = IdxCa::new(PlSmallStr::EMPTY, &indices);
    df.take(&idx)
        .map_err(|e| TracedashError::DataError(format!("Failed to dedup on '{}': {}", key, e)))
}

/// Left-join `bring` columns of `secondary` onto `primary` by `key`
///
/// Every primary row is kept, in order. Rows whose key has no match (or is
/// missing) get nulls in the brought columns. When `secondary` repeats a key,
/// its first row is used, so the output height always equals the primary
/// height. A brought column replaces a primary column of the same name.
pub fn left_join(
    primary: &DataFrame,
    secondary: &DataFrame,
    key: &str,
    bring: &[&str],
) -> Result<DataFrame> {
    let primary_keys = string_values(primary, key)?;
    let secondary_keys = string_values(secondary, key)?;

    let mut lookup: HashMap<&str, IdxSize> = HashMap::with_capacity(secondary_keys.len());
    for (i, k) in secondary_keys.iter().enumerate() {
        if let Some(k) = k {
            lookup.entry(k.as_str()).or_insert(i as IdxSize);
        }
    }

    let matches: Vec<Option<IdxSize>> = primary_keys
        .iter()
        .map(|k| k.as_deref().and_then(|k| lookup.get(k).copied()))
        .collect();
    let any_match = matches.iter().any(Option::is_some);
    let idx = IdxCa::new(PlSmallStr::EMPTY, &matches);

    let mut out = primary.clone();
    for name in bring {
        let source = column(secondary, name)?;
        let gathered = if any_match {
            source.take(&idx).map_err(|e| {
                TracedashError::DataError(format!("Failed to join column '{}': {}", name, e))
            })?
        } else {
            // Nothing to gather from (possibly empty) secondary
            Series::full_null(source.name().clone(), primary.height(), source.dtype())
        };
        out.with_column(gathered).map_err(|e| {
            TracedashError::DataError(format!("Failed to attach column '{}': {}", name, e))
        })?;
    }

    Ok(out)
}
