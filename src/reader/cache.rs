//! Memoized fetch results
//!
//! Fetched tables are kept per collection name until explicitly invalidated.
//! There is no automatic invalidation when the remote data changes.

use crate::{DataFrame, Result};
use std::collections::HashMap;
use tracing::info;

/// Cache of fetched tables keyed by collection name
#[derive(Debug, Default)]
pub struct TableCache {
    tables: HashMap<String, DataFrame>,
}

impl TableCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached table for `collection`, fetching it on a miss
    ///
    /// A failed fetch leaves the cache untouched.
    pub fn get_or_fetch<F>(&mut self, collection: &str, fetch: F) -> Result<DataFrame>
    where
        F: FnOnce() -> Result<DataFrame>,
    {
        if let Some(df) = self.tables.get(collection) {
            info!(collection, rows = df.height(), "cache hit");
            return Ok(df.clone());
        }

        let df = fetch()?;
        info!(collection, rows = df.height(), "fetched and cached");
        self.tables.insert(collection.to_string(), df.clone());
        Ok(df)
    }

    pub fn get(&self, collection: &str) -> Option<&DataFrame> {
        self.tables.get(collection)
    }

    pub fn contains(&self, collection: &str) -> bool {
        self.tables.contains_key(collection)
    }

    /// Drop every cached table
    pub fn invalidate(&mut self) {
        self.tables.clear();
    }

    /// Drop the cached table for one collection
    pub fn invalidate_collection(&mut self, collection: &str) -> bool {
        self.tables.remove(collection).is_some()
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}
