//! In-memory record store
//!
//! Serves collections held in memory. Used by tests and for `memory://`
//! connections; a failure can be injected at a given page offset to exercise
//! fetch-error handling.

use crate::reader::{Page, Record, RecordStore};
use crate::{Result, TracedashError};
use serde_json::Value;
use std::cell::Cell;
use std::collections::HashMap;

/// Injected failure: the page of `collection` starting at `offset` errors out
#[derive(Debug, Clone)]
struct Failure {
    collection: String,
    offset: usize,
    message: String,
}

/// Record store backed by in-memory collections
#[derive(Debug, Default)]
pub struct InMemoryStore {
    collections: HashMap<String, Vec<Record>>,
    failure: Option<Failure>,
    requests: Cell<usize>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) a collection
    ///
    /// Non-object values are skipped.
    pub fn insert(&mut self, collection: &str, records: Vec<Value>) {
        let records = records
            .into_iter()
            .filter_map(|v| match v {
                Value::Object(map) => Some(map),
                _ => None,
            })
            .collect();
        self.collections.insert(collection.to_string(), records);
    }

    /// Make the page of `collection` starting at `offset` fail
    pub fn fail_at(mut self, collection: &str, offset: usize, message: &str) -> Self {
        self.failure = Some(Failure {
            collection: collection.to_string(),
            offset,
            message: message.to_string(),
        });
        self
    }

    /// Number of pages requested so far
    pub fn requests(&self) -> usize {
        self.requests.get()
    }
}

/// Keep only the selected fields of a record
pub(crate) fn project(record: &Record, columns: &[&str]) -> Record {
    if columns.is_empty() {
        return record.clone();
    }
    columns
        .iter()
        .filter_map(|c| record.get(*c).map(|v| (c.to_string(), v.clone())))
        .collect()
}

impl RecordStore for InMemoryStore {
    fn fetch_page(
        &self,
        collection: &str,
        columns: &[&str],
        offset: usize,
        limit: usize,
    ) -> Result<Page> {
        self.requests.set(self.requests.get() + 1);

        if let Some(failure) = &self.failure {
            if failure.collection == collection && failure.offset == offset {
                return Err(TracedashError::ReaderError(failure.message.clone()));
            }
        }

        let records = self.collections.get(collection).ok_or_else(|| {
            TracedashError::ReaderError(format!("Unknown collection '{}'", collection))
        })?;

        let data = records
            .iter()
            .skip(offset)
            .take(limit)
            .map(|r| project(r, columns))
            .collect();

        Ok(Page {
            data,
            count: Some(records.len()),
        })
    }
}
