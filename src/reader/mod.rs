//! Data source abstraction layer for tracedash
//!
//! The reader module provides a pluggable interface for pulling records out of a
//! remote record store and assembling them into Polars DataFrames.
//!
//! # Architecture
//!
//! All stores implement the `RecordStore` trait, which serves one page of a
//! named collection at a time. [`fetch_all`] walks the pages sequentially and
//! concatenates them in remote order. Latency is one round-trip per page; pages
//! are never requested concurrently.
//!
//! # Example
//!
//! ```rust,ignore
//! use tracedash::reader::{fetch_all, JsonDirStore};
//!
//! let store = JsonDirStore::new("fixtures");
//! let df = fetch_all(&store, "traceability", &[], 1000)?;
//! ```

use crate::{DataFrame, Result, TracedashError};
use serde_json::{Map, Value};
use tracing::debug;

pub mod cache;
pub mod connection;
pub mod json_dir;
pub mod memory;
mod records;

#[cfg(feature = "postgrest")]
pub mod postgrest;

pub use cache::TableCache;
pub use json_dir::JsonDirStore;
pub use memory::InMemoryStore;
pub use records::records_to_dataframe;

#[cfg(feature = "postgrest")]
pub use postgrest::PostgrestStore;

/// A single remote record: field name to JSON value
pub type Record = Map<String, Value>;

/// One page of records returned by a store
#[derive(Debug, Clone, Default)]
pub struct Page {
    /// Records in remote order. May be empty.
    pub data: Vec<Record>,
    /// Total size of the collection, when the store reports it
    pub count: Option<usize>,
}

/// Trait for remote record stores
///
/// A store serves the rows `offset..offset + limit` of a named collection,
/// projected to `columns` (an empty slice selects every field). Records may
/// omit fields; the normalizer deals with that downstream.
pub trait RecordStore {
    /// Fetch one page of a collection
    ///
    /// # Errors
    ///
    /// Returns `TracedashError::ReaderError` if the store rejects the request
    /// (unknown collection, malformed column list) or the transport fails.
    /// An exhausted collection is not an error: it yields an empty page.
    fn fetch_page(
        &self,
        collection: &str,
        columns: &[&str],
        offset: usize,
        limit: usize,
    ) -> Result<Page>;
}

impl<S: RecordStore + ?Sized> RecordStore for &S {
    fn fetch_page(
        &self,
        collection: &str,
        columns: &[&str],
        offset: usize,
        limit: usize,
    ) -> Result<Page> {
        (**self).fetch_page(collection, columns, offset, limit)
    }
}

impl<S: RecordStore + ?Sized> RecordStore for Box<S> {
    fn fetch_page(
        &self,
        collection: &str,
        columns: &[&str],
        offset: usize,
        limit: usize,
    ) -> Result<Page> {
        (**self).fetch_page(collection, columns, offset, limit)
    }
}

/// Fetch every row of a collection, one fixed-size page at a time
///
/// Stops at the first page holding fewer than `page_size` rows, unless the
/// store reports a total beyond the rows received so far. Servers may cap a
/// page below the requested size, so the offset advances by the rows actually
/// received. Any page failure aborts the whole fetch; partial results are never
/// returned.
///
/// # Arguments
///
/// * `store` - The record store to read from
/// * `collection` - Remote collection name (validated by the store)
/// * `columns` - Columns to select; empty selects all
/// * `page_size` - Rows per request, must be positive
///
/// # Errors
///
/// Returns `TracedashError::ValidationError` for a zero page size and
/// `TracedashError::FetchError` (carrying the failing offset) when a page fails
/// or the store runs out of rows before its reported total.
pub fn fetch_all(
    store: &dyn RecordStore,
    collection: &str,
    columns: &[&str],
    page_size: usize,
) -> Result<DataFrame> {
    if page_size == 0 {
        return Err(TracedashError::ValidationError(
            "Page size must be greater than zero".to_string(),
        ));
    }

    let mut rows: Vec<Record> = Vec::new();
    let mut offset = 0usize;
    let mut reported: Option<usize> = None;

    loop {
        let page = store
            .fetch_page(collection, columns, offset, page_size)
            .map_err(|e| TracedashError::FetchError {
                collection: collection.to_string(),
                offset,
                source: Box::new(e),
            })?;

        let received = page.data.len();
        debug!(
            collection,
            offset,
            received,
            total = ?page.count,
            "fetched page"
        );
        rows.extend(page.data);
        offset += received;
        if page.count.is_some() {
            reported = page.count;
        }

        let more_reported = reported.is_some_and(|total| offset < total);
        if received == 0 || (received < page_size && !more_reported) {
            break;
        }
    }

    if let Some(total) = reported.filter(|&total| rows.len() < total) {
        return Err(TracedashError::FetchError {
            collection: collection.to_string(),
            offset,
            source: Box::new(TracedashError::ReaderError(format!(
                "Store reported {} rows but returned {}",
                total,
                rows.len()
            ))),
        });
    }

    records_to_dataframe(&rows, columns)
}
