//! JSON directory record store
//!
//! Each collection is a JSON array of objects stored as `<dir>/<collection>.json`.
//! Useful for running the dashboard pipeline against an exported snapshot.
//!
//! A file is parsed when a walk starts at offset 0; later pages of the same
//! walk are served from the parsed records.

use crate::reader::memory::project;
use crate::reader::{Page, Record, RecordStore};
use crate::{Result, TracedashError};
use std::cell::RefCell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Record store reading collections from a directory of JSON files
#[derive(Debug, Clone)]
pub struct JsonDirStore {
    root: PathBuf,
    loaded: RefCell<HashMap<String, Vec<Record>>>,
}

impl JsonDirStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            loaded: RefCell::new(HashMap::new()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn collection_path(&self, collection: &str) -> Result<PathBuf> {
        if collection.is_empty() || collection.contains(['/', '\\']) || collection.starts_with('.') {
            return Err(TracedashError::ReaderError(format!(
                "Invalid collection name '{}'",
                collection
            )));
        }
        Ok(self.root.join(format!("{}.json", collection)))
    }

    fn read_collection(&self, collection: &str) -> Result<Vec<Record>> {
        let path = self.collection_path(collection)?;
        let content = std::fs::read_to_string(&path).map_err(|e| {
            TracedashError::ReaderError(format!("Failed to read '{}': {}", path.display(), e))
        })?;
        let records: Vec<Record> = serde_json::from_str(&content).map_err(|e| {
            TracedashError::ReaderError(format!(
                "'{}' is not a JSON array of objects: {}",
                path.display(),
                e
            ))
        })?;
        debug!(collection, rows = records.len(), "parsed collection file");
        Ok(records)
    }
}

impl RecordStore for JsonDirStore {
    fn fetch_page(
        &self,
        collection: &str,
        columns: &[&str],
        offset: usize,
        limit: usize,
    ) -> Result<Page> {
        let mut loaded = self.loaded.borrow_mut();
        if offset == 0 {
            loaded.remove(collection);
        }
        if !loaded.contains_key(collection) {
            let records = self.read_collection(collection)?;
            loaded.insert(collection.to_string(), records);
        }
        let records = &loaded[collection];
        let count = records.len();

        let data = records
            .iter()
            .skip(offset)
            .take(limit)
            .map(|r| project(r, columns))
            .collect();

        Ok(Page {
            data,
            count: Some(count),
        })
    }
}
