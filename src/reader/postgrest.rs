//! PostgREST record store
//!
//! Reads collections from a PostgREST endpoint (as exposed by Supabase) over
//! blocking HTTP. Pages map onto `offset`/`limit` query parameters.

use crate::reader::{Page, Record, RecordStore};
use crate::{Result, TracedashError};
use std::time::Duration;

/// REST path Supabase mounts PostgREST under
const REST_PATH: &str = "/rest/v1";

/// PostgREST-backed record store
///
/// # Examples
///
/// ```rust,ignore
/// use tracedash::reader::{fetch_all, PostgrestStore};
///
/// let store = PostgrestStore::new("https://project.supabase.co", "anon-key");
/// let df = fetch_all(&store, "traceability", &[], 1000)?;
/// ```
pub struct PostgrestStore {
    base_url: String,
    key: String,
    agent: ureq::Agent,
}

impl PostgrestStore {
    /// Create a store for `url` authenticated with `key`
    ///
    /// `url` may be the project root or already end in `/rest/v1`.
    pub fn new(url: &str, key: &str) -> Self {
        let trimmed = url.trim_end_matches('/');
        let base_url = if trimmed.ends_with(REST_PATH) {
            trimmed.to_string()
        } else {
            format!("{}{}", trimmed, REST_PATH)
        };

        let agent: ureq::Agent = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .timeout_global(Some(Duration::from_secs(60)))
            .build()
            .into();

        Self {
            base_url,
            key: key.to_string(),
            agent,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

/// Parse the total out of a `Content-Range` header (`0-999/5321`, `*/0`)
fn parse_content_range_total(header: &str) -> Option<usize> {
    let (_, total) = header.rsplit_once('/')?;
    total.trim().parse().ok()
}

/// PostgREST select expression for a column list
fn select_expression(columns: &[&str]) -> String {
    if columns.is_empty() {
        "*".to_string()
    } else {
        columns.join(",")
    }
}

impl RecordStore for PostgrestStore {
    fn fetch_page(
        &self,
        collection: &str,
        columns: &[&str],
        offset: usize,
        limit: usize,
    ) -> Result<Page> {
        let url = format!("{}/{}", self.base_url, collection);

        let mut response = self
            .agent
            .get(&url)
            .query("select", select_expression(columns))
            .query("offset", offset.to_string())
            .query("limit", limit.to_string())
            .header("apikey", &self.key)
            .header("Authorization", format!("Bearer {}", self.key))
            .header("Prefer", "count=exact")
            .call()
            .map_err(|e| TracedashError::ReaderError(format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.body_mut().read_to_string().unwrap_or_default();
            return Err(TracedashError::ReaderError(format!(
                "Store returned {} for '{}': {}",
                status.as_u16(),
                collection,
                body.trim()
            )));
        }

        let count = response
            .headers()
            .get("content-range")
            .and_then(|v| v.to_str().ok())
            .and_then(parse_content_range_total);

        let data: Vec<Record> = response.body_mut().read_json().map_err(|e| {
            TracedashError::ReaderError(format!("Invalid JSON from '{}': {}", collection, e))
        })?;

        Ok(Page { data, count })
    }
}
