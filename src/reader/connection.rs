//! Connection string parsing for record stores
//!
//! Parses URI-style connection strings to determine the store type and its location.

use crate::{Result, TracedashError};

/// Parsed connection information
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionInfo {
    /// PostgREST / Supabase endpoint (base URL, without the REST path)
    Postgrest(String),
    /// Directory of `<collection>.json` files
    JsonDir(String),
    /// Empty in-memory store
    Memory,
}

/// Parse a connection string into connection information
///
/// # Supported Formats
///
/// - `https://project.supabase.co` - PostgREST endpoint over HTTPS
/// - `http://localhost:3000` - PostgREST endpoint over plain HTTP
/// - `json:///absolute/dir` - JSON directory (absolute path)
/// - `json://relative/dir` - JSON directory (relative path)
/// - `memory://` - empty in-memory store
///
/// # Examples
///
/// ```
/// use tracedash::reader::connection::{parse_connection_string, ConnectionInfo};
///
/// let info = parse_connection_string("memory://").unwrap();
/// assert_eq!(info, ConnectionInfo::Memory);
///
/// let info = parse_connection_string("json://snapshot").unwrap();
/// assert_eq!(info, ConnectionInfo::JsonDir("snapshot".to_string()));
/// ```
pub fn parse_connection_string(uri: &str) -> Result<ConnectionInfo> {
    let uri = uri.trim();

    if uri == "memory://" || uri == "memory" {
        return Ok(ConnectionInfo::Memory);
    }

    if let Some(path) = uri.strip_prefix("json://") {
        // json:///abs/dir keeps its leading slash, json://rel/dir stays relative
        if path.is_empty() || path == "/" {
            return Err(TracedashError::ValidationError(
                "JSON directory path cannot be empty".to_string(),
            ));
        }
        return Ok(ConnectionInfo::JsonDir(path.to_string()));
    }

    if uri.starts_with("https://") || uri.starts_with("http://") {
        let base = uri.trim_end_matches('/');
        let host = base.split_once("://").map(|(_, rest)| rest).unwrap_or("");
        if host.is_empty() {
            return Err(TracedashError::ValidationError(format!(
                "Missing host in connection string '{}'",
                uri
            )));
        }
        return Ok(ConnectionInfo::Postgrest(base.to_string()));
    }

    Err(TracedashError::ValidationError(format!(
        "Unsupported connection string format: {}. Supported: https://, http://, json://, memory://",
        uri
    )))
}
