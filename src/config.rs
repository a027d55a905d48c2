//! Record store configuration
//!
//! The endpoint and credential come from a secrets TOML file:
//!
//! ```toml
//! [supabase]
//! url = "https://project.supabase.co"
//! key = "anon-key"
//! ```
//!
//! or from the `SUPABASE_URL` / `SUPABASE_KEY` environment variables. The
//! endpoint may also be a `json://` or `memory://` connection string.

use crate::reader::connection::{parse_connection_string, ConnectionInfo};
use crate::reader::{InMemoryStore, JsonDirStore, RecordStore};
use crate::{Result, TracedashError};
use serde::Deserialize;
use std::path::Path;
use tracing::debug;

/// Rows requested per page unless configured otherwise
pub const DEFAULT_PAGE_SIZE: usize = 1000;

pub const URL_ENV: &str = "SUPABASE_URL";
pub const KEY_ENV: &str = "SUPABASE_KEY";

/// Where and how to read records
#[derive(Debug, Clone, PartialEq)]
pub struct StoreConfig {
    /// Connection string of the store
    pub url: String,
    /// Access credential, required for PostgREST endpoints
    pub key: Option<String>,
    pub page_size: usize,
}

#[derive(Debug, Deserialize)]
struct SecretsFile {
    supabase: SupabaseSection,
}

#[derive(Debug, Deserialize)]
struct SupabaseSection {
    url: String,
    key: Option<String>,
    page_size: Option<usize>,
}

impl StoreConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            key: None,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    /// Read the `[supabase]` table of a secrets file
    pub fn from_secrets_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            TracedashError::ConfigError(format!(
                "Failed to read secrets file '{}': {}",
                path.display(),
                e
            ))
        })?;
        let secrets: SecretsFile = toml::from_str(&content).map_err(|e| {
            TracedashError::ConfigError(format!(
                "Invalid secrets file '{}': {}",
                path.display(),
                e
            ))
        })?;

        debug!(path = %path.display(), "loaded store configuration");
        Ok(Self {
            url: secrets.supabase.url,
            key: secrets.supabase.key,
            page_size: secrets.supabase.page_size.unwrap_or(DEFAULT_PAGE_SIZE),
        })
    }

    /// Read `SUPABASE_URL` and `SUPABASE_KEY` from the environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read the environment variables through `lookup`
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let url = lookup(URL_ENV)
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| TracedashError::ConfigError(format!("{} is not set", URL_ENV)))?;
        let key = lookup(KEY_ENV).filter(|v| !v.trim().is_empty());

        Ok(Self {
            url,
            key,
            page_size: DEFAULT_PAGE_SIZE,
        })
    }

    /// Check the configuration without opening a store
    pub fn validate(&self) -> Result<ConnectionInfo> {
        if self.page_size == 0 {
            return Err(TracedashError::ConfigError(
                "Page size must be greater than zero".to_string(),
            ));
        }

        let info = parse_connection_string(&self.url)
            .map_err(|e| TracedashError::ConfigError(e.to_string()))?;

        if matches!(info, ConnectionInfo::Postgrest(_)) && self.key.is_none() {
            return Err(TracedashError::ConfigError(format!(
                "An access key is required for '{}' (set {} or [supabase].key)",
                self.url, KEY_ENV
            )));
        }

        Ok(info)
    }

    /// Open the store the connection string names
    pub fn open_store(&self) -> Result<Box<dyn RecordStore>> {
        match self.validate()? {
            ConnectionInfo::Memory => Ok(Box::new(InMemoryStore::new())),
            ConnectionInfo::JsonDir(dir) => Ok(Box::new(JsonDirStore::new(dir))),
            #[cfg(feature = "postgrest")]
            ConnectionInfo::Postgrest(url) => {
                let key = self.key.as_deref().unwrap_or_default();
                Ok(Box::new(crate::reader::PostgrestStore::new(&url, key)))
            }
            #[cfg(not(feature = "postgrest"))]
            ConnectionInfo::Postgrest(url) => Err(TracedashError::ConfigError(format!(
                "Cannot open '{}': built without the postgrest feature",
                url
            ))),
        }
    }
}
