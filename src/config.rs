//! Configuration Module
//!
//! Loads cache settings from environment variables.

use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use serde::{de::DeserializeOwned, Serialize};

use crate::cache::{CacheOptions, DEFAULT_MAX_AGE_MS};
use crate::error::Result;
use crate::store::{FileStore, MemoryStore, SharedStore};

/// Cache configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Namespace for the demo group
    pub namespace: String,
    /// Max age in milliseconds, `None` for values that never expire
    pub max_age_ms: Option<u64>,
    /// Rotation offset for stored text
    pub obfuscation_offset: Option<u32>,
    /// Whether stale reads remove the durable slot
    pub evict_on_expire: bool,
    /// JSON file backing the store; in-memory when unset
    pub store_path: Option<PathBuf>,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_NAMESPACE` - Group namespace (default: test)
    /// - `CACHE_MAX_AGE_MS` - Max age in ms, or `never` (default: 3600000)
    /// - `CACHE_OBFUSCATION_OFFSET` - Rotation offset (default: unset)
    /// - `CACHE_EVICT_ON_EXPIRE` - Evict stale slots on read (default: true)
    /// - `CACHE_STORE_PATH` - Store file path (default: unset, in-memory)
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            namespace: env::var("CACHE_NAMESPACE").unwrap_or(defaults.namespace),
            max_age_ms: env::var("CACHE_MAX_AGE_MS")
                .ok()
                .and_then(|v| parse_max_age(&v))
                .unwrap_or(defaults.max_age_ms),
            obfuscation_offset: env::var("CACHE_OBFUSCATION_OFFSET")
                .ok()
                .and_then(|v| v.trim().parse().ok())
                .or(defaults.obfuscation_offset),
            evict_on_expire: env::var("CACHE_EVICT_ON_EXPIRE")
                .ok()
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(defaults.evict_on_expire),
            store_path: env::var_os("CACHE_STORE_PATH")
                .filter(|v| !v.is_empty())
                .map(PathBuf::from)
                .or(defaults.store_path),
        }
    }

    /// Builds entry options from these settings, with the default codec and
    /// system clock.
    pub fn cache_options<T>(&self) -> CacheOptions<T>
    where
        T: Serialize + DeserializeOwned + 'static,
    {
        CacheOptions::default()
            .max_age_ms(self.max_age_ms)
            .obfuscation_offset(self.obfuscation_offset)
            .evict_on_expire(self.evict_on_expire)
    }

    /// Opens the configured store: a file store when a path is set, an
    /// in-memory store otherwise.
    pub fn open_store(&self) -> Result<SharedStore> {
        match &self.store_path {
            Some(path) => FileStore::open_shared(path),
            None => Ok(Arc::new(MemoryStore::new())),
        }
    }
}

/// Parses a max age: milliseconds, or `never` for no expiry.
fn parse_max_age(value: &str) -> Option<Option<u64>> {
    let value = value.trim();
    if value.eq_ignore_ascii_case("never") {
        return Some(None);
    }
    value.parse().ok().map(Some)
}

impl Default for Config {
    fn default() -> Self {
        Self {
            namespace: "test".to_string(),
            max_age_ms: Some(DEFAULT_MAX_AGE_MS),
            obfuscation_offset: None,
            evict_on_expire: true,
            store_path: None,
        }
    }
}
