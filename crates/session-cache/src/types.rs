//! Cache types

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::warn;

/// Record stored in each file of the file backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub value: serde_json::Value,
    /// Absolute expiry instant, milliseconds since the Unix epoch
    pub expires: i64,
}

impl CacheEntry {
    /// An entry is gone once its expiry instant is at or before `now_ms`
    pub fn is_expired(&self, now_ms: i64) -> bool {
        self.expires <= now_ms
    }
}

/// Which store backs the cache
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    File,
    Networked,
}

impl BackendKind {
    /// Parse a configured backend name. `redis` is accepted as an alias for
    /// `networked`; anything unrecognised selects the file backend.
    pub fn from_setting(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "networked" | "redis" => Self::Networked,
            "file" | "" => Self::File,
            other => {
                warn!(backend = %other, "Unknown cache backend, using file cache");
                Self::File
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::File => "file",
            Self::Networked => "networked",
        }
    }
}

/// Hit/miss counters for `get` calls
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
}

/// Configuration for building a [`crate::CacheManager`]
#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub backend: BackendKind,
    pub redis_url: String,
    pub cache_dir: PathBuf,
    pub connect_timeout_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::File,
            redis_url: "redis://localhost:6379".to_string(),
            cache_dir: PathBuf::from("./cache"),
            connect_timeout_secs: 5,
        }
    }
}

impl CacheConfig {
    /// Parse configuration from environment variables
    pub fn from_env() -> Self {
        Self::from_vars(|name| std::env::var(name).ok())
    }

    /// Parse configuration from an arbitrary variable lookup
    pub fn from_vars(var: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let backend = var("CACHE_TYPE")
            .map(|v| BackendKind::from_setting(&v))
            .unwrap_or(defaults.backend);

        let redis_url = var("REDIS_URL").unwrap_or(defaults.redis_url);

        let cache_dir = var("CACHE_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.cache_dir);

        let connect_timeout_secs = var("REDIS_CONNECT_TIMEOUT_SECS")
            .and_then(|s| s.parse::<u64>().ok())
            .filter(|secs| *secs > 0)
            .unwrap_or(defaults.connect_timeout_secs);

        Self {
            backend,
            redis_url,
            cache_dir,
            connect_timeout_secs,
        }
    }
}
