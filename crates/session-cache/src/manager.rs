//! Process-wide cache with a backend resolved once at startup

use crate::clock::{Clock, SystemClock};
use crate::error::{CacheError, Result};
use crate::file_store::FileStore;
use crate::redis_store::RedisStore;
use crate::types::{BackendKind, CacheConfig, CacheStats};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

/// TTL applied by [`CacheManager::set`]
pub const DEFAULT_TTL_SECS: u64 = 3600;

enum Backend {
    Networked(RedisStore),
    File(FileStore),
}

/// Key-value cache shared by handle across the process.
///
/// Every operation swallows its own failures: errors are logged, a failed
/// `set` or `delete` is a no-op and a failed `get` is a miss. Callers treat a
/// miss and an error the same way, by recomputing.
pub struct CacheManager {
    backend: Backend,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl CacheManager {
    /// Build the cache described by `config` using wall-clock time
    pub async fn connect(config: &CacheConfig) -> Self {
        Self::connect_with_clock(config, Arc::new(SystemClock)).await
    }

    /// Build the cache described by `config`.
    ///
    /// A networked backend that cannot be reached here is replaced by the
    /// file backend for the rest of the process; it is never retried.
    pub async fn connect_with_clock(config: &CacheConfig, clock: Arc<dyn Clock>) -> Self {
        if config.backend == BackendKind::Networked {
            let connect_timeout = Duration::from_secs(config.connect_timeout_secs);
            match RedisStore::connect(&config.redis_url, connect_timeout).await {
                Ok(store) => {
                    info!("Redis connected successfully");
                    return Self::with_backend(Backend::Networked(store));
                }
                Err(e) => {
                    error!(error = %e, "Redis connection failed, falling back to file cache");
                }
            }
        }

        Self::file(config.cache_dir.clone(), clock).await
    }

    /// Build a file-backed cache rooted at `cache_dir`.
    ///
    /// A directory that cannot be created is logged; the cache is still
    /// returned and its operations fail individually.
    pub async fn file(cache_dir: PathBuf, clock: Arc<dyn Clock>) -> Self {
        let store = FileStore::new(cache_dir, clock);
        if let Err(e) = store.init().await {
            error!(cache_dir = ?store.cache_dir(), error = %e, "File cache initialization failed");
        }
        Self::with_backend(Backend::File(store))
    }

    fn with_backend(backend: Backend) -> Self {
        Self {
            backend,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn backend_kind(&self) -> BackendKind {
        match self.backend {
            Backend::Networked(_) => BackendKind::Networked,
            Backend::File(_) => BackendKind::File,
        }
    }

    /// Store `value` under `key` for [`DEFAULT_TTL_SECS`]
    pub async fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T) {
        self.set_with_ttl(key, value, DEFAULT_TTL_SECS).await
    }

    /// Store `value` under `key` for `ttl_secs` seconds, replacing any
    /// previous value.
    ///
    /// A rejected or failed set also drops the previous value, so the key
    /// never reads back older data than the caller last wrote.
    pub async fn set_with_ttl<T: Serialize + ?Sized>(&self, key: &str, value: &T, ttl_secs: u64) {
        match self.try_set(key, value, ttl_secs).await {
            Ok(()) => debug!(key, ttl_secs, "Cache set"),
            Err(CacheError::EmptyKey) => error!("Cache set error: empty key"),
            Err(e) => {
                error!(key, error = %e, "Cache set error");
                if let Err(e) = self.try_delete(key).await {
                    debug!(key, error = %e, "Could not clear key after failed set");
                }
            }
        }
    }

    /// The stored value, or `None` when absent, expired, or unreadable.
    ///
    /// A stored JSON `null` also reads back as `None`.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = match self.try_get(key).await {
            Ok(value) => value.filter(|v| !v.is_null()),
            Err(e) => {
                error!(key, error = %e, "Cache get error");
                None
            }
        };

        let decoded = value.and_then(|v| match serde_json::from_value(v) {
            Ok(decoded) => Some(decoded),
            Err(e) => {
                error!(key, error = %e, "Cached value has unexpected shape");
                None
            }
        });

        if decoded.is_some() {
            self.hits.fetch_add(1, Ordering::Relaxed);
            debug!(key, "Cache hit");
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
            debug!(key, "Cache miss");
        }
        decoded
    }

    /// Remove `key`; removing an absent key is fine
    pub async fn delete(&self, key: &str) {
        match self.try_delete(key).await {
            Ok(()) => debug!(key, "Cache deleted"),
            Err(e) => error!(key, error = %e, "Cache delete error"),
        }
    }

    /// Whether `get(key)` would return a value. Performs a full read, so an
    /// expired file entry is evicted here as well.
    pub async fn has(&self, key: &str) -> bool {
        self.get::<serde_json::Value>(key).await.is_some()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }

    async fn try_set<T: Serialize + ?Sized>(&self, key: &str, value: &T, ttl_secs: u64) -> Result<()> {
        check_key(key)?;
        if ttl_secs == 0 {
            return Err(CacheError::ZeroTtl);
        }
        let value = serde_json::to_value(value)?;

        match &self.backend {
            Backend::Networked(store) => {
                let text = serde_json::to_string(&value)?;
                store.set(key, &text, ttl_secs).await
            }
            Backend::File(store) => store.set(key, value, ttl_secs).await,
        }
    }

    async fn try_get(&self, key: &str) -> Result<Option<serde_json::Value>> {
        check_key(key)?;
        match &self.backend {
            Backend::Networked(store) => match store.get(key).await? {
                Some(text) => Ok(Some(serde_json::from_str(&text)?)),
                None => Ok(None),
            },
            Backend::File(store) => store.get(key).await,
        }
    }

    async fn try_delete(&self, key: &str) -> Result<()> {
        check_key(key)?;
        match &self.backend {
            Backend::Networked(store) => store.delete(key).await,
            Backend::File(store) => store.delete(key).await,
        }
    }
}

fn check_key(key: &str) -> Result<()> {
    if key.is_empty() {
        Err(CacheError::EmptyKey)
    } else {
        Ok(())
    }
}
