//! File-per-key storage with lazily enforced expiry

use crate::clock::Clock;
use crate::error::Result;
use crate::types::CacheEntry;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tracing::{debug, info};

/// Stores each key as `<encoded key>.json` inside `cache_dir`.
///
/// Writes go straight to the target file with no temp-file rename, so a
/// reader racing a writer on the same key can observe a partial file; that
/// surfaces as a deserialization error and therefore as a miss.
pub struct FileStore {
    cache_dir: PathBuf,
    clock: Arc<dyn Clock>,
}

impl FileStore {
    pub fn new(cache_dir: PathBuf, clock: Arc<dyn Clock>) -> Self {
        Self { cache_dir, clock }
    }

    /// Ensure the cache directory (and its parents) exists
    pub async fn init(&self) -> Result<()> {
        fs::create_dir_all(&self.cache_dir).await?;
        info!(cache_dir = ?self.cache_dir, "File cache initialized");
        Ok(())
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Path of the file holding `key`.
    ///
    /// The key is percent-encoded, so path separators and other unsafe
    /// characters cannot escape the cache directory and distinct keys never
    /// share a file.
    pub fn entry_path(&self, key: &str) -> PathBuf {
        self.cache_dir
            .join(format!("{}.json", urlencoding::encode(key)))
    }

    pub async fn set(&self, key: &str, value: serde_json::Value, ttl_secs: u64) -> Result<()> {
        let ttl_ms = i64::try_from(ttl_secs)
            .unwrap_or(i64::MAX)
            .saturating_mul(1000);
        let entry = CacheEntry {
            value,
            expires: self.clock.now_millis().saturating_add(ttl_ms),
        };

        let json = serde_json::to_vec_pretty(&entry)?;
        fs::write(self.entry_path(key), json).await?;
        Ok(())
    }

    pub async fn get(&self, key: &str) -> Result<Option<serde_json::Value>> {
        let path = self.entry_path(key);

        let data = match fs::read(&path).await {
            Ok(data) => data,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let entry: CacheEntry = serde_json::from_slice(&data)?;

        let now = self.clock.now_millis();
        if entry.is_expired(now) {
            debug!(key, expires = entry.expires, now, "Cache entry expired");
            self.delete(key).await?;
            return Ok(None);
        }

        Ok(Some(entry.value))
    }

    pub async fn delete(&self, key: &str) -> Result<()> {
        match fs::remove_file(self.entry_path(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
