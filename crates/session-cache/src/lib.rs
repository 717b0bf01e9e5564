//! Key-value cache with TTL expiration and a pluggable backend
//!
//! Stores JSON-serializable values either in Redis (expiry enforced by the
//! server) or as one JSON file per key (expiry enforced lazily on read).
//! The backend is resolved once when the [`CacheManager`] is built: a Redis
//! backend that cannot be reached at startup permanently falls back to the
//! file store. Cache operations never return errors; failures are logged and
//! surface as misses.

mod clock;
mod error;
#[cfg(test)]
mod fake_redis;
mod file_store;
mod manager;
mod redis_store;
mod types;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{CacheError, Result};
pub use file_store::FileStore;
pub use manager::{CacheManager, DEFAULT_TTL_SECS};
pub use redis_store::RedisStore;
pub use types::{BackendKind, CacheConfig, CacheEntry, CacheStats};
