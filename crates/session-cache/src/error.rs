//! Error types for cache backends
//!
//! These never leave [`crate::CacheManager`]'s public methods; they exist so
//! each backend can propagate with `?` and the manager can log one message
//! per failed operation.

use std::fmt;

#[derive(Debug)]
pub enum CacheError {
    Io(std::io::Error),
    Serialization(serde_json::Error),
    Redis(redis::RedisError),
    ConnectTimeout(u64),
    EmptyKey,
    ZeroTtl,
}

impl fmt::Display for CacheError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "IO error: {}", e),
            Self::Serialization(e) => write!(f, "Serialization error: {}", e),
            Self::Redis(e) => write!(f, "Redis error: {}", e),
            Self::ConnectTimeout(secs) => {
                write!(f, "Redis connection timed out after {} seconds", secs)
            }
            Self::EmptyKey => write!(f, "Cache key must not be empty"),
            Self::ZeroTtl => write!(f, "Cache TTL must be at least one second"),
        }
    }
}

impl std::error::Error for CacheError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Serialization(e) => Some(e),
            Self::Redis(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for CacheError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<serde_json::Error> for CacheError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err)
    }
}

impl From<redis::RedisError> for CacheError {
    fn from(err: redis::RedisError) -> Self {
        Self::Redis(err)
    }
}

pub type Result<T> = std::result::Result<T, CacheError>;
