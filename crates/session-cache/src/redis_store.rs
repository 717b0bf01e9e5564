//! Redis-backed storage; expiry is delegated to the server via `SETEX`

use crate::error::{CacheError, Result};
use redis::{aio::MultiplexedConnection, AsyncCommands, Client};
use std::fmt;
use std::time::Duration;
use tokio::time::timeout;
use tracing::debug;

/// Values are stored as JSON text under the caller's key.
///
/// Each operation opens its own connection, so a Redis restart only fails
/// the operations issued while the server is down.
#[derive(Clone)]
pub struct RedisStore {
    client: Client,
}

impl RedisStore {
    /// Open a connection and verify it with `PING`.
    ///
    /// Fails on a malformed URL, a refused connection, or when the handshake
    /// does not finish within `connect_timeout`.
    pub async fn connect(url: &str, connect_timeout: Duration) -> Result<Self> {
        let client = Client::open(url)?;

        let handshake = async {
            let mut conn = client.get_multiplexed_async_connection().await?;
            let _: String = redis::cmd("PING").query_async(&mut conn).await?;
            Ok::<_, CacheError>(())
        };

        timeout(connect_timeout, handshake)
            .await
            .map_err(|_| CacheError::ConnectTimeout(connect_timeout.as_secs()))??;

        debug!("Redis handshake complete");
        Ok(Self { client })
    }

    async fn connection(&self) -> Result<MultiplexedConnection> {
        Ok(self.client.get_multiplexed_async_connection().await?)
    }

    pub async fn set(&self, key: &str, value: &str, ttl_secs: u64) -> Result<()> {
        let mut conn = self.connection().await?;
        let result: redis::RedisResult<()> = conn.set_ex(key, value, ttl_secs).await;
        result.map_err(CacheError::from)
    }

    pub async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.connection().await?;
        let value: Option<String> = conn.get(key).await?;
        Ok(value)
    }

    pub async fn delete(&self, key: &str) -> Result<()> {
        let mut conn = self.connection().await?;
        let _removed: i64 = conn.del(key).await?;
        Ok(())
    }
}

impl fmt::Debug for RedisStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisStore").finish_non_exhaustive()
    }
}
