//! Redis cache client

use async_trait::async_trait;
use catalog_common::CatalogError;
use redis::aio::ConnectionManager;
use std::time::Duration;
use tracing::{info, instrument};

use crate::config::parse_env;
use crate::error::CacheError;
use crate::sync::cache_sink::CacheClient;

/// Default Redis URL for local development
pub const DEFAULT_REDIS_URL: &str = "redis://127.0.0.1:6379";

/// Default connect timeout in seconds
pub const DEFAULT_REDIS_CONNECT_TIMEOUT_SECS: u64 = 5;

/// Redis connection settings
#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub url: String,
    pub connect_timeout_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_REDIS_URL.to_string(),
            connect_timeout_secs: DEFAULT_REDIS_CONNECT_TIMEOUT_SECS,
        }
    }
}

impl CacheConfig {
    /// Read `REDIS_URL` and `REDIS_CONNECT_TIMEOUT`
    pub fn from_env() -> Result<Self, CatalogError> {
        Ok(Self {
            url: std::env::var("REDIS_URL").unwrap_or_else(|_| DEFAULT_REDIS_URL.to_string()),
            connect_timeout_secs: parse_env("REDIS_CONNECT_TIMEOUT", "a number of seconds")?
                .unwrap_or(DEFAULT_REDIS_CONNECT_TIMEOUT_SECS),
        })
    }
}

/// [`CacheClient`] over a multiplexed, auto-reconnecting Redis connection
///
/// Cloning is cheap and clones share the connection.
#[derive(Clone)]
pub struct RedisCache {
    conn: ConnectionManager,
}

impl RedisCache {
    /// Connect and verify the server answers `PING`
    pub async fn connect(config: &CacheConfig) -> Result<Self, CacheError> {
        let client = redis::Client::open(config.url.as_str())?;
        let timeout = Duration::from_secs(config.connect_timeout_secs);

        let conn = tokio::time::timeout(timeout, ConnectionManager::new(client))
            .await
            .map_err(|_| CacheError::Timeout(timeout))??;

        let cache = Self { conn };
        cache.ping().await?;

        info!("Successfully connected to Redis");

        Ok(cache)
    }

    pub async fn ping(&self) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }
}

#[async_trait]
impl CacheClient for RedisCache {
    #[instrument(skip(self, value))]
    async fn set_with_expiry(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        let _: () = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("EX")
            .arg(ttl.as_secs().max(1))
            .query_async(&mut conn)
            .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn add_to_set(&self, set_key: &str, member: &str) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        let _: () = redis::cmd("SADD")
            .arg(set_key)
            .arg(member)
            .query_async(&mut conn)
            .await?;
        Ok(())
    }
}
