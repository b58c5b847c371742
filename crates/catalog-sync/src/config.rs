//! Configuration management

use catalog_common::CatalogError;
use std::time::Duration;

use crate::cache::CacheConfig;
use crate::db::DbConfig;
use crate::storage::config::StorageConfig;
use crate::sync::{SyncSettings, UnitFailurePolicy, DEFAULT_SINK_TIMEOUT_SECS, DEFAULT_SYNC_CONCURRENCY};

/// Process configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub database: DbConfig,
    pub cache: CacheConfig,
    pub storage: StorageConfig,
    pub sync: SyncSettings,
}

impl Config {
    /// Load configuration from `.env`, the environment and defaults
    pub fn load() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let config = Config {
            database: DbConfig::from_env()?,
            cache: CacheConfig::from_env()?,
            storage: StorageConfig::from_env()?,
            sync: sync_settings_from_env()?,
        };

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.database.url.is_empty() {
            anyhow::bail!("Database URL cannot be empty");
        }

        if self.database.max_connections == 0 {
            anyhow::bail!("Database max_connections must be greater than 0");
        }

        if self.database.min_connections > self.database.max_connections {
            anyhow::bail!(
                "Database min_connections ({}) cannot be greater than max_connections ({})",
                self.database.min_connections,
                self.database.max_connections
            );
        }

        if self.cache.url.is_empty() {
            anyhow::bail!("Redis URL cannot be empty");
        }

        if self.sync.concurrency == 0 {
            anyhow::bail!("Sync concurrency must be greater than 0");
        }

        if self.sync.sink_timeout.is_zero() {
            anyhow::bail!("Sink timeout must be greater than 0");
        }

        // More lanes than pooled connections only queues on the pool
        if self.sync.concurrency as u32 > self.database.max_connections {
            tracing::warn!(
                concurrency = self.sync.concurrency,
                max_connections = self.database.max_connections,
                "Sync concurrency exceeds the database pool size"
            );
        }

        Ok(())
    }
}

fn sync_settings_from_env() -> Result<SyncSettings, CatalogError> {
    let concurrency = parse_env("SYNC_CONCURRENCY", "a positive integer")?
        .unwrap_or(DEFAULT_SYNC_CONCURRENCY);

    let sink_timeout = parse_env("SYNC_SINK_TIMEOUT_SECS", "a number of seconds")?
        .map(Duration::from_secs)
        .unwrap_or(Duration::from_secs(DEFAULT_SINK_TIMEOUT_SECS));

    let batch_timeout = parse_env::<u64>("SYNC_BATCH_TIMEOUT_SECS", "a number of seconds")?
        .map(Duration::from_secs);

    let unit_failure_policy = parse_env::<UnitFailurePolicy>("SYNC_UNIT_FAILURE_POLICY", "abort|isolate")?
        .unwrap_or_default();

    Ok(SyncSettings {
        concurrency,
        sink_timeout,
        batch_timeout,
        unit_failure_policy,
    })
}

/// Unset or empty is `None`; set but unparsable is an error
pub(crate) fn parse_env<T: std::str::FromStr>(name: &str, expected: &str) -> Result<Option<T>, CatalogError> {
    match std::env::var(name) {
        Ok(value) if !value.trim().is_empty() => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| CatalogError::invalid_env(name, &value, expected)),
        _ => Ok(None),
    }
}
