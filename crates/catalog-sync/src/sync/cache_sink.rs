//! Best-effort cache projection of products
//!
//! Each product is cached twice: a JSON snapshot under `product:<id>` that
//! expires after 24 hours, and its id in the `products:list` set, which never
//! expires. The set may name ids whose snapshot already expired.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument};

use super::model::Product;
use crate::error::{CacheError, CacheSyncError};

/// Lifetime of a product snapshot, refreshed on every sync
pub const PRODUCT_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Set of every product id seen by the cache
pub const PRODUCT_INDEX_KEY: &str = "products:list";

/// Minimal cache capability the sink needs
#[async_trait]
pub trait CacheClient: Send + Sync {
    async fn set_with_expiry(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError>;

    async fn add_to_set(&self, set_key: &str, member: &str) -> Result<(), CacheError>;
}

/// Writes product snapshots and index membership
#[derive(Clone)]
pub struct CacheSink {
    client: Arc<dyn CacheClient>,
    timeout: Duration,
}

impl CacheSink {
    pub fn new(client: Arc<dyn CacheClient>, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    /// Cache `product`
    ///
    /// The index add is attempted even when the snapshot write failed, and
    /// each failure is reported on its own.
    #[instrument(skip(self, product), fields(product_id = %product.id))]
    pub async fn sync(&self, product: &Product) -> Result<(), CacheSyncError> {
        let value = self.store_snapshot(product).await.err();
        let index = self
            .bounded(self.client.add_to_set(PRODUCT_INDEX_KEY, &product.id))
            .await
            .err();

        if value.is_none() && index.is_none() {
            debug!("Product cached");
            return Ok(());
        }

        Err(CacheSyncError { value, index })
    }

    async fn store_snapshot(&self, product: &Product) -> Result<(), CacheError> {
        let snapshot = serde_json::to_string(product)?;
        self.bounded(
            self.client
                .set_with_expiry(&product.cache_key(), &snapshot, PRODUCT_TTL),
        )
        .await
    }

    async fn bounded<F>(&self, op: F) -> Result<(), CacheError>
    where
        F: std::future::Future<Output = Result<(), CacheError>>,
    {
        match tokio::time::timeout(self.timeout, op).await {
            Ok(result) => result,
            Err(_) => Err(CacheError::Timeout(self.timeout)),
        }
    }
}
