//! Shared test utilities for catalog-sync integration tests
//!
//! In-memory fakes for the three seams of the orchestrator (object fetch,
//! durable store, cache) plus testcontainers wrappers for PostgreSQL and
//! Redis. Container-backed tests are `#[ignore]`d and need Docker.

#![allow(dead_code)]

use anyhow::{Context, Result};
use async_trait::async_trait;
use catalog_sync::error::{CacheError, DurableError, FetchError};
use catalog_sync::sync::{
    BatchOrchestrator, BlobLocation, CacheClient, ObjectFetcher, Product, ProductStore,
    SyncSettings,
};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use testcontainers::{core::IntoContainerPort, runners::AsyncRunner, ContainerAsync, ImageExt};
use testcontainers_modules::{postgres::Postgres, redis::Redis};
use tokio_util::sync::CancellationToken;
use tracing::info;

pub const TEST_BUCKET: &str = "catalog-uploads";

/// Initialize tracing for tests
pub fn init_test_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let _ = fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new("info,catalog_sync=debug,sqlx=warn,testcontainers=info")
        }))
        .with_test_writer()
        .try_init();
}

pub fn location(key: &str) -> BlobLocation {
    BlobLocation::new(TEST_BUCKET, key)
}

/// CSV document with the standard header
pub fn csv(rows: &[&str]) -> Vec<u8> {
    let mut doc = String::from("id,name,image,price,quantity\n");
    for row in rows {
        doc.push_str(row);
        doc.push('\n');
    }
    doc.into_bytes()
}

// ============================================================================
// Object fetch
// ============================================================================

/// Serves payloads from memory; unknown keys fail like a missing object
#[derive(Default)]
pub struct MemoryFetcher {
    objects: Mutex<HashMap<BlobLocation, Vec<u8>>>,
    broken: Mutex<HashSet<BlobLocation>>,
    calls: AtomicUsize,
}

impl MemoryFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_object(self, location: BlobLocation, data: Vec<u8>) -> Self {
        self.objects.lock().unwrap().insert(location, data);
        self
    }

    /// Fail fetches of `location` as a network error would
    pub fn with_network_error(self, location: BlobLocation) -> Self {
        self.broken.lock().unwrap().insert(location);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ObjectFetcher for MemoryFetcher {
    async fn fetch(&self, location: &BlobLocation) -> Result<Vec<u8>, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if self.broken.lock().unwrap().contains(location) {
            return Err(FetchError::Object {
                bucket: location.bucket.clone(),
                key: location.key.clone(),
                message: "dispatch failure: connection reset by peer".to_string(),
            });
        }

        self.objects
            .lock()
            .unwrap()
            .get(location)
            .cloned()
            .ok_or_else(|| FetchError::Object {
                bucket: location.bucket.clone(),
                key: location.key.clone(),
                message: "NoSuchKey".to_string(),
            })
    }
}

/// Never answers; only cancellation ends a fetch
pub struct StalledFetcher;

#[async_trait]
impl ObjectFetcher for StalledFetcher {
    async fn fetch(&self, _location: &BlobLocation) -> Result<Vec<u8>, FetchError> {
        std::future::pending().await
    }
}

// ============================================================================
// Durable store
// ============================================================================

/// Keyed product table with call recording and injectable failures
#[derive(Default)]
pub struct MemoryStore {
    rows: Mutex<HashMap<String, Product>>,
    calls: Mutex<Vec<String>>,
    failing: HashSet<String>,
    cancel_after: Option<(usize, CancellationToken)>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject upserts of `id`
    pub fn failing_on(mut self, id: &str) -> Self {
        self.failing.insert(id.to_string());
        self
    }

    /// Cancel `token` once `count` upserts have been applied
    pub fn cancel_after(mut self, count: usize, token: CancellationToken) -> Self {
        self.cancel_after = Some((count, token));
        self
    }

    pub fn get(&self, id: &str) -> Option<Product> {
        self.rows.lock().unwrap().get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.rows.lock().unwrap().len()
    }

    /// Ids passed to `upsert`, in call order
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ProductStore for MemoryStore {
    async fn upsert(&self, product: &Product) -> Result<(), DurableError> {
        let applied = {
            let mut calls = self.calls.lock().unwrap();
            calls.push(product.id.clone());
            calls.len()
        };

        if self.failing.contains(&product.id) {
            return Err(DurableError::Database(sqlx::Error::PoolTimedOut));
        }

        self.rows
            .lock()
            .unwrap()
            .insert(product.id.clone(), product.clone());

        if let Some((count, token)) = &self.cancel_after {
            if applied >= *count {
                token.cancel();
            }
        }

        Ok(())
    }
}

// ============================================================================
// Cache
// ============================================================================

/// Strings with TTLs and sets, with injectable failures per operation
#[derive(Default)]
pub struct MemoryCache {
    values: Mutex<HashMap<String, (String, Duration)>>,
    sets: Mutex<HashMap<String, BTreeSet<String>>>,
    value_calls: AtomicUsize,
    index_calls: AtomicUsize,
    fail_values_for: HashSet<String>,
    fail_index_for: HashSet<String>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the snapshot write of `id`
    pub fn failing_value_for(mut self, id: &str) -> Self {
        self.fail_values_for.insert(id.to_string());
        self
    }

    /// Fail the index add of `id`
    pub fn failing_index_for(mut self, id: &str) -> Self {
        self.fail_index_for.insert(id.to_string());
        self
    }

    pub fn value(&self, key: &str) -> Option<String> {
        self.values.lock().unwrap().get(key).map(|(v, _)| v.clone())
    }

    pub fn ttl(&self, key: &str) -> Option<Duration> {
        self.values.lock().unwrap().get(key).map(|(_, ttl)| *ttl)
    }

    pub fn snapshot(&self, id: &str) -> Option<Product> {
        self.value(&format!("product:{id}"))
            .map(|json| serde_json::from_str(&json).unwrap())
    }

    pub fn members(&self, set_key: &str) -> BTreeSet<String> {
        self.sets
            .lock()
            .unwrap()
            .get(set_key)
            .cloned()
            .unwrap_or_default()
    }

    pub fn value_calls(&self) -> usize {
        self.value_calls.load(Ordering::SeqCst)
    }

    pub fn index_calls(&self) -> usize {
        self.index_calls.load(Ordering::SeqCst)
    }

    /// Total writes attempted against the cache
    pub fn calls(&self) -> usize {
        self.value_calls() + self.index_calls()
    }
}

fn id_of_key(key: &str) -> &str {
    key.strip_prefix("product:").unwrap_or(key)
}

#[async_trait]
impl CacheClient for MemoryCache {
    async fn set_with_expiry(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        self.value_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_values_for.contains(id_of_key(key)) {
            return Err(redis::RedisError::from((redis::ErrorKind::ReadOnly, "READONLY replica")).into());
        }
        self.values
            .lock()
            .unwrap()
            .insert(key.to_string(), (value.to_string(), ttl));
        Ok(())
    }

    async fn add_to_set(&self, set_key: &str, member: &str) -> Result<(), CacheError> {
        self.index_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_index_for.contains(member) {
            return Err(redis::RedisError::from((redis::ErrorKind::IoError, "connection reset")).into());
        }
        self.sets
            .lock()
            .unwrap()
            .entry(set_key.to_string())
            .or_default()
            .insert(member.to_string());
        Ok(())
    }
}

// ============================================================================
// Harness
// ============================================================================

/// Orchestrator wired to in-memory fakes, with handles kept for assertions
pub struct Harness {
    pub fetcher: Arc<MemoryFetcher>,
    pub store: Arc<MemoryStore>,
    pub cache: Arc<MemoryCache>,
    pub orchestrator: BatchOrchestrator,
}

impl Harness {
    pub fn new(fetcher: MemoryFetcher, store: MemoryStore, cache: MemoryCache) -> Self {
        Self::with_settings(fetcher, store, cache, SyncSettings::default())
    }

    pub fn with_settings(
        fetcher: MemoryFetcher,
        store: MemoryStore,
        cache: MemoryCache,
        settings: SyncSettings,
    ) -> Self {
        let fetcher = Arc::new(fetcher);
        let store = Arc::new(store);
        let cache = Arc::new(cache);
        let orchestrator =
            BatchOrchestrator::new(fetcher.clone(), store.clone(), cache.clone(), settings);

        Self {
            fetcher,
            store,
            cache,
            orchestrator,
        }
    }

    /// Harness serving a single object at `products.csv`
    pub fn single(data: Vec<u8>) -> Self {
        Self::new(
            MemoryFetcher::new().with_object(location("products.csv"), data),
            MemoryStore::new(),
            MemoryCache::new(),
        )
    }
}

// ============================================================================
// Containers
// ============================================================================

/// PostgreSQL container with the products schema applied
pub struct TestPostgres {
    _container: ContainerAsync<Postgres>,
    pool: PgPool,
}

impl TestPostgres {
    pub async fn start() -> Result<Self> {
        info!("Starting PostgreSQL test container...");

        let container = Postgres::default()
            .with_tag("16-alpine")
            .start()
            .await
            .context("Failed to start PostgreSQL container")?;

        let host = container.get_host().await?;
        let port = container.get_host_port_ipv4(5432.tcp()).await?;
        let connection_string = format!("postgresql://postgres:postgres@{}:{}/postgres", host, port);

        let pool = PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(30))
            .connect(&connection_string)
            .await
            .context("Failed to connect to PostgreSQL")?;

        sqlx::migrate!("../../migrations")
            .run(&pool)
            .await
            .context("Failed to run migrations")?;

        Ok(Self {
            _container: container,
            pool,
        })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// Redis container
pub struct TestRedis {
    _container: ContainerAsync<Redis>,
    url: String,
}

impl TestRedis {
    pub async fn start() -> Result<Self> {
        info!("Starting Redis test container...");

        let container = Redis::default()
            .start()
            .await
            .context("Failed to start Redis container")?;

        let host = container.get_host().await?;
        let port = container.get_host_port_ipv4(6379.tcp()).await?;

        Ok(Self {
            _container: container,
            url: format!("redis://{}:{}", host, port),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}
