//! Catalog product sync
//!
//! Propagates product CSV files dropped into an S3 bucket into PostgreSQL
//! (the authoritative store) and Redis (a 24h read cache).
//!
//! # Overview
//!
//! - **sync**: parsing, validation, the two sinks and the batch orchestrator
//! - **storage**: S3 object fetch over `aws-sdk-s3`
//! - **db**: PostgreSQL pool over SQLx
//! - **cache**: Redis client over a `ConnectionManager`
//! - **config**: environment-based configuration
//!
//! A batch is the list of products of one uploaded file. Fetch and parse
//! failures abort the batch before any write; once products are being
//! processed, a product that fails is recorded and the batch moves on.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use catalog_sync::{
//!     cache::RedisCache, config::Config, db, storage::Storage,
//!     sync::{BatchOrchestrator, BlobLocation, PgProductStore},
//! };
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load()?;
//!     let pool = db::create_pool(&config.database).await?;
//!     let cache = RedisCache::connect(&config.cache).await?;
//!     let storage = Storage::new(config.storage.clone()).await;
//!
//!     let orchestrator = BatchOrchestrator::new(
//!         Arc::new(storage),
//!         Arc::new(PgProductStore::new(pool)),
//!         Arc::new(cache),
//!         config.sync.clone(),
//!     );
//!
//!     let location = BlobLocation::new("uploads", "products.csv");
//!     let report = orchestrator
//!         .process_invocation(&[location], &CancellationToken::new())
//!         .await;
//!     assert!(report.is_success());
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod config;
pub mod db;
pub mod error;
pub mod storage;
pub mod sync;

// Re-export commonly used types
pub use error::{BatchError, EntityError, EventError};
pub use sync::{BatchOrchestrator, BatchReport, InvocationReport};
