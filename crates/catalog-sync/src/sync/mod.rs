//! Product sync pipeline
//!
//! Turns one uploaded CSV payload into upserts against PostgreSQL and
//! snapshots in Redis.
//!
//! - **model**: the [`Product`] record and its business rules
//! - **parser**: CSV payload → products, all or nothing
//! - **validator**: first broken rule of a product
//! - **durable**: idempotent upsert into the `products` table
//! - **cache_sink**: 24h snapshot plus `products:list` membership
//! - **orchestrator**: per-batch state machine and failure aggregation
//! - **event**: S3 notifications and the object fetch seam
//! - **report**: batch and invocation results

pub mod cache_sink;
pub mod durable;
pub mod event;
pub mod model;
pub mod orchestrator;
pub mod parser;
pub mod report;
pub mod validator;

use serde::{Deserialize, Serialize};
use std::time::Duration;

pub use cache_sink::{CacheClient, CacheSink, PRODUCT_INDEX_KEY, PRODUCT_TTL};
pub use durable::{PgProductStore, ProductStore};
pub use event::{BlobLocation, ObjectFetcher, S3Event};
pub use model::Product;
pub use orchestrator::BatchOrchestrator;
pub use report::{BatchReport, EntityFailure, EntityFailures, InvocationReport, UnitReport};

/// Default number of concurrent lanes per batch
pub const DEFAULT_SYNC_CONCURRENCY: usize = 1;

/// Default bound on a single sink call, in seconds
pub const DEFAULT_SINK_TIMEOUT_SECS: u64 = 10;

/// Where a batch is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchPhase {
    Fetching,
    Parsing,
    ProcessingEntities,
    Done,
}

impl BatchPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            BatchPhase::Fetching => "fetching",
            BatchPhase::Parsing => "parsing",
            BatchPhase::ProcessingEntities => "processing_entities",
            BatchPhase::Done => "done",
        }
    }
}

impl std::fmt::Display for BatchPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a failed unit does to the rest of its invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitFailurePolicy {
    /// Stop at the first failed unit; later units are not attempted
    #[default]
    AbortInvocation,
    /// Attempt every unit and report each on its own
    Isolate,
}

impl std::str::FromStr for UnitFailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "abort" | "abort_invocation" => Ok(UnitFailurePolicy::AbortInvocation),
            "isolate" => Ok(UnitFailurePolicy::Isolate),
            other => Err(format!("unknown unit failure policy: {other}")),
        }
    }
}

/// Tuning of the orchestrator
#[derive(Debug, Clone)]
pub struct SyncSettings {
    /// Lanes processed concurrently within a batch; 1 is fully sequential
    pub concurrency: usize,
    /// Bound on each upsert and each cache sub-operation
    pub sink_timeout: Duration,
    /// Cancel a batch at the next product boundary once this elapses
    pub batch_timeout: Option<Duration>,
    pub unit_failure_policy: UnitFailurePolicy,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_SYNC_CONCURRENCY,
            sink_timeout: Duration::from_secs(DEFAULT_SINK_TIMEOUT_SECS),
            batch_timeout: None,
            unit_failure_policy: UnitFailurePolicy::default(),
        }
    }
}
