//! Error types for the product sync pipeline
//!
//! Structural errors ([`FetchError`], [`ParseError`]) abort a whole unit.
//! Per-product errors ([`ValidationError`], [`DurableError`], [`CacheError`])
//! are recorded in the batch report and never stop the batch.

use std::time::Duration;
use thiserror::Error;

use crate::sync::report::BatchReport;
use crate::sync::BatchPhase;

/// The object named by a trigger could not be read
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("failed to get object {key} from bucket {bucket}: {message}")]
    Object {
        bucket: String,
        key: String,
        message: String,
    },

    #[error("failed to read body of object {key} from bucket {bucket}: {message}")]
    Body {
        bucket: String,
        key: String,
        message: String,
    },
}

/// The payload is not a CSV file of products
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("failed to parse CSV at line {line}: {message}")]
    Row { line: u64, message: String },

    #[error("failed to parse CSV: {0}")]
    Csv(String),
}

impl From<csv::Error> for ParseError {
    fn from(err: csv::Error) -> Self {
        match err.position() {
            Some(position) => ParseError::Row {
                line: position.line(),
                message: err.to_string(),
            },
            None => ParseError::Csv(err.to_string()),
        }
    }
}

/// A product breaks a business rule
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("product ID is required")]
    MissingId,

    #[error("product name is required")]
    MissingName,

    #[error("price cannot be negative (got {0})")]
    InvalidPrice(f64),

    #[error("quantity cannot be negative (got {0})")]
    NegativeQuantity(i64),
}

/// The durable store rejected or did not answer an upsert
#[derive(Error, Debug)]
pub enum DurableError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("upsert timed out after {0:?}")]
    Timeout(Duration),
}

/// The cache rejected or did not answer a write
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("failed to serialize product snapshot: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("cache write timed out after {0:?}")]
    Timeout(Duration),
}

/// Outcome of the two cache sub-operations for one product
///
/// At least one of the fields is set.
#[derive(Debug)]
pub struct CacheSyncError {
    pub value: Option<CacheError>,
    pub index: Option<CacheError>,
}

impl std::fmt::Display for CacheSyncError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (&self.value, &self.index) {
            (Some(value), Some(index)) => write!(f, "snapshot: {value}; index: {index}"),
            (Some(value), None) => write!(f, "snapshot: {value}"),
            (None, Some(index)) => write!(f, "index: {index}"),
            (None, None) => f.write_str("no cache error"),
        }
    }
}

impl std::error::Error for CacheSyncError {}

/// Why one product was not fully propagated
#[derive(Error, Debug)]
pub enum EntityError {
    #[error("invalid product: {0}")]
    Invalid(#[from] ValidationError),

    #[error("failed to upsert product in PostgreSQL: {0}")]
    Durable(#[from] DurableError),

    #[error("failed to cache product snapshot: {0}")]
    CacheValue(CacheError),

    #[error("failed to add product to the cache index: {0}")]
    CacheIndex(CacheError),
}

impl EntityError {
    /// Short stage name used as a log field
    pub fn stage(&self) -> &'static str {
        match self {
            EntityError::Invalid(_) => "validation",
            EntityError::Durable(_) => "durable",
            EntityError::CacheValue(_) => "cache_value",
            EntityError::CacheIndex(_) => "cache_index",
        }
    }

    pub fn is_cache(&self) -> bool {
        matches!(self, EntityError::CacheValue(_) | EntityError::CacheIndex(_))
    }
}

/// A unit could not be processed to completion
#[derive(Error, Debug)]
pub enum BatchError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("batch cancelled while {phase}")]
    Cancelled { phase: BatchPhase },

    #[error("batch interrupted after {attempted} of {rows} rows")]
    Interrupted {
        attempted: usize,
        rows: usize,
        report: Box<BatchReport>,
    },
}

impl BatchError {
    /// Fetch and parse failures: the payload as a whole was unusable
    pub fn is_structural(&self) -> bool {
        matches!(self, BatchError::Fetch(_) | BatchError::Parse(_))
    }
}

/// The trigger document is malformed
#[derive(Error, Debug)]
pub enum EventError {
    #[error("failed to decode event notification: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("record {index} has no bucket name")]
    MissingBucket { index: usize },

    #[error("record {index} has no object key")]
    MissingKey { index: usize },

    #[error("record {index} has an invalid object key {key:?}: {message}")]
    InvalidKey {
        index: usize,
        key: String,
        message: String,
    },
}
