//! Results of a batch and of an invocation

use chrono::{DateTime, Utc};
use std::collections::BTreeSet;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::event::BlobLocation;
use crate::error::{BatchError, EntityError};

/// One product that was not fully propagated
#[derive(Debug)]
pub struct EntityFailure {
    /// 1-based data row (the header is not counted)
    pub row: usize,
    pub product_id: String,
    pub error: EntityError,
}

impl std::fmt::Display for EntityFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "row {} (product {:?}): {}", self.row, self.product_id, self.error)
    }
}

/// Every per-product failure of one batch, in row order
///
/// Implements `Error` so a caller can return or attach the aggregate as is.
#[derive(Debug, Default)]
pub struct EntityFailures(Vec<EntityFailure>);

impl EntityFailures {
    pub fn new(mut failures: Vec<EntityFailure>) -> Self {
        failures.sort_by_key(|failure| failure.row);
        Self(failures)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, EntityFailure> {
        self.0.iter()
    }

    /// Number of distinct rows with at least one failure
    pub fn failed_rows(&self) -> usize {
        self.0.iter().map(|f| f.row).collect::<BTreeSet<_>>().len()
    }
}

impl std::fmt::Display for EntityFailures {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} product failure(s)", self.0.len())?;
        for (i, failure) in self.0.iter().enumerate() {
            f.write_str(if i == 0 { ": " } else { "; " })?;
            write!(f, "{failure}")?;
        }
        Ok(())
    }
}

impl std::error::Error for EntityFailures {}

impl<'a> IntoIterator for &'a EntityFailures {
    type Item = &'a EntityFailure;
    type IntoIter = std::slice::Iter<'a, EntityFailure>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Outcome of one payload whose products were all attempted
#[derive(Debug)]
pub struct BatchReport {
    pub location: BlobLocation,
    /// Products parsed from the payload
    pub rows: usize,
    /// Products written to PostgreSQL
    pub upserted: usize,
    /// Products whose snapshot and index entry were both written
    pub cached: usize,
    /// Products that failed validation
    pub rejected: usize,
    /// Products skipped because the batch was cancelled
    pub not_attempted: usize,
    pub failures: EntityFailures,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl BatchReport {
    pub fn attempted(&self) -> usize {
        self.rows - self.not_attempted
    }

    /// The aggregate of per-product failures, if there were any
    pub fn error(&self) -> Option<&EntityFailures> {
        (!self.failures.is_empty()).then_some(&self.failures)
    }

    pub fn failed_rows(&self) -> usize {
        self.failures.failed_rows()
    }

    pub fn duration_ms(&self) -> i64 {
        (self.finished_at - self.started_at).num_milliseconds()
    }
}

/// One unit of an invocation and what happened to it
#[derive(Debug)]
pub struct UnitReport {
    pub location: BlobLocation,
    pub result: Result<BatchReport, BatchError>,
}

/// Outcome of every unit delivered by one trigger
#[derive(Debug)]
pub struct InvocationReport {
    pub invocation_id: Uuid,
    pub units: Vec<UnitReport>,
    /// Units skipped after an earlier unit stopped the invocation
    pub not_attempted: Vec<BlobLocation>,
}

impl InvocationReport {
    pub fn new(invocation_id: Uuid) -> Self {
        Self {
            invocation_id,
            units: Vec::new(),
            not_attempted: Vec::new(),
        }
    }

    /// True unless a unit failed as a whole
    ///
    /// Per-product failures never make an invocation fail.
    pub fn is_success(&self) -> bool {
        self.units.iter().all(|unit| unit.result.is_ok()) && self.not_attempted.is_empty()
    }

    pub fn first_error(&self) -> Option<(&BlobLocation, &BatchError)> {
        self.units
            .iter()
            .find_map(|unit| unit.result.as_ref().err().map(|e| (&unit.location, e)))
    }

    /// Per-product failures over all completed units
    pub fn entity_failures(&self) -> usize {
        self.units
            .iter()
            .filter_map(|unit| unit.result.as_ref().ok())
            .map(|report| report.failures.len())
            .sum()
    }

    pub fn log_summary(&self) {
        for unit in &self.units {
            match &unit.result {
                Ok(report) if report.failures.is_empty() => info!(
                    location = %unit.location,
                    rows = report.rows,
                    upserted = report.upserted,
                    cached = report.cached,
                    duration_ms = report.duration_ms(),
                    "Batch completed"
                ),
                Ok(report) => warn!(
                    location = %unit.location,
                    rows = report.rows,
                    upserted = report.upserted,
                    cached = report.cached,
                    failed_rows = report.failed_rows(),
                    failures = %report.failures,
                    "Batch completed with product failures"
                ),
                Err(e) => error!(location = %unit.location, error = %e, "Batch failed"),
            }
        }

        for location in &self.not_attempted {
            warn!(location = %location, "Batch not attempted");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{DurableError, ValidationError};
    use std::time::Duration;

    fn failure(row: usize, id: &str, error: EntityError) -> EntityFailure {
        EntityFailure {
            row,
            product_id: id.to_string(),
            error,
        }
    }

    #[test]
    fn test_failures_sorted_and_joined() {
        let failures = EntityFailures::new(vec![
            failure(5, "p-5", DurableError::Timeout(Duration::from_secs(10)).into()),
            failure(2, "p-2", ValidationError::InvalidPrice(-5.0).into()),
        ]);

        assert_eq!(
            failures.to_string(),
            "2 product failure(s): row 2 (product \"p-2\"): invalid product: price cannot be negative (got -5); \
             row 5 (product \"p-5\"): failed to upsert product in PostgreSQL: upsert timed out after 10s"
        );
        assert_eq!(failures.failed_rows(), 2);
    }

    #[test]
    fn test_failed_rows_counts_distinct_rows() {
        use crate::error::CacheError;

        let failures = EntityFailures::new(vec![
            failure(3, "p-3", EntityError::CacheValue(CacheError::Timeout(Duration::from_secs(1)))),
            failure(3, "p-3", EntityError::CacheIndex(CacheError::Timeout(Duration::from_secs(1)))),
        ]);

        assert_eq!(failures.len(), 2);
        assert_eq!(failures.failed_rows(), 1);
    }
}
