//! Batch orchestrator
//!
//! Drives one payload through `Fetching → Parsing → ProcessingEntities → Done`.
//! Fetch and parse failures end the unit before any sink is called. Once
//! products are being processed, every failure is recorded against its row
//! and the batch carries on.

use chrono::Utc;
use futures::future::join_all;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use super::{
    cache_sink::{CacheClient, CacheSink},
    durable::ProductStore,
    event::{BlobLocation, ObjectFetcher},
    model::Product,
    parser,
    report::{BatchReport, EntityFailure, EntityFailures, InvocationReport, UnitReport},
    validator, BatchPhase, SyncSettings, UnitFailurePolicy,
};
use crate::error::{BatchError, CacheSyncError, DurableError, EntityError};

/// Propagates uploaded products into the durable store and the cache
pub struct BatchOrchestrator {
    fetcher: Arc<dyn ObjectFetcher>,
    store: Arc<dyn ProductStore>,
    cache: CacheSink,
    settings: SyncSettings,
}

impl BatchOrchestrator {
    pub fn new(
        fetcher: Arc<dyn ObjectFetcher>,
        store: Arc<dyn ProductStore>,
        cache: Arc<dyn CacheClient>,
        settings: SyncSettings,
    ) -> Self {
        Self {
            fetcher,
            store,
            cache: CacheSink::new(cache, settings.sink_timeout),
            settings,
        }
    }

    pub fn settings(&self) -> &SyncSettings {
        &self.settings
    }

    /// Process every unit of one trigger, in delivery order
    ///
    /// With [`UnitFailurePolicy::AbortInvocation`] the first failed unit stops
    /// the invocation; with [`UnitFailurePolicy::Isolate`] each unit is
    /// attempted regardless. Cancelling `cancel` always stops it.
    #[instrument(skip_all, fields(invocation_id = tracing::field::Empty, units = locations.len()))]
    pub async fn process_invocation(
        &self,
        locations: &[BlobLocation],
        cancel: &CancellationToken,
    ) -> InvocationReport {
        let invocation_id = Uuid::new_v4();
        tracing::Span::current().record("invocation_id", tracing::field::display(invocation_id));

        let mut report = InvocationReport::new(invocation_id);

        for (index, location) in locations.iter().enumerate() {
            let result = self.process_unit(location, cancel).await;

            let stop = cancel.is_cancelled()
                || (result.is_err()
                    && self.settings.unit_failure_policy == UnitFailurePolicy::AbortInvocation);

            report.units.push(UnitReport {
                location: location.clone(),
                result,
            });

            if stop {
                report.not_attempted = locations[index + 1..].to_vec();
                break;
            }
        }

        report.log_summary();
        report
    }

    /// Fetch, parse and propagate one payload
    #[instrument(skip_all, fields(location = %location))]
    pub async fn process_unit(
        &self,
        location: &BlobLocation,
        cancel: &CancellationToken,
    ) -> Result<BatchReport, BatchError> {
        let started_at = Utc::now();
        let deadline = Deadline::arm(cancel, self.settings.batch_timeout);
        let cancel = &deadline.token;

        debug!(phase = %BatchPhase::Fetching, "Batch phase");
        let data = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                warn!(phase = %BatchPhase::Fetching, "Batch cancelled");
                return Err(BatchError::Cancelled { phase: BatchPhase::Fetching });
            }
            fetched = self.fetcher.fetch(location) => fetched.map_err(|e| {
                error!(error = %e, "Failed to fetch payload");
                BatchError::from(e)
            })?,
        };

        debug!(phase = %BatchPhase::Parsing, bytes = data.len(), "Batch phase");
        let products = parser::parse(&data).map_err(|e| {
            error!(error = %e, "Failed to parse payload");
            BatchError::from(e)
        })?;
        drop(data);

        let rows = products.len();
        debug!(phase = %BatchPhase::ProcessingEntities, rows, "Batch phase");
        let tally = self.process_entities(products, cancel).await;

        let report = BatchReport {
            location: location.clone(),
            rows,
            upserted: tally.upserted,
            cached: tally.cached,
            rejected: tally.rejected,
            not_attempted: tally.not_attempted,
            failures: EntityFailures::new(tally.failures),
            started_at,
            finished_at: Utc::now(),
        };

        if report.not_attempted > 0 {
            warn!(
                attempted = report.attempted(),
                rows, "Batch cancelled between products"
            );
            return Err(BatchError::Interrupted {
                attempted: report.attempted(),
                rows,
                report: Box::new(report),
            });
        }

        info!(
            phase = %BatchPhase::Done,
            rows,
            upserted = report.upserted,
            cached = report.cached,
            failures = report.failures.len(),
            "Batch phase"
        );

        Ok(report)
    }

    async fn process_entities(&self, products: Vec<Product>, cancel: &CancellationToken) -> Tally {
        let lanes = partition_by_id(products, self.settings.concurrency);

        join_all(lanes.into_iter().map(|lane| self.run_lane(lane, cancel)))
            .await
            .into_iter()
            .fold(Tally::default(), Tally::merge)
    }

    /// Products of one lane are applied strictly in file order
    async fn run_lane(&self, lane: Vec<(usize, Product)>, cancel: &CancellationToken) -> Tally {
        let mut tally = Tally::default();
        let total = lane.len();

        for (done, (row, product)) in lane.into_iter().enumerate() {
            if cancel.is_cancelled() {
                tally.not_attempted += total - done;
                break;
            }
            self.process_entity(row, product, &mut tally).await;
        }

        tally
    }

    async fn process_entity(&self, row: usize, product: Product, tally: &mut Tally) {
        if let Some(violation) = validator::validate(&product) {
            tally.rejected += 1;
            tally.record(row, &product, violation.into());
            return;
        }

        if let Err(e) = self.upsert(&product).await {
            tally.record(row, &product, e.into());
            return;
        }
        tally.upserted += 1;

        match self.cache.sync(&product).await {
            Ok(()) => tally.cached += 1,
            Err(CacheSyncError { value, index }) => {
                if let Some(e) = value {
                    tally.record(row, &product, EntityError::CacheValue(e));
                }
                if let Some(e) = index {
                    tally.record(row, &product, EntityError::CacheIndex(e));
                }
            },
        }
    }

    async fn upsert(&self, product: &Product) -> Result<(), DurableError> {
        let timeout = self.settings.sink_timeout;
        match tokio::time::timeout(timeout, self.store.upsert(product)).await {
            Ok(result) => result,
            Err(_) => Err(DurableError::Timeout(timeout)),
        }
    }
}

/// Split products into at most `lanes` groups keyed by a hash of the id
///
/// Every occurrence of an id lands in the same lane, in file order, so the
/// last occurrence is applied last. Rows are numbered from 1.
fn partition_by_id(products: Vec<Product>, lanes: usize) -> Vec<Vec<(usize, Product)>> {
    let lanes = lanes.clamp(1, products.len().max(1));
    let mut partitions: Vec<Vec<(usize, Product)>> = (0..lanes).map(|_| Vec::new()).collect();

    for (index, product) in products.into_iter().enumerate() {
        let lane = if lanes == 1 {
            0
        } else {
            let mut hasher = DefaultHasher::new();
            product.id.hash(&mut hasher);
            (hasher.finish() % lanes as u64) as usize
        };
        partitions[lane].push((index + 1, product));
    }

    partitions
}

#[derive(Default)]
struct Tally {
    upserted: usize,
    cached: usize,
    rejected: usize,
    not_attempted: usize,
    failures: Vec<EntityFailure>,
}

impl Tally {
    fn record(&mut self, row: usize, product: &Product, error: EntityError) {
        warn!(
            row,
            product_id = %product.id,
            stage = error.stage(),
            error = %error,
            "Product not fully synced"
        );
        self.failures.push(EntityFailure {
            row,
            product_id: product.id.clone(),
            error,
        });
    }

    fn merge(mut self, other: Tally) -> Tally {
        self.upserted += other.upserted;
        self.cached += other.cached;
        self.rejected += other.rejected;
        self.not_attempted += other.not_attempted;
        self.failures.extend(other.failures);
        self
    }
}

/// Child token of the caller's, cancelled when the batch timeout elapses
struct Deadline {
    token: CancellationToken,
    timer: Option<JoinHandle<()>>,
}

impl Deadline {
    fn arm(parent: &CancellationToken, timeout: Option<Duration>) -> Self {
        let token = parent.child_token();
        let timer = timeout.map(|timeout| {
            let token = token.clone();
            tokio::spawn(async move {
                tokio::time::sleep(timeout).await;
                warn!(?timeout, "Batch timeout elapsed");
                token.cancel();
            })
        });
        Self { token, timer }
    }
}

impl Drop for Deadline {
    fn drop(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }
}
