//! Ingestion pipeline: resolve → fetch (with retry) → reconcile & write → report.
//!
//! Each instrument runs through a small state machine and ends as `Succeeded`, `Failed`
//! or `SkippedEmpty`. One instrument's failure never stops the batch.
//!
//! Fetch and write failures are handled differently:
//! - `SourceUnavailable` and empty results are retried per [`RetryPolicy`]. When attempts
//!   run out, an empty last answer means `SkippedEmpty`, anything else `Failed`.
//! - `MalformedResponse` fails at once.
//! - Store errors fail at once; a conflict signals a local invariant violation.
//!
//! Instruments run concurrently up to `IngestOptions::concurrency`. The per-symbol
//! [`LeaseRegistry`] spans fetch and write, while the store's own per-instrument lock is
//! only taken inside the write. Retry sleeps hold neither.

mod lease;
mod report;
mod retry;

use std::{sync::Arc, time::Duration};

use futures::{StreamExt, stream};
use market_data_source::{
    models::{bar::DailyBar, window::DateWindow},
    providers::{MarketDataSource, SourceError, SourceErrorKind},
};
use tracing::{info, warn};

use crate::catalog::InstrumentSpec;
use crate::error::StoreError;
use crate::store::{TimeSeriesStore, WriteMode};

pub use lease::{AbortSignal, Lease, LeaseRegistry};
pub use report::{BatchReport, FailureReason, InstrumentReport, Outcome};
pub use retry::{Backoff, RetryPolicy};

/// Knobs for one ingestion run.
#[derive(Debug, Clone)]
pub struct IngestOptions {
    /// Inclusive date window fetched for every instrument.
    pub window: DateWindow,
    pub mode: WriteMode,
    pub retry: RetryPolicy,
    /// Instruments in flight at once. 1 runs the batch sequentially.
    pub concurrency: usize,
    /// Per-attempt fetch deadline. Hitting it counts as the source being unavailable.
    pub fetch_timeout: Option<Duration>,
}

impl IngestOptions {
    /// Replace-range writes, the observed retry policy, 4 instruments at a time.
    pub fn new(window: DateWindow) -> Self {
        Self {
            window,
            mode: WriteMode::default(),
            retry: RetryPolicy::default(),
            concurrency: 4,
            fetch_timeout: None,
        }
    }
}

enum Fetched {
    Bars(Vec<DailyBar>),
    Empty,
    Failed(FailureReason),
}

pub struct IngestionPipeline {
    source: Arc<dyn MarketDataSource>,
    store: Arc<dyn TimeSeriesStore>,
    options: IngestOptions,
    leases: LeaseRegistry,
}

impl IngestionPipeline {
    pub fn new(
        source: Arc<dyn MarketDataSource>,
        store: Arc<dyn TimeSeriesStore>,
        options: IngestOptions,
    ) -> Self {
        Self {
            source,
            store,
            options,
            leases: LeaseRegistry::new(),
        }
    }

    /// Shares `leases` with other pipelines so they can't overlap on a symbol.
    pub fn with_leases(mut self, leases: LeaseRegistry) -> Self {
        self.leases = leases;
        self
    }

    pub fn options(&self) -> &IngestOptions {
        &self.options
    }

    /// Ingests every instrument of `specs` and reports each outcome in input order.
    ///
    /// `abort` is checked before each instrument starts; instruments already running
    /// finish normally.
    pub async fn run_batch(&self, specs: &[InstrumentSpec], abort: &AbortSignal) -> BatchReport {
        info!(
            instruments = specs.len(),
            source = self.source.name(),
            mode = %self.options.mode,
            window = %self.options.window,
            "starting ingestion batch"
        );

        let mut results: Vec<(usize, Option<InstrumentReport>)> =
            stream::iter(specs.iter().enumerate())
                .map(|(idx, spec)| async move {
                    if abort.is_aborted() {
                        return (idx, None);
                    }
                    (idx, Some(self.ingest_one(spec).await))
                })
                .buffer_unordered(self.options.concurrency.max(1))
                .collect()
                .await;
        results.sort_by_key(|(idx, _)| *idx);

        let mut batch = BatchReport::default();
        for (idx, report) in results {
            match report {
                Some(r) => batch.reports.push(r),
                None => batch.not_started.push(specs[idx].symbol.clone()),
            }
        }
        batch.aborted = !batch.not_started.is_empty();

        info!(
            succeeded = batch.succeeded(),
            failed = batch.failed(),
            skipped = batch.skipped(),
            not_started = batch.not_started.len(),
            "ingestion batch finished"
        );
        batch
    }

    /// Runs one instrument through resolve, fetch, write.
    pub async fn ingest_one(&self, spec: &InstrumentSpec) -> InstrumentReport {
        let symbol = spec.symbol.as_str();
        let mut report = InstrumentReport::new(symbol);

        let Some(_lease) = self.leases.try_acquire(symbol) else {
            warn!(symbol, "lease held by another run, not ingesting");
            return report.fail(FailureReason::LeaseHeld);
        };

        // Resolve
        let store = Arc::clone(&self.store);
        let owned = spec.clone();
        let instrument = match blocking(move || store.resolve_instrument(&owned)).await {
            Ok(i) => i,
            Err(e) => {
                warn!(symbol, error = %e, "could not resolve instrument");
                return report.fail(FailureReason::Resolve {
                    message: e.to_string(),
                });
            }
        };
        report.instrument_id = Some(instrument.id);

        // Fetch
        let (fetched, attempts) = self.fetch_with_retry(symbol).await;
        report.attempts = attempts;
        let bars = match fetched {
            Fetched::Bars(bars) => bars,
            Fetched::Empty => {
                info!(symbol, attempts, "no data from source, skipping");
                return report.finish(Outcome::SkippedEmpty);
            }
            Fetched::Failed(reason) => {
                warn!(symbol, attempts, %reason, "fetch failed");
                return report.fail(reason);
            }
        };

        // Reconcile
        let window = self.options.window;
        let fetched_rows = bars.len();
        let bars: Vec<DailyBar> = bars
            .into_iter()
            .map(DailyBar::sanitized)
            .filter(|b| !b.is_blank() && window.contains(b.date))
            .collect();
        report.skipped_rows = fetched_rows - bars.len();
        if report.skipped_rows > 0 {
            warn!(symbol, skipped = report.skipped_rows, "dropped unusable rows");
        }
        if bars.is_empty() {
            return report.finish(Outcome::SkippedEmpty);
        }

        // Write
        let store = Arc::clone(&self.store);
        let (id, mode, rows) = (instrument.id, self.options.mode, bars.len());
        match blocking(move || store.write(id, mode, &window, &bars)).await {
            Ok(summary) => {
                info!(symbol, instrument_id = id, rows, ?summary, "instrument ingested");
                report.finish(Outcome::Succeeded { rows, summary })
            }
            Err(StoreError::Conflict { message, .. }) => {
                warn!(symbol, %message, "store conflict");
                report.fail(FailureReason::StoreConflict { message })
            }
            Err(e) => {
                warn!(symbol, error = %e, "write failed");
                report.fail(FailureReason::Store {
                    message: e.to_string(),
                })
            }
        }
    }

    async fn fetch_once(&self, symbol: &str) -> Result<Vec<DailyBar>, SourceError> {
        let window = self.options.window;
        match self.options.fetch_timeout {
            Some(limit) => tokio::time::timeout(limit, self.source.fetch(symbol, window))
                .await
                .unwrap_or_else(|_| {
                    Err(SourceError::unavailable(
                        symbol,
                        format!("fetch timed out after {limit:?}"),
                    ))
                }),
            None => self.source.fetch(symbol, window).await,
        }
    }

    async fn fetch_with_retry(&self, symbol: &str) -> (Fetched, u32) {
        let policy = self.options.retry;
        let max = policy.attempts();
        let mut last: Option<SourceError> = None;

        for attempt in 1..=max {
            let delay = policy.delay_before(attempt);
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }

            match self.fetch_once(symbol).await {
                Ok(bars) if !bars.is_empty() => return (Fetched::Bars(bars), attempt),
                Ok(_) => last = Some(SourceError::empty(symbol)),
                Err(e) if !e.is_retryable() => {
                    let reason = FailureReason::MalformedResponse {
                        message: e.to_string(),
                    };
                    return (Fetched::Failed(reason), attempt);
                }
                Err(e) => {
                    warn!(symbol, attempt, max, error = %e, "fetch attempt failed");
                    last = Some(e);
                }
            }
        }

        let outcome = match last {
            Some(e) if e.kind() == SourceErrorKind::Empty => Fetched::Empty,
            Some(e) => Fetched::Failed(FailureReason::SourceUnavailable {
                attempts: max,
                message: e.to_string(),
            }),
            None => Fetched::Empty,
        };
        (outcome, max)
    }
}

/// Runs a store call on the blocking pool.
async fn blocking<T, F>(f: F) -> Result<T, StoreError>
where
    F: FnOnce() -> Result<T, StoreError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| StoreError::Task(e.to_string()))?
}
