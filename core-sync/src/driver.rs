//! # Sync Driver
//!
//! Runs one source end to end: list, fetch, normalize, merge, checkpoint.
//!
//! ## Workflow
//!
//! 1. Register the source; a second concurrent run of the same source is refused
//! 2. Record a new run and load the source's checkpoint
//! 3. Pull pages from the [`Pager`] until it reports `Done`
//! 4. Fetch and normalize each fresh item; item failures are logged and skipped
//! 5. Merge every `batch_size` items in one transaction
//! 6. Persist the pager's checkpoint, unless a batch rolled back
//!
//! A listing failure aborts the run. Cancellation and the optional run timeout
//! stop the run between awaits; neither persists a checkpoint or the batch
//! being built. Batches already committed stay committed, and re-merging them on
//! the next run is a no-op.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use core_sync::{CursorStrategy, DriverConfig, SyncDriver, SyncRequest};
//! use tokio_util::sync::CancellationToken;
//!
//! let driver = SyncDriver::new(pool, event_bus, DriverConfig::default());
//! let request = SyncRequest::new(adapter, normalizer, CursorStrategy::Incremental)
//!     .with_settings(config.source_settings("logs.tf"));
//!
//! let report = driver.run(request, CancellationToken::new()).await?;
//! println!("merged {} items", report.stats.items_merged);
//! ```

use bridge_traits::{ItemId, SourceAdapter, SourceId};
use core_runtime::config::{ImporterConfig, SourceSettings};
use core_runtime::events::{CoreEvent, EventBus, StoreEvent, SyncEvent};
use core_store::{MergePipeline, Record, RecordNormalizer, RecordStore};
use sqlx::SqlitePool;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::checkpoint::{Checkpoint, CheckpointStore, SqliteCheckpointStore};
use crate::fetch::{attempts, ItemFetchStage};
use crate::job::{RunStats, RunStatus, SyncRun, SyncRunId};
use crate::pacing::Pacer;
use crate::pager::{CursorStrategy, PageFilters, PageOutcome, Pager, PagerOptions};
use crate::repository::{SqliteSyncRunRepository, SyncRunRepository};
use crate::{Result, SyncError};

// ============================================================================
// Configuration
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverConfig {
    /// Items merged per transaction
    pub batch_size: usize,
    /// Upper bound on a whole run
    pub run_timeout: Option<Duration>,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            batch_size: 100,
            run_timeout: None,
        }
    }
}

impl From<&ImporterConfig> for DriverConfig {
    fn from(config: &ImporterConfig) -> Self {
        Self {
            batch_size: config.batch_size,
            run_timeout: config.run_timeout,
        }
    }
}

/// Everything one run needs to know about its source.
#[derive(Clone)]
pub struct SyncRequest {
    pub adapter: Arc<dyn SourceAdapter>,
    pub normalizer: Arc<dyn RecordNormalizer>,
    pub strategy: CursorStrategy,
    pub filters: PageFilters,
    pub page_size: u32,
    pub max_count: Option<u64>,
    /// Minimum gap between requests; ignored for local sources.
    pub pacing_delay: Duration,
}

impl SyncRequest {
    pub fn new(
        adapter: Arc<dyn SourceAdapter>,
        normalizer: Arc<dyn RecordNormalizer>,
        strategy: CursorStrategy,
    ) -> Self {
        let page_size = adapter.capabilities().max_page_size;
        Self {
            adapter,
            normalizer,
            strategy,
            filters: PageFilters::default(),
            page_size,
            max_count: None,
            pacing_delay: Duration::ZERO,
        }
    }

    pub fn with_settings(mut self, settings: &SourceSettings) -> Self {
        self.page_size = settings.page_size;
        self.max_count = settings.max_count;
        self.pacing_delay = settings.pacing_delay;
        self
    }

    pub fn with_filters(mut self, filters: PageFilters) -> Self {
        self.filters = filters;
        self
    }

    pub fn with_max_count(mut self, max_count: u64) -> Self {
        self.max_count = Some(max_count);
        self
    }

    pub fn with_pacing_delay(mut self, delay: Duration) -> Self {
        self.pacing_delay = delay;
        self
    }

    pub fn source_id(&self) -> &SourceId {
        self.adapter.source_id()
    }

    fn pager_options(&self) -> PagerOptions {
        PagerOptions {
            page_size: self.page_size,
            max_count: self.max_count,
            filters: self.filters.clone(),
        }
    }
}

// ============================================================================
// Reports
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemResult {
    Merged,
    FetchFailed { attempts: u32, message: String },
    ParseFailed { message: String },
    MergeFailed { message: String },
}

impl ItemResult {
    pub fn is_failure(&self) -> bool {
        !matches!(self, ItemResult::Merged)
    }

    pub fn stage(&self) -> &'static str {
        match self {
            ItemResult::Merged => "merged",
            ItemResult::FetchFailed { .. } => "fetch",
            ItemResult::ParseFailed { .. } => "parse",
            ItemResult::MergeFailed { .. } => "merge",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemOutcome {
    pub id: ItemId,
    pub result: ItemResult,
}

/// Summary of a finished run.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub run_id: SyncRunId,
    pub source: SourceId,
    pub strategy: CursorStrategy,
    pub status: RunStatus,
    pub stats: RunStats,
    /// Checkpoint persisted by this run; `None` when a batch rolled back.
    pub checkpoint: Option<Checkpoint>,
    /// Per-item results in processing order.
    pub outcomes: Vec<ItemOutcome>,
    pub duration: Duration,
}

impl RunReport {
    pub fn merged_ids(&self) -> Vec<ItemId> {
        self.outcomes
            .iter()
            .filter(|outcome| outcome.result == ItemResult::Merged)
            .map(|outcome| outcome.id)
            .collect()
    }

    pub fn failures(&self) -> impl Iterator<Item = &ItemOutcome> {
        self.outcomes
            .iter()
            .filter(|outcome| outcome.result.is_failure())
    }
}

// ============================================================================
// Run State
// ============================================================================

struct RunState {
    run: SyncRun,
    outcomes: Vec<ItemOutcome>,
    saved: Option<Checkpoint>,
}

#[derive(Default)]
struct PendingBatch {
    items: Vec<ItemId>,
    records: Vec<Record>,
}

impl PendingBatch {
    fn push(&mut self, id: ItemId, records: Vec<Record>) {
        self.items.push(id);
        self.records.extend(records);
    }

    fn len(&self) -> usize {
        self.items.len()
    }

    fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

type ActiveRuns = Arc<Mutex<HashMap<SourceId, CancellationToken>>>;

/// Removes the source from the active set when the run ends, however it ends.
struct RunGuard {
    active: ActiveRuns,
    source: SourceId,
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        let mut active = self.active.lock().unwrap_or_else(|e| e.into_inner());
        active.remove(&self.source);
    }
}

// ============================================================================
// Driver
// ============================================================================

pub struct SyncDriver {
    store: Arc<dyn RecordStore>,
    checkpoints: Arc<dyn CheckpointStore>,
    runs: Arc<dyn SyncRunRepository>,
    event_bus: EventBus,
    config: DriverConfig,
    active: ActiveRuns,
}

impl SyncDriver {
    pub fn new(pool: SqlitePool, event_bus: EventBus, config: DriverConfig) -> Self {
        Self::with_components(
            Arc::new(MergePipeline::new(pool.clone())),
            Arc::new(SqliteCheckpointStore::new(pool.clone())),
            Arc::new(SqliteSyncRunRepository::new(pool)),
            event_bus,
            config,
        )
    }

    pub fn with_components(
        store: Arc<dyn RecordStore>,
        checkpoints: Arc<dyn CheckpointStore>,
        runs: Arc<dyn SyncRunRepository>,
        event_bus: EventBus,
        config: DriverConfig,
    ) -> Self {
        Self {
            store,
            checkpoints,
            runs,
            event_bus,
            config: DriverConfig {
                batch_size: config.batch_size.max(1),
                ..config
            },
            active: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Run one source to completion.
    ///
    /// # Errors
    ///
    /// - [`SyncError::SyncInProgress`] if the source is already running
    /// - [`SyncError::Listing`] if a listing call failed
    /// - [`SyncError::Cancelled`] / [`SyncError::Timeout`] if the run was stopped
    /// - [`SyncError::Database`] if run or checkpoint bookkeeping failed
    #[instrument(skip(self, request, cancel), fields(source = %request.source_id(), strategy = %request.strategy))]
    pub async fn run(&self, request: SyncRequest, cancel: CancellationToken) -> Result<RunReport> {
        let source = request.source_id().clone();
        let token = cancel.child_token();
        let _guard = self.register(&source, token.clone())?;

        let mut run = SyncRun::new(source.clone(), request.strategy);
        self.runs.insert(&run).await?;
        run.begin()?;
        self.runs.update(&run).await?;

        info!(run_id = %run.id, "Sync started");
        self.emit(CoreEvent::Sync(SyncEvent::Started {
            run_id: run.id.to_string(),
            source: source.to_string(),
            strategy: request.strategy.to_string(),
        }));

        let mut state = RunState {
            run,
            outcomes: Vec::new(),
            saved: None,
        };
        let started = Instant::now();

        let result = match self.config.run_timeout {
            Some(limit) => match timeout(limit, self.execute(&request, &mut state, &token)).await {
                Ok(result) => result,
                Err(_) => Err(SyncError::Timeout(limit.as_secs())),
            },
            None => self.execute(&request, &mut state, &token).await,
        };

        self.finish(state, result, started.elapsed()).await
    }

    /// Request cancellation of the source's active run. Returns whether one was running.
    pub fn cancel(&self, source: &SourceId) -> bool {
        let active = self.active.lock().unwrap_or_else(|e| e.into_inner());
        match active.get(source) {
            Some(token) => {
                info!(source = %source, "Cancelling sync");
                token.cancel();
                true
            }
            None => false,
        }
    }

    pub fn is_running(&self, source: &SourceId) -> bool {
        let active = self.active.lock().unwrap_or_else(|e| e.into_inner());
        active.contains_key(source)
    }

    /// Past runs of a source, most recent first.
    pub async fn history(&self, source: &SourceId, limit: u32) -> Result<Vec<SyncRun>> {
        self.runs.find_by_source(source, limit).await
    }

    pub async fn checkpoint(&self, source: &SourceId) -> Result<Option<Checkpoint>> {
        self.checkpoints.load(source).await
    }

    // ------------------------------------------------------------------------
    // Run loop
    // ------------------------------------------------------------------------

    async fn execute(
        &self,
        request: &SyncRequest,
        state: &mut RunState,
        token: &CancellationToken,
    ) -> Result<()> {
        let adapter = request.adapter.as_ref();
        let source = adapter.source_id().clone();
        let run_id = state.run.id.to_string();

        let checkpoint = self.checkpoints.load(&source).await?.unwrap_or_default();
        debug!(
            since = checkpoint.since,
            last_seen_id = ?checkpoint.last_seen_id,
            offset = checkpoint.offset,
            "Loaded checkpoint"
        );

        let mut pacer = if adapter.capabilities().remote {
            Pacer::new(request.pacing_delay)
        } else {
            Pacer::disabled()
        };
        let mut pager = Pager::new(adapter, request.strategy, checkpoint, request.pager_options());
        let fetcher = ItemFetchStage::new(adapter);
        let mut batch = PendingBatch::default();
        let mut merge_failed = false;

        loop {
            state.run.enter(RunStatus::Listing)?;
            let outcome = tokio::select! {
                biased;
                _ = token.cancelled() => return Err(SyncError::Cancelled),
                outcome = pager.next_page(&mut pacer) => outcome,
            };
            let items = match outcome {
                PageOutcome::More(items) => items,
                PageOutcome::Done => break,
                PageOutcome::Aborted(e) => return Err(SyncError::Listing(e)),
            };

            state.run.stats.items_listed += items.len() as u64;
            debug!(offset = pager.offset(), total = ?pager.total(), fresh = items.len(), "Page listed");
            self.emit(CoreEvent::Sync(SyncEvent::PageListed {
                run_id: run_id.clone(),
                source: source.to_string(),
                offset: pager.offset(),
                total: pager.total(),
                fresh_items: items.len() as u64,
            }));

            state.run.enter(RunStatus::FetchingItem)?;
            for item in items {
                if token.is_cancelled() {
                    return Err(SyncError::Cancelled);
                }

                let fetched = tokio::select! {
                    biased;
                    _ = token.cancelled() => return Err(SyncError::Cancelled),
                    result = fetcher.fetch(&item, &mut pacer) => result,
                };
                let payload = match fetched {
                    Ok(payload) => payload,
                    Err(e) => {
                        if e.is_temporary() {
                            debug!(item_id = %item.id, "Holding checkpoint below item");
                            pager.hold(&item);
                        }
                        self.item_failed(
                            state,
                            item.id,
                            ItemResult::FetchFailed {
                                attempts: attempts(&e),
                                message: e.to_string(),
                            },
                        );
                        continue;
                    }
                };
                state.run.stats.items_fetched += 1;

                match request.normalizer.normalize(&payload) {
                    Ok(records) => batch.push(item.id, records),
                    Err(e) => {
                        self.item_failed(
                            state,
                            item.id,
                            ItemResult::ParseFailed { message: e.message },
                        );
                        continue;
                    }
                }

                if batch.len() >= self.config.batch_size {
                    state.run.enter(RunStatus::Merging)?;
                    merge_failed |= !self.flush(state, &mut batch).await;
                    self.runs.update(&state.run).await?;
                    state.run.enter(RunStatus::FetchingItem)?;
                }
            }
        }

        if !batch.is_empty() {
            state.run.enter(RunStatus::Merging)?;
            merge_failed |= !self.flush(state, &mut batch).await;
        }

        if merge_failed {
            warn!(
                batches_failed = state.run.stats.batches_failed,
                "Checkpoint not advanced because a batch rolled back"
            );
            return Ok(());
        }

        let next = pager.checkpoint();
        self.checkpoints.save(&source, &next).await?;
        info!(
            since = next.since,
            last_seen_id = ?next.last_seen_id,
            offset = next.offset,
            "Checkpoint saved"
        );
        self.emit(CoreEvent::Store(StoreEvent::CheckpointSaved {
            source: source.to_string(),
            since: next.since,
            last_seen_id: next.last_seen_id.map(ItemId::get),
            offset: next.offset,
        }));
        state.saved = Some(next);

        Ok(())
    }

    /// Merge the pending batch. Returns `false` if it rolled back.
    async fn flush(&self, state: &mut RunState, batch: &mut PendingBatch) -> bool {
        let PendingBatch { items, records } = std::mem::take(batch);
        let count = items.len() as u64;
        let run_id = state.run.id.to_string();
        let source = state.run.source.to_string();

        match self.store.merge(&records).await {
            Ok(report) => {
                debug!(
                    items = count,
                    records = report.records,
                    logs = report.logs_inserted,
                    demos = report.demos_inserted,
                    "Batch committed"
                );
                state.run.stats.items_merged += count;
                state.run.stats.batches_committed += 1;
                state.outcomes.extend(items.into_iter().map(|id| ItemOutcome {
                    id,
                    result: ItemResult::Merged,
                }));
                self.emit(CoreEvent::Sync(SyncEvent::BatchCommitted {
                    run_id,
                    source,
                    items: count,
                }));
                true
            }
            Err(e) => {
                let message = e.to_string();
                warn!(items = count, error = %message, "Batch rolled back");
                state.run.stats.items_failed += count;
                state.run.stats.batches_failed += 1;
                state.outcomes.extend(items.into_iter().map(|id| ItemOutcome {
                    id,
                    result: ItemResult::MergeFailed {
                        message: message.clone(),
                    },
                }));
                self.emit(CoreEvent::Sync(SyncEvent::BatchRolledBack {
                    run_id,
                    source,
                    items: count,
                    message,
                }));
                false
            }
        }
    }

    fn item_failed(&self, state: &mut RunState, id: ItemId, result: ItemResult) {
        let (attempts, message) = match &result {
            ItemResult::FetchFailed { attempts, message } => (*attempts, message.clone()),
            ItemResult::ParseFailed { message } | ItemResult::MergeFailed { message } => {
                (1, message.clone())
            }
            ItemResult::Merged => return,
        };

        warn!(
            item_id = %id,
            stage = result.stage(),
            attempts,
            error = %message,
            "Skipping item"
        );
        state.run.stats.items_failed += 1;
        self.emit(CoreEvent::Sync(SyncEvent::ItemFailed {
            run_id: state.run.id.to_string(),
            source: state.run.source.to_string(),
            item_id: id.get(),
            stage: result.stage().to_string(),
            attempts,
            message,
        }));
        state.outcomes.push(ItemOutcome { id, result });
    }

    async fn finish(
        &self,
        mut state: RunState,
        result: Result<()>,
        duration: Duration,
    ) -> Result<RunReport> {
        let run_id = state.run.id.to_string();
        let source = state.run.source.to_string();
        let stats = state.run.stats;

        let result = match result {
            Ok(()) => {
                state.run.complete()?;
                info!(
                    run_id = %run_id,
                    merged = stats.items_merged,
                    failed = stats.items_failed,
                    duration_ms = duration.as_millis() as u64,
                    "Sync completed"
                );
                self.emit(CoreEvent::Sync(SyncEvent::Completed {
                    run_id: run_id.clone(),
                    source: source.clone(),
                    items_merged: stats.items_merged,
                    items_failed: stats.items_failed,
                    duration_secs: duration.as_secs(),
                }));
                Ok(())
            }
            Err(SyncError::Cancelled) => {
                state.run.cancel()?;
                info!(run_id = %run_id, merged = stats.items_merged, "Sync cancelled");
                self.emit(CoreEvent::Sync(SyncEvent::Cancelled {
                    run_id: run_id.clone(),
                    source: source.clone(),
                    items_merged: stats.items_merged,
                }));
                Err(SyncError::Cancelled)
            }
            Err(e) => {
                let message = e.to_string();
                state.run.fail(message.clone())?;
                error!(run_id = %run_id, error = %message, "Sync failed");
                self.emit(CoreEvent::Sync(SyncEvent::Failed {
                    run_id: run_id.clone(),
                    source: source.clone(),
                    message,
                    items_merged: stats.items_merged,
                }));
                Err(e)
            }
        };

        if let Err(e) = self.runs.update(&state.run).await {
            warn!(run_id = %run_id, error = %e, "Failed to persist run record");
        }

        result.map(|()| RunReport {
            run_id: state.run.id,
            source: state.run.source,
            strategy: state.run.strategy,
            status: state.run.status,
            stats: state.run.stats,
            checkpoint: state.saved,
            outcomes: state.outcomes,
            duration,
        })
    }

    fn register(&self, source: &SourceId, token: CancellationToken) -> Result<RunGuard> {
        let mut active = self.active.lock().unwrap_or_else(|e| e.into_inner());
        if active.contains_key(source) {
            warn!(source = %source, "Sync already in progress");
            return Err(SyncError::SyncInProgress {
                source_id: source.to_string(),
            });
        }
        active.insert(source.clone(), token);

        Ok(RunGuard {
            active: Arc::clone(&self.active),
            source: source.clone(),
        })
    }

    fn emit(&self, event: CoreEvent) {
        self.event_bus.emit(event).ok();
    }
}
