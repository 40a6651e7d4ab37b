//! # Pager and Cursor Strategies
//!
//! Turns a source's paged listing into a deduplicated stream of fresh items and
//! computes the checkpoint the next run should resume from.
//!
//! ## Strategies
//!
//! - **Incremental**: newest-first listings with a source-reported total
//!   (logs.tf, demos.tf). Items at or below the checkpoint's `last_seen_id`, and
//!   items not strictly below the lowest id emitted so far, are skipped. An item
//!   older than `since` means the listing crossed into history: the rest of the
//!   current page is still scanned, but no further page is requested.
//! - **Reverse**: discovers the newest id with a one-item listing and walks every
//!   id below it. Used for backfills; no `since` filtering applies.
//! - **Enumerate**: emits every listed id once, in listing order. Used for local
//!   collections, explicit id lists and league listings that filter server-side.
//!
//! The mid-page scan after crossing `since` is a heuristic. Ids are only
//! approximately ordered by creation time, so a slightly older id may carry a
//! newer timestamp; such items are still picked up if they share the crossing
//! page, but one that lands on a later page is missed.
//!
//! ## Termination
//!
//! - `offset >= total`
//! - the source reports a `total` smaller than the offset just requested
//! - two consecutive empty pages while `offset < total`
//! - an empty page, or a page with nothing fresh, when the source reports no total
//! - the optional item budget is spent
//!
//! Pages are pulled explicitly with [`Pager::next_page`], which returns a
//! [`PageOutcome`] rather than failing, so the driver decides what an aborted
//! listing means for the run.

use bridge_traits::{FetchError, ItemEnvelope, ItemId, Page, PageParams, SourceAdapter};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use tracing::{debug, info, warn};

use crate::checkpoint::Checkpoint;
use crate::ids::DescendingIds;
use crate::pacing::Pacer;
use crate::SyncError;

/// Consecutive empty pages tolerated while the source claims more items exist.
const MAX_EMPTY_PAGES: u32 = 2;

// ============================================================================
// Strategy
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CursorStrategy {
    Incremental,
    Reverse,
    Enumerate,
}

impl CursorStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            CursorStrategy::Incremental => "incremental",
            CursorStrategy::Reverse => "reverse",
            CursorStrategy::Enumerate => "enumerate",
        }
    }
}

impl FromStr for CursorStrategy {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "incremental" => Ok(CursorStrategy::Incremental),
            "reverse" => Ok(CursorStrategy::Reverse),
            "enumerate" => Ok(CursorStrategy::Enumerate),
            _ => Err(SyncError::InvalidStrategy(s.to_string())),
        }
    }
}

impl fmt::Display for CursorStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Options
// ============================================================================

/// Listing filters passed through to the source.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageFilters {
    /// Overrides the checkpoint's `since` when set.
    pub since: Option<i64>,
    pub until: Option<i64>,
    pub players: Vec<u64>,
    pub team: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PagerOptions {
    pub page_size: u32,
    /// Stop after this many items have been emitted.
    pub max_count: Option<u64>,
    pub filters: PageFilters,
}

impl Default for PagerOptions {
    fn default() -> Self {
        Self {
            page_size: 1000,
            max_count: None,
            filters: PageFilters::default(),
        }
    }
}

/// Result of pulling one page.
#[derive(Debug, Clone, PartialEq)]
pub enum PageOutcome {
    /// Fresh items, in the order they should be processed. Never empty.
    More(Vec<ItemEnvelope>),
    /// Listing finished.
    Done,
    /// The listing call failed; nothing further can be listed this run.
    Aborted(FetchError),
}

// ============================================================================
// Pager
// ============================================================================

pub struct Pager<'a> {
    adapter: &'a dyn SourceAdapter,
    strategy: CursorStrategy,
    start: Checkpoint,
    since: i64,
    limit: u32,
    max_count: Option<u64>,
    filters: PageFilters,

    offset: u64,
    total: Option<u64>,
    /// Lowest id emitted this run; emitted ids strictly decrease.
    low_water: Option<ItemId>,
    emitted: u64,
    empty_pages: u32,
    /// No further page may be requested.
    exhausted: bool,
    finished: bool,
    truncated: bool,
    newest: Option<i64>,
    highest: Option<ItemId>,
    seen: HashSet<ItemId>,
    ids: Option<DescendingIds>,
    top: Option<ItemId>,
    /// Lowest id whose fetch failed for a reason that may clear up.
    held_id: Option<ItemId>,
    /// Oldest creation time among held items.
    held_since: Option<i64>,
}

impl<'a> Pager<'a> {
    pub fn new(
        adapter: &'a dyn SourceAdapter,
        strategy: CursorStrategy,
        checkpoint: Checkpoint,
        options: PagerOptions,
    ) -> Self {
        let capabilities = adapter.capabilities();
        let mut limit = options.page_size.min(capabilities.max_page_size);
        if let Some(max_count) = options.max_count {
            limit = limit.min(u32::try_from(max_count).unwrap_or(u32::MAX));
        }
        let since = options.filters.since.unwrap_or(checkpoint.since);
        let offset = match strategy {
            CursorStrategy::Reverse => 0,
            _ => checkpoint.offset,
        };

        Self {
            adapter,
            strategy,
            start: checkpoint,
            since,
            limit: limit.max(1),
            max_count: options.max_count,
            filters: options.filters,
            offset,
            total: None,
            low_water: None,
            emitted: 0,
            empty_pages: 0,
            exhausted: false,
            finished: false,
            truncated: false,
            newest: None,
            highest: None,
            seen: HashSet::new(),
            ids: None,
            top: None,
            held_id: None,
            held_since: None,
        }
    }

    pub fn strategy(&self) -> CursorStrategy {
        self.strategy
    }

    /// Listing position after the items consumed so far.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Most recent source-reported total.
    pub fn total(&self) -> Option<u64> {
        self.total
    }

    pub fn emitted(&self) -> u64 {
        self.emitted
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    /// Whether the item budget stopped the listing before the source ran out.
    pub fn is_truncated(&self) -> bool {
        match self.strategy {
            CursorStrategy::Reverse => self.ids.as_ref().is_some_and(|ids| !ids.is_exhausted()),
            _ => self.truncated,
        }
    }

    /// Pull the next page of fresh items.
    pub async fn next_page(&mut self, pacer: &mut Pacer) -> PageOutcome {
        if self.finished {
            return PageOutcome::Done;
        }

        let outcome = match self.strategy {
            CursorStrategy::Incremental => self.next_incremental(pacer).await,
            CursorStrategy::Reverse => self.next_reverse(pacer).await,
            CursorStrategy::Enumerate => self.next_enumerate(pacer).await,
        };

        if !matches!(outcome, PageOutcome::More(_)) {
            self.finished = true;
        }
        outcome
    }

    /// Keep an emitted item inside the next run's window. Used for items whose
    /// fetch failed transiently, so the saved checkpoint does not pass them.
    pub fn hold(&mut self, item: &ItemEnvelope) {
        self.held_id = Some(self.held_id.map_or(item.id, |held| held.min(item.id)));
        self.held_since = Some(
            self.held_since
                .map_or(item.created_at, |held| held.min(item.created_at)),
        );
    }

    /// Checkpoint to persist if everything emitted so far gets merged.
    pub fn checkpoint(&self) -> Checkpoint {
        let old = self.start;

        if self.strategy == CursorStrategy::Reverse {
            let held = self.held_id.map_or(0, ItemId::get);
            return match self.ids.as_ref().and_then(DescendingIds::next_id) {
                Some(next) => Checkpoint {
                    offset: next.max(held),
                    ..old
                },
                None => Checkpoint {
                    since: old.since,
                    last_seen_id: old.last_seen_id.max(self.top),
                    offset: held,
                },
            };
        }

        if self.truncated {
            // Resuming mid-window would skip the held items' positions.
            let offset = if self.held_id.is_some() {
                old.offset
            } else {
                self.offset
            };
            return Checkpoint { offset, ..old };
        }

        let mut since = self.newest.map_or(old.since, |newest| newest.max(old.since));
        let mut last_seen_id = old.last_seen_id.max(self.highest);
        if let Some(held) = self.held_id {
            if last_seen_id >= Some(held) {
                last_seen_id = Some(ItemId(held.get().saturating_sub(1))).filter(|id| id.get() > 0);
            }
            last_seen_id = last_seen_id.max(old.last_seen_id);
        }
        if let Some(held_since) = self.held_since {
            since = since.min(held_since).max(old.since);
        }

        Checkpoint {
            since,
            last_seen_id,
            offset: 0,
        }
    }

    // ------------------------------------------------------------------------
    // Strategies
    // ------------------------------------------------------------------------

    async fn next_incremental(&mut self, pacer: &mut Pacer) -> PageOutcome {
        let floor = self.start.last_seen_id;

        loop {
            if self.exhausted || self.reached_total() {
                return PageOutcome::Done;
            }
            if self.budget_spent() {
                self.mark_truncated();
                return PageOutcome::Done;
            }

            let requested = self.offset;
            let page = match self.list(pacer, self.page_params(requested)).await {
                Ok(page) => page,
                Err(e) => return PageOutcome::Aborted(e),
            };
            if !self.accept_total(&page, requested) {
                return PageOutcome::Done;
            }

            let skipped = page.skipped;
            if page.items.is_empty() {
                if skipped > 0 {
                    self.empty_pages = 0;
                    self.skip_positions(requested, skipped);
                    continue;
                }
                if !self.tolerate_empty_page(requested) {
                    return PageOutcome::Done;
                }
                continue;
            }
            self.empty_pages = 0;

            let mut fresh = Vec::new();
            let mut stopped_early = false;
            for item in page.items {
                self.offset += 1;

                let already_merged = floor.is_some_and(|floor| item.id <= floor);
                let out_of_order = self.low_water.is_some_and(|low| item.id >= low);
                if already_merged || out_of_order {
                    continue;
                }

                if item.created_at >= self.since {
                    self.low_water = Some(item.id);
                    self.record(&item);
                    fresh.push(item);
                    if self.budget_spent() {
                        stopped_early = true;
                        break;
                    }
                } else if !self.exhausted {
                    debug!(
                        source = %self.adapter.source_id(),
                        item_id = %item.id,
                        created_at = item.created_at,
                        since = self.since,
                        "Listing crossed the since bound, finishing current page"
                    );
                    self.exhausted = true;
                }
            }
            if !stopped_early {
                self.skip_positions(requested, skipped);
            }

            if !fresh.is_empty() {
                return PageOutcome::More(fresh);
            }
            if self.total.is_none() {
                debug!(source = %self.adapter.source_id(), offset = self.offset, "Page had no fresh items");
                return PageOutcome::Done;
            }
        }
    }

    async fn next_reverse(&mut self, pacer: &mut Pacer) -> PageOutcome {
        if self.ids.is_none() {
            let ids = if self.start.offset > 0 {
                info!(
                    source = %self.adapter.source_id(),
                    resume_from = self.start.offset,
                    "Resuming reverse scan"
                );
                DescendingIds::new(self.start.offset, 1)
            } else {
                let page = match self.list(pacer, PageParams::new(0, 1)).await {
                    Ok(page) => page,
                    Err(e) => return PageOutcome::Aborted(e),
                };
                let Some(top) = page.items.iter().map(|item| item.id).max() else {
                    return PageOutcome::Done;
                };
                info!(source = %self.adapter.source_id(), top = %top, "Starting reverse scan");
                self.top = Some(top);
                DescendingIds::new(top.get(), 1)
            };
            self.ids = Some(ids);
        }

        let mut chunk_size = u64::from(self.limit);
        if let Some(remaining) = self.remaining_budget() {
            chunk_size = chunk_size.min(remaining);
        }
        let Some(ids) = self.ids.as_mut() else {
            return PageOutcome::Done;
        };
        let chunk = ids.take_chunk(usize::try_from(chunk_size).unwrap_or(usize::MAX));
        if chunk.is_empty() {
            return PageOutcome::Done;
        }

        let items: Vec<ItemEnvelope> = chunk
            .into_iter()
            .map(|id| ItemEnvelope::new(id, 0, serde_json::Value::Null))
            .collect();
        for item in &items {
            self.record(item);
        }
        self.offset += items.len() as u64;
        PageOutcome::More(items)
    }

    async fn next_enumerate(&mut self, pacer: &mut Pacer) -> PageOutcome {
        loop {
            if self.reached_total() {
                return PageOutcome::Done;
            }
            if self.budget_spent() {
                self.mark_truncated();
                return PageOutcome::Done;
            }

            let requested = self.offset;
            let page = match self.list(pacer, self.page_params(requested)).await {
                Ok(page) => page,
                Err(e) => return PageOutcome::Aborted(e),
            };
            if !self.accept_total(&page, requested) {
                return PageOutcome::Done;
            }
            let skipped = page.skipped;
            if page.items.is_empty() {
                if skipped == 0 {
                    return PageOutcome::Done;
                }
                self.skip_positions(requested, skipped);
                continue;
            }

            let mut fresh = Vec::new();
            let mut stopped_early = false;
            for item in page.items {
                self.offset += 1;
                if !self.seen.insert(item.id) {
                    continue;
                }
                self.record(&item);
                fresh.push(item);
                if self.budget_spent() {
                    stopped_early = true;
                    break;
                }
            }
            if !stopped_early {
                self.skip_positions(requested, skipped);
            }

            if !fresh.is_empty() {
                return PageOutcome::More(fresh);
            }
            if self.total.is_none() {
                return PageOutcome::Done;
            }
        }
    }

    // ------------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------------

    async fn list(&self, pacer: &mut Pacer, params: PageParams) -> Result<Page, FetchError> {
        pacer.wait().await;
        debug!(
            source = %self.adapter.source_id(),
            offset = params.offset,
            limit = params.limit,
            "Listing page"
        );

        self.adapter.list_page(&params).await.map_err(|e| {
            warn!(
                source = %self.adapter.source_id(),
                offset = params.offset,
                error = %e,
                "Listing call failed"
            );
            e
        })
    }

    fn page_params(&self, offset: u64) -> PageParams {
        PageParams {
            offset,
            limit: self.limit,
            since: (self.since > 0).then_some(self.since),
            until: self.filters.until,
            players: self.filters.players.clone(),
            team: self.filters.team,
        }
    }

    /// Record the page's total. Returns `false` when the total shrank below the
    /// offset just requested.
    fn accept_total(&mut self, page: &Page, requested: u64) -> bool {
        let Some(total) = page.total else {
            return true;
        };
        if total < requested {
            warn!(
                source = %self.adapter.source_id(),
                total,
                offset = requested,
                "Source reported fewer items than already listed, stopping"
            );
            return false;
        }
        self.total = Some(total);
        true
    }

    /// Count an empty page. Returns `true` if another attempt at the same
    /// offset is allowed.
    fn tolerate_empty_page(&mut self, requested: u64) -> bool {
        match self.total {
            Some(total) if requested < total => {
                self.empty_pages += 1;
                if self.empty_pages >= MAX_EMPTY_PAGES {
                    warn!(
                        source = %self.adapter.source_id(),
                        offset = requested,
                        total,
                        empty_pages = self.empty_pages,
                        "Source stopped making progress, stopping"
                    );
                    return false;
                }
                debug!(
                    source = %self.adapter.source_id(),
                    offset = requested,
                    total,
                    "Empty page before reported total"
                );
                true
            }
            _ => false,
        }
    }

    /// Move the offset past listing positions that produced no item. Skipped
    /// positions interleave with items, so after a budget stop they are left
    /// for the next call to list again.
    fn skip_positions(&mut self, requested: u64, skipped: u64) {
        if skipped == 0 {
            return;
        }
        debug!(
            source = %self.adapter.source_id(),
            offset = requested,
            skipped,
            "Advancing past unidentified listing entries"
        );
        self.offset += skipped;
    }

    fn record(&mut self, item: &ItemEnvelope) {
        self.emitted += 1;
        self.highest = self.highest.max(Some(item.id));
        self.newest = self.newest.max(Some(item.created_at));
    }

    fn reached_total(&self) -> bool {
        self.total.is_some_and(|total| self.offset >= total)
    }

    fn remaining_budget(&self) -> Option<u64> {
        self.max_count
            .map(|max_count| max_count.saturating_sub(self.emitted))
    }

    fn budget_spent(&self) -> bool {
        self.remaining_budget() == Some(0)
    }

    fn mark_truncated(&mut self) {
        self.truncated = !self.exhausted && !self.reached_total();
        if self.truncated {
            info!(
                source = %self.adapter.source_id(),
                emitted = self.emitted,
                offset = self.offset,
                "Item budget reached"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strategy_parsing() {
        assert_eq!(
            "incremental".parse::<CursorStrategy>().unwrap(),
            CursorStrategy::Incremental
        );
        assert_eq!(
            "REVERSE".parse::<CursorStrategy>().unwrap(),
            CursorStrategy::Reverse
        );
        assert_eq!(CursorStrategy::Enumerate.to_string(), "enumerate");
        assert!(matches!(
            "sideways".parse::<CursorStrategy>(),
            Err(SyncError::InvalidStrategy(_))
        ));
    }
}
