//! # Player Profile Refresh
//!
//! Walks the stored players in batches and replaces their display name and avatar
//! with what the player directory currently reports. Names are interned, so a
//! refreshed name never rewrites the name recorded against past logs.
//!
//! A failed batch is logged and skipped. A client error other than 429 means the
//! request itself is wrong (bad key, bad parameters) and every later batch would
//! fail the same way, so the walk aborts.

use bridge_traits::{FetchError, ProfileSource};
use core_runtime::events::{CoreEvent, EventBus, StoreEvent};
use core_store::{PlayerDirectory, PlayerRecord, Record, RecordStore, SteamId};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::pacing::Pacer;
use crate::{Result, SyncError};

/// Largest batch any supported directory accepts.
const MAX_BATCH: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerWalk {
    /// Every stored player, in ascending id order.
    Full,
    /// One batch of randomly chosen players.
    Random,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RefreshReport {
    pub batches: u64,
    pub players_updated: u64,
    pub failed_batches: u64,
}

pub struct PlayerRefresh {
    directory: Arc<dyn PlayerDirectory>,
    profiles: Arc<dyn ProfileSource>,
    store: Arc<dyn RecordStore>,
    event_bus: EventBus,
    pacing_delay: Duration,
}

impl PlayerRefresh {
    pub fn new(
        directory: Arc<dyn PlayerDirectory>,
        profiles: Arc<dyn ProfileSource>,
        store: Arc<dyn RecordStore>,
        event_bus: EventBus,
    ) -> Self {
        Self {
            directory,
            profiles,
            store,
            event_bus,
            pacing_delay: Duration::ZERO,
        }
    }

    pub fn with_pacing_delay(mut self, delay: Duration) -> Self {
        self.pacing_delay = delay;
        self
    }

    fn batch_size(&self) -> usize {
        self.profiles.max_batch().clamp(1, MAX_BATCH)
    }

    /// # Errors
    ///
    /// - [`SyncError::Refresh`] if the directory rejected a request outright
    /// - [`SyncError::Cancelled`] if `cancel` fired between batches
    /// - [`SyncError::Database`] if the player table could not be read
    #[instrument(skip(self, cancel))]
    pub async fn run(&self, walk: PlayerWalk, cancel: &CancellationToken) -> Result<RefreshReport> {
        let limit = self.batch_size() as u32;
        let mut pacer = Pacer::new(self.pacing_delay);
        let mut report = RefreshReport::default();

        match walk {
            PlayerWalk::Random => {
                let ids = self.directory.random_steamids(limit).await?;
                if !ids.is_empty() {
                    self.refresh_batch(&ids, &mut pacer, &mut report, cancel)
                        .await?;
                }
            }
            PlayerWalk::Full => {
                let mut after = 0;
                loop {
                    let ids = self.directory.steamids_after(after, limit).await?;
                    let Some(&last) = ids.last() else {
                        break;
                    };
                    self.refresh_batch(&ids, &mut pacer, &mut report, cancel)
                        .await?;
                    after = last;
                }
            }
        }

        info!(
            batches = report.batches,
            updated = report.players_updated,
            failed_batches = report.failed_batches,
            "Player refresh finished"
        );
        self.event_bus
            .emit(CoreEvent::Store(StoreEvent::PlayersRefreshed {
                updated: report.players_updated,
                failed_batches: report.failed_batches,
            }))
            .ok();

        Ok(report)
    }

    async fn refresh_batch(
        &self,
        ids: &[u64],
        pacer: &mut Pacer,
        report: &mut RefreshReport,
        cancel: &CancellationToken,
    ) -> Result<()> {
        report.batches += 1;

        let fetched = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(SyncError::Cancelled),
            result = async {
                pacer.wait().await;
                self.profiles.fetch_profiles(ids).await
            } => result,
        };

        let summaries = match fetched {
            Ok(summaries) => summaries,
            Err(e) if is_rejected(&e) => {
                warn!(error = %e, "Player directory rejected the request, aborting refresh");
                return Err(SyncError::Refresh(e));
            }
            Err(e) => {
                warn!(batch = report.batches, players = ids.len(), error = %e, "Skipping player batch");
                report.failed_batches += 1;
                return Ok(());
            }
        };

        let records: Vec<Record> = summaries
            .into_iter()
            .filter_map(|summary| match SteamId::from_u64(summary.steamid64) {
                Ok(steamid) => Some(Record::Player(PlayerRecord {
                    steamid,
                    name: summary.display_name,
                    avatar_hash: summary.avatar_hash,
                })),
                Err(e) => {
                    warn!(steamid = summary.steamid64, error = %e, "Ignoring profile");
                    None
                }
            })
            .collect();

        if records.is_empty() {
            debug!(batch = report.batches, "No profiles returned");
            return Ok(());
        }

        match self.store.merge(&records).await {
            Ok(merged) => {
                debug!(batch = report.batches, players = merged.players_written, "Profiles merged");
                report.players_updated += records.len() as u64;
            }
            Err(e) => {
                warn!(batch = report.batches, error = %e, "Profile batch rolled back");
                report.failed_batches += 1;
            }
        }

        Ok(())
    }
}

/// Client errors other than rate limiting will not succeed on any later batch.
fn is_rejected(err: &FetchError) -> bool {
    matches!(err.status(), Some(status) if (400..500).contains(&status) && status != 429)
}
