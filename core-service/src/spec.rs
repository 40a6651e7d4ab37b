//! Source specifications.
//!
//! A [`SourceSpec`] names one walk over one source. The service turns it into
//! an adapter, a normalizer and a cursor strategy.

use bridge_traits::{HttpClient, RetryPolicy, SourceAdapter, SourceId};
use core_store::RecordNormalizer;
use core_sync::{CursorStrategy, PageFilters};
use provider_demos_tf::{DemosTfNormalizer, DemosTfSource};
use provider_etf2l::{Etf2lFeed, Etf2lSource, ResultNormalizer, TransferNormalizer};
use provider_local::{IdListSource, JsonDirectorySource, SnapshotSource};
use provider_logs_tf::{LogsTfNormalizer, LogsTfSource};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum SourceSpec {
    /// logs.tf newest first, optionally restricted to logs with all of `players`.
    LogsBulk {
        #[serde(default)]
        players: Vec<u64>,
        /// Overrides the checkpoint's lower time bound
        #[serde(default)]
        since: Option<i64>,
    },
    /// logs.tf by descending id from the current maximum.
    LogsReverse,
    /// Specific logs.tf ids.
    LogsList { ids: Vec<u64> },
    /// A directory of `<logid>.json` documents.
    LogsDirectory { path: PathBuf },
    /// A clone_logs SQLite snapshot.
    LogsSnapshot { path: PathBuf },
    /// demos.tf newest first within an optional time window.
    DemosBulk {
        #[serde(default)]
        since: Option<i64>,
        #[serde(default)]
        until: Option<i64>,
    },
    /// Specific demos.tf ids.
    DemosList { ids: Vec<u64> },
    /// A directory of `<demoid>.json` documents.
    DemosDirectory { path: PathBuf },
    /// ETF2L match results.
    Etf2lResults {
        #[serde(default)]
        since: Option<i64>,
    },
    /// ETF2L transfer history of one team.
    Etf2lTransfers { teamid: u64 },
}

/// A spec resolved against a transport.
pub(crate) struct ResolvedSource {
    pub adapter: Arc<dyn SourceAdapter>,
    pub normalizer: Arc<dyn RecordNormalizer>,
    pub strategy: CursorStrategy,
    pub filters: PageFilters,
}

impl SourceSpec {
    /// Source id the spec's checkpoint and run history are kept under.
    pub fn source_id(&self) -> SourceId {
        SourceId::new(match self {
            SourceSpec::LogsBulk { players, .. } if players.is_empty() => {
                provider_logs_tf::SOURCE_ID.to_string()
            }
            SourceSpec::LogsBulk { players, .. } => {
                let mut players = players.clone();
                players.sort_unstable();
                players.dedup();
                let players = players
                    .iter()
                    .map(u64::to_string)
                    .collect::<Vec<_>>()
                    .join(",");
                format!("{}?player={}", provider_logs_tf::SOURCE_ID, players)
            }
            SourceSpec::LogsReverse => format!("{}/reverse", provider_logs_tf::SOURCE_ID),
            SourceSpec::LogsList { .. } => format!("{}/list", provider_logs_tf::SOURCE_ID),
            SourceSpec::LogsDirectory { path } => {
                format!("{}/files:{}", provider_logs_tf::SOURCE_ID, path.display())
            }
            SourceSpec::LogsSnapshot { path } => {
                format!("{}/snapshot:{}", provider_logs_tf::SOURCE_ID, path.display())
            }
            SourceSpec::DemosBulk { .. } => provider_demos_tf::SOURCE_ID.to_string(),
            SourceSpec::DemosList { .. } => format!("{}/list", provider_demos_tf::SOURCE_ID),
            SourceSpec::DemosDirectory { path } => {
                format!("{}/files:{}", provider_demos_tf::SOURCE_ID, path.display())
            }
            SourceSpec::Etf2lResults { .. } => Etf2lFeed::Results.source_id(),
            SourceSpec::Etf2lTransfers { teamid } => {
                Etf2lFeed::Transfers { teamid: *teamid }.source_id()
            }
        })
    }

    /// Settings key shared by every walk over the same upstream.
    pub fn provider(&self) -> &'static str {
        match self {
            SourceSpec::LogsBulk { .. }
            | SourceSpec::LogsReverse
            | SourceSpec::LogsList { .. }
            | SourceSpec::LogsDirectory { .. }
            | SourceSpec::LogsSnapshot { .. } => provider_logs_tf::SOURCE_ID,
            SourceSpec::DemosBulk { .. }
            | SourceSpec::DemosList { .. }
            | SourceSpec::DemosDirectory { .. } => provider_demos_tf::SOURCE_ID,
            SourceSpec::Etf2lResults { .. } | SourceSpec::Etf2lTransfers { .. } => "etf2l",
        }
    }

    pub fn strategy(&self) -> CursorStrategy {
        match self {
            SourceSpec::LogsBulk { .. } | SourceSpec::DemosBulk { .. } => {
                CursorStrategy::Incremental
            }
            SourceSpec::LogsReverse => CursorStrategy::Reverse,
            _ => CursorStrategy::Enumerate,
        }
    }

    fn filters(&self) -> PageFilters {
        match self {
            SourceSpec::LogsBulk { players, since } => PageFilters {
                since: *since,
                players: players.clone(),
                ..Default::default()
            },
            SourceSpec::DemosBulk { since, until } => PageFilters {
                since: *since,
                until: *until,
                ..Default::default()
            },
            SourceSpec::Etf2lResults { since } => PageFilters {
                since: *since,
                ..Default::default()
            },
            SourceSpec::Etf2lTransfers { teamid } => PageFilters {
                team: Some(*teamid),
                ..Default::default()
            },
            _ => PageFilters::default(),
        }
    }

    pub(crate) fn resolve(&self, http: Arc<dyn HttpClient>, retry: RetryPolicy) -> ResolvedSource {
        let id = self.source_id();
        let logs = |http: Arc<dyn HttpClient>| LogsTfSource::new(http, retry.clone());
        let demos = |http: Arc<dyn HttpClient>| DemosTfSource::new(http, retry.clone());

        let (adapter, normalizer): (Arc<dyn SourceAdapter>, Arc<dyn RecordNormalizer>) = match self
        {
            SourceSpec::LogsBulk { .. } | SourceSpec::LogsReverse => (
                Arc::new(logs(http).with_source_id(id.as_str())),
                Arc::new(LogsTfNormalizer::new()),
            ),
            SourceSpec::LogsList { ids } => (
                Arc::new(IdListSource::new(Arc::new(logs(http)), ids.iter().copied())),
                Arc::new(LogsTfNormalizer::new()),
            ),
            SourceSpec::LogsDirectory { path } => (
                Arc::new(JsonDirectorySource::new(id.as_str(), path)),
                Arc::new(LogsTfNormalizer::new()),
            ),
            SourceSpec::LogsSnapshot { path } => (
                Arc::new(SnapshotSource::new(id.as_str(), path)),
                Arc::new(LogsTfNormalizer::new()),
            ),
            SourceSpec::DemosBulk { .. } => (
                Arc::new(demos(http).with_source_id(id.as_str())),
                Arc::new(DemosTfNormalizer::new()),
            ),
            SourceSpec::DemosList { ids } => (
                Arc::new(IdListSource::new(Arc::new(demos(http)), ids.iter().copied())),
                Arc::new(DemosTfNormalizer::new()),
            ),
            SourceSpec::DemosDirectory { path } => (
                Arc::new(JsonDirectorySource::new(id.as_str(), path)),
                Arc::new(DemosTfNormalizer::new()),
            ),
            SourceSpec::Etf2lResults { .. } => (
                Arc::new(Etf2lSource::results(http, retry.clone())),
                Arc::new(ResultNormalizer),
            ),
            SourceSpec::Etf2lTransfers { teamid } => (
                Arc::new(Etf2lSource::transfers(*teamid, http, retry.clone())),
                Arc::new(TransferNormalizer),
            ),
        };

        ResolvedSource {
            adapter,
            normalizer,
            strategy: self.strategy(),
            filters: self.filters(),
        }
    }
}
