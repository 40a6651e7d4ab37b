//! # Incremental Sync Engine
//!
//! Pulls records from paginated, rate-limited sources into the local store,
//! resuming where the previous run stopped.
//!
//! ## Overview
//!
//! One run of one source is a single cooperative loop:
//! - The pager lists pages and decides which items are fresh
//! - The fetch stage resolves each fresh item to its payload
//! - The source's normalizer turns payloads into records
//! - The merge pipeline commits records in atomic batches
//! - The checkpoint advances only once everything listed has been committed
//!
//! ## Components
//!
//! - **Pager** (`pager`): cursor strategies, termination rules, checkpoint candidates
//! - **Id sequences** (`ids`): bounded, restartable descending id ranges for backfills
//! - **Pacing** (`pacing`): minimum gap between requests to one source
//! - **Fetch stage** (`fetch`): embedded or per-item payload retrieval
//! - **Checkpoints** (`checkpoint`): per-source resume state
//! - **Run state machine** (`job`) and **history** (`repository`)
//! - **Driver** (`driver`): the per-source loop and its at-most-one-run guard
//! - **Player refresh** (`players`): batch profile updates from a player directory

pub mod checkpoint;
pub mod driver;
pub mod error;
pub mod fetch;
pub mod ids;
pub mod job;
pub mod pacing;
pub mod pager;
pub mod players;
pub mod repository;

pub use checkpoint::{Checkpoint, CheckpointStore, SqliteCheckpointStore};
pub use driver::{DriverConfig, ItemOutcome, ItemResult, RunReport, SyncDriver, SyncRequest};
pub use error::{Result, SyncError};
pub use fetch::ItemFetchStage;
pub use ids::DescendingIds;
pub use job::{RunStats, RunStatus, SyncRun, SyncRunId};
pub use pacing::Pacer;
pub use pager::{CursorStrategy, PageFilters, PageOutcome, Pager, PagerOptions};
pub use players::{PlayerRefresh, PlayerWalk, RefreshReport};
pub use repository::{SqliteSyncRunRepository, SyncRunRepository};
