//! # Sync Run State Machine
//!
//! Lifecycle of one run of one source, with validated state transitions.
//!
//! ## State Machine
//!
//! ```text
//! Idle → Listing ⇄ FetchingItem ⇄ Merging → Completed
//!           │            │           │
//!           └────────────┴───────────┴──→ Failed | Cancelled
//! ```
//!
//! `Completed` is the terminal form of the driver returning to idle; a fresh run
//! record starts in `Idle` again. A single item failing never changes the run
//! state: it is counted in [`RunStats::items_failed`] and the loop continues.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use core_sync::{CursorStrategy, RunStatus, SyncRun};
//! use bridge_traits::SourceId;
//!
//! let mut run = SyncRun::new(SourceId::new("logs.tf"), CursorStrategy::Incremental);
//! run.begin()?;
//! run.enter(RunStatus::FetchingItem)?;
//! run.enter(RunStatus::Merging)?;
//! run.complete()?;
//! ```

use crate::pager::CursorStrategy;
use crate::{Result, SyncError};
use bridge_traits::SourceId;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

// ============================================================================
// ID Types
// ============================================================================

/// Unique identifier for a sync run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SyncRunId(Uuid);

impl SyncRunId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// # Errors
    ///
    /// Returns an error if the string is not a valid UUID
    pub fn from_string(s: &str) -> Result<Self> {
        Ok(Self(
            Uuid::parse_str(s).map_err(|e| SyncError::InvalidRunId(e.to_string()))?,
        ))
    }

    pub fn as_str(&self) -> String {
        self.0.to_string()
    }
}

impl Default for SyncRunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SyncRunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for SyncRunId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

// ============================================================================
// Status Types
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Created, nothing requested yet
    Idle,
    /// Requesting a listing page
    Listing,
    /// Resolving listed items to payloads
    FetchingItem,
    /// Committing a batch
    Merging,
    /// Listing exhausted and checkpoint handled
    Completed,
    /// Aborted; checkpoint unchanged
    Failed,
    /// Stopped by a cancellation request; checkpoint unchanged
    Cancelled,
}

impl RunStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RunStatus::Completed | RunStatus::Failed | RunStatus::Cancelled
        )
    }

    pub fn is_active(&self) -> bool {
        matches!(
            self,
            RunStatus::Listing | RunStatus::FetchingItem | RunStatus::Merging
        )
    }

    /// String form used for database storage
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Idle => "idle",
            RunStatus::Listing => "listing",
            RunStatus::FetchingItem => "fetching_item",
            RunStatus::Merging => "merging",
            RunStatus::Completed => "completed",
            RunStatus::Failed => "failed",
            RunStatus::Cancelled => "cancelled",
        }
    }
}

impl FromStr for RunStatus {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "idle" => Ok(RunStatus::Idle),
            "listing" => Ok(RunStatus::Listing),
            "fetching_item" => Ok(RunStatus::FetchingItem),
            "merging" => Ok(RunStatus::Merging),
            "completed" => Ok(RunStatus::Completed),
            "failed" => Ok(RunStatus::Failed),
            "cancelled" => Ok(RunStatus::Cancelled),
            _ => Err(SyncError::InvalidStatus(s.to_string())),
        }
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// Statistics
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStats {
    /// Fresh items emitted by the pager
    pub items_listed: u64,
    /// Items whose payload was obtained
    pub items_fetched: u64,
    /// Items whose records were committed
    pub items_merged: u64,
    /// Items skipped at fetch, parse or merge
    pub items_failed: u64,
    pub batches_committed: u64,
    pub batches_failed: u64,
}

// ============================================================================
// Sync Run Entity
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncRun {
    pub id: SyncRunId,
    pub source: SourceId,
    pub strategy: CursorStrategy,
    pub status: RunStatus,
    pub stats: RunStats,
    pub error_message: Option<String>,
    pub created_at: i64,
    pub started_at: Option<i64>,
    pub completed_at: Option<i64>,
}

impl SyncRun {
    pub fn new(source: SourceId, strategy: CursorStrategy) -> Self {
        Self {
            id: SyncRunId::new(),
            source,
            strategy,
            status: RunStatus::Idle,
            stats: RunStats::default(),
            error_message: None,
            created_at: current_timestamp(),
            started_at: None,
            completed_at: None,
        }
    }

    /// Move from `Idle` to `Listing`.
    ///
    /// # Errors
    ///
    /// Returns an error if the run is not idle
    pub fn begin(&mut self) -> Result<()> {
        if self.status != RunStatus::Idle {
            return Err(SyncError::InvalidStateTransition {
                from: self.status.as_str().to_string(),
                to: RunStatus::Listing.as_str().to_string(),
                reason: "Run has already started".to_string(),
            });
        }
        self.status = RunStatus::Listing;
        self.started_at = Some(current_timestamp());
        Ok(())
    }

    /// Move between the active states. Re-entering the current state is a no-op.
    ///
    /// # Errors
    ///
    /// Returns an error if `to` is not an active state or the run is not active
    pub fn enter(&mut self, to: RunStatus) -> Result<()> {
        if self.status == to {
            return Ok(());
        }
        if !to.is_active() {
            return Err(SyncError::InvalidStateTransition {
                from: self.status.as_str().to_string(),
                to: to.as_str().to_string(),
                reason: "Terminal states are reached through complete, fail or cancel"
                    .to_string(),
            });
        }
        self.validate_transition(to)?;
        self.status = to;
        Ok(())
    }

    /// # Errors
    ///
    /// Returns an error if the run is not active
    pub fn complete(&mut self) -> Result<()> {
        self.validate_transition(RunStatus::Completed)?;
        self.status = RunStatus::Completed;
        self.completed_at = Some(current_timestamp());
        Ok(())
    }

    /// # Errors
    ///
    /// Returns an error if the run already reached a terminal state
    pub fn fail(&mut self, error_message: impl Into<String>) -> Result<()> {
        self.validate_transition(RunStatus::Failed)?;
        self.status = RunStatus::Failed;
        self.completed_at = Some(current_timestamp());
        self.error_message = Some(error_message.into());
        Ok(())
    }

    /// # Errors
    ///
    /// Returns an error if the run already reached a terminal state
    pub fn cancel(&mut self) -> Result<()> {
        self.validate_transition(RunStatus::Cancelled)?;
        self.status = RunStatus::Cancelled;
        self.completed_at = Some(current_timestamp());
        Ok(())
    }

    /// Returns None if the run hasn't started or finished yet
    pub fn duration_secs(&self) -> Option<u64> {
        match (self.started_at, self.completed_at) {
            (Some(start), Some(end)) => Some(end.saturating_sub(start).max(0) as u64),
            _ => None,
        }
    }

    fn validate_transition(&self, to: RunStatus) -> Result<()> {
        use RunStatus::*;

        let valid = match (self.status, to) {
            (Idle, Listing) => true,
            (Idle, Failed) | (Idle, Cancelled) => true,

            (Listing, FetchingItem) | (Listing, Merging) => true,
            (FetchingItem, Listing) | (FetchingItem, Merging) => true,
            (Merging, Listing) | (Merging, FetchingItem) => true,

            (Listing, Completed) | (Merging, Completed) => true,
            (Listing | FetchingItem | Merging, Failed) => true,
            (Listing | FetchingItem | Merging, Cancelled) => true,

            (Completed | Failed | Cancelled, _) => false,
            _ => false,
        };

        if !valid {
            return Err(SyncError::InvalidStateTransition {
                from: self.status.as_str().to_string(),
                to: to.as_str().to_string(),
                reason: format!(
                    "Cannot transition from {} to {}",
                    self.status.as_str(),
                    to.as_str()
                ),
            });
        }

        Ok(())
    }
}

fn current_timestamp() -> i64 {
    chrono::Utc::now().timestamp()
}

// ============================================================================
// Tests
// ============================================================================
