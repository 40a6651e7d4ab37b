//! Source Adapter Abstraction
//!
//! Uniform capability over one external data source: a paginated listing plus a
//! per-item payload lookup. Remote APIs, directories of files, and read-only
//! database snapshots all implement the same trait so the pager and fetch stage
//! never need to know which one they are driving.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::FetchError;

// ============================================================================
// Identifiers
// ============================================================================

/// Identifier assigned to an item by its source.
///
/// Ordering follows the source's numbering, which is only approximately aligned
/// with creation time. Identifiers are never reused by a source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ItemId(pub u64);

impl ItemId {
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for ItemId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

/// Stable identity of a source, used to key checkpoints and run history.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SourceId(String);

impl SourceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// Listing Types
// ============================================================================

/// One listed item. `raw` is whatever the listing returned for it.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemEnvelope {
    pub id: ItemId,
    /// Unix seconds. Zero when the listing carries no timestamp.
    pub created_at: i64,
    pub raw: serde_json::Value,
}

impl ItemEnvelope {
    pub fn new(id: impl Into<ItemId>, created_at: i64, raw: serde_json::Value) -> Self {
        Self {
            id: id.into(),
            created_at,
            raw,
        }
    }
}

/// Parameters for a single listing call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageParams {
    pub offset: u64,
    pub limit: u32,
    pub since: Option<i64>,
    pub until: Option<i64>,
    pub players: Vec<u64>,
    pub team: Option<u64>,
}

impl PageParams {
    pub fn new(offset: u64, limit: u32) -> Self {
        Self {
            offset,
            limit,
            ..Default::default()
        }
    }
}

/// Result of a single listing call.
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    pub items: Vec<ItemEnvelope>,
    /// Source-reported number of items available, when the source reports one.
    pub total: Option<u64>,
    /// Offset this page starts at.
    pub offset: u64,
    /// Listing positions the adapter consumed without producing an item, such
    /// as entries missing their id. The pager advances past them.
    pub skipped: u64,
}

impl Page {
    pub fn empty(offset: u64, total: Option<u64>) -> Self {
        Self {
            items: Vec::new(),
            total,
            offset,
            skipped: 0,
        }
    }
}

/// Full payload of one item.
#[derive(Debug, Clone, PartialEq)]
pub struct RawPayload {
    pub id: ItemId,
    pub body: serde_json::Value,
    /// Unix seconds at which the payload was obtained.
    pub fetched_at: i64,
}

// ============================================================================
// Capabilities
// ============================================================================

/// Where an item's full payload comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadMode {
    /// One extra request per item via [`SourceAdapter::fetch_payload`].
    Separate,
    /// The listing envelope already carries the full record.
    Embedded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceCapabilities {
    /// Largest `limit` the listing endpoint accepts.
    pub max_page_size: u32,
    pub payload: PayloadMode,
    /// Network sources are paced; local files and snapshots are not.
    pub remote: bool,
}

// ============================================================================
// Traits
// ============================================================================

/// Capability set exposed by every source to the pager and fetch stage.
///
/// Network adapters classify failures with [`FetchError`] and retry transient ones
/// through the shared [`RetryPolicy`](crate::retry::RetryPolicy). Local adapters
/// report a missing collection as an empty page.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    fn source_id(&self) -> &SourceId;

    fn capabilities(&self) -> SourceCapabilities;

    /// List one page of items, in the order the source delivers them.
    async fn list_page(&self, params: &PageParams) -> Result<Page, FetchError>;

    /// Resolve one identifier to its full payload.
    async fn fetch_payload(&self, id: ItemId) -> Result<RawPayload, FetchError>;
}

/// Public profile of a player as reported by a player directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileSummary {
    pub steamid64: u64,
    pub display_name: String,
    pub avatar_hash: Option<String>,
}

/// Batch lookup of player profiles.
#[async_trait]
pub trait ProfileSource: Send + Sync {
    /// Largest number of ids accepted per call.
    fn max_batch(&self) -> usize;

    async fn fetch_profiles(&self, steamids: &[u64]) -> Result<Vec<ProfileSummary>, FetchError>;
}
