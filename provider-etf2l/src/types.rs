//! ETF2L API response types
//!
//! Both feeds share one envelope: a list under a feed-specific key plus a
//! `page` block. Entries are kept as JSON until normalization because they are
//! embedded verbatim in the listing envelopes.

use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Clone, Deserialize)]
pub struct PageInfo {
    pub total_pages: u64,

    #[serde(default)]
    pub page: Option<u64>,
}

/// One page of either feed. The API sends `null` instead of an empty list.
#[derive(Debug, Clone, Deserialize)]
pub struct FeedPage {
    #[serde(default)]
    pub results: Option<Vec<Value>>,

    #[serde(default)]
    pub transfers: Option<Vec<Value>>,

    #[serde(default)]
    pub page: Option<PageInfo>,
}

// ============================================================================
// Entries
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct Clan {
    pub id: u64,

    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Competition {
    #[serde(default)]
    pub name: String,
}

/// A league match result
#[derive(Debug, Clone, Deserialize)]
pub struct MatchResult {
    pub id: u64,

    pub clan1: Clan,

    pub clan2: Clan,

    #[serde(default)]
    pub competition: Option<Competition>,

    #[serde(default)]
    pub round: Option<String>,

    /// Null for matches without a scheduled time
    #[serde(default)]
    pub time: Option<i64>,

    #[serde(default)]
    pub r1: Option<i64>,

    #[serde(default)]
    pub r2: Option<i64>,

    #[serde(default)]
    pub defaultwin: bool,

    /// Stamped by the adapter with the listing time
    pub fetched: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SteamRef {
    pub id64: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TransferPlayer {
    #[serde(default)]
    pub name: String,

    pub steam: SteamRef,
}

/// A roster change of one team
#[derive(Debug, Clone, Deserialize)]
pub struct Transfer {
    #[serde(rename = "type")]
    pub kind: String,

    pub time: i64,

    pub who: TransferPlayer,

    /// Stamped by the adapter with the team being walked
    pub teamid: u64,

    /// Stamped by the adapter with the listing time
    pub fetched: i64,
}
