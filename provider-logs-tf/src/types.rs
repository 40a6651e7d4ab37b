//! logs.tf API response types
//!
//! Listing responses from `/api/v1/log` and the subset of the v3 log document
//! that the normalizer reads. Unknown fields are ignored.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};

/// `/api/v1/log` listing response
#[derive(Debug, Clone, Deserialize)]
pub struct LogListResponse {
    pub success: bool,

    /// Present when `success` is false
    #[serde(default)]
    pub error: Option<String>,

    /// Number of logs matching the query, across all pages
    #[serde(default)]
    pub total: Option<u64>,

    #[serde(default)]
    pub logs: Vec<LogSummary>,
}

/// One entry of a listing, newest first
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogSummary {
    pub id: u64,

    /// Upload time, Unix seconds
    pub date: i64,

    #[serde(default)]
    pub title: String,

    #[serde(default)]
    pub map: String,

    #[serde(default)]
    pub views: Option<u64>,
}

// ============================================================================
// v3 log document
// ============================================================================

/// A full log as returned by `/api/v1/log/{id}`.
#[derive(Debug, Clone, Deserialize)]
pub struct LogDocument {
    pub info: LogInfo,

    #[serde(default)]
    pub teams: Teams,

    /// Keyed by the player's id as logs.tf spells it (SteamID3 or legacy)
    #[serde(default)]
    pub players: BTreeMap<String, PlayerStats>,

    #[serde(default)]
    pub names: HashMap<String, String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogInfo {
    #[serde(default)]
    pub map: String,

    pub date: i64,

    #[serde(default)]
    pub title: String,

    /// Seconds
    #[serde(default)]
    pub total_length: i64,

    #[serde(default)]
    pub uploader: Option<Uploader>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Uploader {
    /// A 64-bit id, as a string on logs.tf and as a number in some snapshots
    #[serde(default)]
    pub id: Value,

    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Teams {
    #[serde(rename = "Red", default)]
    pub red: TeamStats,

    #[serde(rename = "Blue", default)]
    pub blue: TeamStats,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TeamStats {
    #[serde(default)]
    pub score: i64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PlayerStats {
    #[serde(default)]
    pub team: Option<String>,

    #[serde(default)]
    pub kills: i64,

    #[serde(default)]
    pub deaths: i64,

    #[serde(default)]
    pub assists: i64,

    #[serde(default)]
    pub dmg: i64,
}
