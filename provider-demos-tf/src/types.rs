//! demos.tf API response types

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One entry of the `/demos` listing, newest first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DemoSummary {
    pub id: u64,

    /// Upload time, Unix seconds
    pub time: i64,

    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub map: String,

    #[serde(default)]
    pub duration: i64,

    #[serde(default)]
    pub red: String,

    #[serde(default)]
    pub blu: String,

    #[serde(default)]
    pub red_score: i64,

    #[serde(default)]
    pub blu_score: i64,

    #[serde(default)]
    pub url: String,
}

/// A full demo as returned by `/demos/{id}`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DemoDocument {
    pub id: u64,

    pub time: i64,

    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub map: String,

    #[serde(default)]
    pub duration: i64,

    #[serde(default)]
    pub red: String,

    #[serde(default)]
    pub blu: String,

    #[serde(default)]
    pub red_score: i64,

    #[serde(default)]
    pub blu_score: i64,

    #[serde(default)]
    pub url: String,

    /// A user object on the detail endpoint, a bare user id in listings
    #[serde(default)]
    pub uploader: Value,

    #[serde(default)]
    pub players: Vec<DemoPlayerEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DemoPlayerEntry {
    pub user: DemoUser,

    /// In-game name for this demo; the user's profile name is a fallback
    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub team: Option<String>,

    #[serde(default)]
    pub class: Option<String>,

    #[serde(default)]
    pub kills: i64,

    #[serde(default)]
    pub assists: i64,

    #[serde(default)]
    pub deaths: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DemoUser {
    /// 64-bit id as a decimal string
    pub steamid: String,

    #[serde(default)]
    pub name: String,
}
