//! Normalized records accepted by the merge pipeline.
//!
//! Normalizers in the provider crates turn raw source payloads into these types.
//! Everything here is plain data keyed by the source's own identifiers; interned
//! dimension ids (`nameid`, `mapid`) are resolved inside the merge transaction.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::StoreError;
use crate::steamid::SteamId;

/// A player reference as seen in a match record: id plus the name used there.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerRef {
    pub steamid: SteamId,
    pub name: String,
}

impl PlayerRef {
    pub fn new(steamid: SteamId, name: impl Into<String>) -> Self {
        Self {
            steamid,
            name: name.into(),
        }
    }
}

/// Authoritative player profile. Overwrites the stored name and avatar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerRecord {
    pub steamid: SteamId,
    pub name: String,
    pub avatar_hash: Option<String>,
}

// ============================================================================
// logs.tf
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogPlayer {
    pub player: PlayerRef,
    pub team: Option<String>,
    pub kills: i64,
    pub deaths: i64,
    pub assists: i64,
    pub damage: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogRecord {
    pub logid: u64,
    /// Unix seconds
    pub time: i64,
    /// Seconds
    pub duration: i64,
    pub title: String,
    pub map: Option<String>,
    pub red_score: i64,
    pub blue_score: i64,
    pub uploader: Option<PlayerRef>,
    pub players: Vec<LogPlayer>,
}

// ============================================================================
// demos.tf
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DemoPlayer {
    pub player: PlayerRef,
    pub team: Option<String>,
    pub class: Option<String>,
    pub kills: i64,
    pub assists: i64,
    pub deaths: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DemoRecord {
    pub demoid: u64,
    pub time: i64,
    pub duration: i64,
    pub title: String,
    pub map: Option<String>,
    pub red_name: String,
    pub blue_name: String,
    pub red_score: i64,
    pub blue_score: i64,
    pub uploader: Option<PlayerRef>,
    pub url: String,
    pub players: Vec<DemoPlayer>,
}

// ============================================================================
// ETF2L
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeagueTeam {
    pub teamid: u64,
    /// Unknown when the team is only referenced by id.
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchRecord {
    pub matchid: u64,
    pub time: Option<i64>,
    pub competition: String,
    pub round: Option<String>,
    pub team1: LeagueTeam,
    pub team2: LeagueTeam,
    pub score1: i64,
    pub score2: i64,
    pub forfeit: bool,
    /// Unix seconds at which the listing was fetched.
    pub fetched: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferKind {
    Joined,
    Left,
}

impl TransferKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransferKind::Joined => "joined",
            TransferKind::Left => "left",
        }
    }
}

impl fmt::Display for TransferKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransferKind {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "joined" => Ok(TransferKind::Joined),
            "left" => Ok(TransferKind::Left),
            other => Err(StoreError::InvalidInput {
                field: "kind".to_string(),
                message: format!("unknown transfer kind '{}'", other),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferRecord {
    pub team: LeagueTeam,
    pub player: PlayerRef,
    pub kind: TransferKind,
    pub time: i64,
    pub fetched: i64,
}

impl TransferRecord {
    /// Transfers carry no source id; this tuple is their identity.
    pub fn key(&self) -> (u64, SteamId, i64, TransferKind) {
        (self.team.teamid, self.player.steamid, self.time, self.kind)
    }
}

// ============================================================================
// Record
// ============================================================================

/// One normalized record of any kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Record {
    Player(PlayerRecord),
    Log(LogRecord),
    Demo(DemoRecord),
    Match(MatchRecord),
    Transfer(TransferRecord),
}

impl Record {
    pub fn kind(&self) -> &'static str {
        match self {
            Record::Player(_) => "player",
            Record::Log(_) => "log",
            Record::Demo(_) => "demo",
            Record::Match(_) => "match",
            Record::Transfer(_) => "transfer",
        }
    }
}

impl From<PlayerRecord> for Record {
    fn from(record: PlayerRecord) -> Self {
        Record::Player(record)
    }
}

impl From<LogRecord> for Record {
    fn from(record: LogRecord) -> Self {
        Record::Log(record)
    }
}

impl From<DemoRecord> for Record {
    fn from(record: DemoRecord) -> Self {
        Record::Demo(record)
    }
}

impl From<MatchRecord> for Record {
    fn from(record: MatchRecord) -> Self {
        Record::Match(record)
    }
}

impl From<TransferRecord> for Record {
    fn from(record: TransferRecord) -> Self {
        Record::Transfer(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transfer_kind_round_trip() {
        assert_eq!("joined".parse::<TransferKind>().unwrap(), TransferKind::Joined);
        assert_eq!(TransferKind::Left.to_string(), "left");
        assert!("kicked".parse::<TransferKind>().is_err());
    }

    #[test]
    fn test_record_kind() {
        let record: Record = PlayerRecord {
            steamid: SteamId::from_account_id(1),
            name: "a".into(),
            avatar_hash: None,
        }
        .into();
        assert_eq!(record.kind(), "player");
    }
}
