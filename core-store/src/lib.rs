//! # Match Store
//!
//! Owns the relational store that synchronized records land in.
//!
//! ## Overview
//!
//! This crate manages:
//! - SQLite connection pooling and embedded migrations ([`db`])
//! - The normalized record model ([`models`]) and the normalizer seam that
//!   source crates implement ([`normalize`])
//! - Steam id parsing across the spellings sources use ([`steamid`])
//! - The atomic merge pipeline, the only writer of match data ([`merge`])
//! - Player directory reads for profile refresh ([`players`])
//!
//! Checkpoints and run history live in the same database but are owned by
//! `core-sync`.

pub mod db;
pub mod error;
pub mod merge;
pub mod models;
pub mod normalize;
pub mod players;
pub mod steamid;

pub use db::{create_pool, create_test_pool, DatabaseConfig};
pub use error::{Result, StoreError};
pub use merge::{MergePipeline, MergeReport, RecordStore};
pub use models::{
    DemoPlayer, DemoRecord, LeagueTeam, LogPlayer, LogRecord, MatchRecord, PlayerRecord,
    PlayerRef, Record, TransferKind, TransferRecord,
};
pub use normalize::{ParseError, RecordNormalizer};
pub use players::{PlayerDirectory, SqlitePlayerDirectory};
pub use steamid::SteamId;
