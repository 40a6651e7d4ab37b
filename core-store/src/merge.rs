//! # Atomic Merge Pipeline
//!
//! Commits a batch of normalized records as one transaction.
//!
//! ## Overview
//!
//! A batch is first staged in memory: records are deduplicated by their source
//! key and every table's candidate rows are held in ascending key order. The
//! transaction then runs, in order:
//!
//! 1. Intern display names and map names (insert missing, ignore existing)
//! 2. Upsert league teams
//! 3. Write players: authoritative profiles overwrite name and avatar, players
//!    only referenced by a match are inserted if missing
//! 4. Insert logs, demos and their per-player rows (immutable, conflicts ignored)
//! 5. Upsert league matches (scores and fetch time are mutable)
//! 6. Insert league transfers (immutable)
//!
//! Any failure rolls the whole batch back and surfaces [`StoreError::Merge`].
//! No column is derived from the wall clock, so merging an identical batch twice
//! leaves the store exactly as merging it once.
//!
//! ## Usage
//!
//! ```rust,ignore
//! let pipeline = MergePipeline::new(pool.clone());
//! let report = pipeline.merge(&records).await?;
//! pipeline.link_demo(logid, demoid).await?;
//! ```

use async_trait::async_trait;
use serde::Serialize;
use sqlx::{Row, SqliteConnection, SqlitePool};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::{debug, info, instrument, warn};

use crate::error::{Result, StoreError};
use crate::models::{
    DemoRecord, LogRecord, MatchRecord, PlayerRecord, PlayerRef, Record, TransferKind,
    TransferRecord,
};
use crate::steamid::SteamId;

/// Counts of rows a merge actually changed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MergeReport {
    /// Records submitted, before deduplication.
    pub records: usize,
    pub names_interned: u64,
    pub maps_interned: u64,
    pub players_written: u64,
    pub teams_written: u64,
    pub logs_inserted: u64,
    pub demos_inserted: u64,
    pub matches_written: u64,
    pub transfers_inserted: u64,
}

/// Destination of normalized batches.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Commit every record or none of them.
    async fn merge(&self, records: &[Record]) -> Result<MergeReport>;
}

// ============================================================================
// Staging
// ============================================================================

type TransferKey = (u64, SteamId, i64, TransferKind);

/// Candidate rows for one batch, deduplicated and key-ordered.
#[derive(Debug, Default)]
struct StagedBatch {
    names: BTreeSet<String>,
    maps: BTreeSet<String>,
    /// Players seen inside match records, with the first name they appeared under.
    referenced: BTreeMap<SteamId, String>,
    /// Authoritative profiles; the last one in the batch wins.
    profiles: BTreeMap<SteamId, PlayerRecord>,
    teams: BTreeMap<u64, Option<String>>,
    logs: BTreeMap<u64, LogRecord>,
    demos: BTreeMap<u64, DemoRecord>,
    matches: BTreeMap<u64, MatchRecord>,
    transfers: BTreeMap<TransferKey, TransferRecord>,
}

impl StagedBatch {
    fn stage(records: &[Record]) -> Self {
        let mut batch = Self::default();

        for record in records {
            match record {
                Record::Player(profile) => {
                    batch.names.insert(profile.name.clone());
                    batch.profiles.insert(profile.steamid, profile.clone());
                }
                Record::Log(log) => {
                    if batch.logs.contains_key(&log.logid) {
                        continue;
                    }
                    batch.stage_map(log.map.as_deref());
                    if let Some(uploader) = &log.uploader {
                        batch.stage_ref(uploader);
                    }
                    for row in &log.players {
                        batch.stage_ref(&row.player);
                    }
                    batch.logs.insert(log.logid, log.clone());
                }
                Record::Demo(demo) => {
                    if batch.demos.contains_key(&demo.demoid) {
                        continue;
                    }
                    batch.stage_map(demo.map.as_deref());
                    if let Some(uploader) = &demo.uploader {
                        batch.stage_ref(uploader);
                    }
                    for row in &demo.players {
                        batch.stage_ref(&row.player);
                    }
                    batch.demos.insert(demo.demoid, demo.clone());
                }
                Record::Match(league_match) => {
                    batch.stage_team(league_match.team1.teamid, league_match.team1.name.as_deref());
                    batch.stage_team(league_match.team2.teamid, league_match.team2.name.as_deref());
                    batch
                        .matches
                        .insert(league_match.matchid, league_match.clone());
                }
                Record::Transfer(transfer) => {
                    batch.stage_team(transfer.team.teamid, transfer.team.name.as_deref());
                    batch.stage_ref(&transfer.player);
                    batch
                        .transfers
                        .entry(transfer.key())
                        .or_insert_with(|| transfer.clone());
                }
            }
        }

        batch
    }

    fn stage_ref(&mut self, player: &PlayerRef) {
        self.names.insert(player.name.clone());
        self.referenced
            .entry(player.steamid)
            .or_insert_with(|| player.name.clone());
    }

    fn stage_map(&mut self, map: Option<&str>) {
        if let Some(map) = map {
            self.maps.insert(map.to_string());
        }
    }

    fn stage_team(&mut self, teamid: u64, name: Option<&str>) {
        let slot = self.teams.entry(teamid).or_insert(None);
        if let Some(name) = name {
            *slot = Some(name.to_string());
        }
    }

    fn is_empty(&self) -> bool {
        self.names.is_empty()
            && self.maps.is_empty()
            && self.teams.is_empty()
            && self.profiles.is_empty()
            && self.logs.is_empty()
            && self.demos.is_empty()
            && self.matches.is_empty()
            && self.transfers.is_empty()
    }

    /// Every player id to write, ascending.
    fn player_ids(&self) -> BTreeSet<SteamId> {
        self.referenced
            .keys()
            .chain(self.profiles.keys())
            .copied()
            .collect()
    }
}

// ============================================================================
// Pipeline
// ============================================================================

/// SQLite implementation of the atomic merge contract.
#[derive(Clone)]
pub struct MergePipeline {
    pool: SqlitePool,
}

impl MergePipeline {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Record that `logid` was recorded in demo `demoid`.
    ///
    /// Returns `false` when the log is not in the store.
    #[instrument(skip(self))]
    pub async fn link_demo(&self, logid: u64, demoid: u64) -> Result<bool> {
        let result = sqlx::query("UPDATE log SET demoid = ? WHERE logid = ?")
            .bind(demoid as i64)
            .bind(logid as i64)
            .execute(&self.pool)
            .await?;

        let linked = result.rows_affected() > 0;
        if linked {
            info!(logid, demoid, "Linked log to demo");
        } else {
            debug!(logid, demoid, "Log not found, demo not linked");
        }
        Ok(linked)
    }

    /// Demo linked to a stored log.
    pub async fn linked_demo(&self, logid: u64) -> Result<Option<u64>> {
        let row = sqlx::query("SELECT demoid FROM log WHERE logid = ?")
            .bind(logid as i64)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| StoreError::NotFound {
                entity_type: "log".to_string(),
                id: logid.to_string(),
            })?;

        let demoid: Option<i64> = row.try_get("demoid")?;
        Ok(demoid.map(|id| id as u64))
    }
}

#[async_trait]
impl RecordStore for MergePipeline {
    #[instrument(skip(self, records), fields(records = records.len()))]
    async fn merge(&self, records: &[Record]) -> Result<MergeReport> {
        let batch = StagedBatch::stage(records);
        if batch.is_empty() {
            return Ok(MergeReport {
                records: records.len(),
                ..Default::default()
            });
        }

        let merge_error = |message: String| StoreError::Merge {
            records: records.len(),
            message,
        };

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| merge_error(e.to_string()))?;

        match apply(&mut *tx, &batch).await {
            Ok(mut report) => {
                tx.commit().await.map_err(|e| merge_error(e.to_string()))?;
                report.records = records.len();
                debug!(?report, "Batch committed");
                Ok(report)
            }
            Err(e) => {
                warn!(error = %e, records = records.len(), "Merge failed, rolling back batch");
                if let Err(rollback) = tx.rollback().await {
                    warn!(error = %rollback, "Rollback failed");
                }
                Err(merge_error(e.to_string()))
            }
        }
    }
}

// ============================================================================
// Transaction body
// ============================================================================

async fn apply(conn: &mut SqliteConnection, batch: &StagedBatch) -> Result<MergeReport> {
    let mut report = MergeReport::default();

    let (names, interned) = intern(conn, &NAME_DIMENSION, &batch.names).await?;
    report.names_interned = interned;
    let (maps, interned) = intern(conn, &MAP_DIMENSION, &batch.maps).await?;
    report.maps_interned = interned;

    for (teamid, name) in &batch.teams {
        let result = sqlx::query(
            r#"
            INSERT INTO league_team (teamid, name) VALUES (?, ?)
            ON CONFLICT (teamid) DO UPDATE SET name = COALESCE(excluded.name, league_team.name)
            "#,
        )
        .bind(*teamid as i64)
        .bind(name)
        .execute(&mut *conn)
        .await?;
        report.teams_written += result.rows_affected();
    }

    for steamid in batch.player_ids() {
        let result = match batch.profiles.get(&steamid) {
            Some(profile) => {
                sqlx::query(
                    r#"
                    INSERT INTO player (steamid64, nameid, avatarhash) VALUES (?, ?, ?)
                    ON CONFLICT (steamid64) DO UPDATE
                    SET nameid = excluded.nameid, avatarhash = excluded.avatarhash
                    "#,
                )
                .bind(steamid.as_u64() as i64)
                .bind(lookup(&names, "name", &profile.name)?)
                .bind(&profile.avatar_hash)
                .execute(&mut *conn)
                .await?
            }
            None => {
                let name = batch.referenced.get(&steamid).map(String::as_str).unwrap_or_default();
                sqlx::query(
                    r#"
                    INSERT INTO player (steamid64, nameid) VALUES (?, ?)
                    ON CONFLICT (steamid64) DO NOTHING
                    "#,
                )
                .bind(steamid.as_u64() as i64)
                .bind(lookup(&names, "name", name)?)
                .execute(&mut *conn)
                .await?
            }
        };
        report.players_written += result.rows_affected();
    }

    for log in batch.logs.values() {
        let result = sqlx::query(
            r#"
            INSERT INTO log (logid, time, duration, title, mapid, red_score, blue_score, uploader)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT (logid) DO NOTHING
            "#,
        )
        .bind(log.logid as i64)
        .bind(log.time)
        .bind(log.duration)
        .bind(&log.title)
        .bind(optional_lookup(&maps, log.map.as_deref())?)
        .bind(log.red_score)
        .bind(log.blue_score)
        .bind(log.uploader.as_ref().map(|u| u.steamid.as_u64() as i64))
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 0 {
            debug!(logid = log.logid, "Log already stored");
            continue;
        }
        report.logs_inserted += 1;

        let mut rows: Vec<_> = log.players.iter().collect();
        rows.sort_by_key(|row| row.player.steamid);
        for row in rows {
            sqlx::query(
                r#"
                INSERT INTO log_player (logid, steamid64, nameid, team, kills, deaths, assists, damage)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT (logid, steamid64) DO NOTHING
                "#,
            )
            .bind(log.logid as i64)
            .bind(row.player.steamid.as_u64() as i64)
            .bind(lookup(&names, "name", &row.player.name)?)
            .bind(&row.team)
            .bind(row.kills)
            .bind(row.deaths)
            .bind(row.assists)
            .bind(row.damage)
            .execute(&mut *conn)
            .await?;
        }
    }

    for demo in batch.demos.values() {
        let result = sqlx::query(
            r#"
            INSERT INTO demo (
                demoid, time, duration, title, mapid, red_name, blue_name,
                red_score, blue_score, uploader, url
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT (demoid) DO NOTHING
            "#,
        )
        .bind(demo.demoid as i64)
        .bind(demo.time)
        .bind(demo.duration)
        .bind(&demo.title)
        .bind(optional_lookup(&maps, demo.map.as_deref())?)
        .bind(&demo.red_name)
        .bind(&demo.blue_name)
        .bind(demo.red_score)
        .bind(demo.blue_score)
        .bind(demo.uploader.as_ref().map(|u| u.steamid.as_u64() as i64))
        .bind(&demo.url)
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 0 {
            debug!(demoid = demo.demoid, "Demo already stored");
            continue;
        }
        report.demos_inserted += 1;

        let mut rows: Vec<_> = demo.players.iter().collect();
        rows.sort_by_key(|row| row.player.steamid);
        for row in rows {
            sqlx::query(
                r#"
                INSERT INTO demo_player (demoid, steamid64, nameid, team, class, kills, assists, deaths)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT (demoid, steamid64) DO NOTHING
                "#,
            )
            .bind(demo.demoid as i64)
            .bind(row.player.steamid.as_u64() as i64)
            .bind(lookup(&names, "name", &row.player.name)?)
            .bind(&row.team)
            .bind(&row.class)
            .bind(row.kills)
            .bind(row.assists)
            .bind(row.deaths)
            .execute(&mut *conn)
            .await?;
        }
    }

    for league_match in batch.matches.values() {
        let result = sqlx::query(
            r#"
            INSERT INTO league_match (
                matchid, time, competition, round, team1, team2, score1, score2, forfeit, fetched
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT (matchid) DO UPDATE SET
                score1 = excluded.score1,
                score2 = excluded.score2,
                forfeit = excluded.forfeit,
                fetched = excluded.fetched
            "#,
        )
        .bind(league_match.matchid as i64)
        .bind(league_match.time)
        .bind(&league_match.competition)
        .bind(&league_match.round)
        .bind(league_match.team1.teamid as i64)
        .bind(league_match.team2.teamid as i64)
        .bind(league_match.score1)
        .bind(league_match.score2)
        .bind(league_match.forfeit)
        .bind(league_match.fetched)
        .execute(&mut *conn)
        .await?;
        report.matches_written += result.rows_affected();
    }

    for transfer in batch.transfers.values() {
        let result = sqlx::query(
            r#"
            INSERT INTO league_transfer (teamid, steamid64, time, kind, fetched)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT (teamid, steamid64, time, kind) DO NOTHING
            "#,
        )
        .bind(transfer.team.teamid as i64)
        .bind(transfer.player.steamid.as_u64() as i64)
        .bind(transfer.time)
        .bind(transfer.kind.as_str())
        .bind(transfer.fetched)
        .execute(&mut *conn)
        .await?;
        report.transfers_inserted += result.rows_affected();
    }

    Ok(report)
}

struct Dimension {
    table: &'static str,
    insert: &'static str,
    select: &'static str,
}

const NAME_DIMENSION: Dimension = Dimension {
    table: "name",
    insert: "INSERT INTO name (name) VALUES (?) ON CONFLICT (name) DO NOTHING",
    select: "SELECT nameid FROM name WHERE name = ?",
};

const MAP_DIMENSION: Dimension = Dimension {
    table: "map",
    insert: "INSERT INTO map (map) VALUES (?) ON CONFLICT (map) DO NOTHING",
    select: "SELECT mapid FROM map WHERE map = ?",
};

/// Insert missing values, then resolve every value to its id.
async fn intern(
    conn: &mut SqliteConnection,
    dimension: &Dimension,
    values: &BTreeSet<String>,
) -> Result<(HashMap<String, i64>, u64)> {
    let mut ids = HashMap::with_capacity(values.len());
    let mut inserted = 0;

    for value in values {
        inserted += sqlx::query(dimension.insert)
            .bind(value)
            .execute(&mut *conn)
            .await?
            .rows_affected();

        let id: i64 = sqlx::query_scalar(dimension.select)
            .bind(value)
            .fetch_one(&mut *conn)
            .await?;
        ids.insert(value.clone(), id);
    }

    if inserted > 0 {
        debug!(table = dimension.table, inserted, "Interned new values");
    }
    Ok((ids, inserted))
}

fn lookup(ids: &HashMap<String, i64>, field: &str, value: &str) -> Result<i64> {
    ids.get(value).copied().ok_or_else(|| StoreError::InvalidInput {
        field: field.to_string(),
        message: format!("'{}' was not staged", value),
    })
}

fn optional_lookup(ids: &HashMap<String, i64>, value: Option<&str>) -> Result<Option<i64>> {
    value.map(|v| lookup(ids, "map", v)).transpose()
}
