//! Read-only clone_logs snapshot
//!
//! A SQLite database holding previously downloaded logs in a flat `log` table
//! with a `player` table of per-player rows. Each log is rebuilt into the
//! logs.tf v3 document shape, so the logs.tf normalizer can consume it
//! unchanged.

use async_trait::async_trait;
use bridge_traits::{
    FetchError, ItemEnvelope, ItemId, Page, PageParams, PayloadMode, RawPayload, SourceAdapter,
    SourceCapabilities, SourceId,
};
use serde_json::{json, Map, Value};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use std::path::{Path, PathBuf};
use tokio::sync::OnceCell;
use tracing::{debug, info, instrument, warn};

use crate::directory::LOCAL_PAGE_SIZE;
use crate::error::{LocalError, Result};

/// clone_logs stores dates as text; convert to Unix seconds in SQL.
const DATE_COLUMN: &str = "CAST(strftime('%s', date, 'utc') AS INTEGER)";

/// Source over a clone_logs SQLite database.
pub struct SnapshotSource {
    id: SourceId,
    path: PathBuf,
    pool: OnceCell<Option<SqlitePool>>,
}

impl SnapshotSource {
    pub fn new(id: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            id: SourceId::new(id),
            path: path.into(),
            pool: OnceCell::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn open(&self) -> Result<Option<SqlitePool>> {
        if !tokio::fs::try_exists(&self.path)
            .await
            .map_err(|e| LocalError::io(&self.path, e))?
        {
            warn!(source = %self.id, path = ?self.path, "Snapshot does not exist, nothing to list");
            return Ok(None);
        }

        let options = SqliteConnectOptions::new()
            .filename(&self.path)
            .read_only(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(2)
            .connect_with(options)
            .await?;

        info!(source = %self.id, path = ?self.path, "Opened snapshot");
        Ok(Some(pool))
    }

    async fn pool(&self) -> Result<Option<&SqlitePool>> {
        self.pool
            .get_or_try_init(|| self.open())
            .await
            .map(Option::as_ref)
    }

    async fn list(&self, pool: &SqlitePool, params: &PageParams) -> Result<Page> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM log")
            .fetch_one(pool)
            .await?;

        let rows = sqlx::query(&format!(
            "SELECT id, {} AS date FROM log ORDER BY id ASC LIMIT ? OFFSET ?",
            DATE_COLUMN
        ))
        .bind(params.limit as i64)
        .bind(params.offset as i64)
        .fetch_all(pool)
        .await?;

        let items = rows
            .iter()
            .map(|row| {
                let id: i64 = row.try_get("id")?;
                let date: Option<i64> = row.try_get("date")?;
                Ok(ItemEnvelope::new(id as u64, date.unwrap_or(0), Value::Null))
            })
            .collect::<std::result::Result<Vec<_>, sqlx::Error>>()?;

        Ok(Page {
            items,
            total: Some(total.max(0) as u64),
            offset: params.offset,
            skipped: 0,
        })
    }

    /// Rebuild one log as a logs.tf v3 document.
    #[instrument(skip(self, pool), fields(source = %self.id))]
    async fn document(&self, pool: &SqlitePool, logid: u64) -> Result<Value> {
        let log = sqlx::query(&format!(
            "SELECT {} AS date, title, map, duration, red_score, blu_score, \
                    CAST(uploader_steam_id AS TEXT) AS uploader_steam_id, uploader_name \
             FROM log WHERE id = ?",
            DATE_COLUMN
        ))
        .bind(logid as i64)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| LocalError::NotFound {
            id: logid,
            location: self.path.display().to_string(),
        })?;

        let players = sqlx::query(
            "SELECT CAST(steam_id AS TEXT) AS steam_id, name, team, kills, deaths, assists, damage \
             FROM player WHERE log_id = ?",
        )
        .bind(logid as i64)
        .fetch_all(pool)
        .await?;

        let mut stats = Map::new();
        let mut names = Map::new();
        for player in &players {
            let steamid: String = player.try_get("steam_id")?;
            let name: Option<String> = player.try_get("name")?;
            stats.insert(
                steamid.clone(),
                json!({
                    "team": player.try_get::<Option<String>, _>("team")?,
                    "kills": player.try_get::<Option<i64>, _>("kills")?.unwrap_or(0),
                    "deaths": player.try_get::<Option<i64>, _>("deaths")?.unwrap_or(0),
                    "assists": player.try_get::<Option<i64>, _>("assists")?.unwrap_or(0),
                    "dmg": player.try_get::<Option<i64>, _>("damage")?.unwrap_or(0),
                }),
            );
            names.insert(steamid, Value::from(name.unwrap_or_default()));
        }

        let uploader_id: Option<String> = log.try_get("uploader_steam_id")?;
        let uploader = uploader_id.map(|id| {
            json!({
                "id": id,
                "name": log.try_get::<Option<String>, _>("uploader_name").ok().flatten().unwrap_or_default(),
            })
        });

        debug!(logid, players = players.len(), "Rebuilt log document");
        Ok(json!({
            "version": 3,
            "info": {
                "date": log.try_get::<Option<i64>, _>("date")?.unwrap_or(0),
                "title": log.try_get::<Option<String>, _>("title")?.unwrap_or_default(),
                "map": log.try_get::<Option<String>, _>("map")?.unwrap_or_default(),
                "total_length": log.try_get::<Option<i64>, _>("duration")?.unwrap_or(0),
                "uploader": uploader,
            },
            "teams": {
                "Red": {"score": log.try_get::<Option<i64>, _>("red_score")?.unwrap_or(0)},
                "Blue": {"score": log.try_get::<Option<i64>, _>("blu_score")?.unwrap_or(0)},
            },
            "players": stats,
            "names": names,
        }))
    }
}

#[async_trait]
impl SourceAdapter for SnapshotSource {
    fn source_id(&self) -> &SourceId {
        &self.id
    }

    fn capabilities(&self) -> SourceCapabilities {
        SourceCapabilities {
            max_page_size: LOCAL_PAGE_SIZE,
            payload: PayloadMode::Separate,
            remote: false,
        }
    }

    async fn list_page(&self, params: &PageParams) -> std::result::Result<Page, FetchError> {
        match self.pool().await? {
            Some(pool) => Ok(self.list(pool, params).await?),
            None => Ok(Page::empty(params.offset, Some(0))),
        }
    }

    async fn fetch_payload(&self, id: ItemId) -> std::result::Result<RawPayload, FetchError> {
        let pool = self.pool().await?.ok_or_else(|| LocalError::NotFound {
            id: id.get(),
            location: self.path.display().to_string(),
        })?;
        let body = self.document(pool, id.get()).await?;
        Ok(RawPayload {
            id,
            body,
            fetched_at: chrono::Utc::now().timestamp(),
        })
    }
}
