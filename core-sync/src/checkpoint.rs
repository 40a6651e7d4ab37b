//! # Checkpoints
//!
//! Per-source resume state, read when a run starts and written only after the
//! whole run, merges included, committed.

use async_trait::async_trait;
use bridge_traits::{ItemId, SourceId};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};

use crate::{Result, SyncError};

/// Resume state for one source.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Items created before this Unix time are considered synchronized.
    pub since: i64,
    /// Greatest identifier known to be merged.
    pub last_seen_id: Option<ItemId>,
    /// Listing position to resume from; zero after a complete run.
    pub offset: u64,
}

#[async_trait]
pub trait CheckpointStore: Send + Sync {
    async fn load(&self, source: &SourceId) -> Result<Option<Checkpoint>>;

    async fn save(&self, source: &SourceId, checkpoint: &Checkpoint) -> Result<()>;
}

pub struct SqliteCheckpointStore {
    pool: SqlitePool,
}

impl SqliteCheckpointStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct CheckpointRow {
    since: i64,
    last_seen_id: Option<i64>,
    next_offset: i64,
}

impl From<CheckpointRow> for Checkpoint {
    fn from(row: CheckpointRow) -> Self {
        Self {
            since: row.since,
            last_seen_id: row.last_seen_id.map(|id| ItemId(id as u64)),
            offset: row.next_offset as u64,
        }
    }
}

#[async_trait]
impl CheckpointStore for SqliteCheckpointStore {
    async fn load(&self, source: &SourceId) -> Result<Option<Checkpoint>> {
        let row = sqlx::query_as::<_, CheckpointRow>(
            "SELECT since, last_seen_id, next_offset FROM sync_checkpoint WHERE source = ?",
        )
        .bind(source.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| SyncError::Database(e.to_string()))?;

        Ok(row.map(Checkpoint::from))
    }

    async fn save(&self, source: &SourceId, checkpoint: &Checkpoint) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO sync_checkpoint (source, since, last_seen_id, next_offset, updated_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT (source) DO UPDATE SET
                since = excluded.since,
                last_seen_id = excluded.last_seen_id,
                next_offset = excluded.next_offset,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(source.as_str())
        .bind(checkpoint.since)
        .bind(checkpoint.last_seen_id.map(|id| id.get() as i64))
        .bind(checkpoint.offset as i64)
        .bind(chrono::Utc::now().timestamp())
        .execute(&self.pool)
        .await
        .map_err(|e| SyncError::Database(e.to_string()))?;

        Ok(())
    }
}
