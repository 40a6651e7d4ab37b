//! # Sync Run Repository
//!
//! Persists run records so operators can see what each source did, when, and
//! why it stopped.
//!
//! ## Overview
//!
//! - Creating a record when a run starts
//! - Updating status and counters as the run progresses
//! - Querying runs by source or status
//! - Run history retrieval

use crate::job::{RunStats, RunStatus, SyncRun, SyncRunId};
use crate::pager::CursorStrategy;
use crate::{Result, SyncError};
use async_trait::async_trait;
use bridge_traits::SourceId;
use sqlx::{FromRow, SqlitePool};

const SELECT_RUN: &str = r#"
    SELECT id, source, strategy, status,
           items_listed, items_fetched, items_merged, items_failed,
           batches_committed, batches_failed,
           error_message, started_at, completed_at, created_at
    FROM sync_runs
"#;

// ============================================================================
// Repository Trait
// ============================================================================

#[async_trait]
pub trait SyncRunRepository: Send + Sync {
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    async fn insert(&self, run: &SyncRun) -> Result<()>;

    /// # Errors
    ///
    /// Returns [`SyncError::RunNotFound`] if the run was never inserted
    async fn update(&self, run: &SyncRun) -> Result<()>;

    async fn find_by_id(&self, id: &SyncRunId) -> Result<Option<SyncRun>>;

    /// Runs for a source, most recent first.
    async fn find_by_source(&self, source: &SourceId, limit: u32) -> Result<Vec<SyncRun>>;

    async fn find_latest_by_source(&self, source: &SourceId) -> Result<Option<SyncRun>>;

    async fn find_by_status(&self, status: RunStatus) -> Result<Vec<SyncRun>>;
}

// ============================================================================
// SQLite Implementation
// ============================================================================

pub struct SqliteSyncRunRepository {
    pool: SqlitePool,
}

impl SqliteSyncRunRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct SyncRunRow {
    id: String,
    source: String,
    strategy: String,
    status: String,
    items_listed: i64,
    items_fetched: i64,
    items_merged: i64,
    items_failed: i64,
    batches_committed: i64,
    batches_failed: i64,
    error_message: Option<String>,
    started_at: Option<i64>,
    completed_at: Option<i64>,
    created_at: i64,
}

impl TryFrom<SyncRunRow> for SyncRun {
    type Error = SyncError;

    fn try_from(row: SyncRunRow) -> Result<Self> {
        let strategy: CursorStrategy = row.strategy.parse()?;
        let status: RunStatus = row.status.parse()?;

        Ok(SyncRun {
            id: SyncRunId::from_string(&row.id)?,
            source: SourceId::new(row.source),
            strategy,
            status,
            stats: RunStats {
                items_listed: row.items_listed as u64,
                items_fetched: row.items_fetched as u64,
                items_merged: row.items_merged as u64,
                items_failed: row.items_failed as u64,
                batches_committed: row.batches_committed as u64,
                batches_failed: row.batches_failed as u64,
            },
            error_message: row.error_message,
            created_at: row.created_at,
            started_at: row.started_at,
            completed_at: row.completed_at,
        })
    }
}

#[async_trait]
impl SyncRunRepository for SqliteSyncRunRepository {
    async fn insert(&self, run: &SyncRun) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO sync_runs (
                id, source, strategy, status,
                items_listed, items_fetched, items_merged, items_failed,
                batches_committed, batches_failed,
                error_message, started_at, completed_at, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(run.id.as_str())
        .bind(run.source.as_str())
        .bind(run.strategy.as_str())
        .bind(run.status.as_str())
        .bind(run.stats.items_listed as i64)
        .bind(run.stats.items_fetched as i64)
        .bind(run.stats.items_merged as i64)
        .bind(run.stats.items_failed as i64)
        .bind(run.stats.batches_committed as i64)
        .bind(run.stats.batches_failed as i64)
        .bind(&run.error_message)
        .bind(run.started_at)
        .bind(run.completed_at)
        .bind(run.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| SyncError::Database(e.to_string()))?;

        Ok(())
    }

    async fn update(&self, run: &SyncRun) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE sync_runs SET
                status = ?,
                items_listed = ?,
                items_fetched = ?,
                items_merged = ?,
                items_failed = ?,
                batches_committed = ?,
                batches_failed = ?,
                error_message = ?,
                started_at = ?,
                completed_at = ?
            WHERE id = ?
            "#,
        )
        .bind(run.status.as_str())
        .bind(run.stats.items_listed as i64)
        .bind(run.stats.items_fetched as i64)
        .bind(run.stats.items_merged as i64)
        .bind(run.stats.items_failed as i64)
        .bind(run.stats.batches_committed as i64)
        .bind(run.stats.batches_failed as i64)
        .bind(&run.error_message)
        .bind(run.started_at)
        .bind(run.completed_at)
        .bind(run.id.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| SyncError::Database(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(SyncError::RunNotFound {
                run_id: run.id.to_string(),
            });
        }

        Ok(())
    }

    async fn find_by_id(&self, id: &SyncRunId) -> Result<Option<SyncRun>> {
        let row = sqlx::query_as::<_, SyncRunRow>(&format!("{} WHERE id = ?", SELECT_RUN))
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| SyncError::Database(e.to_string()))?;

        row.map(SyncRun::try_from).transpose()
    }

    async fn find_by_source(&self, source: &SourceId, limit: u32) -> Result<Vec<SyncRun>> {
        let rows = sqlx::query_as::<_, SyncRunRow>(&format!(
            "{} WHERE source = ? ORDER BY created_at DESC, rowid DESC LIMIT ?",
            SELECT_RUN
        ))
        .bind(source.as_str())
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| SyncError::Database(e.to_string()))?;

        rows.into_iter()
            .map(SyncRun::try_from)
            .collect::<Result<Vec<_>>>()
    }

    async fn find_latest_by_source(&self, source: &SourceId) -> Result<Option<SyncRun>> {
        Ok(self.find_by_source(source, 1).await?.into_iter().next())
    }

    async fn find_by_status(&self, status: RunStatus) -> Result<Vec<SyncRun>> {
        let rows = sqlx::query_as::<_, SyncRunRow>(&format!(
            "{} WHERE status = ? ORDER BY created_at DESC, rowid DESC",
            SELECT_RUN
        ))
        .bind(status.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| SyncError::Database(e.to_string()))?;

        rows.into_iter()
            .map(SyncRun::try_from)
            .collect::<Result<Vec<_>>>()
    }
}
