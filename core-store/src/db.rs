//! SQLite pool setup for the match store.
//!
//! File databases run in WAL mode so history queries can read while a batch
//! merge holds the write lock. Every pool enforces foreign keys and has the
//! embedded migrations applied before it is handed out.

use crate::{Result, StoreError};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::{info, warn};

/// Where the store lives and how many connections may reach it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseConfig {
    /// `sqlite:<path>` or `sqlite::memory:`
    pub database_url: String,
    pub max_connections: u32,
    /// How long a writer waits on a locked database before failing the batch.
    pub busy_timeout: Duration,
}

impl DatabaseConfig {
    pub fn new(database_path: impl AsRef<Path>) -> Self {
        Self {
            database_url: format!("sqlite:{}", database_path.as_ref().display()),
            max_connections: 5,
            busy_timeout: Duration::from_secs(5),
        }
    }

    /// Every connection to `:memory:` opens its own private database, so the
    /// pool is pinned to one connection.
    pub fn in_memory() -> Self {
        Self {
            database_url: "sqlite::memory:".to_string(),
            max_connections: 1,
            busy_timeout: Duration::from_secs(5),
        }
    }

    fn is_memory(&self) -> bool {
        self.database_url.contains(":memory:")
    }
}

/// Open the store and bring its schema up to date.
pub async fn create_pool(config: DatabaseConfig) -> Result<SqlitePool> {
    info!(database_url = %config.database_url, "Opening match store");

    let connect_options = SqliteConnectOptions::from_str(&config.database_url)?
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .foreign_keys(true)
        .create_if_missing(true)
        .busy_timeout(config.busy_timeout);

    let mut pool_options = SqlitePoolOptions::new()
        .min_connections(1)
        .max_connections(config.max_connections);
    if config.is_memory() {
        // Recycling the only connection would drop the database.
        pool_options = pool_options.max_lifetime(None).idle_timeout(None);
    }

    let pool = pool_options
        .connect_with(connect_options)
        .await
        .map_err(|e| {
            warn!(error = %e, "Failed to open match store");
            StoreError::Database(e)
        })?;

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .map_err(|e| {
            warn!(error = %e, "Migration failed");
            StoreError::Migration(e.to_string())
        })?;

    info!(connections = pool.size(), "Match store ready");
    Ok(pool)
}

/// In-memory store with migrations applied.
pub async fn create_test_pool() -> Result<SqlitePool> {
    create_pool(DatabaseConfig::in_memory()).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_urls() {
        assert_eq!(
            DatabaseConfig::new("importer.db").database_url,
            "sqlite:importer.db"
        );
        assert!(DatabaseConfig::in_memory().is_memory());
        assert!(!DatabaseConfig::new("importer.db").is_memory());
        assert_eq!(DatabaseConfig::in_memory().max_connections, 1);
    }

    #[tokio::test]
    async fn test_foreign_keys_enabled() {
        let pool = create_test_pool().await.unwrap();

        let result: (i32,) = sqlx::query_as("PRAGMA foreign_keys")
            .fetch_one(&pool)
            .await
            .unwrap();

        assert_eq!(result.0, 1);
    }

    #[tokio::test]
    async fn test_file_database_uses_wal() {
        let dir = tempfile::tempdir().unwrap();
        let pool = create_pool(DatabaseConfig::new(dir.path().join("importer.db")))
            .await
            .unwrap();

        let result: (String,) = sqlx::query_as("PRAGMA journal_mode")
            .fetch_one(&pool)
            .await
            .unwrap();

        assert_eq!(result.0.to_lowercase(), "wal");
    }

    #[tokio::test]
    async fn test_migrations_create_tables() {
        let pool = create_test_pool().await.unwrap();

        for table in [
            "name",
            "map",
            "player",
            "log",
            "log_player",
            "demo",
            "demo_player",
            "league_team",
            "league_match",
            "league_transfer",
            "sync_checkpoint",
            "sync_runs",
        ] {
            let result: (i32,) =
                sqlx::query_as("SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?")
                    .bind(table)
                    .fetch_one(&pool)
                    .await
                    .unwrap();
            assert_eq!(result.0, 1, "{} table should exist", table);
        }
    }
}
