//! Read access to the player table for refresh walks.

use async_trait::async_trait;
use sqlx::{Row, SqlitePool};

use crate::error::Result;
use crate::models::PlayerRecord;
use crate::steamid::SteamId;

/// Player lookups used by the profile refresh job.
#[async_trait]
pub trait PlayerDirectory: Send + Sync {
    /// Up to `limit` stored ids strictly greater than `after`, ascending.
    async fn steamids_after(&self, after: u64, limit: u32) -> Result<Vec<u64>>;

    /// A random sample of up to `limit` stored ids.
    async fn random_steamids(&self, limit: u32) -> Result<Vec<u64>>;

    async fn find(&self, steamid: SteamId) -> Result<Option<PlayerRecord>>;

    async fn count(&self) -> Result<u64>;
}

pub struct SqlitePlayerDirectory {
    pool: SqlitePool,
}

impl SqlitePlayerDirectory {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PlayerDirectory for SqlitePlayerDirectory {
    async fn steamids_after(&self, after: u64, limit: u32) -> Result<Vec<u64>> {
        let ids: Vec<i64> = sqlx::query_scalar(
            "SELECT steamid64 FROM player WHERE steamid64 > ? ORDER BY steamid64 ASC LIMIT ?",
        )
        .bind(after as i64)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(ids.into_iter().map(|id| id as u64).collect())
    }

    async fn random_steamids(&self, limit: u32) -> Result<Vec<u64>> {
        let ids: Vec<i64> =
            sqlx::query_scalar("SELECT steamid64 FROM player ORDER BY RANDOM() LIMIT ?")
                .bind(limit)
                .fetch_all(&self.pool)
                .await?;

        Ok(ids.into_iter().map(|id| id as u64).collect())
    }

    async fn find(&self, steamid: SteamId) -> Result<Option<PlayerRecord>> {
        let row = sqlx::query(
            r#"
            SELECT p.steamid64, n.name, p.avatarhash
            FROM player p
            JOIN name n USING (nameid)
            WHERE p.steamid64 = ?
            "#,
        )
        .bind(steamid.as_u64() as i64)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| -> Result<PlayerRecord> {
            Ok(PlayerRecord {
                steamid,
                name: row.try_get("name")?,
                avatar_hash: row.try_get("avatarhash")?,
            })
        })
        .transpose()
    }

    async fn count(&self) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM player")
            .fetch_one(&self.pool)
            .await?;
        Ok(count as u64)
    }
}
