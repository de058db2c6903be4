//! SQLite-backed persistent cache tier.
//!
//! Rows outlive the memory TTL by design of the read path: freshness is
//! judged by the caller from `written_at`, and rows are only swept once they
//! pass the retention horizon.

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use time::OffsetDateTime;
use tracing::{debug, warn};

use crate::cache::{CacheTier, TierEntry};

use super::error::InfraError;

const SOURCE: &str = "courtside::infra::store";

#[derive(sqlx::FromRow)]
struct EntryRow {
    value: String,
    written_at: i64,
}

#[derive(Clone, Debug)]
pub struct SqliteStore {
    pool: SqlitePool,
    retention: Duration,
}

impl SqliteStore {
    pub async fn connect(url: &str, retention: Duration) -> Result<Self, InfraError> {
        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
        let pool_options = if url.contains(":memory:") {
            // Every connection to `:memory:` is its own database.
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(4)
        };
        let pool = pool_options.connect_with(options).await?;
        Self::run_migrations(&pool).await?;
        debug!(target = SOURCE, url, "persistent cache ready");
        Ok(Self { pool, retention })
    }

    pub async fn run_migrations(pool: &SqlitePool) -> Result<(), InfraError> {
        sqlx::migrate!("./migrations")
            .run(pool)
            .await
            .map_err(|err| InfraError::storage(err.to_string()))
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    fn expires_at(&self, now: i64) -> i64 {
        now.saturating_add(self.retention.as_millis() as i64)
    }

    async fn try_get(&self, key: &str) -> Result<Option<TierEntry>, InfraError> {
        let row = sqlx::query_as::<_, EntryRow>(
            "SELECT value, written_at FROM cache_entries WHERE key = ? AND expires_at > ?",
        )
        .bind(key)
        .bind(now_millis())
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let value = serde_json::from_str(&row.value)
            .map_err(|err| InfraError::storage(format!("corrupt entry `{key}`: {err}")))?;
        Ok(Some(TierEntry {
            value,
            written_at: from_millis(row.written_at),
        }))
    }

    async fn try_set(&self, key: &str, value: &Value) -> Result<(), InfraError> {
        let now = now_millis();
        sqlx::query(
            "INSERT INTO cache_entries (key, value, written_at, expires_at) VALUES (?, ?, ?, ?) \
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, \
             written_at = excluded.written_at, expires_at = excluded.expires_at",
        )
        .bind(key)
        .bind(value.to_string())
        .bind(now)
        .bind(self.expires_at(now))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    fn report(&self, op: &'static str, key: &str, err: &InfraError) {
        warn!(target = SOURCE, op, key, error = %err, "persistent cache operation failed");
    }
}

#[async_trait]
impl CacheTier for SqliteStore {
    fn name(&self) -> &'static str {
        "persistent"
    }

    async fn get(&self, key: &str) -> Option<TierEntry> {
        match self.try_get(key).await {
            Ok(entry) => entry,
            Err(err) => {
                self.report("get", key, &err);
                None
            }
        }
    }

    /// Rows are kept for the retention horizon regardless of `ttl`.
    async fn set(&self, key: &str, value: &Value, _ttl: Duration) {
        if let Err(err) = self.try_set(key, value).await {
            self.report("set", key, &err);
        }
    }

    async fn delete(&self, key: &str) {
        let result = sqlx::query("DELETE FROM cache_entries WHERE key = ?")
            .bind(key)
            .execute(&self.pool)
            .await;
        if let Err(err) = result {
            self.report("delete", key, &err.into());
        }
    }

    async fn clear(&self) {
        if let Err(err) = sqlx::query("DELETE FROM cache_entries")
            .execute(&self.pool)
            .await
        {
            self.report("clear", "*", &err.into());
        }
    }

    async fn cleanup(&self) -> usize {
        match sqlx::query("DELETE FROM cache_entries WHERE expires_at <= ?")
            .bind(now_millis())
            .execute(&self.pool)
            .await
        {
            Ok(done) => done.rows_affected() as usize,
            Err(err) => {
                self.report("cleanup", "*", &err.into());
                0
            }
        }
    }

    async fn touch(&self, key: &str) {
        let now = now_millis();
        let result =
            sqlx::query("UPDATE cache_entries SET written_at = ?, expires_at = ? WHERE key = ?")
                .bind(now)
                .bind(self.expires_at(now))
                .bind(key)
                .execute(&self.pool)
                .await;
        if let Err(err) = result {
            self.report("touch", key, &err.into());
        }
    }
}

fn now_millis() -> i64 {
    (OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64
}

fn from_millis(millis: i64) -> OffsetDateTime {
    OffsetDateTime::from_unix_timestamp_nanos(i128::from(millis) * 1_000_000)
        .unwrap_or(OffsetDateTime::UNIX_EPOCH)
}
