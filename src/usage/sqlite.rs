use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::Row;
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteRow,
};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

use super::store::{DailyUsageRecord, UsageStore};
use crate::platform::common::ensure_directory_exists;

/// How long a writer waits for another connection or process to release the lock
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const MAX_CONNECTIONS: u32 = 4;

/// Usage store persisted in a SQLite database file
///
/// Every mutation is a single SQL statement, so SQLite's write lock makes
/// each read-modify-write atomic across all connections and all processes
/// sharing the file.
pub struct SqliteUsageStore {
    path: PathBuf,
    pool: SqlitePool,
}

impl SqliteUsageStore {
    /// Open the database at `path`, creating the file and schema on first use
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            ensure_directory_exists(parent)?;
        }

        let options = SqliteConnectOptions::new()
            .filename(&path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(BUSY_TIMEOUT);

        let pool = SqlitePoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .connect_with(options)
            .await
            .with_context(|| format!("Failed to open usage database: {}", path.display()))?;

        setup_schema(&pool).await?;

        debug!("Opened usage database {}", path.display());
        Ok(Self { path, pool })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Close all pooled connections
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

async fn setup_schema(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS daily_usage (
            kid_profile_id TEXT NOT NULL,
            date TEXT NOT NULL,
            total_minutes_used REAL NOT NULL,
            last_updated_at TEXT NOT NULL,
            PRIMARY KEY (kid_profile_id, date)
        )
        "#,
    )
    .execute(pool)
    .await
    .context("Failed to create usage schema")?;

    Ok(())
}

fn record_from_row(row: &SqliteRow) -> Result<DailyUsageRecord> {
    Ok(DailyUsageRecord {
        kid_profile_id: row.try_get("kid_profile_id")?,
        date: row.try_get("date")?,
        total_minutes_used: row.try_get("total_minutes_used")?,
        last_updated_at: row.try_get("last_updated_at")?,
    })
}

#[async_trait]
impl UsageStore for SqliteUsageStore {
    async fn increment(
        &self,
        kid_id: &str,
        date: NaiveDate,
        minutes: f64,
        at: DateTime<Utc>,
    ) -> Result<Option<f64>> {
        // The WHERE guard leaves an existing row untouched (and returns no
        // row) when the new total would overflow to infinity
        let row = sqlx::query(
            r#"
            INSERT INTO daily_usage (kid_profile_id, date, total_minutes_used, last_updated_at)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT (kid_profile_id, date) DO UPDATE SET
                total_minutes_used = daily_usage.total_minutes_used + excluded.total_minutes_used,
                last_updated_at = excluded.last_updated_at
            WHERE daily_usage.total_minutes_used + excluded.total_minutes_used <= ?5
            RETURNING total_minutes_used
            "#,
        )
        .bind(kid_id)
        .bind(date)
        .bind(minutes)
        .bind(at)
        .bind(f64::MAX)
        .fetch_optional(&self.pool)
        .await
        .with_context(|| format!("Failed to record usage for {} on {}", kid_id, date))?;

        match row {
            Some(row) => Ok(Some(row.try_get("total_minutes_used")?)),
            None => Ok(None),
        }
    }

    async fn get(&self, kid_id: &str, date: NaiveDate) -> Result<Option<DailyUsageRecord>> {
        let row = sqlx::query(
            r#"
            SELECT kid_profile_id, date, total_minutes_used, last_updated_at
            FROM daily_usage
            WHERE kid_profile_id = ?1 AND date = ?2
            "#,
        )
        .bind(kid_id)
        .bind(date)
        .fetch_optional(&self.pool)
        .await
        .with_context(|| format!("Failed to read usage for {} on {}", kid_id, date))?;

        row.as_ref().map(record_from_row).transpose()
    }

    async fn reset(&self, kid_id: &str, date: NaiveDate, at: DateTime<Utc>) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE daily_usage
            SET total_minutes_used = 0.0,
                last_updated_at = CASE
                    WHEN total_minutes_used = 0.0 THEN last_updated_at
                    ELSE ?1
                END
            WHERE kid_profile_id = ?2 AND date = ?3
            "#,
        )
        .bind(at)
        .bind(kid_id)
        .bind(date)
        .execute(&self.pool)
        .await
        .with_context(|| format!("Failed to reset usage for {} on {}", kid_id, date))?;

        Ok(result.rows_affected() > 0)
    }

    async fn history(&self, kid_id: &str, since: NaiveDate) -> Result<Vec<DailyUsageRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT kid_profile_id, date, total_minutes_used, last_updated_at
            FROM daily_usage
            WHERE kid_profile_id = ?1 AND date >= ?2
            ORDER BY date DESC
            "#,
        )
        .bind(kid_id)
        .bind(since)
        .fetch_all(&self.pool)
        .await
        .with_context(|| format!("Failed to read usage history for {}", kid_id))?;

        rows.iter().map(record_from_row).collect()
    }
}
