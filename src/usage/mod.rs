//! Usage accounting for kid profiles
//!
//! Playback clients report elapsed minutes here; the access engine reads
//! today's total back when checking daily limits. "Today" is always the
//! calendar day of the kid's parent account timezone.

pub mod sqlite;
pub mod store;

pub use sqlite::SqliteUsageStore;
pub use store::{DailyUsageRecord, MemoryUsageStore, UsageLedger, UsageStore};

use chrono::{DateTime, Days, NaiveDate, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info};

use crate::clock::{Clock, LocalInstant};
use crate::error::{AccessError, Result};
use crate::profile::{ProfileDirectory, resolve_kid};

/// Today's usage for a kid; zeroed when nothing was reported yet
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UsageToday {
    pub date: NaiveDate,
    pub total_minutes_used: f64,
    pub last_updated_at: Option<DateTime<Utc>>,
}

/// Records and reads per-day consumption for kid profiles
#[derive(Clone)]
pub struct UsageTracker {
    directory: Arc<dyn ProfileDirectory>,
    store: Arc<dyn UsageStore>,
    clock: Arc<dyn Clock>,
}

impl UsageTracker {
    pub fn new(
        directory: Arc<dyn ProfileDirectory>,
        store: Arc<dyn UsageStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            directory,
            store,
            clock,
        }
    }

    pub fn store(&self) -> &Arc<dyn UsageStore> {
        &self.store
    }

    /// Resolve the kid and the current instant in its account's timezone
    async fn kid_today(&self, kid_id: &str) -> Result<(DateTime<Utc>, NaiveDate)> {
        let (_, tz) = resolve_kid(self.directory.as_ref(), kid_id).await?;
        let now = self.clock.now();
        Ok((now, LocalInstant::at(now, tz).date))
    }

    /// Add consumed minutes to today's counter and return the new total
    pub async fn add_usage(&self, kid_id: &str, minutes: f64) -> Result<f64> {
        if !minutes.is_finite() || minutes <= 0.0 {
            return Err(AccessError::InvalidArgument(format!(
                "minutes must be a positive finite number, got {}",
                minutes
            )));
        }

        let (now, today) = self.kid_today(kid_id).await?;
        let total = self
            .store
            .increment(kid_id, today, minutes, now)
            .await?
            .ok_or_else(|| {
                AccessError::InvalidArgument(format!(
                    "adding {} minutes would overflow today's total for {}",
                    minutes, kid_id
                ))
            })?;

        info!(
            "Recorded {} minutes for kid {} on {} (total {})",
            minutes, kid_id, today, total
        );
        Ok(total)
    }

    /// Today's usage, with zeroed defaults when no record exists yet
    pub async fn get_usage_today(&self, kid_id: &str) -> Result<UsageToday> {
        let (_, today) = self.kid_today(kid_id).await?;

        let usage = match self.store.get(kid_id, today).await? {
            Some(record) => UsageToday {
                date: record.date,
                total_minutes_used: record.total_minutes_used,
                last_updated_at: Some(record.last_updated_at),
            },
            None => UsageToday {
                date: today,
                total_minutes_used: 0.0,
                last_updated_at: None,
            },
        };

        Ok(usage)
    }

    /// Zero today's counter; does nothing when no usage was reported today
    pub async fn reset_daily_usage(&self, kid_id: &str) -> Result<()> {
        let (now, today) = self.kid_today(kid_id).await?;

        if self.store.reset(kid_id, today, now).await? {
            info!("Reset usage for kid {} on {}", kid_id, today);
        } else {
            debug!("No usage recorded for kid {} on {}, nothing to reset", kid_id, today);
        }

        Ok(())
    }

    /// Records dated within the last `days` days (today included), newest first
    pub async fn get_usage_history(
        &self,
        kid_id: &str,
        days: u32,
    ) -> Result<Vec<DailyUsageRecord>> {
        let (_, today) = self.kid_today(kid_id).await?;
        let since = today
            .checked_sub_days(Days::new(days as u64))
            .unwrap_or(NaiveDate::MIN);

        Ok(self.store.history(kid_id, since).await?)
    }
}
