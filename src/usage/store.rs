use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

/// Consumption for one kid on one calendar day
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct DailyUsageRecord {
    pub kid_profile_id: String,
    pub date: NaiveDate, // YYYY-MM-DD in the account's timezone
    pub total_minutes_used: f64,
    pub last_updated_at: DateTime<Utc>,
}

/// Durable per-kid, per-day usage counters
///
/// Implementations must apply `increment` as a single atomic
/// read-modify-write at the storage layer: concurrent increments of the
/// same (kid, date), from any number of handles, are all reflected in the
/// final total.
#[async_trait]
pub trait UsageStore: Send + Sync {
    /// Add minutes to the (kid, date) counter, creating it on first use.
    ///
    /// Returns the new total, or `None` without writing anything when the
    /// new total would not be a finite number.
    async fn increment(
        &self,
        kid_id: &str,
        date: NaiveDate,
        minutes: f64,
        at: DateTime<Utc>,
    ) -> Result<Option<f64>>;

    /// Record for (kid, date), if one exists
    async fn get(&self, kid_id: &str, date: NaiveDate) -> Result<Option<DailyUsageRecord>>;

    /// Zero the (kid, date) counter if a record exists.
    /// Returns whether a record was found.
    async fn reset(&self, kid_id: &str, date: NaiveDate, at: DateTime<Utc>) -> Result<bool>;

    /// Records for a kid dated on or after `since`, newest first
    async fn history(&self, kid_id: &str, since: NaiveDate) -> Result<Vec<DailyUsageRecord>>;
}

/// Usage records held in memory
#[derive(Debug, Clone, Default)]
pub struct UsageLedger {
    pub records: Vec<DailyUsageRecord>,
}

impl UsageLedger {
    pub fn new() -> Self {
        Self::default()
    }

    fn position(&self, kid_id: &str, date: NaiveDate) -> Option<usize> {
        self.records
            .iter()
            .position(|r| r.kid_profile_id == kid_id && r.date == date)
    }

    pub fn get(&self, kid_id: &str, date: NaiveDate) -> Option<&DailyUsageRecord> {
        self.position(kid_id, date).map(|pos| &self.records[pos])
    }

    /// Add minutes to an existing record or create it
    ///
    /// Leaves the ledger untouched and returns `None` if the new total
    /// would not be finite.
    pub fn increment(
        &mut self,
        kid_id: &str,
        date: NaiveDate,
        minutes: f64,
        at: DateTime<Utc>,
    ) -> Option<f64> {
        let current = self.get(kid_id, date).map_or(0.0, |r| r.total_minutes_used);
        let total = current + minutes;
        if !total.is_finite() {
            return None;
        }

        match self.position(kid_id, date) {
            Some(pos) => {
                let record = &mut self.records[pos];
                record.total_minutes_used = total;
                record.last_updated_at = at;
            }
            None => self.records.push(DailyUsageRecord {
                kid_profile_id: kid_id.to_string(),
                date,
                total_minutes_used: total,
                last_updated_at: at,
            }),
        }
        Some(total)
    }

    /// Zero an existing record; never creates one
    pub fn reset(&mut self, kid_id: &str, date: NaiveDate, at: DateTime<Utc>) -> bool {
        match self.position(kid_id, date) {
            Some(pos) => {
                let record = &mut self.records[pos];
                if record.total_minutes_used != 0.0 {
                    record.total_minutes_used = 0.0;
                    record.last_updated_at = at;
                }
                true
            }
            None => false,
        }
    }

    pub fn history(&self, kid_id: &str, since: NaiveDate) -> Vec<DailyUsageRecord> {
        let mut records: Vec<_> = self
            .records
            .iter()
            .filter(|r| r.kid_profile_id == kid_id && r.date >= since)
            .cloned()
            .collect();
        records.sort_by(|a, b| b.date.cmp(&a.date));
        records
    }
}

/// Usage store held entirely in memory
#[derive(Debug, Default)]
pub struct MemoryUsageStore {
    ledger: Mutex<UsageLedger>,
}

impl MemoryUsageStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UsageStore for MemoryUsageStore {
    async fn increment(
        &self,
        kid_id: &str,
        date: NaiveDate,
        minutes: f64,
        at: DateTime<Utc>,
    ) -> Result<Option<f64>> {
        let mut ledger = self.ledger.lock().await;
        Ok(ledger.increment(kid_id, date, minutes, at))
    }

    async fn get(&self, kid_id: &str, date: NaiveDate) -> Result<Option<DailyUsageRecord>> {
        Ok(self.ledger.lock().await.get(kid_id, date).cloned())
    }

    async fn reset(&self, kid_id: &str, date: NaiveDate, at: DateTime<Utc>) -> Result<bool> {
        Ok(self.ledger.lock().await.reset(kid_id, date, at))
    }

    async fn history(&self, kid_id: &str, since: NaiveDate) -> Result<Vec<DailyUsageRecord>> {
        Ok(self.ledger.lock().await.history(kid_id, since))
    }
}
