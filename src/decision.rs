use serde::{Deserialize, Serialize};
use std::ops::ControlFlow;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::clock::{Clock, LocalInstant};
use crate::error::Result;
use crate::profile::{AccessPolicy, ProfileDirectory, Rule, resolve_kid};
use crate::usage::{UsageStore, UsageTracker};
use crate::window::{AllowedWindow, WindowBound};

/// Why access was granted or denied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DecisionReason {
    Paused,
    OutsideAllowedHours,
    DailyLimitReached,
    /// Access allowed
    None,
}

/// Single allow/deny verdict for a kid at an instant
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AccessDecision {
    pub allowed: bool,
    pub reason: DecisionReason,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub used_minutes: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit_minutes: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining_minutes: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub allowed_start: Option<WindowBound>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub allowed_end: Option<WindowBound>,
}

impl AccessDecision {
    fn blank(allowed: bool, reason: DecisionReason) -> Self {
        Self {
            allowed,
            reason,
            used_minutes: None,
            limit_minutes: None,
            remaining_minutes: None,
            allowed_start: None,
            allowed_end: None,
        }
    }

    pub fn paused() -> Self {
        Self::blank(false, DecisionReason::Paused)
    }

    pub fn outside_window(window: &AllowedWindow) -> Self {
        Self {
            allowed_start: Some(window.start),
            allowed_end: Some(window.end),
            ..Self::blank(false, DecisionReason::OutsideAllowedHours)
        }
    }

    /// Allowed with no daily limit in force
    pub fn unrestricted() -> Self {
        Self::blank(true, DecisionReason::None)
    }

    fn with_quota(mut self, used: f64, limit: u32, remaining: f64) -> Self {
        self.used_minutes = Some(used);
        self.limit_minutes = Some(limit);
        self.remaining_minutes = Some(remaining);
        self
    }

    /// Client-facing text explaining the decision
    pub fn message(&self) -> String {
        match self.reason {
            DecisionReason::Paused => "access is paused by a parent".to_string(),
            DecisionReason::OutsideAllowedHours => match (self.allowed_start, self.allowed_end) {
                (Some(start), Some(end)) => AllowedWindow::new(start, end).availability_message(),
                _ => "outside allowed hours".to_string(),
            },
            DecisionReason::DailyLimitReached => match self.limit_minutes {
                Some(limit) => format!("daily limit of {} minutes reached", limit),
                None => "daily limit reached".to_string(),
            },
            DecisionReason::None => match self.remaining_minutes {
                Some(remaining) => format!("{} minutes remaining today", remaining.floor()),
                None => "no limits apply".to_string(),
            },
        }
    }
}

/// Pause and time-window checks, in precedence order
///
/// Breaks with the blocking decision, or continues with the daily limit
/// (if any) that still has to be checked against today's usage.
pub fn evaluate_schedule<P: AccessPolicy + ?Sized>(
    policy: &P,
    now: &LocalInstant,
) -> ControlFlow<AccessDecision, Option<u32>> {
    if policy.is_paused() {
        return ControlFlow::Break(AccessDecision::paused());
    }

    match policy.time_window() {
        Rule::On(window) if !window.contains(now.time) => {
            return ControlFlow::Break(AccessDecision::outside_window(&window));
        }
        Rule::Incomplete(field) => {
            warn!(
                "Time window enabled for {} but {} is missing, skipping window check",
                policy.profile_id(),
                field
            );
        }
        _ => {}
    }

    match policy.daily_limit() {
        Rule::On(limit) => ControlFlow::Continue(Some(limit.effective_for(now.weekday()))),
        Rule::Incomplete(field) => {
            warn!(
                "Daily limit enabled for {} but {} is missing, skipping limit check",
                policy.profile_id(),
                field
            );
            ControlFlow::Continue(None)
        }
        Rule::Off => ControlFlow::Continue(None),
    }
}

/// Daily limit check against minutes already used today
pub fn evaluate_quota(limit: u32, used_minutes: f64) -> AccessDecision {
    let limit_f = limit as f64;

    if used_minutes >= limit_f {
        AccessDecision::blank(false, DecisionReason::DailyLimitReached).with_quota(
            used_minutes,
            limit,
            0.0,
        )
    } else {
        AccessDecision::blank(true, DecisionReason::None).with_quota(
            used_minutes,
            limit,
            (limit_f - used_minutes).max(0.0),
        )
    }
}

/// Decides whether a kid profile may consume content right now
pub struct AccessEngine {
    directory: Arc<dyn ProfileDirectory>,
    usage: UsageTracker,
    clock: Arc<dyn Clock>,
}

impl AccessEngine {
    pub fn new(
        directory: Arc<dyn ProfileDirectory>,
        store: Arc<dyn UsageStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let usage = UsageTracker::new(directory.clone(), store, clock.clone());
        Self {
            directory,
            usage,
            clock,
        }
    }

    /// Usage accounting sharing this engine's directory, store and clock
    pub fn usage(&self) -> &UsageTracker {
        &self.usage
    }

    pub fn directory(&self) -> &Arc<dyn ProfileDirectory> {
        &self.directory
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Access decision for a kid at the current instant
    pub async fn evaluate(&self, kid_id: &str) -> Result<AccessDecision> {
        let (profile, tz) = resolve_kid(self.directory.as_ref(), kid_id).await?;
        let now = LocalInstant::at(self.clock.now(), tz);
        self.evaluate_policy(&profile, &now).await
    }

    /// Access decision for any profile shape at a given local instant
    pub async fn evaluate_policy<P: AccessPolicy + ?Sized>(
        &self,
        policy: &P,
        now: &LocalInstant,
    ) -> Result<AccessDecision> {
        let decision = match evaluate_schedule(policy, now) {
            ControlFlow::Break(decision) => decision,
            ControlFlow::Continue(None) => AccessDecision::unrestricted(),
            ControlFlow::Continue(Some(limit)) => {
                let used = self
                    .usage
                    .store()
                    .get(policy.profile_id(), now.date)
                    .await?
                    .map(|record| record.total_minutes_used)
                    .unwrap_or(0.0);
                evaluate_quota(limit, used)
            }
        };

        debug!(
            "Access for {} at {} {}: {:?}",
            policy.profile_id(),
            now.date,
            now.time.format("%H:%M"),
            decision.reason
        );
        Ok(decision)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::profile::{DailyLimit, KidProfile, StaticDirectory};
    use crate::usage::MemoryUsageStore;
    use chrono::{NaiveDate, NaiveTime, TimeZone, Utc};

    fn bound(hour: u32) -> WindowBound {
        WindowBound::hour(hour).unwrap()
    }

    fn local(y: i32, m: u32, d: u32, hour: u32, minute: u32) -> LocalInstant {
        LocalInstant {
            date: NaiveDate::from_ymd_opt(y, m, d).unwrap(),
            time: NaiveTime::from_hms_opt(hour, minute, 0).unwrap(),
        }
    }

    // Tuesday afternoon
    fn tuesday() -> LocalInstant {
        local(2025, 11, 18, 14, 0)
    }

    fn engine_with(profiles: Vec<KidProfile>) -> (AccessEngine, Arc<FixedClock>) {
        let mut directory = StaticDirectory::new(chrono_tz::UTC);
        for profile in profiles {
            directory.add_profile(profile).unwrap();
        }
        let clock = Arc::new(FixedClock::new(
            Utc.with_ymd_and_hms(2025, 11, 18, 14, 0, 0).unwrap(),
        ));
        let engine = AccessEngine::new(
            Arc::new(directory),
            Arc::new(MemoryUsageStore::new()),
            clock.clone(),
        );
        (engine, clock)
    }

    #[test]
    fn test_pause_wins_over_everything() {
        let profile = KidProfile::new("k1", "p1", "Alice")
            .with_window(bound(8), bound(20))
            .with_daily_limit(60, None)
            .paused(true);

        let flow = evaluate_schedule(&profile, &tuesday());
        assert_eq!(flow, ControlFlow::Break(AccessDecision::paused()));
    }

    #[test]
    fn test_window_blocks_before_quota() {
        let profile = KidProfile::new("k1", "p1", "Alice")
            .with_window(bound(8), bound(20))
            .with_daily_limit(60, None);

        let ControlFlow::Break(decision) = evaluate_schedule(&profile, &local(2025, 11, 18, 21, 0))
        else {
            panic!("expected the window to block");
        };
        assert!(!decision.allowed);
        assert_eq!(decision.reason, DecisionReason::OutsideAllowedHours);
        assert_eq!(decision.allowed_start, Some(bound(8)));
        assert_eq!(decision.allowed_end, Some(bound(20)));
        assert_eq!(decision.used_minutes, None);
        assert_eq!(decision.message(), "available from 8:00 AM to 8:00 PM");
    }

    #[test]
    fn test_inside_window_continues_to_quota() {
        let profile = KidProfile::new("k1", "p1", "Alice")
            .with_window(bound(22), bound(6))
            .with_daily_limit(60, Some(120));

        assert_eq!(
            evaluate_schedule(&profile, &local(2025, 11, 18, 23, 0)),
            ControlFlow::Continue(Some(60))
        );
        // Saturday after midnight
        assert_eq!(
            evaluate_schedule(&profile, &local(2025, 11, 15, 2, 0)),
            ControlFlow::Continue(Some(120))
        );
    }

    #[test]
    fn test_incomplete_checks_are_skipped() {
        let mut profile = KidProfile::new("k1", "p1", "Alice");
        profile.time_window_enabled = true;
        profile.allowed_start = Some(bound(8));
        profile.daily_limit_enabled = true;

        assert_eq!(
            evaluate_schedule(&profile, &local(2025, 11, 18, 3, 0)),
            ControlFlow::Continue(None)
        );
    }

    #[test]
    fn test_quota_under_and_over_limit() {
        let allowed = evaluate_quota(30, 20.0);
        assert!(allowed.allowed);
        assert_eq!(allowed.reason, DecisionReason::None);
        assert_eq!(allowed.remaining_minutes, Some(10.0));
        assert_eq!(allowed.message(), "10 minutes remaining today");

        let exact = evaluate_quota(30, 30.0);
        assert!(!exact.allowed);
        assert_eq!(exact.reason, DecisionReason::DailyLimitReached);

        let over = evaluate_quota(30, 35.0);
        assert_eq!(over.used_minutes, Some(35.0));
        assert_eq!(over.limit_minutes, Some(30));
        assert_eq!(over.remaining_minutes, Some(0.0));
        assert_eq!(over.message(), "daily limit of 30 minutes reached");
    }

    #[test]
    fn test_reason_serializes_screaming_case() {
        let json = serde_json::to_value(AccessDecision::outside_window(&AllowedWindow::new(
            bound(8),
            WindowBound::new(20, 30).unwrap(),
        )))
        .unwrap();

        assert_eq!(json["reason"], "OUTSIDE_ALLOWED_HOURS");
        assert_eq!(json["allowed_start"], 8);
        assert_eq!(json["allowed_end"], "20:30");
        assert!(json.get("used_minutes").is_none());
    }

    #[tokio::test]
    async fn test_paused_inside_window_under_limit() {
        let (engine, _) = engine_with(vec![
            KidProfile::new("k1", "p1", "Alice")
                .with_window(bound(8), bound(20))
                .with_daily_limit(60, None)
                .paused(true),
        ]);

        let decision = engine.evaluate("k1").await.unwrap();
        assert!(!decision.allowed);
        assert_eq!(decision.reason, DecisionReason::Paused);
    }

    #[tokio::test]
    async fn test_outside_window_under_limit() {
        let (engine, clock) = engine_with(vec![
            KidProfile::new("k1", "p1", "Alice")
                .with_window(bound(8), bound(20))
                .with_daily_limit(60, None),
        ]);
        clock.set(Utc.with_ymd_and_hms(2025, 11, 18, 21, 30, 0).unwrap());

        let decision = engine.evaluate("k1").await.unwrap();
        assert_eq!(decision.reason, DecisionReason::OutsideAllowedHours);
    }

    #[tokio::test]
    async fn test_weekend_override() {
        let (engine, clock) = engine_with(vec![
            KidProfile::new("k1", "p1", "Alice").with_daily_limit(60, Some(120)),
        ]);

        // Saturday
        clock.set(Utc.with_ymd_and_hms(2025, 11, 15, 14, 0, 0).unwrap());
        engine.usage().add_usage("k1", 90.0).await.unwrap();
        let decision = engine.evaluate("k1").await.unwrap();
        assert!(decision.allowed);
        assert_eq!(decision.limit_minutes, Some(120));
        assert_eq!(decision.remaining_minutes, Some(30.0));

        // Tuesday with the same usage
        clock.set(Utc.with_ymd_and_hms(2025, 11, 18, 14, 0, 0).unwrap());
        engine.usage().add_usage("k1", 90.0).await.unwrap();
        let decision = engine.evaluate("k1").await.unwrap();
        assert!(!decision.allowed);
        assert_eq!(decision.reason, DecisionReason::DailyLimitReached);
        assert_eq!(decision.limit_minutes, Some(60));
    }

    #[tokio::test]
    async fn test_limit_scenario() {
        let (engine, _) = engine_with(vec![
            KidProfile::new("k1", "p1", "Alice").with_daily_limit(30, None),
        ]);

        engine.usage().add_usage("k1", 20.0).await.unwrap();
        let decision = engine.evaluate("k1").await.unwrap();
        assert!(decision.allowed);
        assert_eq!(decision.remaining_minutes, Some(10.0));

        let total = engine.usage().add_usage("k1", 15.0).await.unwrap();
        assert_eq!(total, 35.0);
        let decision = engine.evaluate("k1").await.unwrap();
        assert_eq!(
            decision,
            AccessDecision {
                allowed: false,
                reason: DecisionReason::DailyLimitReached,
                used_minutes: Some(35.0),
                limit_minutes: Some(30),
                remaining_minutes: Some(0.0),
                allowed_start: None,
                allowed_end: None,
            }
        );
    }

    #[tokio::test]
    async fn test_reset_restores_access() {
        let (engine, _) = engine_with(vec![
            KidProfile::new("k1", "p1", "Alice").with_daily_limit(30, None),
        ]);

        engine.usage().add_usage("k1", 45.0).await.unwrap();
        assert!(!engine.evaluate("k1").await.unwrap().allowed);

        engine.usage().reset_daily_usage("k1").await.unwrap();
        let decision = engine.evaluate("k1").await.unwrap();
        assert!(decision.allowed);
        assert_eq!(decision.remaining_minutes, Some(30.0));
    }

    #[tokio::test]
    async fn test_no_limits_configured() {
        let (engine, _) = engine_with(vec![KidProfile::new("k1", "p1", "Alice")]);

        let decision = engine.evaluate("k1").await.unwrap();
        assert_eq!(decision, AccessDecision::unrestricted());
        assert_eq!(decision.message(), "no limits apply");
    }

    #[tokio::test]
    async fn test_unknown_kid() {
        let (engine, _) = engine_with(vec![]);
        assert!(engine.evaluate("ghost").await.unwrap_err().is_not_found());
    }

    /// Profile shape of another product surface, sharing the same engine
    struct ListeningProfile {
        id: String,
        locked: bool,
        minutes_per_day: u32,
    }

    impl AccessPolicy for ListeningProfile {
        fn profile_id(&self) -> &str {
            &self.id
        }

        fn is_paused(&self) -> bool {
            self.locked
        }

        fn time_window(&self) -> Rule<AllowedWindow> {
            Rule::Off
        }

        fn daily_limit(&self) -> Rule<DailyLimit> {
            Rule::On(DailyLimit {
                minutes: self.minutes_per_day,
                weekend_minutes: None,
            })
        }
    }

    #[tokio::test]
    async fn test_engine_accepts_other_profile_shapes() {
        let (engine, _) = engine_with(vec![
            KidProfile::new("m1", "p1", "Alice").with_daily_limit(500, None),
        ]);
        engine.usage().add_usage("m1", 25.0).await.unwrap();

        let listening = ListeningProfile {
            id: "m1".to_string(),
            locked: false,
            minutes_per_day: 20,
        };
        let decision = engine.evaluate_policy(&listening, &tuesday()).await.unwrap();
        assert_eq!(decision.reason, DecisionReason::DailyLimitReached);
        assert_eq!(decision.limit_minutes, Some(20));
    }
}
