use async_trait::async_trait;
use chrono::Weekday;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::{AccessError, Result};
use crate::window::{AllowedWindow, WindowBound};

/// Kid profile as supplied by the profile management collaborator
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct KidProfile {
    /// Unique identifier
    pub id: String,

    /// Owning parent account
    pub parent_id: String,

    /// Display name
    pub name: String,

    /// Parent-set hard override; denies access regardless of limits
    #[serde(default)]
    pub paused: bool,

    #[serde(default)]
    pub daily_limit_enabled: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub daily_limit_minutes: Option<u32>,

    /// Replaces the daily limit on Saturday and Sunday
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weekend_limit_minutes: Option<u32>,

    #[serde(default)]
    pub time_window_enabled: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed_start: Option<WindowBound>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed_end: Option<WindowBound>,
}

impl KidProfile {
    /// Profile with no restrictions configured
    pub fn new(
        id: impl Into<String>,
        parent_id: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            parent_id: parent_id.into(),
            name: name.into(),
            paused: false,
            daily_limit_enabled: false,
            daily_limit_minutes: None,
            weekend_limit_minutes: None,
            time_window_enabled: false,
            allowed_start: None,
            allowed_end: None,
        }
    }

    pub fn with_daily_limit(mut self, minutes: u32, weekend_minutes: Option<u32>) -> Self {
        self.daily_limit_enabled = true;
        self.daily_limit_minutes = Some(minutes);
        self.weekend_limit_minutes = weekend_minutes;
        self
    }

    pub fn with_window(mut self, start: WindowBound, end: WindowBound) -> Self {
        self.time_window_enabled = true;
        self.allowed_start = Some(start);
        self.allowed_end = Some(end);
        self
    }

    pub fn paused(mut self, paused: bool) -> Self {
        self.paused = paused;
        self
    }
}

/// State of one optional check on a profile
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rule<T> {
    /// Check is switched off
    Off,
    /// Check is switched on and fully specified
    On(T),
    /// Check is switched on but the named field is missing
    Incomplete(&'static str),
}

/// Daily consumption quota with its optional weekend override
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DailyLimit {
    pub minutes: u32,
    pub weekend_minutes: Option<u32>,
}

impl DailyLimit {
    /// Limit in force on the given local weekday
    pub fn effective_for(&self, weekday: Weekday) -> u32 {
        match (weekday, self.weekend_minutes) {
            (Weekday::Sat | Weekday::Sun, Some(weekend)) => weekend,
            _ => self.minutes,
        }
    }
}

/// Access configuration capabilities of a product-specific profile shape
///
/// Video, music and reading surfaces each store kid profiles differently;
/// implementing this trait lets all of them share one decision engine.
pub trait AccessPolicy {
    fn profile_id(&self) -> &str;

    fn is_paused(&self) -> bool;

    fn time_window(&self) -> Rule<AllowedWindow>;

    fn daily_limit(&self) -> Rule<DailyLimit>;
}

impl AccessPolicy for KidProfile {
    fn profile_id(&self) -> &str {
        &self.id
    }

    fn is_paused(&self) -> bool {
        self.paused
    }

    fn time_window(&self) -> Rule<AllowedWindow> {
        if !self.time_window_enabled {
            return Rule::Off;
        }
        match (self.allowed_start, self.allowed_end) {
            (Some(start), Some(end)) => Rule::On(AllowedWindow::new(start, end)),
            (None, _) => Rule::Incomplete("allowed_start"),
            (_, None) => Rule::Incomplete("allowed_end"),
        }
    }

    fn daily_limit(&self) -> Rule<DailyLimit> {
        if !self.daily_limit_enabled {
            return Rule::Off;
        }
        match self.daily_limit_minutes {
            Some(minutes) => Rule::On(DailyLimit {
                minutes,
                weekend_minutes: self.weekend_limit_minutes,
            }),
            None => Rule::Incomplete("daily_limit_minutes"),
        }
    }
}

/// Read-only view of kid profiles and their parent accounts
#[async_trait]
pub trait ProfileDirectory: Send + Sync {
    /// Look up a single kid profile
    async fn get_profile(&self, kid_id: &str) -> anyhow::Result<Option<KidProfile>>;

    /// All kid profiles owned by a parent, in insertion order
    async fn list_profiles(&self, parent_id: &str) -> anyhow::Result<Vec<KidProfile>>;

    /// Reference timezone of a parent account, `None` if the account is unknown
    async fn account_timezone(&self, parent_id: &str) -> anyhow::Result<Option<Tz>>;
}

/// Fetch a kid profile together with its account's reference timezone
pub(crate) async fn resolve_kid(
    directory: &dyn ProfileDirectory,
    kid_id: &str,
) -> Result<(KidProfile, Tz)> {
    let profile = directory
        .get_profile(kid_id)
        .await?
        .ok_or_else(|| AccessError::kid_not_found(kid_id))?;

    let tz = directory
        .account_timezone(&profile.parent_id)
        .await?
        .ok_or_else(|| AccessError::parent_not_found(&profile.parent_id))?;

    Ok((profile, tz))
}

/// In-memory profile directory, typically built from the configuration file
#[derive(Debug, Clone)]
pub struct StaticDirectory {
    default_timezone: Tz,
    accounts: HashMap<String, Tz>,
    profiles: Vec<KidProfile>,
}

impl StaticDirectory {
    /// Empty directory; parents without an explicit account use `default_timezone`
    pub fn new(default_timezone: Tz) -> Self {
        Self {
            default_timezone,
            accounts: HashMap::new(),
            profiles: Vec::new(),
        }
    }

    pub fn add_account(&mut self, parent_id: impl Into<String>, timezone: Tz) {
        self.accounts.insert(parent_id.into(), timezone);
    }

    /// Add a profile after checking its configuration is complete
    pub fn add_profile(&mut self, profile: KidProfile) -> Result<()> {
        crate::config::validate_kid_profile(&profile)?;

        if self.profiles.iter().any(|p| p.id == profile.id) {
            return Err(AccessError::InvalidConfig(format!(
                "Duplicate kid profile ID: {}",
                profile.id
            )));
        }

        self.profiles.push(profile);
        Ok(())
    }
}

#[async_trait]
impl ProfileDirectory for StaticDirectory {
    async fn get_profile(&self, kid_id: &str) -> anyhow::Result<Option<KidProfile>> {
        Ok(self.profiles.iter().find(|p| p.id == kid_id).cloned())
    }

    async fn list_profiles(&self, parent_id: &str) -> anyhow::Result<Vec<KidProfile>> {
        Ok(self
            .profiles
            .iter()
            .filter(|p| p.parent_id == parent_id)
            .cloned()
            .collect())
    }

    async fn account_timezone(&self, parent_id: &str) -> anyhow::Result<Option<Tz>> {
        if let Some(tz) = self.accounts.get(parent_id) {
            return Ok(Some(*tz));
        }

        // Parents only known through their kids fall back to the default zone
        let has_kids = self.profiles.iter().any(|p| p.parent_id == parent_id);
        Ok(has_kids.then_some(self.default_timezone))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bound(hour: u32) -> WindowBound {
        WindowBound::hour(hour).unwrap()
    }

    #[test]
    fn test_effective_limit_weekend_override() {
        let limit = DailyLimit {
            minutes: 60,
            weekend_minutes: Some(120),
        };
        assert_eq!(limit.effective_for(Weekday::Tue), 60);
        assert_eq!(limit.effective_for(Weekday::Fri), 60);
        assert_eq!(limit.effective_for(Weekday::Sat), 120);
        assert_eq!(limit.effective_for(Weekday::Sun), 120);
    }

    #[test]
    fn test_effective_limit_without_weekend_override() {
        let limit = DailyLimit {
            minutes: 45,
            weekend_minutes: None,
        };
        assert_eq!(limit.effective_for(Weekday::Sat), 45);
    }

    #[test]
    fn test_rules_off_by_default() {
        let profile = KidProfile::new("k1", "p1", "Alice");
        assert_eq!(profile.time_window(), Rule::Off);
        assert_eq!(profile.daily_limit(), Rule::Off);
        assert!(!profile.is_paused());
    }

    #[test]
    fn test_rules_incomplete_when_values_missing() {
        let mut profile = KidProfile::new("k1", "p1", "Alice");
        profile.time_window_enabled = true;
        profile.allowed_end = Some(bound(20));
        profile.daily_limit_enabled = true;

        assert_eq!(profile.time_window(), Rule::Incomplete("allowed_start"));
        assert_eq!(profile.daily_limit(), Rule::Incomplete("daily_limit_minutes"));
    }

    #[test]
    fn test_rules_on_when_configured() {
        let profile = KidProfile::new("k1", "p1", "Alice")
            .with_daily_limit(30, None)
            .with_window(bound(8), bound(20));

        assert_eq!(
            profile.time_window(),
            Rule::On(AllowedWindow::new(bound(8), bound(20)))
        );
        assert_eq!(
            profile.daily_limit(),
            Rule::On(DailyLimit {
                minutes: 30,
                weekend_minutes: None
            })
        );
    }

    #[test]
    fn test_profile_yaml_flat_fields() {
        let yaml = r#"
id: k1
parent_id: p1
name: Alice
daily_limit_enabled: true
daily_limit_minutes: 60
weekend_limit_minutes: 120
time_window_enabled: true
allowed_start: "07:30"
allowed_end: 20
"#;
        let profile: KidProfile = serde_yaml::from_str(yaml).unwrap();
        assert!(!profile.paused);
        assert_eq!(profile.daily_limit_minutes, Some(60));
        assert_eq!(profile.allowed_start, WindowBound::new(7, 30));
        assert_eq!(profile.allowed_end, Some(bound(20)));
    }

    #[tokio::test]
    async fn test_directory_lists_in_insertion_order() {
        let mut directory = StaticDirectory::new(chrono_tz::UTC);
        directory.add_profile(KidProfile::new("k2", "p1", "Bob")).unwrap();
        directory.add_profile(KidProfile::new("k1", "p1", "Alice")).unwrap();
        directory.add_profile(KidProfile::new("k3", "p2", "Carol")).unwrap();

        let ids: Vec<_> = directory
            .list_profiles("p1")
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.id)
            .collect();
        assert_eq!(ids, vec!["k2", "k1"]);
    }

    #[tokio::test]
    async fn test_directory_rejects_duplicates_and_incomplete_profiles() {
        let mut directory = StaticDirectory::new(chrono_tz::UTC);
        directory.add_profile(KidProfile::new("k1", "p1", "Alice")).unwrap();
        assert!(directory.add_profile(KidProfile::new("k1", "p1", "Again")).is_err());

        let mut incomplete = KidProfile::new("k2", "p1", "Bob");
        incomplete.daily_limit_enabled = true;
        assert!(matches!(
            directory.add_profile(incomplete),
            Err(AccessError::InvalidConfig(_))
        ));
    }

    #[tokio::test]
    async fn test_account_timezone_resolution() {
        let mut directory = StaticDirectory::new(chrono_tz::America::New_York);
        directory.add_account("p1", chrono_tz::Europe::Berlin);
        directory.add_profile(KidProfile::new("k1", "p1", "Alice")).unwrap();
        directory.add_profile(KidProfile::new("k2", "p2", "Bob")).unwrap();

        assert_eq!(
            directory.account_timezone("p1").await.unwrap(),
            Some(chrono_tz::Europe::Berlin)
        );
        assert_eq!(
            directory.account_timezone("p2").await.unwrap(),
            Some(chrono_tz::America::New_York)
        );
        assert_eq!(directory.account_timezone("nobody").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_resolve_kid_not_found() {
        let directory = StaticDirectory::new(chrono_tz::UTC);
        let err = resolve_kid(&directory, "ghost").await.unwrap_err();
        assert!(err.is_not_found());
    }
}
