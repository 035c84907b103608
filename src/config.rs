use anyhow::{Context, Result};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::error::AccessError;
use crate::profile::{KidProfile, StaticDirectory};

/// Main access configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AccessConfig {
    /// Timezone for parents without an explicit account entry
    #[serde(default = "default_timezone")]
    pub default_timezone: Tz,

    /// Usage ledger settings
    #[serde(default)]
    pub store: StoreConfig,

    /// Parent accounts
    #[serde(default)]
    pub accounts: Vec<AccountConfig>,

    /// Kid profiles
    #[serde(default)]
    pub kids: Vec<KidProfile>,
}

fn default_timezone() -> Tz {
    Tz::UTC
}

/// Parent account with its reference timezone
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AccountConfig {
    pub id: String,

    /// IANA timezone, e.g. `Europe/Berlin`
    pub timezone: Tz,
}

/// Usage ledger settings
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct StoreConfig {
    /// Usage database location; platform data directory when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

impl AccessConfig {
    /// Profile directory over this configuration
    pub fn directory(&self) -> crate::error::Result<StaticDirectory> {
        let mut directory = StaticDirectory::new(self.default_timezone);

        for account in &self.accounts {
            directory.add_account(account.id.clone(), account.timezone);
        }
        for kid in &self.kids {
            directory.add_profile(kid.clone())?;
        }

        Ok(directory)
    }

    /// Configured usage file, or the platform default
    pub fn usage_path(&self) -> Result<PathBuf> {
        match &self.store.path {
            Some(path) => Ok(path.clone()),
            None => get_usage_path(),
        }
    }
}

/// Get the platform-specific config file path
pub fn get_config_path() -> Result<PathBuf> {
    Ok(crate::platform::config_dir()?.join("config.yaml"))
}

/// Get the platform-specific usage database path
pub fn get_usage_path() -> Result<PathBuf> {
    Ok(crate::platform::data_dir()?.join("usage.db"))
}

/// Load configuration from YAML file
pub fn load_config(path: &Path) -> Result<AccessConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: AccessConfig = serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse YAML config file: {}", path.display()))?;

    validate_config(&config)
        .with_context(|| format!("Invalid config file: {}", path.display()))?;

    Ok(config)
}

/// Validate configuration
pub fn validate_config(config: &AccessConfig) -> crate::error::Result<()> {
    let mut account_ids = HashSet::new();
    for account in &config.accounts {
        if account.id.is_empty() {
            return Err(invalid("Account ID cannot be empty"));
        }
        if !account_ids.insert(account.id.as_str()) {
            return Err(invalid(format!("Duplicate account ID: {}", account.id)));
        }
    }

    let mut kid_ids = HashSet::new();
    for kid in &config.kids {
        if !kid_ids.insert(kid.id.as_str()) {
            return Err(invalid(format!("Duplicate kid profile ID: {}", kid.id)));
        }

        validate_kid_profile(kid)?;
    }

    Ok(())
}

/// Validate a kid profile: every enabled check must carry its values
pub fn validate_kid_profile(kid: &KidProfile) -> crate::error::Result<()> {
    if kid.id.is_empty() {
        return Err(invalid("Kid profile ID cannot be empty"));
    }

    if kid.parent_id.is_empty() {
        return Err(invalid(format!("Kid profile '{}' has no parent_id", kid.id)));
    }

    if kid.daily_limit_enabled {
        match kid.daily_limit_minutes {
            None => {
                return Err(invalid(format!(
                    "Kid profile '{}' enables a daily limit without daily_limit_minutes",
                    kid.id
                )));
            }
            Some(0) => {
                return Err(invalid(format!(
                    "Kid profile '{}' daily_limit_minutes must be positive",
                    kid.id
                )));
            }
            Some(_) => {}
        }
    }

    if kid.weekend_limit_minutes == Some(0) {
        return Err(invalid(format!(
            "Kid profile '{}' weekend_limit_minutes must be positive",
            kid.id
        )));
    }

    if kid.time_window_enabled && (kid.allowed_start.is_none() || kid.allowed_end.is_none()) {
        return Err(invalid(format!(
            "Kid profile '{}' enables a time window without allowed_start and allowed_end",
            kid.id
        )));
    }

    Ok(())
}

fn invalid(message: impl Into<String>) -> AccessError {
    AccessError::InvalidConfig(message.into())
}

/// Example configuration file content
pub const EXAMPLE_CONFIG: &str = include_str!("../example-config.yaml");
