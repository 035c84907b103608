//! Time-based access control for kid profiles
//!
//! Decides, at any instant, whether a kid profile may consume content,
//! and keeps the per-day usage accounting that feeds the decision:
//!
//! - [`usage`] records consumed minutes per kid per calendar day
//! - [`window`] evaluates allowed-hours windows, including ones that wrap past midnight
//! - [`decision`] combines pause flag, window and daily limit in fixed precedence
//! - [`fleet`] evaluates every kid of a parent account in one call

pub mod clock;
pub mod config;
pub mod decision;
pub mod error;
pub mod fleet;
pub mod platform;
pub mod profile;
pub mod usage;
pub mod window;

pub use clock::{Clock, FixedClock, LocalInstant, SystemClock};
pub use config::AccessConfig;
pub use decision::{AccessDecision, AccessEngine, DecisionReason};
pub use error::{AccessError, Result};
pub use fleet::{FleetReporter, KidStatus};
pub use profile::{AccessPolicy, KidProfile, ProfileDirectory, StaticDirectory};
pub use usage::{DailyUsageRecord, MemoryUsageStore, SqliteUsageStore, UsageStore, UsageTracker};
pub use window::{AllowedWindow, WindowBound};
