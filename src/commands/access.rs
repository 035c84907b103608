use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use family_access::clock::{Clock, FixedClock, SystemClock};
use family_access::config::{get_config_path, load_config, EXAMPLE_CONFIG};
use family_access::{AccessDecision, AccessEngine, FleetReporter, SqliteUsageStore};

use super::utils::format_minutes;
use crate::cli::{Args, Commands};

/// Dispatch a parsed command line
pub fn run_command(args: Args) -> Result<()> {
    let Args {
        command,
        config,
        state,
        json,
        verbose: _,
    } = args;

    let config_path = match config {
        Some(path) => path,
        None => get_config_path()?,
    };

    match command {
        Commands::Init { output, force } => init(output.unwrap_or(config_path), force),
        Commands::Validate => validate(&config_path),
        Commands::Status { kid, at } => block_on(async {
            let engine = open_engine(&config_path, state, at).await?;
            status(&engine, &kid, json).await
        }),
        Commands::Fleet { parent, at } => block_on(async {
            let engine = open_engine(&config_path, state, at).await?;
            fleet(engine, &parent, json).await
        }),
        Commands::AddUsage { kid, minutes } => block_on(async {
            let engine = open_engine(&config_path, state, None).await?;
            add_usage(&engine, &kid, minutes, json).await
        }),
        Commands::Usage { kid } => block_on(async {
            let engine = open_engine(&config_path, state, None).await?;
            usage(&engine, &kid, json).await
        }),
        Commands::Reset { kid } => block_on(async {
            let engine = open_engine(&config_path, state, None).await?;
            reset(&engine, &kid).await
        }),
        Commands::History { kid, days } => block_on(async {
            let engine = open_engine(&config_path, state, None).await?;
            history(&engine, &kid, days, json).await
        }),
    }
}

fn block_on(task: impl Future<Output = Result<()>>) -> Result<()> {
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(task)
}

/// Build the engine over the configuration file and usage database
async fn open_engine(
    config_path: &Path,
    state: Option<PathBuf>,
    at: Option<DateTime<Utc>>,
) -> Result<Arc<AccessEngine>> {
    let config = load_config(config_path)?;
    let directory = config.directory()?;

    let usage_path = match state {
        Some(path) => path,
        None => config.usage_path()?,
    };
    let store = SqliteUsageStore::open(&usage_path).await?;

    let clock: Arc<dyn Clock> = match at {
        Some(instant) => Arc::new(FixedClock::new(instant)),
        None => Arc::new(SystemClock),
    };

    Ok(Arc::new(AccessEngine::new(
        Arc::new(directory),
        Arc::new(store),
        clock,
    )))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!(
        "{}",
        serde_json::to_string_pretty(value).context("Failed to serialize output")?
    );
    Ok(())
}

fn print_decision(decision: &AccessDecision, indent: &str) {
    let verdict = if decision.allowed { "✓ Allowed" } else { "✗ Blocked" };
    println!("{}Status:    {} ({:?})", indent, verdict, decision.reason);

    if let (Some(used), Some(limit)) = (decision.used_minutes, decision.limit_minutes) {
        println!(
            "{}Used:      {} / {}",
            indent,
            format_minutes(used),
            format_minutes(limit as f64)
        );
    }
    if let Some(remaining) = decision.remaining_minutes {
        println!("{}Remaining: {}", indent, format_minutes(remaining));
    }

    println!("{}Message:   {}", indent, decision.message());
}

/// Write an example configuration file
fn init(output: PathBuf, force: bool) -> Result<()> {
    if output.exists() && !force {
        anyhow::bail!(
            "Configuration file already exists: {}\nUse --force to overwrite",
            output.display()
        );
    }

    family_access::platform::common::atomic_write(&output, EXAMPLE_CONFIG.as_bytes())
        .with_context(|| format!("Failed to write config file: {}", output.display()))?;

    println!("✓ Created configuration file: {}", output.display());
    println!("\nEdit this file to configure kid profiles and their limits.");
    Ok(())
}

/// Load and validate the configuration file
fn validate(config_path: &Path) -> Result<()> {
    let config = load_config(config_path)?;
    config.directory()?;

    println!("✓ Configuration is valid: {}", config_path.display());
    println!("  Accounts: {}", config.accounts.len());
    println!("  Kid profiles: {}", config.kids.len());
    println!("  Default timezone: {}", config.default_timezone);
    Ok(())
}

/// Show the access decision for one kid
async fn status(engine: &AccessEngine, kid: &str, json: bool) -> Result<()> {
    let decision = engine.evaluate(kid).await?;

    if json {
        return print_json(&decision);
    }

    println!("\n=== Access Status: {} ===\n", kid);
    print_decision(&decision, "  ");
    println!();
    Ok(())
}

/// Show access decisions for every kid of a parent account
async fn fleet(engine: Arc<AccessEngine>, parent: &str, json: bool) -> Result<()> {
    let statuses = FleetReporter::new(engine).get_fleet_status(parent).await?;

    if json {
        return print_json(&statuses);
    }

    println!("\n=== Fleet Status: {} ===\n", parent);
    if statuses.is_empty() {
        println!("No kid profiles found");
        return Ok(());
    }

    for status in &statuses {
        println!("{} ({}):", status.kid_name, status.kid_profile_id);
        print_decision(&status.decision, "  ");
        println!();
    }
    Ok(())
}

/// Report minutes consumed by a kid
async fn add_usage(engine: &AccessEngine, kid: &str, minutes: f64, json: bool) -> Result<()> {
    let total = engine.usage().add_usage(kid, minutes).await?;

    if json {
        return print_json(&serde_json::json!({
            "kid_profile_id": kid,
            "total_minutes_used": total,
        }));
    }

    println!("✓ Recorded {} for {}", format_minutes(minutes), kid);
    println!("  Used today: {}", format_minutes(total));
    Ok(())
}

/// Show today's usage for a kid
async fn usage(engine: &AccessEngine, kid: &str, json: bool) -> Result<()> {
    let today = engine.usage().get_usage_today(kid).await?;

    if json {
        return print_json(&today);
    }

    println!("{} on {}: {}", kid, today.date, format_minutes(today.total_minutes_used));
    if let Some(updated) = today.last_updated_at {
        println!("  Last updated: {}", updated.format("%Y-%m-%d %H:%M:%S %Z"));
    }
    Ok(())
}

/// Reset today's usage for a kid
async fn reset(engine: &AccessEngine, kid: &str) -> Result<()> {
    engine.usage().reset_daily_usage(kid).await?;
    println!("✓ Reset today's usage for {}", kid);
    Ok(())
}

/// Show usage history for a kid
async fn history(engine: &AccessEngine, kid: &str, days: u32, json: bool) -> Result<()> {
    let records = engine.usage().get_usage_history(kid, days).await?;

    if json {
        return print_json(&records);
    }

    println!("\n=== Usage History for {} ===\n", kid);
    if records.is_empty() {
        println!("No usage history found");
        return Ok(());
    }

    for record in &records {
        println!("  {}  {}", record.date, format_minutes(record.total_minutes_used));
    }
    println!();
    Ok(())
}
