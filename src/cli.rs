use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Family Access Engine
///
/// Decides whether kid profiles may consume content right now and keeps
/// track of how many minutes each kid has used today.
#[derive(Parser, Debug)]
#[command(name = "family-access")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file [default: platform config directory]
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Path to usage file, overriding the configuration
    #[arg(long, global = true)]
    pub state: Option<PathBuf>,

    /// Print results as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Write an example configuration file
    Init {
        /// Output path [default: --config or platform config path]
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// Load and validate the configuration file
    Validate,
    /// Show the access decision for one kid
    Status {
        /// Kid profile ID
        #[arg(long)]
        kid: String,

        /// Evaluate at this instant instead of now (RFC 3339)
        #[arg(long)]
        at: Option<DateTime<Utc>>,
    },
    /// Show access decisions for every kid of a parent account
    Fleet {
        /// Parent account ID
        #[arg(long)]
        parent: String,

        /// Evaluate at this instant instead of now (RFC 3339)
        #[arg(long)]
        at: Option<DateTime<Utc>>,
    },
    /// Report minutes consumed by a kid
    AddUsage {
        /// Kid profile ID
        #[arg(long)]
        kid: String,

        /// Elapsed minutes (may be fractional)
        #[arg(long, allow_negative_numbers = true)]
        minutes: f64,
    },
    /// Show today's usage for a kid
    Usage {
        /// Kid profile ID
        #[arg(long)]
        kid: String,
    },
    /// Reset today's usage for a kid
    Reset {
        /// Kid profile ID
        #[arg(long)]
        kid: String,
    },
    /// Show usage history for a kid, newest first
    History {
        /// Kid profile ID
        #[arg(long)]
        kid: String,

        /// Number of past days to include
        #[arg(long, default_value = "7")]
        days: u32,
    },
}
