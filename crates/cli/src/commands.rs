//! CLI command definitions for apbridge.
//!
//! `run` starts the bridge; every other subcommand answers one query against the
//! current snapshot and exits.

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Main CLI application.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Logging verbosity
    #[arg(short, long, default_value_t = 0, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Configuration file path
    #[arg(short, long, env = "APBRIDGE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Snapshot file, overriding `paths.state_file`
    #[arg(long, env = "APBRIDGE_STATE_FILE", global = true)]
    pub state_file: Option<PathBuf>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the bridge: announce new items and answer commands read from stdin
    Run(RunArgs),

    /// Show check completion
    Progress(QueryArgs),

    /// Show the most recent distinct items
    LastItems(LastItemsArgs),

    /// Show every notable item received so far
    KeyItems(QueryArgs),

    /// Show the main seed rules
    Rules(QueryArgs),

    /// Show the enabled seed flags
    Flags(QueryArgs),

    /// Show seed and server information
    SeedInfo(QueryArgs),

    /// Describe one of the recent items
    ItemInfo(ItemInfoArgs),

    /// Show the connected slot
    Identity(QueryArgs),

    /// Show whether the slot plays solo or on a team
    Team(QueryArgs),

    /// Dump the snapshot summary or one raw section
    Dump(DumpArgs),

    /// Show snapshot file status
    Status,

    /// Show the tail of the fetcher log
    Log(LogArgs),

    /// Validate the configuration and print the effective settings
    CheckConfig(QueryArgs),
}

/// Bridge run arguments.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Deliver chat messages to this webhook instead of stdout
    #[arg(long, env = "APBRIDGE_WEBHOOK_URL")]
    pub webhook_url: Option<String>,

    /// Webhook request timeout in seconds
    #[arg(long, default_value_t = 10)]
    pub webhook_timeout: u64,

    /// Do not announce new items automatically
    #[arg(long, default_value_t = false)]
    pub no_announce: bool,

    /// Name used for commands typed on stdin
    #[arg(long)]
    pub operator: Option<String>,
}

/// Shared query arguments.
#[derive(Args, Debug)]
pub struct QueryArgs {
    /// Output format
    #[arg(short, long, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

/// Recent items arguments.
#[derive(Args, Debug)]
pub struct LastItemsArgs {
    /// Number of items to show
    #[arg(short = 'n', long, default_value_t = 5)]
    pub limit: usize,

    /// Output format
    #[arg(short, long, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

/// Item description arguments.
#[derive(Args, Debug)]
pub struct ItemInfoArgs {
    /// Position among the recent distinct items, 1 is the newest
    #[arg(default_value_t = 1)]
    pub index: usize,

    /// Output format
    #[arg(short, long, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

/// Snapshot dump arguments.
#[derive(Args, Debug)]
pub struct DumpArgs {
    /// Top-level section to print
    pub section: Option<String>,
}

/// Fetcher log arguments.
#[derive(Args, Debug)]
pub struct LogArgs {
    /// Number of lines to show
    #[arg(short = 'n', long, default_value_t = 10)]
    pub lines: usize,
}

/// Output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Chat text
    Text,
    /// JSON format
    Json,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}
