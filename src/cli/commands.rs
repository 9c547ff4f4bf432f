//! CLI commands and argument parsing

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// DEAR Inventory source CLI
#[derive(Parser, Debug)]
#[command(name = "dear-inventory")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration file (JSON or YAML)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Inline config JSON (takes precedence over --config)
    #[arg(long, global = true)]
    pub config_json: Option<String>,

    /// State file (JSON), read at start and rewritten at the end of `read`
    #[arg(short, long, global = true)]
    pub state: Option<PathBuf>,

    /// Inline state JSON (takes precedence over --state, never written back)
    #[arg(long, global = true)]
    pub state_json: Option<String>,

    /// Verbose logging on stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands
#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Commands {
    /// Validate the configuration
    Check,

    /// List available streams
    Streams,

    /// Read records from streams
    Read {
        /// Streams to sync (comma-separated, empty = all)
        #[arg(long, value_delimiter = ',')]
        streams: Vec<String>,

        /// Streams synced at the same time (overrides the config)
        #[arg(long)]
        concurrency: Option<usize>,
    },
}
