//! CLI module
//!
//! Command-line interface for the DEAR Inventory source.
//!
//! # Commands
//!
//! - `check` - Validate the configuration
//! - `streams` - List available streams
//! - `read` - Extract records as JSON lines

mod commands;
mod runner;

pub use commands::{Cli, Commands};
pub use runner::Runner;
