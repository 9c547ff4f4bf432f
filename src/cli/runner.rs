//! CLI runner - executes commands

use crate::cli::commands::{Cli, Commands};
use crate::config::SourceConfig;
use crate::connector::{CheckResult, Connector, DearInventory};
use crate::engine::{Message, StreamStatus};
use crate::error::{Error, Result};
use crate::state::StateManager;
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Messages buffered between the engine and stdout
const CHANNEL_CAPACITY: usize = 1024;

/// CLI runner
pub struct Runner {
    cli: Cli,
}

impl Runner {
    /// Create a new runner
    pub fn new(cli: Cli) -> Self {
        Self { cli }
    }

    /// Run the CLI command
    pub async fn run(&self) -> Result<()> {
        match &self.cli.command {
            Commands::Check => self.check().await,
            Commands::Streams => self.streams(),
            Commands::Read {
                streams,
                concurrency,
            } => self.read(streams, *concurrency).await,
        }
    }

    /// Load configuration; inline JSON takes precedence over the file
    fn load_config(&self) -> Result<SourceConfig> {
        if let Some(json_str) = &self.cli.config_json {
            return SourceConfig::from_json_str(json_str);
        }

        match &self.cli.config {
            Some(path) => SourceConfig::from_file(path),
            None => Err(Error::config(
                "No configuration given (use --config or --config-json)",
            )),
        }
    }

    /// Load state; inline JSON takes precedence over the file
    fn load_state(&self) -> Result<StateManager> {
        if let Some(state_json) = &self.cli.state_json {
            StateManager::from_json(state_json)
        } else if let Some(path) = &self.cli.state {
            StateManager::from_file(path)
        } else {
            Ok(StateManager::in_memory())
        }
    }

    /// Check the configuration
    async fn check(&self) -> Result<()> {
        let result = match self.load_config() {
            Ok(config) => DearInventory::new(config)?.check().await?,
            Err(e) => CheckResult::failure(e.to_string()),
        };

        let (status, message) = if result.success {
            ("SUCCEEDED", "Configuration is valid".to_string())
        } else {
            ("FAILED", result.message.unwrap_or_default())
        };

        output_message(&json!({
            "type": "CONNECTION_STATUS",
            "connectionStatus": {
                "status": status,
                "message": message
            }
        }));

        Ok(())
    }

    /// List available streams
    fn streams(&self) -> Result<()> {
        // Listing needs no credentials
        let config = self
            .load_config()
            .unwrap_or_else(|_| SourceConfig::new("", ""));
        let connector = DearInventory::new(config)?;

        output_message(&json!({
            "type": "STREAMS",
            "connector": connector.name(),
            "streams": connector.streams(),
        }));

        Ok(())
    }

    /// Read streams and print every message as one JSON line
    async fn read(&self, streams: &[String], concurrency: Option<usize>) -> Result<()> {
        let mut config = self.load_config()?;
        if let Some(n) = concurrency {
            config.max_concurrent_streams = n;
        }

        let connector = DearInventory::new(config)?;
        let state = self.load_state()?;
        let selected = (!streams.is_empty()).then_some(streams);

        let cancel = connector.cancel_handle();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupted, stopping after the current page");
                cancel.cancel();
            }
        });

        let (tx, mut rx) = mpsc::channel::<Message>(CHANNEL_CAPACITY);
        let printer = async {
            while let Some(message) = rx.recv().await {
                match serde_json::to_value(&message) {
                    Ok(value) => output_message(&value),
                    Err(e) => warn!("Dropping unserializable message: {e}"),
                }
            }
        };

        let (report, ()) = tokio::join!(connector.read(selected, state, tx), printer);
        let report = report?;

        info!(
            "Read {} records from {} streams in {}ms",
            report.total_records(),
            report.streams.len(),
            report.duration_ms
        );

        let failed: Vec<String> = report
            .failures()
            .map(|s| match &s.status {
                StreamStatus::Failed {
                    last_status: Some(status),
                    ..
                } => format!("{} (HTTP {status})", s.stream),
                StreamStatus::Cancelled => format!("{} (cancelled)", s.stream),
                _ => s.stream.clone(),
            })
            .collect();

        if failed.is_empty() {
            Ok(())
        } else {
            Err(Error::Other(format!("Streams did not complete: {}", failed.join(", "))))
        }
    }
}

/// Print one message as a JSON line on stdout
fn output_message(msg: &Value) {
    println!("{}", serde_json::to_string(msg).unwrap_or_default());
}
