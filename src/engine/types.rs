//! Engine types
//!
//! Message types, configuration and reports of the sync engine.

use crate::types::{JsonValue, LogLevel, Record};
use chrono::Utc;
use serde::{Deserialize, Serialize};

/// A message emitted during sync
///
/// Serialized as one JSON object per message:
/// `{"type": "RECORD", "record": {...}}`, `{"type": "STATE", "state": {...}}`,
/// `{"type": "LOG", "log": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "UPPERCASE")]
pub enum Message {
    /// One extracted record
    Record {
        /// The record and its stream
        record: RecordMessage,
    },
    /// Full state document after a stream committed its cursor
    State {
        /// `{stream: {cursor_field: value}}`
        state: JsonValue,
    },
    /// Log message
    Log {
        /// Level and text
        log: LogMessage,
    },
}

/// Payload of a record message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordMessage {
    /// Stream name
    pub stream: String,
    /// Record as returned by the API
    pub data: Record,
    /// Emission time, milliseconds since the Unix epoch
    pub emitted_at: i64,
}

/// Payload of a log message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogMessage {
    /// Log level
    pub level: LogLevel,
    /// Log text
    pub message: String,
}

impl Message {
    /// Create a record message stamped with the current time
    pub fn record(stream: impl Into<String>, data: Record) -> Self {
        Self::Record {
            record: RecordMessage {
                stream: stream.into(),
                data,
                emitted_at: Utc::now().timestamp_millis(),
            },
        }
    }

    /// Create a state message
    pub fn state(state: JsonValue) -> Self {
        Self::State { state }
    }

    /// Create a log message
    pub fn log(level: LogLevel, message: impl Into<String>) -> Self {
        Self::Log {
            log: LogMessage {
                level,
                message: message.into(),
            },
        }
    }

    /// Create an info log
    pub fn info(message: impl Into<String>) -> Self {
        Self::log(LogLevel::Info, message)
    }

    /// Create a warning log
    pub fn warn(message: impl Into<String>) -> Self {
        Self::log(LogLevel::Warn, message)
    }

    /// Create an error log
    pub fn error(message: impl Into<String>) -> Self {
        Self::log(LogLevel::Error, message)
    }

    /// Check if this is a record message
    pub fn is_record(&self) -> bool {
        matches!(self, Self::Record { .. })
    }

    /// Check if this is a state message
    pub fn is_state(&self) -> bool {
        matches!(self, Self::State { .. })
    }

    /// Check if this is a log message
    pub fn is_log(&self) -> bool {
        matches!(self, Self::Log { .. })
    }
}

/// Configuration for sync operation
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Streams synced at the same time
    pub max_concurrent_streams: usize,
    /// Watermark for incremental streams without saved state
    pub initial_watermark: Option<String>,
    /// Non-secret values exposed to templates as `{{ config.<field> }}`
    pub template_config: JsonValue,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            max_concurrent_streams: 1,
            initial_watermark: None,
            template_config: JsonValue::Null,
        }
    }
}

impl SyncConfig {
    /// Create a new sync config
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the number of streams synced at once (at least one)
    #[must_use]
    pub fn with_max_concurrent_streams(mut self, n: usize) -> Self {
        self.max_concurrent_streams = n.max(1);
        self
    }

    /// Set the initial watermark
    #[must_use]
    pub fn with_initial_watermark(mut self, watermark: Option<String>) -> Self {
        self.initial_watermark = watermark;
        self
    }

    /// Set template config values
    #[must_use]
    pub fn with_template_config(mut self, config: JsonValue) -> Self {
        self.template_config = config;
        self
    }
}

/// Statistics of one stream's sync
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncStats {
    /// Records emitted
    pub records: usize,
    /// Pages fetched (not counted for dependent streams)
    pub pages: usize,
    /// Parent slices processed by a dependent stream
    pub groups: usize,
    /// Sentinel records emitted in place of failed child requests
    pub sentinels: usize,
    /// Duration in milliseconds
    pub duration_ms: u64,
}

/// Outcome of one stream
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StreamStatus {
    /// Traversed to the end; cursor committed for incremental streams
    Succeeded,
    /// Stopped by cancellation; nothing committed
    Cancelled,
    /// Stopped by an error; nothing committed
    Failed {
        /// Error text
        error: String,
        /// Last HTTP status seen, when the failure came from the API
        last_status: Option<u16>,
    },
}

/// Report of one stream
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StreamReport {
    /// Stream name
    pub stream: String,
    /// Outcome
    #[serde(flatten)]
    pub status: StreamStatus,
    /// Statistics
    pub stats: SyncStats,
}

impl StreamReport {
    /// Whether the stream finished successfully
    pub fn is_success(&self) -> bool {
        self.status == StreamStatus::Succeeded
    }
}

/// Report of a whole sync, streams in plan order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    /// Per-stream reports
    pub streams: Vec<StreamReport>,
    /// Duration in milliseconds
    pub duration_ms: u64,
}

impl SyncReport {
    /// Whether every stream succeeded
    pub fn is_success(&self) -> bool {
        self.streams.iter().all(StreamReport::is_success)
    }

    /// Streams that did not succeed
    pub fn failures(&self) -> impl Iterator<Item = &StreamReport> {
        self.streams.iter().filter(|s| !s.is_success())
    }

    /// Report of a stream
    pub fn get(&self, stream: &str) -> Option<&StreamReport> {
        self.streams.iter().find(|s| s.stream == stream)
    }

    /// Records emitted across all streams
    pub fn total_records(&self) -> usize {
        self.streams.iter().map(|s| s.stats.records).sum()
    }
}
