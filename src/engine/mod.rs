//! Execution engine module
//!
//! Main read loop and stream orchestration.
//!
//! # Overview
//!
//! The engine module provides:
//! - `ExtractionPlan` - Ordered streams of a sync, parents wired to dependents
//! - `SyncEngine` - Runs a plan, emits messages, commits cursors
//! - Message and report types

mod plan;
mod types;

pub use plan::{ExtractionPlan, PlannedStream, StreamKind};
pub use types::{
    LogMessage, Message, RecordMessage, StreamReport, StreamStatus, SyncConfig, SyncReport,
    SyncStats,
};

use crate::error::{Error, Result};
use crate::http::HttpClient;
use crate::source::{CancelFlag, DependentSource, FetchContext, RecordSource};
use crate::state::{CursorState, CursorValue, State, StateManager};
use futures::stream::{self, StreamExt, TryStreamExt};
use futures::FutureExt;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

/// Sync engine for orchestrating data extraction
pub struct SyncEngine {
    /// HTTP client shared by every stream
    client: Arc<HttpClient>,
    /// State store
    state: StateManager,
    /// Sync configuration
    config: SyncConfig,
    /// Cancellation flag shared with every traversal
    cancel: CancelFlag,
}

impl SyncEngine {
    /// Create a new sync engine
    pub fn new(client: Arc<HttpClient>, state: StateManager) -> Self {
        Self {
            client,
            state,
            config: SyncConfig::default(),
            cancel: CancelFlag::new(),
        }
    }

    /// Set sync configuration
    #[must_use]
    pub fn with_config(mut self, config: SyncConfig) -> Self {
        self.config = config;
        self
    }

    /// Share an external cancellation flag
    #[must_use]
    pub fn with_cancel(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    /// Get the state manager
    pub fn state(&self) -> &StateManager {
        &self.state
    }

    /// Get the sync configuration
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Handle that stops the sync before the next page of every stream
    pub fn cancel_handle(&self) -> CancelFlag {
        self.cancel.clone()
    }

    /// Run every stream of `plan`, sending messages to `tx`.
    ///
    /// Streams fail independently; their outcome is in the report. Watermarks
    /// are read from the state as it was when the run started. The state file
    /// is saved once at the end.
    pub async fn run(&self, plan: &ExtractionPlan, tx: mpsc::Sender<Message>) -> Result<SyncReport> {
        let start = Instant::now();
        let initial = self.state.snapshot().await;

        info!(
            "Syncing {} streams ({} at a time): {}",
            plan.len(),
            self.config.max_concurrent_streams,
            plan.names().join(", ")
        );

        let tasks: Vec<_> = plan
            .streams()
            .iter()
            .map(|planned| self.run_stream(planned, &initial, tx.clone()).boxed())
            .collect();
        let streams: Vec<StreamReport> = stream::iter(tasks)
            .buffered(self.config.max_concurrent_streams.max(1))
            .collect()
            .await;

        self.state.save().await?;

        let report = SyncReport {
            streams,
            duration_ms: start.elapsed().as_millis() as u64,
        };
        info!(
            "Sync finished: {} records, {} failed streams in {}ms",
            report.total_records(),
            report.failures().count(),
            report.duration_ms
        );
        Ok(report)
    }

    /// Run one stream and turn its outcome into a report
    async fn run_stream(
        &self,
        planned: &PlannedStream,
        initial: &State,
        tx: mpsc::Sender<Message>,
    ) -> StreamReport {
        let started = Instant::now();
        let name = planned.name.as_str();
        let mut stats = SyncStats::default();

        info!("{name}: starting {:?} sync", planned.kind);
        self.emit(&tx, name, Message::info(format!("Starting stream {name}")))
            .await
            .ok();

        let result = match &planned.kind {
            StreamKind::Dependent { .. } => {
                self.sync_dependent(planned, initial, &tx, &mut stats)
                    .await
            }
            StreamKind::FullRefresh | StreamKind::Incremental { .. } => {
                self.sync_records(planned, initial, &tx, &mut stats).await
            }
        };
        stats.duration_ms = started.elapsed().as_millis() as u64;

        let status = match result {
            Ok(()) => {
                info!(
                    "{name}: {} records in {}ms",
                    stats.records, stats.duration_ms
                );
                self.emit(
                    &tx,
                    name,
                    Message::info(format!("Finished stream {name}: {} records", stats.records)),
                )
                .await
                .ok();
                StreamStatus::Succeeded
            }
            Err(Error::Cancelled { .. }) => {
                warn!("{name}: cancelled after {} records", stats.records);
                StreamStatus::Cancelled
            }
            Err(e) => {
                error!("{name}: failed after {} records: {e}", stats.records);
                self.emit(&tx, name, Message::error(format!("Stream {name} failed: {e}")))
                    .await
                    .ok();
                StreamStatus::Failed {
                    error: e.to_string(),
                    last_status: e.http_status_code(),
                }
            }
        };

        StreamReport {
            stream: planned.name.clone(),
            status,
            stats,
        }
    }

    /// Full-refresh or incremental stream
    async fn sync_records(
        &self,
        planned: &PlannedStream,
        initial: &State,
        tx: &mpsc::Sender<Message>,
        stats: &mut SyncStats,
    ) -> Result<()> {
        let name = planned.name.as_str();
        let source = RecordSource::new(Arc::clone(&self.client), planned.config.clone());

        let mut cursor = match &planned.kind {
            StreamKind::Incremental { cursor_field } => {
                Some(self.resume_cursor(name, cursor_field, initial))
            }
            _ => None,
        };
        let ctx = self.fetch_context(cursor.as_ref().map(|c| c.request_value().clone()));

        {
            let mut pages = source.fetch_pages(&ctx);
            while let Some(page) = pages.try_next().await? {
                stats.pages += 1;
                for record in page {
                    if let Some(cursor) = cursor.as_mut() {
                        cursor.observe(&record);
                    }
                    stats.records += 1;
                    self.emit(tx, name, Message::record(name, record)).await?;
                }
            }
        }

        if let Some(cursor) = cursor {
            self.state.commit(&cursor).await;
            let snapshot = serde_json::to_value(self.state.snapshot().await)?;
            self.emit(tx, name, Message::state(snapshot)).await?;
        }

        Ok(())
    }

    /// Dependent stream: traverse the parent, one child request per parent record
    async fn sync_dependent(
        &self,
        planned: &PlannedStream,
        initial: &State,
        tx: &mpsc::Sender<Message>,
        stats: &mut SyncStats,
    ) -> Result<()> {
        let name = planned.name.as_str();
        let parent_config = planned.parent_config.clone().ok_or_else(|| {
            Error::config(format!("Dependent stream '{name}' has no parent definition"))
        })?;

        let parent_watermark = parent_config.incremental.as_ref().map(|incremental| {
            self.resume_cursor(&parent_config.name, &incremental.cursor_field, initial)
                .request_value()
                .clone()
        });

        let parent = Arc::new(RecordSource::new(Arc::clone(&self.client), parent_config));
        let child = RecordSource::new(Arc::clone(&self.client), planned.config.clone());
        let dependent = DependentSource::new(parent, child)?;
        let ctx = self.fetch_context(parent_watermark);

        let mut groups = dependent.fetch_groups(&ctx);
        while let Some(group) = groups.try_next().await? {
            stats.groups += 1;
            if group.is_sentinel() {
                stats.sentinels += 1;
            }
            for record in group.records {
                stats.records += 1;
                self.emit(tx, name, Message::record(name, record)).await?;
            }
        }

        Ok(())
    }

    /// Cursor starting from saved state, then config, then the floor
    fn resume_cursor(&self, stream: &str, cursor_field: &str, initial: &State) -> CursorState {
        CursorState::resume(
            stream,
            cursor_field,
            initial.get_cursor(stream, cursor_field).cloned(),
            self.config.initial_watermark.as_deref(),
        )
    }

    fn fetch_context(&self, watermark: Option<CursorValue>) -> FetchContext {
        FetchContext::new()
            .with_watermark(watermark)
            .with_config(self.config.template_config.clone())
            .with_cancel(self.cancel.clone())
    }

    /// Send a message; a closed channel cancels the whole sync
    async fn emit(&self, tx: &mpsc::Sender<Message>, stream: &str, message: Message) -> Result<()> {
        tx.send(message).await.map_err(|_| {
            self.cancel.cancel();
            Error::Cancelled {
                stream: stream.to_string(),
            }
        })
    }
}

impl std::fmt::Debug for SyncEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncEngine")
            .field("config", &self.config)
            .field("cancelled", &self.cancel.is_cancelled())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests;
