//! State manager implementation
//!
//! Provides file-based state persistence with atomic writes.

use super::cursor::{CursorState, CursorValue};
use super::types::State;
use crate::error::{Error, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// State manager for persisting and loading state
#[derive(Debug, Clone)]
pub struct StateManager {
    /// Path to the state file, `None` in memory
    path: Option<PathBuf>,
    /// Current state, shared between clones
    state: Arc<RwLock<State>>,
}

impl StateManager {
    /// Create a file-backed manager starting from empty state
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: Some(path.as_ref().to_path_buf()),
            state: Arc::new(RwLock::new(State::new())),
        }
    }

    /// Create an in-memory state manager (no file persistence)
    pub fn in_memory() -> Self {
        Self {
            path: None,
            state: Arc::new(RwLock::new(State::new())),
        }
    }

    /// Create a state manager from a file, loading existing state if present
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let state = if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .map_err(|e| Error::state(format!("Failed to read state file: {e}")))?;
            parse_state(&contents)?
        } else {
            State::new()
        };
        if !state.is_empty() {
            info!(
                "Loaded state from {} for: {}",
                path.display(),
                state.stream_names().collect::<Vec<_>>().join(", ")
            );
        }

        Ok(Self {
            path: Some(path),
            state: Arc::new(RwLock::new(state)),
        })
    }

    /// Create an in-memory state manager from an inline JSON string
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(Self {
            path: None,
            state: Arc::new(RwLock::new(parse_state(json)?)),
        })
    }

    /// Save current state to the backing file; no-op in memory
    pub async fn save(&self) -> Result<()> {
        match &self.path {
            Some(path) => self.save_to_file(path).await,
            None => Ok(()),
        }
    }

    /// Save state to a specific file path
    pub async fn save_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let contents = self.to_json_pretty().await?;

        // Write to temp file first, then rename for atomicity
        let path = path.as_ref();
        let temp_path = path.with_extension("tmp");
        tokio::fs::write(&temp_path, &contents)
            .await
            .map_err(|e| Error::state(format!("Failed to write state file: {e}")))?;

        tokio::fs::rename(&temp_path, path)
            .await
            .map_err(|e| Error::state(format!("Failed to rename state file: {e}")))?;

        debug!("State saved to {}", path.display());
        Ok(())
    }

    /// Snapshot of the current state
    pub async fn snapshot(&self) -> State {
        self.state.read().await.clone()
    }

    /// Get a read lock on the current state
    pub async fn state(&self) -> tokio::sync::RwLockReadGuard<'_, State> {
        self.state.read().await
    }

    /// Saved cursor of a stream
    pub async fn get_cursor(&self, stream: &str, cursor_field: &str) -> Option<CursorValue> {
        let state = self.state.read().await;
        state.get_cursor(stream, cursor_field).cloned()
    }

    /// Replace the saved cursor of a stream with the cursor's current value.
    ///
    /// Only called after a stream has been traversed to the end.
    pub async fn commit(&self, cursor: &CursorState) {
        let mut state = self.state.write().await;
        let previous = state.get_cursor(cursor.stream(), cursor.cursor_field()).cloned();
        state.set_cursor(
            cursor.stream(),
            cursor.cursor_field(),
            cursor.current_value().clone(),
        );

        let previous = previous.as_ref().map_or("(none)", CursorValue::as_str);
        if cursor.has_advanced() {
            info!(
                "{}: cursor '{}' committed {} -> {}",
                cursor.stream(),
                cursor.cursor_field(),
                previous,
                cursor.current_value()
            );
        } else {
            debug!(
                "{}: cursor '{}' unchanged at {} (saved {})",
                cursor.stream(),
                cursor.cursor_field(),
                cursor.current_value(),
                previous
            );
        }
    }

    /// Export state as JSON string
    pub async fn to_json(&self) -> Result<String> {
        let state = self.state.read().await;
        serde_json::to_string(&*state)
            .map_err(|e| Error::state(format!("Failed to serialize state: {e}")))
    }

    /// Export state as pretty-printed JSON string
    pub async fn to_json_pretty(&self) -> Result<String> {
        let state = self.state.read().await;
        serde_json::to_string_pretty(&*state)
            .map_err(|e| Error::state(format!("Failed to serialize state: {e}")))
    }

    /// Get the state file path
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Check if using in-memory mode
    pub fn is_in_memory(&self) -> bool {
        self.path.is_none()
    }
}

fn parse_state(contents: &str) -> Result<State> {
    if contents.trim().is_empty() {
        return Ok(State::new());
    }
    serde_json::from_str(contents).map_err(|e| Error::state(format!("Failed to parse state: {e}")))
}
