//! Persisted state document
//!
//! Serialized as `{"<stream>": {"<cursor_field>": "<value>"}}`.

use super::cursor::CursorValue;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Complete state for a connector
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct State {
    streams: BTreeMap<String, StreamState>,
}

impl State {
    /// Create a new empty state
    pub fn new() -> Self {
        Self::default()
    }

    /// Get state for a stream
    pub fn get_stream(&self, stream: &str) -> Option<&StreamState> {
        self.streams.get(stream)
    }

    /// Get mutable state for a stream, creating if needed
    pub fn get_stream_mut(&mut self, stream: &str) -> &mut StreamState {
        self.streams.entry(stream.to_string()).or_default()
    }

    /// Get the saved cursor of a stream
    pub fn get_cursor(&self, stream: &str, cursor_field: &str) -> Option<&CursorValue> {
        self.streams.get(stream)?.get(cursor_field)
    }

    /// Replace the saved cursor of a stream
    pub fn set_cursor(&mut self, stream: &str, cursor_field: &str, value: CursorValue) {
        self.get_stream_mut(stream).set(cursor_field, value);
    }

    /// Names of streams with saved state
    pub fn stream_names(&self) -> impl Iterator<Item = &str> {
        self.streams.keys().map(String::as_str)
    }

    /// Whether nothing has been saved
    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }
}

/// Saved cursors of a single stream, keyed by cursor field
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StreamState {
    cursors: BTreeMap<String, CursorValue>,
}

impl StreamState {
    /// Cursor value for a field
    pub fn get(&self, cursor_field: &str) -> Option<&CursorValue> {
        self.cursors.get(cursor_field)
    }

    /// Set the cursor value for a field
    pub fn set(&mut self, cursor_field: &str, value: CursorValue) {
        self.cursors.insert(cursor_field.to_string(), value);
    }
}
