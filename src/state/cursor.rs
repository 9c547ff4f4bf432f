//! Incremental cursor tracking
//!
//! A `CursorState` is created at the start of a stream's sync and dropped at
//! the end of it. The value sent to the API never changes during the sync;
//! the value observed in records only moves forward.

use crate::types::Record;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use tracing::debug;

/// Watermark used when neither saved state nor config give one
pub const EPOCH_FLOOR: &str = "2000-01-01T00:00:00Z";

/// An ISO-8601 timestamp as found in the cursor field of a record
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CursorValue(String);

impl CursorValue {
    /// Wrap a raw cursor string
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// The `2000-01-01T00:00:00Z` floor
    pub fn floor() -> Self {
        Self(EPOCH_FLOOR.to_string())
    }

    /// Raw string value
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume into the raw string
    pub fn into_string(self) -> String {
        self.0
    }

    /// Parse the value as a UTC instant.
    ///
    /// Accepts RFC 3339 and offset-less `YYYY-MM-DDTHH:MM:SS[.fff]` (taken as
    /// UTC) and bare dates.
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        let raw = self.0.trim();

        if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
            return Some(dt.with_timezone(&Utc));
        }

        for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
            if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
                return Some(naive.and_utc());
            }
        }

        NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|naive| naive.and_utc())
    }

    /// Compare two cursor values in time.
    ///
    /// Falls back to comparing the raw strings when either side does not
    /// parse, and breaks ties between equal instants written differently
    /// the same way.
    pub fn temporal_cmp(&self, other: &Self) -> Ordering {
        match (self.timestamp(), other.timestamp()) {
            (Some(a), Some(b)) => a.cmp(&b).then_with(|| self.0.cmp(&other.0)),
            _ => self.0.cmp(&other.0),
        }
    }

    /// Whether this value is strictly later than `other`
    pub fn is_after(&self, other: &Self) -> bool {
        self.temporal_cmp(other) == Ordering::Greater
    }
}

impl fmt::Display for CursorValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CursorValue {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for CursorValue {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Watermark of one incremental stream for the duration of a sync
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CursorState {
    stream: String,
    cursor_field: String,
    request: CursorValue,
    current: CursorValue,
}

impl CursorState {
    /// Start tracking from `start`, which is also the value sent to the API
    pub fn new(
        stream: impl Into<String>,
        cursor_field: impl Into<String>,
        start: CursorValue,
    ) -> Self {
        Self {
            stream: stream.into(),
            cursor_field: cursor_field.into(),
            current: start.clone(),
            request: start,
        }
    }

    /// Pick the starting watermark: saved state first, then the configured
    /// value, then [`EPOCH_FLOOR`]
    pub fn resume(
        stream: impl Into<String>,
        cursor_field: impl Into<String>,
        saved: Option<CursorValue>,
        configured: Option<&str>,
    ) -> Self {
        let start = saved
            .or_else(|| configured.map(CursorValue::new))
            .unwrap_or_else(CursorValue::floor);
        Self::new(stream, cursor_field, start)
    }

    /// Stream the cursor belongs to
    pub fn stream(&self) -> &str {
        &self.stream
    }

    /// Record field holding the cursor
    pub fn cursor_field(&self) -> &str {
        &self.cursor_field
    }

    /// Highest value seen so far
    pub fn current_value(&self) -> &CursorValue {
        &self.current
    }

    /// Start-of-sync watermark
    pub fn request_value(&self) -> &CursorValue {
        &self.request
    }

    /// Whether any record moved the cursor past its start value
    pub fn has_advanced(&self) -> bool {
        self.current != self.request
    }

    /// Move the cursor to `candidate` if it is later. Returns whether it moved.
    pub fn advance(&mut self, candidate: CursorValue) -> bool {
        if candidate.is_after(&self.current) {
            self.current = candidate;
            true
        } else {
            false
        }
    }

    /// Advance from a record's cursor field; records without it are ignored
    pub fn observe(&mut self, record: &Record) -> bool {
        match record.get(&self.cursor_field).and_then(|v| v.as_str()) {
            Some(value) => self.advance(CursorValue::new(value)),
            None => {
                debug!(
                    "{}: record without string '{}' ignored for cursor",
                    self.stream, self.cursor_field
                );
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: serde_json::Value) -> Record {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_timestamp_formats() {
        assert!(CursorValue::new("2021-05-01T00:00:00Z").timestamp().is_some());
        assert!(CursorValue::new("2021-05-01T10:00:00+10:00").timestamp().is_some());
        assert!(CursorValue::new("2021-05-01T04:11:23.123").timestamp().is_some());
        assert!(CursorValue::new("2021-05-01").timestamp().is_some());
        assert!(CursorValue::new("yesterday").timestamp().is_none());
    }

    #[test]
    fn test_temporal_comparison_ignores_offsets() {
        let utc = CursorValue::new("2021-05-01T01:00:00Z");
        let sydney = CursorValue::new("2021-05-01T10:00:00+10:00");
        assert!(!sydney.is_after(&utc));
        assert_eq!(utc.temporal_cmp(&sydney), Ordering::Greater);

        let earlier_text_later_time = CursorValue::new("2021-05-01T09:00:00-05:00");
        let later_text = CursorValue::new("2021-05-01T12:00:00Z");
        assert!(earlier_text_later_time.is_after(&later_text));
    }

    #[test]
    fn test_lexical_fallback() {
        let a = CursorValue::new("abc");
        let b = CursorValue::new("abd");
        assert!(b.is_after(&a));
    }

    #[test]
    fn test_advance_is_monotone_and_idempotent() {
        let mut state = CursorState::new("sale", "Updated", CursorValue::floor());

        assert!(state.advance("2021-05-01T00:00:00Z".into()));
        assert!(!state.advance("2021-05-01T00:00:00Z".into()));
        assert!(!state.advance("2021-04-01T00:00:00Z".into()));
        assert_eq!(state.current_value().as_str(), "2021-05-01T00:00:00Z");
        assert_eq!(state.request_value().as_str(), EPOCH_FLOOR);
        assert!(state.has_advanced());
    }

    #[test]
    fn test_observe_records() {
        let mut state = CursorState::new("sale", "Updated", CursorValue::floor());

        state.observe(&record(json!({"SaleID": "1", "Updated": "2021-05-01T00:00:00Z"})));
        state.observe(&record(json!({"SaleID": "2", "Updated": "2021-04-01T00:00:00Z"})));
        assert!(!state.observe(&record(json!({"SaleID": "3"}))));
        assert!(!state.observe(&record(json!({"SaleID": "4", "Updated": null}))));

        assert_eq!(state.current_value().as_str(), "2021-05-01T00:00:00Z");
    }

    #[test]
    fn test_resume_priority() {
        let state = CursorState::resume(
            "sale",
            "Updated",
            Some("2022-01-01T00:00:00Z".into()),
            Some("2021-01-01T00:00:00Z"),
        );
        assert_eq!(state.request_value().as_str(), "2022-01-01T00:00:00Z");

        let state = CursorState::resume("sale", "Updated", None, Some("2021-01-01T00:00:00Z"));
        assert_eq!(state.request_value().as_str(), "2021-01-01T00:00:00Z");

        let state = CursorState::resume("sale", "Updated", None, None);
        assert_eq!(state.request_value().as_str(), EPOCH_FLOOR);
        assert!(!state.has_advanced());
    }
}
