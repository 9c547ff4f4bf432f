//! Partition router implementations

use super::types::ParentChildSlice;
use crate::config::ParentConfig;
use crate::error::{Error, Result};
use crate::types::{JsonValue, Record};

// ============================================================================
// Parent Router
// ============================================================================

/// Parent stream partition router
///
/// Maps each record of the parent stream to the slice of one child request.
#[derive(Debug, Clone)]
pub struct ParentRouter {
    /// Name of the dependent stream
    stream: String,
    /// Name of the parent stream
    parent_stream: String,
    /// Key to extract from parent records (dotted paths allowed)
    parent_key: String,
}

impl ParentRouter {
    /// Create a new parent router
    pub fn new(
        stream: impl Into<String>,
        parent_stream: impl Into<String>,
        parent_key: impl Into<String>,
    ) -> Self {
        Self {
            stream: stream.into(),
            parent_stream: parent_stream.into(),
            parent_key: parent_key.into(),
        }
    }

    /// Create from a stream's parent binding
    pub fn from_config(stream: impl Into<String>, parent: &ParentConfig) -> Self {
        Self::new(stream, parent.stream.clone(), parent.key.clone())
    }

    /// Name of the parent stream
    pub fn parent_stream(&self) -> &str {
        &self.parent_stream
    }

    /// Key field read from parent records
    pub fn parent_key(&self) -> &str {
        &self.parent_key
    }

    /// Build the slice for one parent record.
    ///
    /// Fails when the record has no string or numeric value under the key.
    pub fn slice_for(&self, record: Record) -> Result<ParentChildSlice> {
        let key = self.extract_key(&record).ok_or_else(|| {
            Error::partition(
                &self.stream,
                format!(
                    "parent record from '{}' has no usable '{}'",
                    self.parent_stream, self.parent_key
                ),
            )
        })?;

        Ok(ParentChildSlice::new(record, key))
    }

    /// Extract value from a record using the parent key
    fn extract_key(&self, record: &Record) -> Option<String> {
        let mut parts = self.parent_key.split('.');
        let mut current = record.get(parts.next()?)?;

        for part in parts {
            current = current.get(part)?;
        }

        match current {
            JsonValue::String(s) if !s.is_empty() => Some(s.clone()),
            JsonValue::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }
}
