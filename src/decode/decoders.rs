//! Decoder implementations

use super::types::RecordDecoder;
use crate::error::{Error, Result};
use crate::types::Record;
use serde_json::Value;

/// Decoder that takes the array found under a named key
#[derive(Debug, Clone)]
pub struct ListDecoder {
    /// Key holding the record array
    key: String,
}

impl ListDecoder {
    /// Create a decoder for the given list key
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }

    /// The list key
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl RecordDecoder for ListDecoder {
    fn decode(&self, body: &Value) -> Result<Vec<Record>> {
        match body.get(&self.key) {
            None | Some(Value::Null) => Ok(Vec::new()),
            Some(Value::Array(items)) => items
                .iter()
                .enumerate()
                .map(|(i, item)| match item {
                    Value::Object(record) => Ok(record.clone()),
                    other => Err(Error::decode(format!(
                        "'{}'[{i}] is not an object: {other}",
                        self.key
                    ))),
                })
                .collect(),
            Some(other) => Err(Error::decode(format!(
                "'{}' is not an array: {other}",
                self.key
            ))),
        }
    }
}
