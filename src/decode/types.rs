//! Decoder types and traits
//!
//! Defines the core decoder abstraction.

use crate::error::Result;
use crate::types::Record;
use serde_json::Value;

/// Trait for extracting records from a decoded response body
pub trait RecordDecoder: Send + Sync {
    /// Extract the records carried by one page
    fn decode(&self, body: &Value) -> Result<Vec<Record>>;
}
