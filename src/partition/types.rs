//! Partition types

use crate::pagination::PaginationToken;
use crate::types::{JsonValue, Record};

/// One child request's worth of parent context
#[derive(Debug, Clone, PartialEq)]
pub struct ParentChildSlice {
    /// The parent record, in the order the parent traversal produced it
    pub parent: Record,
    /// Key value extracted from the parent record
    pub key: String,
    /// Page of the child resource. Child requests are single-page, so every
    /// slice the router builds leaves this `None`.
    pub sub_parent: Option<PaginationToken>,
}

impl ParentChildSlice {
    /// Create a slice for the first child page
    pub fn new(parent: Record, key: impl Into<String>) -> Self {
        Self {
            parent,
            key: key.into(),
            sub_parent: None,
        }
    }

    /// Parent record as a template root (`{{ parent.<field> }}`)
    pub fn template_value(&self) -> JsonValue {
        JsonValue::Object(self.parent.clone())
    }
}
