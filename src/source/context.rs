//! Traversal context

use crate::partition::ParentChildSlice;
use crate::state::CursorValue;
use crate::template::TemplateContext;
use crate::types::JsonValue;
use serde_json::json;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared cancellation flag, cheap to clone
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    /// Create an unset flag
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation was requested
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Inputs of one traversal of a resource
#[derive(Debug, Clone, Default)]
pub struct FetchContext {
    /// Start-of-sync watermark sent as the incremental request parameter
    pub watermark: Option<CursorValue>,
    /// Parent slice for dependent requests
    pub parent: Option<ParentChildSlice>,
    /// Non-secret config values available as `{{ config.<field> }}`
    pub config: JsonValue,
    /// Checked before every page
    pub cancel: CancelFlag,
}

impl FetchContext {
    /// Create an empty context
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the watermark
    #[must_use]
    pub fn with_watermark(mut self, watermark: Option<CursorValue>) -> Self {
        self.watermark = watermark;
        self
    }

    /// Set template config values
    #[must_use]
    pub fn with_config(mut self, config: JsonValue) -> Self {
        self.config = config;
        self
    }

    /// Share a cancellation flag
    #[must_use]
    pub fn with_cancel(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    /// Context of a child request: same config and cancellation, no watermark
    pub fn for_slice(&self, slice: ParentChildSlice) -> Self {
        Self {
            watermark: None,
            parent: Some(slice),
            config: self.config.clone(),
            cancel: self.cancel.clone(),
        }
    }

    /// Whether cancellation was requested
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Template roots for rendering query parameters
    pub(crate) fn template_context(&self, cursor_field: Option<&str>) -> TemplateContext {
        let mut ctx = TemplateContext::new();
        ctx.set_config(self.config.clone());

        if let Some(slice) = &self.parent {
            ctx.set_parent(slice.template_value());
        }
        if let (Some(field), Some(watermark)) = (cursor_field, &self.watermark) {
            ctx.set_state(json!({ field: watermark.as_str() }));
        }

        ctx
    }
}
