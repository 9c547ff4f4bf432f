//! Pagination strategy implementations

use super::types::{PageInfo, PaginationToken, Paginator, TerminationPolicy};
use crate::config::PaginationConfigDef;
use crate::error::{Error, Result};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::debug;

// ============================================================================
// Page Cursor
// ============================================================================

/// DEAR page-number pagination
///
/// Requests carry `?Page=n&Limit=size`; every response reports the page it
/// holds and the total record count. Pages start at 1.
#[derive(Debug, Clone)]
pub struct PageCursor {
    /// Query parameter name for the page number
    pub page_param: String,
    /// Query parameter name for the page size
    pub limit_param: String,
    /// Records per page
    pub page_size: u32,
    /// Rule for detecting the last page
    pub termination: TerminationPolicy,
}

impl PageCursor {
    /// Create a page cursor with DEAR parameter names
    pub fn new(page_size: u32) -> Self {
        Self {
            page_param: "Page".to_string(),
            limit_param: "Limit".to_string(),
            page_size,
            termination: TerminationPolicy::Strict,
        }
    }

    /// Set the query parameter names
    #[must_use]
    pub fn with_params(mut self, page_param: impl Into<String>, limit_param: impl Into<String>) -> Self {
        self.page_param = page_param.into();
        self.limit_param = limit_param.into();
        self
    }

    /// Set the termination policy
    #[must_use]
    pub fn with_termination(mut self, termination: TerminationPolicy) -> Self {
        self.termination = termination;
        self
    }

    /// Whether the page described by `info` is the last one
    pub fn is_last(&self, info: &PageInfo) -> bool {
        self.termination
            .is_last(info.page, info.total, self.page_size)
    }
}

impl Paginator for PageCursor {
    fn first_token(&self) -> Option<PaginationToken> {
        Some(PaginationToken::first())
    }

    fn query_params(&self, token: Option<&PaginationToken>) -> BTreeMap<String, String> {
        let page = token.copied().unwrap_or_else(PaginationToken::first).page;
        let mut params = BTreeMap::new();
        params.insert(self.page_param.clone(), page.to_string());
        params.insert(self.limit_param.clone(), self.page_size.to_string());
        params
    }

    fn next(&self, stream: &str, body: &Value) -> Result<Option<PaginationToken>> {
        let info = PageInfo::from_body(stream, body)?;

        if self.is_last(&info) {
            debug!(
                "{stream}: page {} of {} is the last page (total {})",
                info.page,
                self.termination.total_pages(info.total, self.page_size),
                info.total
            );
            return Ok(None);
        }

        let next = info.page.checked_add(1).ok_or_else(|| {
            Error::protocol(stream, format!("page {} has no successor", info.page))
        })?;
        Ok(Some(PaginationToken::new(next)))
    }
}

// ============================================================================
// Single Page
// ============================================================================

/// No pagination - single request
#[derive(Debug, Clone, Default)]
pub struct SinglePage;

impl Paginator for SinglePage {
    fn first_token(&self) -> Option<PaginationToken> {
        None
    }

    fn query_params(&self, _token: Option<&PaginationToken>) -> BTreeMap<String, String> {
        BTreeMap::new()
    }

    fn next(&self, _stream: &str, _body: &Value) -> Result<Option<PaginationToken>> {
        Ok(None)
    }
}

/// Build the paginator described by a stream definition
pub fn build_paginator(config: &PaginationConfigDef) -> Box<dyn Paginator> {
    match config {
        PaginationConfigDef::None => Box::new(SinglePage),
        PaginationConfigDef::PageCursor {
            page_param,
            limit_param,
            page_size,
            termination,
        } => Box::new(
            PageCursor::new(*page_size)
                .with_params(page_param, limit_param)
                .with_termination(*termination),
        ),
    }
}
