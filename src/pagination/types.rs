//! Pagination types and traits
//!
//! Defines the core pagination abstractions used by all strategies.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Position of the next page to request
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PaginationToken {
    /// 1-based page number
    pub page: u32,
}

impl PaginationToken {
    /// Create a token for a page
    pub fn new(page: u32) -> Self {
        Self { page }
    }

    /// Token of the first page
    pub fn first() -> Self {
        Self { page: 1 }
    }
}

/// Pagination header of a DEAR page body
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageInfo {
    /// Page number reported by the API
    pub page: u32,
    /// Total record count across all pages
    pub total: u64,
}

impl PageInfo {
    /// Read `Page` and `Total` from a body.
    ///
    /// A body without both integer fields violates the protocol for `stream`.
    pub fn from_body(stream: &str, body: &Value) -> Result<Self> {
        let field = |name: &str| -> Result<u64> {
            match body.get(name) {
                Some(value) => value.as_u64().ok_or_else(|| {
                    Error::protocol(stream, format!("'{name}' is not a non-negative integer: {value}"))
                }),
                None => Err(Error::protocol(stream, format!("page body is missing '{name}'"))),
            }
        };

        let page = field("Page")?;
        let total = field("Total")?;
        let page = u32::try_from(page)
            .map_err(|_| Error::protocol(stream, format!("'Page' out of range: {page}")))?;

        Ok(Self { page, total })
    }
}

/// Rule deciding which page is the last one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminationPolicy {
    /// Stop at page `ceil(total / page_size)`
    #[default]
    Strict,
    /// Stop at page `floor(total / page_size) + 1`, which fetches one extra
    /// empty page whenever `total` is a multiple of the page size
    Legacy,
}

impl TerminationPolicy {
    /// Number of pages the policy expects to fetch (never less than one)
    pub fn total_pages(self, total: u64, page_size: u32) -> u64 {
        let size = u64::from(page_size.max(1));
        let pages = match self {
            Self::Strict => total.div_ceil(size),
            Self::Legacy => total / size + 1,
        };
        pages.max(1)
    }

    /// Whether `page` is the last page to fetch
    pub fn is_last(self, page: u32, total: u64, page_size: u32) -> bool {
        u64::from(page) >= self.total_pages(total, page_size)
    }
}

/// Core trait for pagination strategies
pub trait Paginator: Send + Sync {
    /// Token for the first request, `None` when the endpoint is not paginated
    fn first_token(&self) -> Option<PaginationToken>;

    /// Query parameters for a request at `token`
    fn query_params(&self, token: Option<&PaginationToken>) -> BTreeMap<String, String>;

    /// Token for the page after `body`, or `None` when `body` was the last page
    fn next(&self, stream: &str, body: &Value) -> Result<Option<PaginationToken>>;
}
