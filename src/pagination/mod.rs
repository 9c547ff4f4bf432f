//! Pagination module
//!
//! Supports: DEAR `Page`/`Total` page-number pagination, single-page endpoints
//!
//! # Overview
//!
//! A paginator turns the body of the page just fetched into the token for the
//! next request, or `None` once the last page has been seen. Tokens are derived
//! from the reported `Page` and `Total` only.

mod strategies;
mod types;

pub use strategies::{build_paginator, PageCursor, SinglePage};
pub use types::{PageInfo, PaginationToken, Paginator, TerminationPolicy};
