//! Record sources
//!
//! Lazy streams of records for one resource.
//!
//! # Overview
//!
//! - `RecordSource` - path, query template, paginator and decoder for one
//!   resource; yields whole pages
//! - `DependentSource` - a child `RecordSource` driven by every record of a
//!   parent `RecordSource`
//! - `FetchContext` - per-traversal inputs (watermark, parent slice,
//!   template config, cancellation)

mod context;
mod dependent;
mod record;

pub use context::{CancelFlag, FetchContext};
pub use dependent::{ChildGroup, DependentSource};
pub use record::RecordSource;
