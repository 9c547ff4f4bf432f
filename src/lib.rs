// Allow common clippy pedantic lints that aren't critical for this codebase
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_lossless)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::ref_option)]
#![allow(clippy::unused_self)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::items_after_statements)]
#![allow(clippy::unnecessary_wraps)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::match_wildcard_for_single_variants)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::unused_async)]

//! # DEAR Inventory source
//!
//! Extracts sales, sale invoices, products, categories, customers, locations
//! and product availability from the DEAR Inventory REST API as a sequence of
//! typed messages, resuming incremental streams from saved state.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use dear_inventory::{Connector, DearInventory, SourceConfig, StateManager};
//! use tokio::sync::mpsc;
//!
//! #[tokio::main]
//! async fn main() -> dear_inventory::Result<()> {
//!     let connector = DearInventory::new(SourceConfig::new("account-id", "api-key"))?;
//!     let state = StateManager::from_file("state.json")?;
//!
//!     let (tx, mut rx) = mpsc::channel(1024);
//!     let printer = async move {
//!         while let Some(message) = rx.recv().await {
//!             println!("{}", serde_json::to_string(&message).unwrap());
//!         }
//!     };
//!
//!     let (report, ()) = tokio::join!(connector.read(None, state, tx), printer);
//!     println!("{} records", report?.total_records());
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │  Connector: check() · streams() · read(selected, state, tx)  │
//! └──────────────────────────────────────────────────────────────┘
//!                               │
//! ┌──────────────────────────────────────────────────────────────┐
//! │  SyncEngine: ExtractionPlan → bounded stream tasks → report  │
//! └──────────────────────────────────────────────────────────────┘
//!                               │
//! ┌────────────┬───────────────┬──────────────┬──────────────────┐
//! │   Source   │  Pagination   │  Partition   │      State       │
//! ├────────────┼───────────────┼──────────────┼──────────────────┤
//! │ Record     │ Page / Total  │ Parent slice │ CursorState      │
//! │ Dependent  │ Single page   │              │ StateManager     │
//! └────────────┴───────────────┴──────────────┴──────────────────┘
//!                               │
//! ┌──────────────────────────────────────────────────────────────┐
//! │  HttpClient: auth headers · fixed backoff · rate limit       │
//! └──────────────────────────────────────────────────────────────┘
//! ```

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]

// ============================================================================
// Module declarations
// ============================================================================

/// Error types
pub mod error;

/// Common types and type aliases
pub mod types;

/// User configuration and stream definitions
pub mod config;

/// Built-in resource catalog
pub mod catalog;

/// Template interpolation
pub mod template;

/// Static header authentication
pub mod auth;

/// HTTP client with retry and rate limiting
pub mod http;

/// Pagination strategies
pub mod pagination;

/// Response decoders
pub mod decode;

/// Parent/child partition routing
pub mod partition;

/// Incremental cursors and state persistence
pub mod state;

/// Lazy record sources
pub mod source;

/// Extraction plan and sync engine
pub mod engine;

/// Connector trait and the DEAR Inventory connector
pub mod connector;

/// Command-line interface
pub mod cli;

// ============================================================================
// Re-exports
// ============================================================================

pub use config::{CatalogConfig, SourceConfig, StreamConfig};
pub use connector::{CheckResult, Connector, DearInventory, StreamInfo};
pub use engine::{ExtractionPlan, Message, StreamStatus, SyncEngine, SyncReport};
pub use error::{Error, Result};
pub use state::{CursorState, CursorValue, StateManager};
pub use types::*;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name
pub const NAME: &str = env!("CARGO_PKG_NAME");
