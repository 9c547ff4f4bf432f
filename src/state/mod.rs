//! State management module
//!
//! Handles incremental cursors and their persistence between runs.
//!
//! # Overview
//!
//! - `CursorValue` / `CursorState` - the watermark of one incremental stream
//!   during a single sync
//! - `State` - the persisted `{stream: {cursor_field: value}}` document
//! - `StateManager` - file-backed or in-memory store for `State`

mod cursor;
mod manager;
mod types;

pub use cursor::{CursorState, CursorValue, EPOCH_FLOOR};
pub use manager::StateManager;
pub use types::{State, StreamState};
