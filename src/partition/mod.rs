//! Partition routing module
//!
//! Supports: parent-stream slicing for dependent resources
//!
//! # Overview
//!
//! A dependent resource (sale invoices) cannot be listed on its own; each
//! request needs a key taken from one record of its parent resource (sales).
//! `ParentRouter` turns every parent record into a `ParentChildSlice` that
//! carries the parent record and the extracted key.

mod routers;
mod types;

pub use routers::ParentRouter;
pub use types::ParentChildSlice;

#[cfg(test)]
mod tests;
