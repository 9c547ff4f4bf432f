//! Response decoder module
//!
//! Unwraps the record array from a decoded page body.
//!
//! # Overview
//!
//! Every DEAR list endpoint nests its records under a resource-specific key
//! (`SaleList`, `Products`, `Invoices`, ...). A missing key means the page
//! carries no records, not that the response is broken.

mod decoders;
mod types;

pub use decoders::ListDecoder;
pub use types::RecordDecoder;
