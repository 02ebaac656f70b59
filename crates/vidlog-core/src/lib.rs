//! Core types and the ingestion & reconciliation engine for vidlog.
//!
//! No HTTP or database code lives here. Storage backends implement
//! [`store::TrackerStore`]; extraction backends implement
//! [`oracle::ExtractionOracle`]. Value parsing, video resolution,
//! field-level merging and spreadsheet import are written against those two
//! traits only.

pub mod audit;
pub mod error;
pub mod field;
pub mod import;
pub mod ingest;
pub mod log;
pub mod mapping;
pub mod oracle;
pub mod parse;
pub mod reconcile;
pub mod resolve;
pub mod settings;
pub mod store;
pub mod sync;
pub mod video;

#[cfg(any(test, feature = "test-util"))]
pub mod testing;

pub use error::{Error, Result};
