//! Catalog Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared types, utilities, and error handling for the supplier catalog
//! ingestion workspace.
//!
//! # Overview
//!
//! - **Error Handling**: Shared error and result types
//! - **GTIN**: Barcode structure and check-digit validation
//! - **Logging**: Tracing subscriber setup for every binary in the workspace
//!
//! # Example
//!
//! ```no_run
//! use catalog_common::gtin::validate_gtin;
//!
//! assert!(validate_gtin("4901234567894").is_ok());
//! assert!(validate_gtin("4901234567895").is_err());
//! ```

pub mod error;
pub mod gtin;
pub mod logging;

// Re-export commonly used types
pub use error::{CatalogError, Result};
pub use gtin::{validate_gtin, GtinError};
