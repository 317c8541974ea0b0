//! Supplier catalog bulk import
//!
//! Two phases:
//!
//! - **upload** parses a CSV, scores each row and stores the batch as READY
//!   or FAILED without touching the catalog
//! - **apply** commits the valid rows of a READY batch as supplier offers in
//!   one transaction, creating product masters only for barcodes the
//!   regulator verifies again at that moment
//!
//! Storage and the regulator are reached through the traits in [`store`] and
//! [`crate::verification`], bundled in an [`ImportContext`].

pub mod commands;
pub mod context;
pub mod csv_input;
pub mod queries;
pub mod routes;
pub mod store;
pub mod types;

#[cfg(test)]
pub(crate) mod test_support;

pub use commands::{
    ApplyBatchCommand, ApplyBatchError, ApplyBatchResponse, RowSummary, SkippedRow,
    UploadCatalogCommand, UploadCatalogError, UploadCatalogResponse,
};
pub use context::{ImportContext, ImportSettings};
pub use queries::{
    GetBatchError, GetBatchQuery, GetBatchResponse, ImportRowView, ListBatchesError,
    ListBatchesQuery, ListBatchesResponse,
};
pub use routes::catalog_import_routes;
