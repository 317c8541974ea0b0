//! Write operations for catalog imports

pub mod apply;
pub mod upload;

pub use apply::{ApplyBatchCommand, ApplyBatchError, ApplyBatchResponse, SkippedRow};
pub use upload::{RowSummary, UploadCatalogCommand, UploadCatalogError, UploadCatalogResponse};
