//! Utilities shared across feature slices
//!
//! - **identity**: caller identity from gateway headers
//! - **pagination**: page/per-page parameters and response metadata

pub mod identity;
pub mod pagination;

pub use identity::SupplierIdentity;
pub use pagination::{PaginationMetadata, PaginationParams};
