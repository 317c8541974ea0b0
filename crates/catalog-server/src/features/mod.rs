//! Feature slices of the catalog API
//!
//! Each feature is a vertical slice with `commands/` (writes), `queries/`
//! (reads), `routes.rs` and its own types.
//!
//! # Features
//!
//! - **catalog_import**: supplier CSV upload, validation and transactional apply

pub mod catalog_import;
pub mod shared;

use axum::Router;

use catalog_import::ImportContext;

/// Creates the `/api/v1` router with every feature mounted under its prefix:
///
/// - `/catalog-imports` - Catalog upload and apply
pub fn router(ctx: ImportContext) -> Router<()> {
    let settings = ctx.settings;
    Router::new().nest(
        "/catalog-imports",
        catalog_import::catalog_import_routes(&settings).with_state(ctx),
    )
}
