//! Catalog Server Library
//!
//! HTTP server for supplier catalog bulk ingestion.
//!
//! # Overview
//!
//! Suppliers upload a CSV of products identified by GTIN barcodes. Every row
//! is validated (structure, checksum, duplicates) and checked against the
//! regulatory product registry before anything touches the catalog. A
//! validated batch is then applied in a single transaction: missing product
//! masters are registered and the supplier's offers are created or updated.
//!
//! - **API Endpoints**: upload, apply, batch detail and batch history
//! - **Database Management**: PostgreSQL integration with SQLx
//! - **Verification**: HTTP client for the regulatory registry
//! - **Configuration**: Environment-based configuration management
//! - **Middleware**: CORS and request logging
//!
//! # Architecture
//!
//! Features are vertical slices split into commands (writes) and queries
//! (reads). Handlers depend on store traits rather than on the pool, so the
//! import workflow runs unchanged against PostgreSQL or an in-memory store.
//!
//! ## Framework Stack
//!
//! - **Axum**: Web framework
//! - **SQLx**: PostgreSQL access and migrations
//! - **Reqwest**: Regulatory registry client
//! - **Tower**: Middleware and service abstractions
//!
//! # Example
//!
//! ```no_run
//! use catalog_server::{api, config::Config};
//! use catalog_server::features::catalog_import::{store::PgCatalogStore, ImportContext, ImportSettings};
//! use catalog_server::verification::HttpRegulatoryVerifier;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load()?;
//!     let pool = sqlx::PgPool::connect(&config.database.url).await?;
//!     let verifier = HttpRegulatoryVerifier::from_config(&config.verification)?;
//!     let ctx = ImportContext::with_postgres(
//!         PgCatalogStore::new(pool.clone()),
//!         Arc::new(verifier),
//!         ImportSettings::from_config(&config),
//!     );
//!     let app = api::create_router(pool, ctx, &config);
//!     let listener = tokio::net::TcpListener::bind("127.0.0.1:8000").await?;
//!     axum::serve(listener, app).await?;
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod config;
pub mod error;
pub mod features;
pub mod middleware;
pub mod verification;

// Re-export commonly used types
pub use error::AppError;
