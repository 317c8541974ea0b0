//! Shared fixtures for catalog server integration tests
//!
//! PostgreSQL runs in a throwaway container with migrations applied. Tests
//! using it need Docker and are marked `#[ignore]`:
//!
//! ```bash
//! cargo test -p catalog-server --test catalog_import_pg_tests -- --ignored
//! ```

#![allow(dead_code)]

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use testcontainers::{core::IntoContainerPort, runners::AsyncRunner, ContainerAsync, ImageExt};
use testcontainers_modules::postgres::Postgres;
use tracing::{debug, info};
use uuid::Uuid;

use catalog_server::features::catalog_import::{store::PgCatalogStore, ImportContext, ImportSettings};
use catalog_server::verification::{
    RegulatedProduct, RegulatoryVerifier, VerificationError, VerificationOutcome,
};

// ============================================================================
// PostgreSQL Test Container
// ============================================================================

/// PostgreSQL container with migrations applied
pub struct TestPostgres {
    _container: ContainerAsync<Postgres>,
    pool: PgPool,
}

impl TestPostgres {
    pub async fn start() -> Result<Self> {
        info!("Starting PostgreSQL test container...");

        let container = Postgres::default()
            .with_tag("16-alpine")
            .start()
            .await
            .context("Failed to start PostgreSQL container")?;

        let host = container
            .get_host()
            .await
            .context("Failed to get container host")?;
        let port = container
            .get_host_port_ipv4(5432.tcp())
            .await
            .context("Failed to get container port")?;

        let connection_string =
            format!("postgresql://postgres:postgres@{}:{}/postgres", host, port);
        debug!("PostgreSQL connection: {}", connection_string);

        let pool = PgPoolOptions::new()
            .max_connections(8)
            .acquire_timeout(Duration::from_secs(30))
            .connect(&connection_string)
            .await
            .context("Failed to connect to PostgreSQL")?;

        sqlx::migrate!("../../migrations")
            .run(&pool)
            .await
            .context("Failed to run migrations")?;

        Ok(Self {
            _container: container,
            pool,
        })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Inserts a supplier with the given status text
    pub async fn seed_supplier(&self, status: &str) -> Result<Uuid> {
        let id = Uuid::new_v4();
        sqlx::query("INSERT INTO suppliers (id, name, status) VALUES ($1, $2, $3)")
            .bind(id)
            .bind(format!("supplier-{}", id))
            .bind(status)
            .execute(&self.pool)
            .await
            .context("Failed to insert supplier")?;
        Ok(id)
    }

    pub async fn count(&self, table: &str) -> Result<i64> {
        let count = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", table))
            .fetch_one(&self.pool)
            .await
            .with_context(|| format!("Failed to count {}", table))?;
        Ok(count)
    }

    /// Import context over this database and the given verifier
    pub fn context(&self, verifier: Arc<dyn RegulatoryVerifier>) -> ImportContext {
        ImportContext::with_postgres(
            PgCatalogStore::new(self.pool.clone()),
            verifier,
            ImportSettings::default(),
        )
    }
}

// ============================================================================
// Regulator stand-in
// ============================================================================

/// Verifies a fixed set of barcodes and reports everything else as unknown
#[derive(Default)]
pub struct KnownProducts {
    barcodes: Mutex<HashSet<String>>,
    latency: Duration,
}

impl KnownProducts {
    pub fn new<'a>(barcodes: impl IntoIterator<Item = &'a str>) -> Arc<Self> {
        Self::with_latency(barcodes, Duration::ZERO)
    }

    /// Answers only after `latency`, so concurrent applies overlap
    pub fn with_latency<'a>(
        barcodes: impl IntoIterator<Item = &'a str>,
        latency: Duration,
    ) -> Arc<Self> {
        Arc::new(Self {
            barcodes: Mutex::new(barcodes.into_iter().map(str::to_string).collect()),
            latency,
        })
    }
}

#[async_trait]
impl RegulatoryVerifier for KnownProducts {
    async fn verify(&self, barcode: &str) -> Result<VerificationOutcome, VerificationError> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        let known = self
            .barcodes
            .lock()
            .map_err(|_| VerificationError::Unavailable("poisoned".to_string()))?
            .contains(barcode);

        Ok(if known {
            VerificationOutcome::Verified(RegulatedProduct {
                regulatory_name: format!("Product {}", barcode),
                manufacturer_name: "Test Pharma".to_string(),
                permit_number: Some(format!("P-{}", barcode)),
                product_id: None,
                regulatory_type: None,
            })
        } else {
            VerificationOutcome::NotVerified
        })
    }
}

/// Initialize tracing for tests; safe to call more than once
pub fn init_test_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let _ = fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new("info,catalog_server=debug,sqlx=warn,testcontainers=info")
        }))
        .with_test_writer()
        .try_init();
}
