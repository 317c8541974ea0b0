//! Dependencies shared by the catalog import commands and queries

use std::sync::Arc;
use std::time::Duration;

use super::csv_input::CsvLimits;
use super::store::{
    ApplyUnitOfWork, ImportBatchStore, MasterRegistry, PgCatalogStore, SupplierDirectory,
};
use crate::config::Config;
use crate::verification::RegulatoryVerifier;

#[derive(Debug, Clone, Copy)]
pub struct ImportSettings {
    pub max_rows: usize,
    pub max_file_bytes: usize,
    /// Regulatory lookups in flight during one upload
    pub verify_concurrency: usize,
    /// Upper bound for a single regulatory lookup
    pub verify_timeout: Duration,
}

impl ImportSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_rows: config.import.max_rows,
            max_file_bytes: config.import.max_file_bytes,
            verify_concurrency: config.import.verify_concurrency,
            verify_timeout: config.verification.timeout(),
        }
    }

    pub fn csv_limits(&self) -> CsvLimits {
        CsvLimits {
            max_rows: self.max_rows,
            max_file_bytes: self.max_file_bytes,
        }
    }
}

impl Default for ImportSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// Route state for the catalog import slice
#[derive(Clone)]
pub struct ImportContext {
    pub batches: Arc<dyn ImportBatchStore>,
    pub masters: Arc<dyn MasterRegistry>,
    pub suppliers: Arc<dyn SupplierDirectory>,
    pub unit_of_work: Arc<dyn ApplyUnitOfWork>,
    pub verifier: Arc<dyn RegulatoryVerifier>,
    pub settings: ImportSettings,
}

impl ImportContext {
    /// Wires every store seam to one database-backed store
    pub fn with_postgres(
        store: PgCatalogStore,
        verifier: Arc<dyn RegulatoryVerifier>,
        settings: ImportSettings,
    ) -> Self {
        let store = Arc::new(store);
        Self {
            batches: store.clone(),
            masters: store.clone(),
            suppliers: store.clone(),
            unit_of_work: store,
            verifier,
            settings,
        }
    }
}
