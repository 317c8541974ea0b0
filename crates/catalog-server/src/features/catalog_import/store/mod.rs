//! Storage seams for catalog imports
//!
//! The import service only talks to these traits. [`postgres::PgCatalogStore`]
//! implements all of them against the database; tests substitute an
//! in-memory catalog.
//!
//! Writes performed by apply go through an [`ApplyTransaction`] so that
//! masters, offers, row links and the batch status flip commit together or
//! not at all. Dropping a transaction without calling
//! [`ApplyTransaction::commit`] rolls it back.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use uuid::Uuid;

use super::types::{
    BatchStatus, DistributionType, ImportBatch, ImportRow, RejectionCode, RowAction,
    RowValidationStatus, SupplierStatus, UnknownVariant,
};
use crate::verification::RegulatedProduct;

pub mod postgres;

#[cfg(test)]
pub(crate) mod memory;

pub use postgres::PgCatalogStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Corrupt record: {0}")]
    CorruptRecord(String),

    #[error("Transaction already finished")]
    TransactionClosed,

    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

impl From<UnknownVariant> for StoreError {
    fn from(err: UnknownVariant) -> Self {
        StoreError::CorruptRecord(err.to_string())
    }
}

/// A fully scored batch ready to be persisted
#[derive(Debug, Clone)]
pub struct NewImportBatch {
    pub id: Uuid,
    pub supplier_id: Uuid,
    pub uploaded_by: Uuid,
    pub file_name: String,
    pub total_rows: i32,
    pub valid_rows: i32,
    pub rejected_rows: i32,
    /// Terminal validation status, `Ready` or `Failed`
    pub status: BatchStatus,
}

#[derive(Debug, Clone)]
pub struct NewImportRow {
    pub row_number: i32,
    pub raw_json: serde_json::Value,
    pub parsed_barcode: Option<String>,
    pub parsed_supply_price: Option<i64>,
    pub parsed_distribution_type: Option<DistributionType>,
    pub validation_status: RowValidationStatus,
    pub validation_error: Option<RejectionCode>,
    pub master_id: Option<Uuid>,
    pub action_type: RowAction,
}

/// Master fields taken from a positive verification, never from CSV input
#[derive(Debug, Clone)]
pub struct NewProductMaster {
    pub barcode: String,
    pub product: RegulatedProduct,
    pub verified_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MasterInsert {
    Created(Uuid),
    /// Another writer holds the barcode already
    AlreadyExists,
}

#[derive(Debug, Clone)]
pub struct OfferTerms {
    pub master_id: Uuid,
    pub supplier_id: Uuid,
    pub supply_price: i64,
    pub distribution_type: DistributionType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OfferUpsert {
    Created(Uuid),
    Updated(Uuid),
}

#[derive(Debug, Clone)]
pub struct BatchPage {
    pub items: Vec<ImportBatch>,
    pub total: i64,
}

#[async_trait]
pub trait ImportBatchStore: Send + Sync {
    /// Persists a batch and all its rows, moving it from `Validating` to
    /// its scored status, in one transaction
    async fn create_scored_batch(
        &self,
        batch: NewImportBatch,
        rows: Vec<NewImportRow>,
    ) -> Result<ImportBatch, StoreError>;

    /// Finds a batch owned by `supplier_id`
    async fn find_batch(
        &self,
        batch_id: Uuid,
        supplier_id: Uuid,
    ) -> Result<Option<ImportBatch>, StoreError>;

    /// Rows of a batch ordered by row number
    async fn list_rows(&self, batch_id: Uuid) -> Result<Vec<ImportRow>, StoreError>;

    /// Batches of a supplier, newest first
    async fn list_batches(
        &self,
        supplier_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<BatchPage, StoreError>;
}

#[async_trait]
pub trait MasterRegistry: Send + Sync {
    /// Resolves existing masters by barcode; unknown barcodes are absent
    async fn find_ids_by_barcodes(
        &self,
        barcodes: &[String],
    ) -> Result<HashMap<String, Uuid>, StoreError>;
}

#[async_trait]
pub trait SupplierDirectory: Send + Sync {
    async fn supplier_status(&self, supplier_id: Uuid)
        -> Result<Option<SupplierStatus>, StoreError>;
}

#[async_trait]
pub trait ApplyUnitOfWork: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn ApplyTransaction>, StoreError>;
}

#[async_trait]
pub trait ApplyTransaction: Send {
    /// Locks the batch row for the rest of the transaction and returns its
    /// current status
    async fn lock_batch(&mut self, batch_id: Uuid) -> Result<Option<BatchStatus>, StoreError>;

    async fn find_master_id(&mut self, barcode: &str) -> Result<Option<Uuid>, StoreError>;

    /// Inserts a master unless the barcode is already taken
    async fn insert_master(&mut self, master: &NewProductMaster)
        -> Result<MasterInsert, StoreError>;

    /// Creates an inactive pending offer, or updates price and distribution
    /// of the existing one for the same master and supplier
    async fn upsert_offer(&mut self, terms: &OfferTerms) -> Result<OfferUpsert, StoreError>;

    async fn link_row_master(&mut self, row_id: Uuid, master_id: Uuid) -> Result<(), StoreError>;

    async fn mark_batch_applied(
        &mut self,
        batch_id: Uuid,
        applied_at: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    async fn commit(&mut self) -> Result<(), StoreError>;
}
