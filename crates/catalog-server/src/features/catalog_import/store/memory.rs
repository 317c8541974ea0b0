//! In-memory catalog for service tests
//!
//! An apply transaction holds the catalog lock for its whole lifetime and
//! works on a copy, which is written back on commit and discarded on drop.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use super::{
    ApplyTransaction, ApplyUnitOfWork, BatchPage, ImportBatchStore, MasterInsert, MasterRegistry,
    NewImportBatch, NewImportRow, NewProductMaster, OfferTerms, OfferUpsert, StoreError,
    SupplierDirectory,
};
use crate::features::catalog_import::types::{
    ApprovalStatus, BatchStatus, ImportBatch, ImportRow, ProductMaster, SupplierProductOffer,
    SupplierStatus,
};

#[derive(Debug, Clone, Default)]
pub struct CatalogState {
    pub suppliers: HashMap<Uuid, SupplierStatus>,
    pub masters: Vec<ProductMaster>,
    pub offers: Vec<SupplierProductOffer>,
    pub batches: Vec<ImportBatch>,
    pub rows: Vec<ImportRow>,
    /// Fail the nth offer upsert (0-based) across all transactions
    pub fail_offer_upsert_at: Option<usize>,
    pub offer_upserts: usize,
    /// Masters another writer commits the moment an apply tries to insert them
    pub racing_masters: HashMap<String, Uuid>,
}

fn seeded_master(id: Uuid, barcode: &str) -> ProductMaster {
    ProductMaster {
        id,
        barcode: barcode.to_string(),
        regulatory_name: format!("Registered {}", barcode),
        manufacturer_name: "Seeded".to_string(),
        permit_number: None,
        regulatory_product_id: None,
        regulatory_type: None,
        is_verified: true,
        verified_at: Some(Utc::now()),
        created_at: Utc::now(),
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryCatalog {
    state: Arc<Mutex<CatalogState>>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_supplier(&self, status: SupplierStatus) -> Uuid {
        let id = Uuid::new_v4();
        self.state.lock().await.suppliers.insert(id, status);
        id
    }

    pub async fn set_supplier_status(&self, supplier_id: Uuid, status: SupplierStatus) {
        self.state.lock().await.suppliers.insert(supplier_id, status);
    }

    pub async fn add_master(&self, barcode: &str) -> Uuid {
        let id = Uuid::new_v4();
        self.state.lock().await.masters.push(seeded_master(id, barcode));
        id
    }

    /// Lets the next insert of `barcode` lose to a concurrent writer, which
    /// commits the returned master id first
    pub async fn race_master_insert(&self, barcode: &str) -> Uuid {
        let id = Uuid::new_v4();
        self.state
            .lock()
            .await
            .racing_masters
            .insert(barcode.to_string(), id);
        id
    }

    pub async fn fail_offer_upsert_at(&self, index: usize) {
        self.state.lock().await.fail_offer_upsert_at = Some(index);
    }

    pub async fn clear_failures(&self) {
        self.state.lock().await.fail_offer_upsert_at = None;
    }

    pub async fn snapshot(&self) -> CatalogState {
        self.state.lock().await.clone()
    }
}

#[async_trait]
impl ImportBatchStore for MemoryCatalog {
    async fn create_scored_batch(
        &self,
        batch: NewImportBatch,
        rows: Vec<NewImportRow>,
    ) -> Result<ImportBatch, StoreError> {
        let mut state = self.state.lock().await;

        let record = ImportBatch {
            id: batch.id,
            supplier_id: batch.supplier_id,
            uploaded_by: batch.uploaded_by,
            file_name: batch.file_name,
            total_rows: batch.total_rows,
            valid_rows: batch.valid_rows,
            rejected_rows: batch.rejected_rows,
            status: batch.status,
            applied_at: None,
            created_at: Utc::now(),
        };

        for row in rows {
            state.rows.push(ImportRow {
                id: Uuid::new_v4(),
                batch_id: batch.id,
                row_number: row.row_number,
                raw_json: row.raw_json,
                parsed_barcode: row.parsed_barcode,
                parsed_supply_price: row.parsed_supply_price,
                parsed_distribution_type: row.parsed_distribution_type,
                validation_status: row.validation_status,
                validation_error: row.validation_error,
                master_id: row.master_id,
                action_type: row.action_type,
            });
        }
        state.batches.push(record.clone());

        Ok(record)
    }

    async fn find_batch(
        &self,
        batch_id: Uuid,
        supplier_id: Uuid,
    ) -> Result<Option<ImportBatch>, StoreError> {
        let state = self.state.lock().await;
        Ok(state
            .batches
            .iter()
            .find(|b| b.id == batch_id && b.supplier_id == supplier_id)
            .cloned())
    }

    async fn list_rows(&self, batch_id: Uuid) -> Result<Vec<ImportRow>, StoreError> {
        let state = self.state.lock().await;
        let mut rows: Vec<_> = state
            .rows
            .iter()
            .filter(|r| r.batch_id == batch_id)
            .cloned()
            .collect();
        rows.sort_by_key(|r| r.row_number);
        Ok(rows)
    }

    async fn list_batches(
        &self,
        supplier_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<BatchPage, StoreError> {
        let state = self.state.lock().await;
        // insertion order stands in for created_at
        let owned: Vec<_> = state
            .batches
            .iter()
            .rev()
            .filter(|b| b.supplier_id == supplier_id)
            .cloned()
            .collect();
        let total = owned.len() as i64;
        let items = owned
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect();
        Ok(BatchPage { items, total })
    }
}

#[async_trait]
impl MasterRegistry for MemoryCatalog {
    async fn find_ids_by_barcodes(
        &self,
        barcodes: &[String],
    ) -> Result<HashMap<String, Uuid>, StoreError> {
        let state = self.state.lock().await;
        Ok(state
            .masters
            .iter()
            .filter(|m| barcodes.contains(&m.barcode))
            .map(|m| (m.barcode.clone(), m.id))
            .collect())
    }
}

#[async_trait]
impl SupplierDirectory for MemoryCatalog {
    async fn supplier_status(
        &self,
        supplier_id: Uuid,
    ) -> Result<Option<SupplierStatus>, StoreError> {
        Ok(self.state.lock().await.suppliers.get(&supplier_id).copied())
    }
}

#[async_trait]
impl ApplyUnitOfWork for MemoryCatalog {
    async fn begin(&self) -> Result<Box<dyn ApplyTransaction>, StoreError> {
        let guard = self.state.clone().lock_owned().await;
        let working = guard.clone();
        Ok(Box::new(MemoryTransaction {
            guard: Some(guard),
            working,
        }))
    }
}

pub struct MemoryTransaction {
    guard: Option<OwnedMutexGuard<CatalogState>>,
    working: CatalogState,
}

impl MemoryTransaction {
    fn open(&mut self) -> Result<&mut CatalogState, StoreError> {
        if self.guard.is_none() {
            return Err(StoreError::TransactionClosed);
        }
        Ok(&mut self.working)
    }
}

#[async_trait]
impl ApplyTransaction for MemoryTransaction {
    async fn lock_batch(&mut self, batch_id: Uuid) -> Result<Option<BatchStatus>, StoreError> {
        let state = self.open()?;
        Ok(state
            .batches
            .iter()
            .find(|b| b.id == batch_id)
            .map(|b| b.status))
    }

    async fn find_master_id(&mut self, barcode: &str) -> Result<Option<Uuid>, StoreError> {
        let state = self.open()?;
        Ok(state
            .masters
            .iter()
            .find(|m| m.barcode == barcode)
            .map(|m| m.id))
    }

    async fn insert_master(
        &mut self,
        master: &NewProductMaster,
    ) -> Result<MasterInsert, StoreError> {
        let state = self.open()?;
        if let Some(id) = state.racing_masters.remove(&master.barcode) {
            state.masters.push(seeded_master(id, &master.barcode));
        }
        if state.masters.iter().any(|m| m.barcode == master.barcode) {
            return Ok(MasterInsert::AlreadyExists);
        }

        let id = Uuid::new_v4();
        state.masters.push(ProductMaster {
            id,
            barcode: master.barcode.clone(),
            regulatory_name: master.product.regulatory_name.clone(),
            manufacturer_name: master.product.manufacturer_name.clone(),
            permit_number: master.product.permit_number.clone(),
            regulatory_product_id: master.product.product_id.clone(),
            regulatory_type: master.product.regulatory_type.clone(),
            is_verified: true,
            verified_at: Some(master.verified_at),
            created_at: Utc::now(),
        });
        Ok(MasterInsert::Created(id))
    }

    async fn upsert_offer(&mut self, terms: &OfferTerms) -> Result<OfferUpsert, StoreError> {
        let state = self.open()?;
        let attempt = state.offer_upserts;
        state.offer_upserts += 1;
        if state.fail_offer_upsert_at == Some(attempt) {
            return Err(StoreError::Unavailable("injected offer failure".to_string()));
        }

        let now = Utc::now();
        if let Some(offer) = state
            .offers
            .iter_mut()
            .find(|o| o.master_id == terms.master_id && o.supplier_id == terms.supplier_id)
        {
            offer.supply_price = terms.supply_price;
            offer.distribution_type = terms.distribution_type;
            offer.updated_at = now;
            return Ok(OfferUpsert::Updated(offer.id));
        }

        let id = Uuid::new_v4();
        state.offers.push(SupplierProductOffer {
            id,
            master_id: terms.master_id,
            supplier_id: terms.supplier_id,
            supply_price: terms.supply_price,
            distribution_type: terms.distribution_type,
            approval_status: ApprovalStatus::Pending,
            is_active: false,
            created_at: now,
            updated_at: now,
        });
        Ok(OfferUpsert::Created(id))
    }

    async fn link_row_master(&mut self, row_id: Uuid, master_id: Uuid) -> Result<(), StoreError> {
        let state = self.open()?;
        if let Some(row) = state.rows.iter_mut().find(|r| r.id == row_id) {
            row.master_id = Some(master_id);
        }
        Ok(())
    }

    async fn mark_batch_applied(
        &mut self,
        batch_id: Uuid,
        applied_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let state = self.open()?;
        match state
            .batches
            .iter_mut()
            .find(|b| b.id == batch_id && b.status.can_transition_to(BatchStatus::Applied))
        {
            Some(batch) => {
                batch.status = BatchStatus::Applied;
                batch.applied_at = Some(applied_at);
                Ok(())
            },
            None => Err(StoreError::CorruptRecord(format!(
                "batch {} left READY during apply",
                batch_id
            ))),
        }
    }

    async fn commit(&mut self) -> Result<(), StoreError> {
        let mut guard = self.guard.take().ok_or(StoreError::TransactionClosed)?;
        *guard = std::mem::take(&mut self.working);
        Ok(())
    }
}
