//! Service harness over the in-memory catalog and a scripted verifier

use std::sync::Arc;
use uuid::Uuid;

use super::commands::apply::{self, ApplyBatchCommand, ApplyBatchError, ApplyBatchResponse};
use super::commands::upload::{self, UploadCatalogCommand, UploadCatalogError, UploadCatalogResponse};
use super::context::{ImportContext, ImportSettings};
use super::store::memory::MemoryCatalog;
use super::types::SupplierStatus;
use crate::verification::fake::FakeVerifier;

pub struct Harness {
    pub catalog: MemoryCatalog,
    pub verifier: Arc<FakeVerifier>,
    pub ctx: ImportContext,
    pub supplier_id: Uuid,
    pub user_id: Uuid,
}

impl Harness {
    pub async fn new() -> Self {
        let catalog = MemoryCatalog::new();
        let verifier = Arc::new(FakeVerifier::new());
        let supplier_id = catalog.add_supplier(SupplierStatus::Active).await;

        let shared = Arc::new(catalog.clone());
        let ctx = ImportContext {
            batches: shared.clone(),
            masters: shared.clone(),
            suppliers: shared.clone(),
            unit_of_work: shared,
            verifier: verifier.clone(),
            settings: ImportSettings::default(),
        };

        Self {
            catalog,
            verifier,
            ctx,
            supplier_id,
            user_id: Uuid::new_v4(),
        }
    }

    pub async fn upload(&self, csv: &str) -> Result<UploadCatalogResponse, UploadCatalogError> {
        self.upload_bytes(csv.as_bytes().to_vec()).await
    }

    pub async fn upload_bytes(
        &self,
        bytes: Vec<u8>,
    ) -> Result<UploadCatalogResponse, UploadCatalogError> {
        self.upload_as(self.supplier_id, bytes).await
    }

    pub async fn upload_as(
        &self,
        supplier_id: Uuid,
        bytes: Vec<u8>,
    ) -> Result<UploadCatalogResponse, UploadCatalogError> {
        upload::handle(
            &self.ctx,
            UploadCatalogCommand {
                supplier_id,
                uploaded_by: self.user_id,
                file_name: "catalog.csv".to_string(),
                bytes,
            },
        )
        .await
    }

    pub async fn apply(&self, batch_id: Uuid) -> Result<ApplyBatchResponse, ApplyBatchError> {
        self.apply_as(batch_id, self.supplier_id).await
    }

    pub async fn apply_as(
        &self,
        batch_id: Uuid,
        supplier_id: Uuid,
    ) -> Result<ApplyBatchResponse, ApplyBatchError> {
        apply::handle(
            &self.ctx,
            ApplyBatchCommand {
                batch_id,
                supplier_id,
            },
        )
        .await
    }
}
