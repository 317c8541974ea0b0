use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::features::catalog_import::context::ImportContext;
use crate::features::catalog_import::store::StoreError;
use crate::features::catalog_import::types::{ImportBatch, ImportRow};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetBatchQuery {
    pub batch_id: Uuid,
    pub supplier_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportRowView {
    #[serde(flatten)]
    pub row: ImportRow,
    pub retryable: bool,
}

impl From<ImportRow> for ImportRowView {
    fn from(row: ImportRow) -> Self {
        let retryable = row.validation_error.is_some_and(|code| code.is_retryable());
        Self { row, retryable }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetBatchResponse {
    pub batch: ImportBatch,
    pub rows: Vec<ImportRowView>,
}

#[derive(Debug, thiserror::Error)]
pub enum GetBatchError {
    #[error("Import batch '{0}' not found")]
    NotFound(Uuid),
    #[error("Storage error: {0}")]
    Store(#[from] StoreError),
}

impl GetBatchError {
    pub fn code(&self) -> &'static str {
        match self {
            GetBatchError::NotFound(_) => "BATCH_NOT_FOUND",
            GetBatchError::Store(_) => "INTERNAL_ERROR",
        }
    }
}

#[tracing::instrument(skip(ctx))]
pub async fn handle(
    ctx: &ImportContext,
    query: GetBatchQuery,
) -> Result<GetBatchResponse, GetBatchError> {
    let batch = ctx
        .batches
        .find_batch(query.batch_id, query.supplier_id)
        .await?
        .ok_or(GetBatchError::NotFound(query.batch_id))?;

    let rows = ctx
        .batches
        .list_rows(batch.id)
        .await?
        .into_iter()
        .map(ImportRowView::from)
        .collect();

    Ok(GetBatchResponse { batch, rows })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::catalog_import::test_support::Harness;
    use crate::features::catalog_import::types::{RejectionCode, SupplierStatus};
    use crate::verification::fake::Scripted;

    #[tokio::test]
    async fn test_returns_rows_in_file_order() {
        let h = Harness::new().await;
        h.catalog.add_master("4901234567894").await;
        h.verifier.set("8801234567893", Scripted::Unavailable);

        let upload = h
            .upload("barcode\n4901234567894\n8801234567893\n")
            .await
            .unwrap();

        let response = handle(
            &h.ctx,
            GetBatchQuery {
                batch_id: upload.batch_id,
                supplier_id: h.supplier_id,
            },
        )
        .await
        .unwrap();

        assert_eq!(response.batch.id, upload.batch_id);
        let numbers: Vec<i32> = response.rows.iter().map(|r| r.row.row_number).collect();
        assert_eq!(numbers, vec![1, 2]);
        assert!(!response.rows[0].retryable);
        assert_eq!(
            response.rows[1].row.validation_error,
            Some(RejectionCode::VerificationUnavailable)
        );
        assert!(response.rows[1].retryable);
    }

    #[tokio::test]
    async fn test_other_supplier_cannot_read_batch() {
        let h = Harness::new().await;
        h.catalog.add_master("4901234567894").await;
        let other = h.catalog.add_supplier(SupplierStatus::Active).await;

        let upload = h.upload("barcode\n4901234567894\n").await.unwrap();
        let err = handle(
            &h.ctx,
            GetBatchQuery {
                batch_id: upload.batch_id,
                supplier_id: other,
            },
        )
        .await
        .unwrap_err();

        assert_eq!(err.code(), "BATCH_NOT_FOUND");
    }
}
