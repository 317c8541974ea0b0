use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::features::catalog_import::context::ImportContext;
use crate::features::catalog_import::store::StoreError;
use crate::features::catalog_import::types::ImportBatch;
use crate::features::shared::pagination::{PaginationMetadata, PaginationParams};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListBatchesQuery {
    pub supplier_id: Uuid,
    #[serde(flatten)]
    pub pagination: PaginationParams,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListBatchesResponse {
    pub items: Vec<ImportBatch>,
    pub pagination: PaginationMetadata,
}

#[derive(Debug, thiserror::Error)]
pub enum ListBatchesError {
    #[error("{0}")]
    InvalidPagination(&'static str),
    #[error("Storage error: {0}")]
    Store(#[from] StoreError),
}

impl ListBatchesError {
    pub fn code(&self) -> &'static str {
        match self {
            ListBatchesError::InvalidPagination(_) => "INVALID_PAGINATION",
            ListBatchesError::Store(_) => "INTERNAL_ERROR",
        }
    }
}

#[tracing::instrument(skip(ctx))]
pub async fn handle(
    ctx: &ImportContext,
    query: ListBatchesQuery,
) -> Result<ListBatchesResponse, ListBatchesError> {
    query
        .pagination
        .validate()
        .map_err(ListBatchesError::InvalidPagination)?;

    let page = ctx
        .batches
        .list_batches(
            query.supplier_id,
            query.pagination.per_page(),
            query.pagination.offset(),
        )
        .await?;

    Ok(ListBatchesResponse {
        items: page.items,
        pagination: PaginationMetadata::from_params(&query.pagination, page.total),
    })
}
