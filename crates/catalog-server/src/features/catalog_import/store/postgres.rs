//! PostgreSQL implementation of the catalog import store

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool, Postgres, QueryBuilder, Transaction};
use std::collections::HashMap;
use uuid::Uuid;

use super::{
    ApplyTransaction, ApplyUnitOfWork, BatchPage, ImportBatchStore, MasterInsert, MasterRegistry,
    NewImportBatch, NewImportRow, NewProductMaster, OfferTerms, OfferUpsert, StoreError,
    SupplierDirectory,
};
use crate::features::catalog_import::types::{
    BatchStatus, ImportBatch, ImportRow, SupplierStatus,
};

/// Postgres binds are capped at 65535 per statement; rows bind 11 values each
const ROW_INSERT_CHUNK: usize = 1_000;

const BATCH_COLUMNS: &str = "id, supplier_id, uploaded_by, file_name, total_rows, valid_rows, \
                             rejected_rows, status, applied_at, created_at";

const ROW_COLUMNS: &str = "id, batch_id, row_number, raw_json, parsed_barcode, \
                           parsed_supply_price, parsed_distribution_type, validation_status, \
                           validation_error, master_id, action_type";

#[derive(Debug, sqlx::FromRow)]
struct BatchRecord {
    id: Uuid,
    supplier_id: Uuid,
    uploaded_by: Uuid,
    file_name: String,
    total_rows: i32,
    valid_rows: i32,
    rejected_rows: i32,
    status: String,
    applied_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl TryFrom<BatchRecord> for ImportBatch {
    type Error = StoreError;

    fn try_from(r: BatchRecord) -> Result<Self, Self::Error> {
        Ok(ImportBatch {
            id: r.id,
            supplier_id: r.supplier_id,
            uploaded_by: r.uploaded_by,
            file_name: r.file_name,
            total_rows: r.total_rows,
            valid_rows: r.valid_rows,
            rejected_rows: r.rejected_rows,
            status: r.status.parse()?,
            applied_at: r.applied_at,
            created_at: r.created_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct RowRecord {
    id: Uuid,
    batch_id: Uuid,
    row_number: i32,
    raw_json: serde_json::Value,
    parsed_barcode: Option<String>,
    parsed_supply_price: Option<i64>,
    parsed_distribution_type: Option<String>,
    validation_status: String,
    validation_error: Option<String>,
    master_id: Option<Uuid>,
    action_type: String,
}

impl TryFrom<RowRecord> for ImportRow {
    type Error = StoreError;

    fn try_from(r: RowRecord) -> Result<Self, Self::Error> {
        Ok(ImportRow {
            id: r.id,
            batch_id: r.batch_id,
            row_number: r.row_number,
            raw_json: r.raw_json,
            parsed_barcode: r.parsed_barcode,
            parsed_supply_price: r.parsed_supply_price,
            parsed_distribution_type: r
                .parsed_distribution_type
                .map(|s| s.parse())
                .transpose()?,
            validation_status: r.validation_status.parse()?,
            validation_error: r.validation_error.map(|s| s.parse()).transpose()?,
            master_id: r.master_id,
            action_type: r.action_type.parse()?,
        })
    }
}

/// Database-backed store for batches, rows, masters, offers and suppliers
#[derive(Debug, Clone)]
pub struct PgCatalogStore {
    pool: PgPool,
}

impl PgCatalogStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ImportBatchStore for PgCatalogStore {
    #[tracing::instrument(skip(self, batch, rows), fields(batch_id = %batch.id, rows = rows.len()))]
    async fn create_scored_batch(
        &self,
        batch: NewImportBatch,
        rows: Vec<NewImportRow>,
    ) -> Result<ImportBatch, StoreError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO import_batches (
                id, supplier_id, uploaded_by, file_name,
                total_rows, valid_rows, rejected_rows, status
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, 'VALIDATING')
            "#,
        )
        .bind(batch.id)
        .bind(batch.supplier_id)
        .bind(batch.uploaded_by)
        .bind(&batch.file_name)
        .bind(batch.total_rows)
        .bind(batch.valid_rows)
        .bind(batch.rejected_rows)
        .execute(&mut *tx)
        .await?;

        for chunk in rows.chunks(ROW_INSERT_CHUNK) {
            let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(
                "INSERT INTO import_rows (id, batch_id, row_number, raw_json, parsed_barcode, \
                 parsed_supply_price, parsed_distribution_type, validation_status, \
                 validation_error, master_id, action_type) ",
            );
            builder.push_values(chunk, |mut b, row| {
                b.push_bind(Uuid::new_v4())
                    .push_bind(batch.id)
                    .push_bind(row.row_number)
                    .push_bind(row.raw_json.clone())
                    .push_bind(row.parsed_barcode.clone())
                    .push_bind(row.parsed_supply_price)
                    .push_bind(row.parsed_distribution_type.map(|d| d.as_str()))
                    .push_bind(row.validation_status.as_str())
                    .push_bind(row.validation_error.map(|c| c.as_str()))
                    .push_bind(row.master_id)
                    .push_bind(row.action_type.as_str());
            });
            builder.build().execute(&mut *tx).await?;
        }

        let sql = format!(
            "UPDATE import_batches SET status = $2 \
             WHERE id = $1 AND status = 'VALIDATING' \
             RETURNING {}",
            BATCH_COLUMNS
        );
        let record = sqlx::query_as::<_, BatchRecord>(&sql)
            .bind(batch.id)
            .bind(batch.status.as_str())
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;

        record.try_into()
    }

    async fn find_batch(
        &self,
        batch_id: Uuid,
        supplier_id: Uuid,
    ) -> Result<Option<ImportBatch>, StoreError> {
        let sql = format!(
            "SELECT {} FROM import_batches WHERE id = $1 AND supplier_id = $2",
            BATCH_COLUMNS
        );
        sqlx::query_as::<_, BatchRecord>(&sql)
            .bind(batch_id)
            .bind(supplier_id)
            .fetch_optional(&self.pool)
            .await?
            .map(ImportBatch::try_from)
            .transpose()
    }

    async fn list_rows(&self, batch_id: Uuid) -> Result<Vec<ImportRow>, StoreError> {
        let sql = format!(
            "SELECT {} FROM import_rows WHERE batch_id = $1 ORDER BY row_number",
            ROW_COLUMNS
        );
        sqlx::query_as::<_, RowRecord>(&sql)
            .bind(batch_id)
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(ImportRow::try_from)
            .collect()
    }

    async fn list_batches(
        &self,
        supplier_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<BatchPage, StoreError> {
        let total: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM import_batches WHERE supplier_id = $1")
                .bind(supplier_id)
                .fetch_one(&self.pool)
                .await?;

        let sql = format!(
            "SELECT {} FROM import_batches WHERE supplier_id = $1 \
             ORDER BY created_at DESC, id DESC LIMIT $2 OFFSET $3",
            BATCH_COLUMNS
        );
        let items = sqlx::query_as::<_, BatchRecord>(&sql)
            .bind(supplier_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(ImportBatch::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(BatchPage { items, total })
    }
}

#[async_trait]
impl MasterRegistry for PgCatalogStore {
    async fn find_ids_by_barcodes(
        &self,
        barcodes: &[String],
    ) -> Result<HashMap<String, Uuid>, StoreError> {
        if barcodes.is_empty() {
            return Ok(HashMap::new());
        }

        let found: Vec<(String, Uuid)> =
            sqlx::query_as("SELECT barcode, id FROM product_masters WHERE barcode = ANY($1)")
                .bind(barcodes)
                .fetch_all(&self.pool)
                .await?;

        Ok(found.into_iter().collect())
    }
}

#[async_trait]
impl SupplierDirectory for PgCatalogStore {
    async fn supplier_status(
        &self,
        supplier_id: Uuid,
    ) -> Result<Option<SupplierStatus>, StoreError> {
        let status: Option<String> = sqlx::query_scalar("SELECT status FROM suppliers WHERE id = $1")
            .bind(supplier_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(status.map(|s| s.parse()).transpose()?)
    }
}

#[async_trait]
impl ApplyUnitOfWork for PgCatalogStore {
    async fn begin(&self) -> Result<Box<dyn ApplyTransaction>, StoreError> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgApplyTransaction { tx: Some(tx) }))
    }
}

/// Apply transaction; rolled back on drop unless committed
pub struct PgApplyTransaction {
    tx: Option<Transaction<'static, Postgres>>,
}

impl PgApplyTransaction {
    fn conn(&mut self) -> Result<&mut PgConnection, StoreError> {
        self.tx.as_deref_mut().ok_or(StoreError::TransactionClosed)
    }
}

#[async_trait]
impl ApplyTransaction for PgApplyTransaction {
    async fn lock_batch(&mut self, batch_id: Uuid) -> Result<Option<BatchStatus>, StoreError> {
        let status: Option<String> =
            sqlx::query_scalar("SELECT status FROM import_batches WHERE id = $1 FOR UPDATE")
                .bind(batch_id)
                .fetch_optional(self.conn()?)
                .await?;

        Ok(status.map(|s| s.parse()).transpose()?)
    }

    async fn find_master_id(&mut self, barcode: &str) -> Result<Option<Uuid>, StoreError> {
        let id = sqlx::query_scalar("SELECT id FROM product_masters WHERE barcode = $1")
            .bind(barcode)
            .fetch_optional(self.conn()?)
            .await?;

        Ok(id)
    }

    async fn insert_master(
        &mut self,
        master: &NewProductMaster,
    ) -> Result<MasterInsert, StoreError> {
        let product = &master.product;
        let id: Option<Uuid> = sqlx::query_scalar(
            r#"
            INSERT INTO product_masters (
                id, barcode, regulatory_name, manufacturer_name, permit_number,
                regulatory_product_id, regulatory_type, is_verified, verified_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, TRUE, $8)
            ON CONFLICT (barcode) DO NOTHING
            RETURNING id
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&master.barcode)
        .bind(&product.regulatory_name)
        .bind(&product.manufacturer_name)
        .bind(&product.permit_number)
        .bind(&product.product_id)
        .bind(&product.regulatory_type)
        .bind(master.verified_at)
        .fetch_optional(self.conn()?)
        .await?;

        Ok(match id {
            Some(id) => MasterInsert::Created(id),
            None => MasterInsert::AlreadyExists,
        })
    }

    async fn upsert_offer(&mut self, terms: &OfferTerms) -> Result<OfferUpsert, StoreError> {
        // xmax is 0 only for a tuple this statement inserted
        let (id, inserted): (Uuid, bool) = sqlx::query_as(
            r#"
            INSERT INTO supplier_product_offers (
                id, master_id, supplier_id, supply_price, distribution_type,
                approval_status, is_active
            )
            VALUES ($1, $2, $3, $4, $5, 'PENDING', FALSE)
            ON CONFLICT (master_id, supplier_id) DO UPDATE
            SET supply_price = EXCLUDED.supply_price,
                distribution_type = EXCLUDED.distribution_type,
                updated_at = NOW()
            RETURNING id, (xmax = 0) AS inserted
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(terms.master_id)
        .bind(terms.supplier_id)
        .bind(terms.supply_price)
        .bind(terms.distribution_type.as_str())
        .fetch_one(self.conn()?)
        .await?;

        Ok(if inserted {
            OfferUpsert::Created(id)
        } else {
            OfferUpsert::Updated(id)
        })
    }

    async fn link_row_master(&mut self, row_id: Uuid, master_id: Uuid) -> Result<(), StoreError> {
        sqlx::query("UPDATE import_rows SET master_id = $2 WHERE id = $1")
            .bind(row_id)
            .bind(master_id)
            .execute(self.conn()?)
            .await?;

        Ok(())
    }

    async fn mark_batch_applied(
        &mut self,
        batch_id: Uuid,
        applied_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE import_batches SET status = 'APPLIED', applied_at = $2 \
             WHERE id = $1 AND status = 'READY'",
        )
        .bind(batch_id)
        .bind(applied_at)
        .execute(self.conn()?)
        .await?;

        if result.rows_affected() != 1 {
            return Err(StoreError::CorruptRecord(format!(
                "batch {} left READY during apply",
                batch_id
            )));
        }

        Ok(())
    }

    async fn commit(&mut self) -> Result<(), StoreError> {
        let tx = self.tx.take().ok_or(StoreError::TransactionClosed)?;
        tx.commit().await?;
        Ok(())
    }
}
