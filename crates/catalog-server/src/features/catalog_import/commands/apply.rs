//! Apply a validated batch to the catalog
//!
//! Every valid row lands in one transaction together with the batch status
//! flip to APPLIED. Rows planned as CREATE_MASTER are verified again inside
//! that transaction; the answer recorded at upload time is not trusted.
//!
//! A row whose barcode is no longer verified is skipped and reported. An
//! unreachable regulator aborts the whole apply and the batch stays READY.
//!
//! Masters are created in ascending barcode order and offers are written in
//! master id order, whatever the row order in the file.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::features::catalog_import::context::ImportContext;
use crate::features::catalog_import::store::{
    ApplyTransaction, MasterInsert, NewProductMaster, OfferTerms, OfferUpsert, StoreError,
};
use crate::features::catalog_import::types::{
    BatchStatus, ImportRow, RejectionCode, RowAction, SupplierStatus,
};
use crate::verification::{verify_within, VerificationError, VerificationOutcome};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplyBatchCommand {
    pub batch_id: Uuid,
    pub supplier_id: Uuid,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedRow {
    pub row_number: i32,
    pub barcode: String,
    pub reason: RejectionCode,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplyBatchResponse {
    pub batch_id: Uuid,
    pub status: BatchStatus,
    pub applied_offers: usize,
    pub created_offers: usize,
    pub updated_offers: usize,
    pub created_masters: usize,
    pub skipped_rows: Vec<SkippedRow>,
}

#[derive(Debug, thiserror::Error)]
pub enum ApplyBatchError {
    #[error("Import batch '{0}' not found")]
    NotFound(Uuid),

    #[error("Import batch '{batch_id}' is {status}, only READY batches can be applied")]
    NotReady { batch_id: Uuid, status: BatchStatus },

    #[error("Supplier '{0}' is not active")]
    SupplierNotActive(Uuid),

    #[error("Import batch '{0}' has no valid rows")]
    NoValidRows(Uuid),

    #[error("Regulatory verification unavailable for row {row_number}: {source}")]
    VerificationUnavailable {
        row_number: i32,
        #[source]
        source: VerificationError,
    },

    #[error("Storage error: {0}")]
    Store(#[from] StoreError),
}

impl ApplyBatchError {
    pub fn code(&self) -> &'static str {
        match self {
            ApplyBatchError::NotFound(_) => "BATCH_NOT_FOUND",
            ApplyBatchError::NotReady { .. } => "BATCH_NOT_READY",
            ApplyBatchError::SupplierNotActive(_) => "SUPPLIER_NOT_ACTIVE",
            ApplyBatchError::NoValidRows(_) => "NO_VALID_ROWS",
            ApplyBatchError::VerificationUnavailable { .. } => "VERIFICATION_UNAVAILABLE",
            ApplyBatchError::Store(_) => "INTERNAL_ERROR",
        }
    }
}

#[derive(Debug, Default)]
struct ApplyTally {
    created_offers: usize,
    updated_offers: usize,
    created_masters: usize,
    skipped_rows: Vec<SkippedRow>,
}

/// Checks that hold before any transaction is opened
async fn check_preconditions(
    ctx: &ImportContext,
    command: &ApplyBatchCommand,
) -> Result<Vec<ImportRow>, ApplyBatchError> {
    let batch = ctx
        .batches
        .find_batch(command.batch_id, command.supplier_id)
        .await?
        .ok_or(ApplyBatchError::NotFound(command.batch_id))?;

    if batch.status != BatchStatus::Ready {
        return Err(ApplyBatchError::NotReady {
            batch_id: batch.id,
            status: batch.status,
        });
    }

    let supplier_status = ctx.suppliers.supplier_status(command.supplier_id).await?;
    if supplier_status != Some(SupplierStatus::Active) {
        return Err(ApplyBatchError::SupplierNotActive(command.supplier_id));
    }

    let valid_rows: Vec<ImportRow> = ctx
        .batches
        .list_rows(batch.id)
        .await?
        .into_iter()
        .filter(ImportRow::is_valid)
        .collect();

    if valid_rows.is_empty() {
        return Err(ApplyBatchError::NoValidRows(batch.id));
    }

    Ok(valid_rows)
}

fn missing_field(row: &ImportRow, field: &str) -> StoreError {
    StoreError::CorruptRecord(format!(
        "valid row {} of batch {} has no {}",
        row.row_number, row.batch_id, field
    ))
}

/// Re-verifies a planned master and returns its id, or `None` when the
/// regulator no longer verifies the barcode
async fn resolve_planned_master(
    ctx: &ImportContext,
    tx: &mut dyn ApplyTransaction,
    row: &ImportRow,
    barcode: &str,
    tally: &mut ApplyTally,
) -> Result<Option<Uuid>, ApplyBatchError> {
    let outcome = verify_within(ctx.verifier.as_ref(), barcode, ctx.settings.verify_timeout)
        .await
        .map_err(|source| {
            tracing::error!(
                row_number = row.row_number,
                barcode,
                error = %source,
                "Re-verification failed, aborting apply"
            );
            ApplyBatchError::VerificationUnavailable {
                row_number: row.row_number,
                source,
            }
        })?;

    let product = match outcome {
        VerificationOutcome::Verified(product) => product,
        VerificationOutcome::NotVerified => {
            tracing::warn!(
                row_number = row.row_number,
                barcode,
                "Barcode no longer verified, skipping row"
            );
            return Ok(None);
        },
    };

    if let Some(id) = tx.find_master_id(barcode).await? {
        return Ok(Some(id));
    }

    let master = NewProductMaster {
        barcode: barcode.to_string(),
        product,
        verified_at: Utc::now(),
    };

    match tx.insert_master(&master).await? {
        MasterInsert::Created(id) => {
            tally.created_masters += 1;
            tracing::debug!(master_id = %id, barcode, "Created product master");
            Ok(Some(id))
        },
        MasterInsert::AlreadyExists => {
            // a concurrent apply committed the same barcode first
            let id = tx
                .find_master_id(barcode)
                .await?
                .ok_or_else(|| missing_field(row, "master after barcode conflict"))?;
            Ok(Some(id))
        },
    }
}

async fn apply_rows(
    ctx: &ImportContext,
    tx: &mut dyn ApplyTransaction,
    command: &ApplyBatchCommand,
    rows: &[ImportRow],
) -> Result<ApplyTally, ApplyBatchError> {
    match tx.lock_batch(command.batch_id).await? {
        Some(status) if status.can_transition_to(BatchStatus::Applied) => {},
        Some(status) => {
            return Err(ApplyBatchError::NotReady {
                batch_id: command.batch_id,
                status,
            })
        },
        None => return Err(ApplyBatchError::NotFound(command.batch_id)),
    }

    let mut tally = ApplyTally::default();
    let mut linked: Vec<(&ImportRow, Uuid)> = Vec::with_capacity(rows.len());
    let mut planned: Vec<(&ImportRow, &str)> = Vec::new();

    for row in rows {
        match row.action_type {
            RowAction::LinkExisting => {
                let master_id = row.master_id.ok_or_else(|| missing_field(row, "master id"))?;
                linked.push((row, master_id));
            },
            RowAction::CreateMaster => {
                let barcode = row
                    .parsed_barcode
                    .as_deref()
                    .ok_or_else(|| missing_field(row, "barcode"))?;
                planned.push((row, barcode));
            },
            RowAction::Reject => {},
        }
    }

    // New masters are claimed in barcode order so that every apply takes the
    // barcode index locks in the same sequence.
    planned.sort_by(|a, b| a.1.cmp(b.1));

    for (row, barcode) in planned {
        match resolve_planned_master(ctx, tx, row, barcode, &mut tally).await? {
            Some(master_id) => linked.push((row, master_id)),
            None => tally.skipped_rows.push(SkippedRow {
                row_number: row.row_number,
                barcode: barcode.to_string(),
                reason: RejectionCode::MasterNotFoundInMfds,
            }),
        }
    }
    tally.skipped_rows.sort_by_key(|s| s.row_number);

    // Offers follow master id order for the same reason.
    linked.sort_by_key(|(row, master_id)| (*master_id, row.row_number));

    for (row, master_id) in linked {
        tx.link_row_master(row.id, master_id).await?;

        let terms = OfferTerms {
            master_id,
            supplier_id: command.supplier_id,
            supply_price: row.parsed_supply_price.unwrap_or(0),
            distribution_type: row.parsed_distribution_type.unwrap_or_default(),
        };
        match tx.upsert_offer(&terms).await? {
            OfferUpsert::Created(_) => tally.created_offers += 1,
            OfferUpsert::Updated(_) => tally.updated_offers += 1,
        }
    }

    tx.mark_batch_applied(command.batch_id, Utc::now()).await?;

    Ok(tally)
}

#[tracing::instrument(
    skip(ctx),
    fields(batch_id = %command.batch_id, supplier_id = %command.supplier_id)
)]
pub async fn handle(
    ctx: &ImportContext,
    command: ApplyBatchCommand,
) -> Result<ApplyBatchResponse, ApplyBatchError> {
    let rows = check_preconditions(ctx, &command).await?;

    let mut tx = ctx.unit_of_work.begin().await?;
    let tally = match apply_rows(ctx, tx.as_mut(), &command, &rows).await {
        Ok(tally) => tally,
        Err(e) => {
            // dropping the transaction rolls it back
            tracing::error!(error = %e, "Apply aborted, batch left unchanged");
            return Err(e);
        },
    };
    tx.commit().await?;

    let applied_offers = tally.created_offers + tally.updated_offers;
    tracing::info!(
        applied_offers,
        created_masters = tally.created_masters,
        skipped = tally.skipped_rows.len(),
        "Import batch applied"
    );

    Ok(ApplyBatchResponse {
        batch_id: command.batch_id,
        status: BatchStatus::Applied,
        applied_offers,
        created_offers: tally.created_offers,
        updated_offers: tally.updated_offers,
        created_masters: tally.created_masters,
        skipped_rows: tally.skipped_rows,
    })
}
