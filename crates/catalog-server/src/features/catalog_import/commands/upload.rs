//! Upload and validate a supplier catalog
//!
//! Parses the CSV, scores every row and persists the batch with its rows.
//! Nothing in the product registry or the offer table is written here, so
//! validating the same file again is always safe.
//!
//! Per row, the first failing check wins:
//!
//! 1. barcode present
//! 2. GTIN structure and check digit
//! 3. first occurrence of the barcode in this file
//! 4. `supply_price` is a non-negative integer when given
//! 5. `distribution_type` is PUBLIC, SERVICE or PRIVATE when given
//! 6. barcode resolves to an existing master, or the regulator verifies it

use catalog_common::gtin::validate_gtin;
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

use crate::features::catalog_import::context::ImportContext;
use crate::features::catalog_import::csv_input::{parse_catalog_csv, CsvInputError, ParsedRow};
use crate::features::catalog_import::store::{NewImportBatch, NewImportRow, StoreError};
use crate::features::catalog_import::types::{
    BatchStatus, DistributionType, RawImportRow, RejectionCode, RowAction, RowValidationStatus,
};
use crate::verification::{verify_within, VerificationError, VerificationOutcome};

#[derive(Debug, Clone)]
pub struct UploadCatalogCommand {
    pub supplier_id: Uuid,
    pub uploaded_by: Uuid,
    pub file_name: String,
    pub bytes: Vec<u8>,
}

/// Per-row outcome shown to the supplier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowSummary {
    /// File line of the record minus the header line, so blank lines leave gaps
    pub row_number: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub barcode: Option<String>,
    pub validation_status: RowValidationStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validation_error: Option<RejectionCode>,
    pub action_type: RowAction,
    /// True when uploading again later may succeed
    pub retryable: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadCatalogResponse {
    pub batch_id: Uuid,
    pub status: BatchStatus,
    pub total_rows: i32,
    pub valid_rows: i32,
    pub rejected_rows: i32,
    pub rows: Vec<RowSummary>,
}

#[derive(Debug, thiserror::Error)]
pub enum UploadCatalogError {
    #[error("CSV could not be parsed: {0}")]
    CsvParse(String),

    #[error("CSV contains no data rows")]
    CsvEmpty,

    #[error("CSV is too large: {0}")]
    CsvTooLarge(String),

    #[error("Failed to encode row: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Storage error: {0}")]
    Store(#[from] StoreError),
}

impl UploadCatalogError {
    pub fn code(&self) -> &'static str {
        match self {
            UploadCatalogError::CsvParse(_) => "CSV_PARSE_ERROR",
            UploadCatalogError::CsvEmpty => "CSV_EMPTY",
            UploadCatalogError::CsvTooLarge(_) => "CSV_TOO_LARGE",
            UploadCatalogError::Serialization(_) | UploadCatalogError::Store(_) => {
                "INTERNAL_ERROR"
            },
        }
    }
}

impl From<CsvInputError> for UploadCatalogError {
    fn from(err: CsvInputError) -> Self {
        match err {
            CsvInputError::Parse(msg) => UploadCatalogError::CsvParse(msg),
            CsvInputError::Empty => UploadCatalogError::CsvEmpty,
            too_large @ (CsvInputError::TooManyBytes { .. } | CsvInputError::TooManyRows { .. }) => {
                UploadCatalogError::CsvTooLarge(too_large.to_string())
            },
        }
    }
}

/// Fields parsed out of a row that passed the structural checks
#[derive(Debug)]
struct ParsedFields {
    barcode: Option<String>,
    supply_price: Option<i64>,
    distribution_type: Option<DistributionType>,
}

#[derive(Debug)]
struct ScoredRow {
    row_number: i32,
    raw: RawImportRow,
    fields: ParsedFields,
    verdict: Verdict,
}

#[derive(Debug, Clone, Copy)]
enum Verdict {
    Rejected(RejectionCode),
    /// Passed checks 1-5, waiting on master resolution
    Unresolved,
    LinkExisting(Uuid),
    CreateMaster,
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Checks 1 to 5; `seen` holds barcodes of earlier rows that passed 1 and 2
fn check_structure(
    raw: &RawImportRow,
    seen: &mut HashSet<String>,
) -> (ParsedFields, Result<(), RejectionCode>) {
    let mut fields = ParsedFields {
        barcode: None,
        supply_price: None,
        distribution_type: None,
    };

    let Some(barcode) = present(&raw.barcode) else {
        return (fields, Err(RejectionCode::InvalidBarcode));
    };
    fields.barcode = Some(barcode.to_string());

    if validate_gtin(barcode).is_err() {
        return (fields, Err(RejectionCode::InvalidGtin));
    }

    if !seen.insert(barcode.to_string()) {
        return (fields, Err(RejectionCode::DuplicateInBatch));
    }

    if let Some(price) = present(&raw.supply_price) {
        match price.parse::<i64>() {
            Ok(value) if value >= 0 => fields.supply_price = Some(value),
            _ => return (fields, Err(RejectionCode::InvalidPrice)),
        }
    }

    if let Some(distribution) = present(&raw.distribution_type) {
        match DistributionType::parse_lenient(distribution) {
            Some(value) => fields.distribution_type = Some(value),
            None => return (fields, Err(RejectionCode::InvalidDistributionType)),
        }
    }

    (fields, Ok(()))
}

impl ScoredRow {
    fn into_new_row(self) -> Result<(NewImportRow, RowSummary), serde_json::Error> {
        let (status, error, action, master_id) = match self.verdict {
            Verdict::LinkExisting(id) => (
                RowValidationStatus::Valid,
                None,
                RowAction::LinkExisting,
                Some(id),
            ),
            Verdict::CreateMaster => (
                RowValidationStatus::Valid,
                None,
                RowAction::CreateMaster,
                None,
            ),
            Verdict::Rejected(code) => (
                RowValidationStatus::Rejected,
                Some(code),
                RowAction::Reject,
                None,
            ),
            // every unresolved row receives a verdict before persisting
            Verdict::Unresolved => (
                RowValidationStatus::Rejected,
                Some(RejectionCode::VerificationUnavailable),
                RowAction::Reject,
                None,
            ),
        };

        let summary = RowSummary {
            row_number: self.row_number,
            barcode: self.fields.barcode.clone(),
            validation_status: status,
            validation_error: error,
            action_type: action,
            retryable: error.is_some_and(RejectionCode::is_retryable),
        };

        let row = NewImportRow {
            row_number: self.row_number,
            raw_json: serde_json::to_value(&self.raw)?,
            parsed_barcode: self.fields.barcode,
            parsed_supply_price: self.fields.supply_price,
            parsed_distribution_type: self.fields.distribution_type,
            validation_status: status,
            validation_error: error,
            master_id,
            action_type: action,
        };

        Ok((row, summary))
    }
}

/// Resolves barcodes missing from the registry with bounded concurrency,
/// keeping input order
async fn verify_unknown_barcodes(
    ctx: &ImportContext,
    barcodes: Vec<String>,
) -> HashMap<String, Result<VerificationOutcome, VerificationError>> {
    let timeout = ctx.settings.verify_timeout;

    stream::iter(barcodes)
        .map(|barcode| {
            let verifier = ctx.verifier.clone();
            async move {
                let result = verify_within(verifier.as_ref(), &barcode, timeout).await;
                (barcode, result)
            }
        })
        .buffered(ctx.settings.verify_concurrency.max(1))
        .collect()
        .await
}

#[tracing::instrument(
    skip(ctx, command),
    fields(
        supplier_id = %command.supplier_id,
        file_name = %command.file_name,
        bytes = command.bytes.len()
    )
)]
pub async fn handle(
    ctx: &ImportContext,
    command: UploadCatalogCommand,
) -> Result<UploadCatalogResponse, UploadCatalogError> {
    let parsed_rows = parse_catalog_csv(&command.bytes, &ctx.settings.csv_limits())?;
    let total_rows = i32::try_from(parsed_rows.len())
        .map_err(|_| UploadCatalogError::CsvTooLarge(format!("{} rows", parsed_rows.len())))?;

    let mut seen = HashSet::new();
    let mut scored: Vec<ScoredRow> = parsed_rows
        .into_iter()
        .map(|ParsedRow { row_number, raw }| {
            let (fields, checked) = check_structure(&raw, &mut seen);
            let verdict = match checked {
                Ok(()) => Verdict::Unresolved,
                Err(code) => Verdict::Rejected(code),
            };
            ScoredRow {
                row_number,
                raw,
                fields,
                verdict,
            }
        })
        .collect();

    let unresolved: Vec<String> = scored
        .iter()
        .filter(|r| matches!(r.verdict, Verdict::Unresolved))
        .filter_map(|r| r.fields.barcode.clone())
        .collect();

    let existing = ctx.masters.find_ids_by_barcodes(&unresolved).await?;
    let unknown: Vec<String> = unresolved
        .into_iter()
        .filter(|b| !existing.contains_key(b))
        .collect();

    tracing::debug!(
        existing = existing.len(),
        to_verify = unknown.len(),
        "Resolving barcodes against the product registry"
    );
    let verified = verify_unknown_barcodes(ctx, unknown).await;

    for row in scored.iter_mut() {
        if !matches!(row.verdict, Verdict::Unresolved) {
            continue;
        }
        let Some(barcode) = row.fields.barcode.as_deref() else {
            continue;
        };

        row.verdict = if let Some(master_id) = existing.get(barcode) {
            Verdict::LinkExisting(*master_id)
        } else {
            match verified.get(barcode) {
                Some(Ok(VerificationOutcome::Verified(_))) => Verdict::CreateMaster,
                Some(Ok(VerificationOutcome::NotVerified)) => {
                    Verdict::Rejected(RejectionCode::MasterNotFoundInMfds)
                },
                Some(Err(e)) => {
                    tracing::warn!(
                        row_number = row.row_number,
                        barcode,
                        error = %e,
                        "Regulatory verification unavailable, rejecting row as retryable"
                    );
                    Verdict::Rejected(RejectionCode::VerificationUnavailable)
                },
                None => Verdict::Rejected(RejectionCode::VerificationUnavailable),
            }
        };
    }

    let mut rows = Vec::with_capacity(scored.len());
    let mut summaries = Vec::with_capacity(scored.len());
    for row in scored {
        let (new_row, summary) = row.into_new_row()?;
        rows.push(new_row);
        summaries.push(summary);
    }

    let valid_rows = summaries
        .iter()
        .filter(|s| s.validation_status == RowValidationStatus::Valid)
        .count() as i32;
    let rejected_rows = total_rows - valid_rows;
    let status = if valid_rows > 0 {
        BatchStatus::Ready
    } else {
        BatchStatus::Failed
    };

    let batch = ctx
        .batches
        .create_scored_batch(
            NewImportBatch {
                id: Uuid::new_v4(),
                supplier_id: command.supplier_id,
                uploaded_by: command.uploaded_by,
                file_name: command.file_name,
                total_rows,
                valid_rows,
                rejected_rows,
                status,
            },
            rows,
        )
        .await?;

    tracing::info!(
        batch_id = %batch.id,
        status = %batch.status,
        total_rows,
        valid_rows,
        rejected_rows,
        "Catalog upload validated"
    );

    Ok(UploadCatalogResponse {
        batch_id: batch.id,
        status: batch.status,
        total_rows: batch.total_rows,
        valid_rows: batch.valid_rows,
        rejected_rows: batch.rejected_rows,
        rows: summaries,
    })
}
