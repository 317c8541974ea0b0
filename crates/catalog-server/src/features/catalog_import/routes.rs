//! Catalog import API routes
//!
//! # Route Structure
//!
//! - `POST /api/v1/catalog-imports` - Upload a CSV (multipart `file` part) and validate it
//! - `GET /api/v1/catalog-imports` - List the supplier's batches, newest first
//! - `GET /api/v1/catalog-imports/:batch_id` - Batch with its rows
//! - `POST /api/v1/catalog-imports/:batch_id/apply` - Apply a READY batch
//!
//! Every route requires the `x-supplier-id` and `x-user-id` headers.

use crate::api::response::{ApiResponse, ErrorResponse};
use crate::features::shared::{PaginationParams, SupplierIdentity};
use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde_json::json;
use uuid::Uuid;

use super::{
    commands::{
        apply::{self, ApplyBatchCommand, ApplyBatchError},
        upload::{self, UploadCatalogCommand, UploadCatalogError},
    },
    context::{ImportContext, ImportSettings},
    queries::{
        get_batch::{self, GetBatchError, GetBatchQuery},
        list_batches::{self, ListBatchesError, ListBatchesQuery},
    },
};

/// Room for multipart boundaries and part headers on top of the file itself
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

const FILE_FIELD: &str = "file";
const DEFAULT_FILE_NAME: &str = "catalog.csv";

// ============================================================================
// Router Configuration
// ============================================================================

/// Creates the catalog import router
///
/// ```rust,ignore
/// let app = Router::new()
///     .nest("/api/v1/catalog-imports", catalog_import_routes(&ctx.settings))
///     .with_state(ctx);
/// ```
pub fn catalog_import_routes(settings: &ImportSettings) -> Router<ImportContext> {
    Router::new()
        .route("/", post(upload_catalog).get(list_batches))
        .route("/:batch_id", get(get_batch))
        .route("/:batch_id/apply", post(apply_batch))
        .layer(DefaultBodyLimit::max(
            settings.max_file_bytes.saturating_add(MULTIPART_OVERHEAD_BYTES),
        ))
}

// ============================================================================
// Command Handlers (Write Operations)
// ============================================================================

/// Reads the `file` part of a multipart upload
async fn read_file_part(
    mut multipart: Multipart,
) -> Result<(String, Vec<u8>), CatalogImportApiError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(CatalogImportApiError::multipart)?
    {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }

        let file_name = field
            .file_name()
            .map(str::to_string)
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_FILE_NAME.to_string());
        let bytes = field
            .bytes()
            .await
            .map_err(CatalogImportApiError::multipart)?;

        return Ok((file_name, bytes.to_vec()));
    }

    Err(CatalogImportApiError::MissingFile)
}

/// Upload and validate a catalog CSV
///
/// # Response
///
/// - `201 Created` - Batch created (READY or FAILED) with per-row results
/// - `400 Bad Request` - CSV_PARSE_ERROR, CSV_EMPTY, CSV_TOO_LARGE or no `file` part
/// - `401 Unauthorized` - Identity headers missing
#[tracing::instrument(
    skip(ctx, multipart),
    fields(supplier_id = %identity.supplier_id)
)]
async fn upload_catalog(
    State(ctx): State<ImportContext>,
    identity: SupplierIdentity,
    multipart: Multipart,
) -> Result<Response, CatalogImportApiError> {
    let (file_name, bytes) = read_file_part(multipart).await?;

    let command = UploadCatalogCommand {
        supplier_id: identity.supplier_id,
        uploaded_by: identity.user_id,
        file_name,
        bytes,
    };
    let response = upload::handle(&ctx, command).await?;

    Ok(ApiResponse::success(response).with_status(StatusCode::CREATED))
}

/// Apply a READY batch
///
/// # Response
///
/// - `200 OK` - Batch applied
/// - `404 Not Found` - BATCH_NOT_FOUND
/// - `409 Conflict` - BATCH_NOT_READY or NO_VALID_ROWS
/// - `403 Forbidden` - SUPPLIER_NOT_ACTIVE
/// - `503 Service Unavailable` - VERIFICATION_UNAVAILABLE, retry later
#[tracing::instrument(skip(ctx), fields(supplier_id = %identity.supplier_id))]
async fn apply_batch(
    State(ctx): State<ImportContext>,
    identity: SupplierIdentity,
    Path(batch_id): Path<Uuid>,
) -> Result<Response, CatalogImportApiError> {
    let command = ApplyBatchCommand {
        batch_id,
        supplier_id: identity.supplier_id,
    };
    let response = apply::handle(&ctx, command).await?;

    Ok(ApiResponse::success(response).into_response())
}

// ============================================================================
// Query Handlers (Read Operations)
// ============================================================================

#[tracing::instrument(skip(ctx), fields(supplier_id = %identity.supplier_id))]
async fn get_batch(
    State(ctx): State<ImportContext>,
    identity: SupplierIdentity,
    Path(batch_id): Path<Uuid>,
) -> Result<Response, CatalogImportApiError> {
    let query = GetBatchQuery {
        batch_id,
        supplier_id: identity.supplier_id,
    };
    let response = get_batch::handle(&ctx, query).await?;

    Ok(ApiResponse::success(response).into_response())
}

#[tracing::instrument(skip(ctx), fields(supplier_id = %identity.supplier_id))]
async fn list_batches(
    State(ctx): State<ImportContext>,
    identity: SupplierIdentity,
    Query(pagination): Query<PaginationParams>,
) -> Result<Response, CatalogImportApiError> {
    let query = ListBatchesQuery {
        supplier_id: identity.supplier_id,
        pagination,
    };
    let response = list_batches::handle(&ctx, query).await?;

    tracing::debug!(
        count = response.items.len(),
        total = response.pagination.total,
        "Import batches listed via API"
    );

    let meta = json!({ "pagination": response.pagination });
    Ok(ApiResponse::success_with_meta(response.items, meta).into_response())
}

// ============================================================================
// Error Handling
// ============================================================================

#[derive(Debug)]
enum CatalogImportApiError {
    Upload(UploadCatalogError),
    Apply(ApplyBatchError),
    Get(GetBatchError),
    List(ListBatchesError),
    Multipart(String),
    MissingFile,
}

impl CatalogImportApiError {
    fn multipart(err: axum::extract::multipart::MultipartError) -> Self {
        if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
            Self::Upload(UploadCatalogError::CsvTooLarge(err.body_text()))
        } else {
            Self::Multipart(err.body_text())
        }
    }
}

impl From<UploadCatalogError> for CatalogImportApiError {
    fn from(err: UploadCatalogError) -> Self {
        Self::Upload(err)
    }
}

impl From<ApplyBatchError> for CatalogImportApiError {
    fn from(err: ApplyBatchError) -> Self {
        Self::Apply(err)
    }
}

impl From<GetBatchError> for CatalogImportApiError {
    fn from(err: GetBatchError) -> Self {
        Self::Get(err)
    }
}

impl From<ListBatchesError> for CatalogImportApiError {
    fn from(err: ListBatchesError) -> Self {
        Self::List(err)
    }
}

/// HTTP status for a stable error code
fn status_for(code: &str) -> StatusCode {
    match code {
        "CSV_PARSE_ERROR" | "CSV_EMPTY" | "CSV_TOO_LARGE" | "INVALID_PAGINATION"
        | "MISSING_FILE" | "INVALID_MULTIPART" => StatusCode::BAD_REQUEST,
        "BATCH_NOT_FOUND" => StatusCode::NOT_FOUND,
        "BATCH_NOT_READY" | "NO_VALID_ROWS" => StatusCode::CONFLICT,
        "SUPPLIER_NOT_ACTIVE" => StatusCode::FORBIDDEN,
        "VERIFICATION_UNAVAILABLE" => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for CatalogImportApiError {
    fn into_response(self) -> Response {
        let (code, message) = match &self {
            Self::Upload(e) => (e.code(), e.to_string()),
            Self::Apply(e) => (e.code(), e.to_string()),
            Self::Get(e) => (e.code(), e.to_string()),
            Self::List(e) => (e.code(), e.to_string()),
            Self::Multipart(msg) => ("INVALID_MULTIPART", msg.clone()),
            Self::MissingFile => (
                "MISSING_FILE",
                format!("Multipart field '{}' is required", FILE_FIELD),
            ),
        };

        let status = status_for(code);
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %message, "Catalog import request failed");
            return ErrorResponse::new(code, "An internal error occurred")
                .into_response_with(status);
        }

        let response = match &self {
            Self::Apply(ApplyBatchError::NotReady { status, .. }) => {
                ErrorResponse::with_details(code, message, json!({ "status": status }))
            },
            _ => ErrorResponse::new(code, message),
        };
        response.into_response_with(status)
    }
}
