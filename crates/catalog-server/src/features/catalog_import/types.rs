//! Domain types for catalog imports
//!
//! Status enums are persisted as SCREAMING_SNAKE_CASE text and round-trip
//! through `as_str` / `FromStr`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Error returned when a stored status value is not recognised
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown {kind} value: '{value}'")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

macro_rules! text_enum {
    ($name:ident, $kind:literal, { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl FromStr for $name {
            type Err = UnknownVariant;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => Err(UnknownVariant {
                        kind: $kind,
                        value: other.to_string(),
                    }),
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

/// Lifecycle of an upload
///
/// Advances `Validating -> Ready | Failed -> Applied` and never backwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BatchStatus {
    Validating,
    Ready,
    Failed,
    Applied,
}

text_enum!(BatchStatus, "batch status", {
    Validating => "VALIDATING",
    Ready => "READY",
    Failed => "FAILED",
    Applied => "APPLIED",
});

impl BatchStatus {
    /// Whether `next` is a legal forward transition from this status
    pub fn can_transition_to(self, next: BatchStatus) -> bool {
        matches!(
            (self, next),
            (BatchStatus::Validating, BatchStatus::Ready)
                | (BatchStatus::Validating, BatchStatus::Failed)
                | (BatchStatus::Ready, BatchStatus::Applied)
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RowValidationStatus {
    Pending,
    Valid,
    Rejected,
}

text_enum!(RowValidationStatus, "row validation status", {
    Pending => "PENDING",
    Valid => "VALID",
    Rejected => "REJECTED",
});

/// What apply will do with a row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RowAction {
    LinkExisting,
    CreateMaster,
    Reject,
}

text_enum!(RowAction, "row action", {
    LinkExisting => "LINK_EXISTING",
    CreateMaster => "CREATE_MASTER",
    Reject => "REJECT",
});

/// Stable reason codes for rejected rows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RejectionCode {
    InvalidBarcode,
    InvalidGtin,
    DuplicateInBatch,
    InvalidPrice,
    InvalidDistributionType,
    MasterNotFoundInMfds,
    VerificationUnavailable,
}

text_enum!(RejectionCode, "rejection code", {
    InvalidBarcode => "INVALID_BARCODE",
    InvalidGtin => "INVALID_GTIN",
    DuplicateInBatch => "DUPLICATE_IN_BATCH",
    InvalidPrice => "INVALID_PRICE",
    InvalidDistributionType => "INVALID_DISTRIBUTION_TYPE",
    MasterNotFoundInMfds => "MASTER_NOT_FOUND_IN_MFDS",
    VerificationUnavailable => "VERIFICATION_UNAVAILABLE",
});

impl RejectionCode {
    /// Rejections caused by infrastructure rather than the row's content
    pub fn is_retryable(self) -> bool {
        matches!(self, RejectionCode::VerificationUnavailable)
    }
}

/// Who may see an offer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DistributionType {
    Public,
    Service,
    Private,
}

text_enum!(DistributionType, "distribution type", {
    Public => "PUBLIC",
    Service => "SERVICE",
    Private => "PRIVATE",
});

impl DistributionType {
    /// Parses CSV input, ignoring case and surrounding whitespace
    pub fn parse_lenient(raw: &str) -> Option<Self> {
        raw.trim().to_ascii_uppercase().parse().ok()
    }
}

impl Default for DistributionType {
    fn default() -> Self {
        DistributionType::Private
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Rejected,
}

text_enum!(ApprovalStatus, "approval status", {
    Pending => "PENDING",
    Approved => "APPROVED",
    Rejected => "REJECTED",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SupplierStatus {
    Pending,
    Active,
    Inactive,
    Rejected,
}

text_enum!(SupplierStatus, "supplier status", {
    Pending => "PENDING",
    Active => "ACTIVE",
    Inactive => "INACTIVE",
    Rejected => "REJECTED",
});

// ============================================================================
// Records
// ============================================================================

/// One CSV data row restricted to the allow-listed columns
///
/// Columns outside this struct never survive parsing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawImportRow {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub barcode: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub supplier_sku: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub supply_price: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stock_qty: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distribution_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportBatch {
    pub id: Uuid,
    pub supplier_id: Uuid,
    pub uploaded_by: Uuid,
    pub file_name: String,
    pub total_rows: i32,
    pub valid_rows: i32,
    pub rejected_rows: i32,
    pub status: BatchStatus,
    pub applied_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportRow {
    pub id: Uuid,
    pub batch_id: Uuid,
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

impl ImportRow {
    pub fn is_valid(&self) -> bool {
        self.validation_status == RowValidationStatus::Valid
    }
}

/// Canonical registry record for a physical product
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductMaster {
    pub id: Uuid,
    pub barcode: String,
    pub regulatory_name: String,
    pub manufacturer_name: String,
    pub permit_number: Option<String>,
    pub regulatory_product_id: Option<String>,
    pub regulatory_type: Option<String>,
    pub is_verified: bool,
    pub verified_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupplierProductOffer {
    pub id: Uuid,
    pub master_id: Uuid,
    pub supplier_id: Uuid,
    pub supply_price: i64,
    pub distribution_type: DistributionType,
    pub approval_status: ApprovalStatus,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_status_round_trip() {
        for status in [
            BatchStatus::Validating,
            BatchStatus::Ready,
            BatchStatus::Failed,
            BatchStatus::Applied,
        ] {
            assert_eq!(status.as_str().parse::<BatchStatus>(), Ok(status));
        }
        assert!("DONE".parse::<BatchStatus>().is_err());
    }

    #[test]
    fn test_batch_status_only_moves_forward() {
        assert!(BatchStatus::Validating.can_transition_to(BatchStatus::Ready));
        assert!(BatchStatus::Validating.can_transition_to(BatchStatus::Failed));
        assert!(BatchStatus::Ready.can_transition_to(BatchStatus::Applied));
        assert!(!BatchStatus::Failed.can_transition_to(BatchStatus::Applied));
        assert!(!BatchStatus::Applied.can_transition_to(BatchStatus::Ready));
        assert!(!BatchStatus::Ready.can_transition_to(BatchStatus::Validating));
    }

    #[test]
    fn test_distribution_type_lenient_parse() {
        assert_eq!(
            DistributionType::parse_lenient(" public "),
            Some(DistributionType::Public)
        );
        assert_eq!(
            DistributionType::parse_lenient("Service"),
            Some(DistributionType::Service)
        );
        assert_eq!(DistributionType::parse_lenient("WHOLESALE"), None);
        assert_eq!(DistributionType::default(), DistributionType::Private);
    }

    #[test]
    fn test_rejection_code_serializes_as_stable_code() {
        let json = serde_json::to_string(&RejectionCode::MasterNotFoundInMfds).unwrap();
        assert_eq!(json, "\"MASTER_NOT_FOUND_IN_MFDS\"");
        assert_eq!(
            RejectionCode::DuplicateInBatch.as_str(),
            "DUPLICATE_IN_BATCH"
        );
    }

    #[test]
    fn test_only_infrastructure_rejections_are_retryable() {
        assert!(RejectionCode::VerificationUnavailable.is_retryable());
        assert!(!RejectionCode::MasterNotFoundInMfds.is_retryable());
        assert!(!RejectionCode::InvalidGtin.is_retryable());
    }

    #[test]
    fn test_raw_row_skips_absent_columns() {
        let row = RawImportRow {
            barcode: Some("4901234567894".to_string()),
            ..Default::default()
        };
        let json = serde_json::to_value(&row).unwrap();
        assert_eq!(json, serde_json::json!({ "barcode": "4901234567894" }));
    }
}
