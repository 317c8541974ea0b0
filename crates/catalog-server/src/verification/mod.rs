//! Regulatory verification
//!
//! A positive answer from a [`RegulatoryVerifier`] is the only admissible
//! basis for creating a product master. Callers must keep a durable
//! "not verified" answer ([`VerificationOutcome::NotVerified`]) apart from an
//! infrastructure failure ([`VerificationError`]); only the latter is
//! retryable.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub mod http;

#[cfg(test)]
pub(crate) mod fake;

pub use http::HttpRegulatoryVerifier;

/// Canonical product metadata returned by the regulator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegulatedProduct {
    pub regulatory_name: String,
    pub manufacturer_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permit_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub regulatory_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerificationOutcome {
    Verified(RegulatedProduct),
    NotVerified,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VerificationError {
    #[error("Verification timed out after {0:?}")]
    Timeout(Duration),

    #[error("Verification service unavailable: {0}")]
    Unavailable(String),

    #[error("Invalid verification response: {0}")]
    InvalidResponse(String),
}

#[async_trait]
pub trait RegulatoryVerifier: Send + Sync {
    async fn verify(&self, barcode: &str) -> Result<VerificationOutcome, VerificationError>;
}

/// Runs one verification bounded by `limit`
///
/// Applied on top of any client-level timeout so a hung verifier can never
/// stall a validate or apply call.
pub async fn verify_within(
    verifier: &dyn RegulatoryVerifier,
    barcode: &str,
    limit: Duration,
) -> Result<VerificationOutcome, VerificationError> {
    match tokio::time::timeout(limit, verifier.verify(barcode)).await {
        Ok(result) => result,
        Err(_) => {
            tracing::warn!(barcode, ?limit, "Regulatory verification timed out");
            Err(VerificationError::Timeout(limit))
        },
    }
}
