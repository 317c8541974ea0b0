//! Scripted verifier for tests

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use super::{RegulatedProduct, RegulatoryVerifier, VerificationError, VerificationOutcome};

#[derive(Debug, Clone)]
pub enum Scripted {
    Verified(RegulatedProduct),
    NotVerified,
    Unavailable,
    Hang,
}

impl Scripted {
    pub fn verified(name: &str) -> Self {
        Scripted::Verified(RegulatedProduct {
            regulatory_name: name.to_string(),
            manufacturer_name: "Hanbit Pharm".to_string(),
            permit_number: Some("P-2024-0001".to_string()),
            product_id: Some(format!("MFDS-{}", name)),
            regulatory_type: Some("QUASI_DRUG".to_string()),
        })
    }
}

/// Answers per barcode; unknown barcodes are not verified
#[derive(Debug, Default)]
pub struct FakeVerifier {
    answers: Mutex<HashMap<String, Scripted>>,
    calls: AtomicUsize,
}

impl FakeVerifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(self, barcode: &str, answer: Scripted) -> Self {
        self.set(barcode, answer);
        self
    }

    /// Changes the answer for later calls
    pub fn set(&self, barcode: &str, answer: Scripted) {
        self.answers
            .lock()
            .unwrap()
            .insert(barcode.to_string(), answer);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RegulatoryVerifier for FakeVerifier {
    async fn verify(&self, barcode: &str) -> Result<VerificationOutcome, VerificationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let answer = self.answers.lock().unwrap().get(barcode).cloned();

        match answer {
            Some(Scripted::Verified(product)) => Ok(VerificationOutcome::Verified(product)),
            Some(Scripted::NotVerified) | None => Ok(VerificationOutcome::NotVerified),
            Some(Scripted::Unavailable) => Err(VerificationError::Unavailable(
                "connection refused".to_string(),
            )),
            Some(Scripted::Hang) => std::future::pending().await,
        }
    }
}
