//! GTIN barcode validation
//!
//! Checks the structure of GTIN-8, GTIN-12 (UPC-A), GTIN-13 (EAN-13) and
//! GTIN-14 codes and verifies their mod-10 check digit.
//!
//! Weights alternate 3, 1, 3, ... starting from the data digit nearest the
//! check digit, so the same routine covers every supported length.
//!
//! # Examples
//!
//! ```rust
//! use catalog_common::gtin::{validate_gtin, GtinError};
//!
//! assert!(validate_gtin("4901234567894").is_ok());
//! assert!(matches!(
//!     validate_gtin("4901234567890"),
//!     Err(GtinError::ChecksumMismatch { expected: 4, actual: 0 })
//! ));
//! ```

use thiserror::Error;

/// Lengths accepted as GTIN codes
pub const GTIN_LENGTHS: [usize; 4] = [8, 12, 13, 14];

/// Reasons a barcode is not a structurally valid GTIN
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GtinError {
    #[error("Barcode is empty")]
    Empty,

    #[error("Barcode must contain digits only")]
    NonDigit,

    #[error("Barcode length {0} is not a GTIN length (8, 12, 13 or 14)")]
    InvalidLength(usize),

    #[error("Barcode cannot consist of zeros only")]
    AllZeros,

    #[error("Check digit mismatch: expected {expected}, found {actual}")]
    ChecksumMismatch { expected: u8, actual: u8 },
}

/// Validates a GTIN barcode
///
/// The input is expected to be trimmed by the caller; surrounding whitespace
/// is reported as [`GtinError::NonDigit`].
pub fn validate_gtin(barcode: &str) -> Result<(), GtinError> {
    if barcode.is_empty() {
        return Err(GtinError::Empty);
    }

    if !barcode.bytes().all(|b| b.is_ascii_digit()) {
        return Err(GtinError::NonDigit);
    }

    if !GTIN_LENGTHS.contains(&barcode.len()) {
        return Err(GtinError::InvalidLength(barcode.len()));
    }

    if barcode.bytes().all(|b| b == b'0') {
        return Err(GtinError::AllZeros);
    }

    let (data, check) = barcode.split_at(barcode.len() - 1);
    let expected = compute_check_digit(data)?;
    let actual = check.as_bytes()[0] - b'0';

    if expected != actual {
        return Err(GtinError::ChecksumMismatch { expected, actual });
    }

    Ok(())
}

/// Computes the check digit for the data digits of a GTIN (everything but
/// the final digit)
pub fn compute_check_digit(data: &str) -> Result<u8, GtinError> {
    if data.is_empty() {
        return Err(GtinError::Empty);
    }

    let mut sum: u32 = 0;
    for (position, byte) in data.bytes().rev().enumerate() {
        if !byte.is_ascii_digit() {
            return Err(GtinError::NonDigit);
        }
        let digit = u32::from(byte - b'0');
        let weight = if position % 2 == 0 { 3 } else { 1 };
        sum += digit * weight;
    }

    Ok(((10 - (sum % 10)) % 10) as u8)
}
