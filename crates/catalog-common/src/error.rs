//! Error types shared across the catalog workspace

use thiserror::Error;

/// Result type alias for shared catalog operations
pub type Result<T> = std::result::Result<T, CatalogError>;

/// Main error type for shared catalog utilities
#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Logging initialization failed: {0}")]
    Logging(String),

    #[error("Parse error: {0}")]
    Parse(String),
}

impl CatalogError {
    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a parse error for an unrecognised value of a named setting
    pub fn invalid_value(setting: &str, value: &str) -> Self {
        Self::Parse(format!("Invalid {}: {}", setting, value))
    }
}
