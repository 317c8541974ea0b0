//! Configuration management

use serde::{Deserialize, Serialize};
use std::time::Duration;

// ============================================================================
// Server Configuration Constants
// ============================================================================

/// Default server host binding.
pub const DEFAULT_SERVER_HOST: &str = "127.0.0.1";

/// Default server port.
pub const DEFAULT_SERVER_PORT: u16 = 8000;

/// Default shutdown timeout in seconds.
pub const DEFAULT_SHUTDOWN_TIMEOUT_SECS: u64 = 30;

/// Default database URL for local development.
pub const DEFAULT_DATABASE_URL: &str = "postgresql://localhost/catalog";

/// Default maximum database connections in the pool.
pub const DEFAULT_DATABASE_MAX_CONNECTIONS: u32 = 10;

/// Default minimum database connections in the pool.
pub const DEFAULT_DATABASE_MIN_CONNECTIONS: u32 = 2;

/// Default database connection timeout in seconds.
pub const DEFAULT_DATABASE_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Default database idle timeout in seconds (10 minutes).
pub const DEFAULT_DATABASE_IDLE_TIMEOUT_SECS: u64 = 600;

/// Default CORS allowed origin for local development.
pub const DEFAULT_CORS_ALLOWED_ORIGIN: &str = "http://localhost:3000";

// ============================================================================
// Import Configuration Constants
// ============================================================================

/// Default maximum number of data rows accepted in one upload.
pub const DEFAULT_IMPORT_MAX_ROWS: usize = 5_000;

/// Default maximum upload size in bytes (10 MiB).
pub const DEFAULT_IMPORT_MAX_FILE_BYTES: usize = 10 * 1024 * 1024;

/// Default number of regulatory lookups in flight per upload.
pub const DEFAULT_IMPORT_VERIFY_CONCURRENCY: usize = 4;

/// Default base URL of the regulatory verification service.
pub const DEFAULT_MFDS_BASE_URL: &str = "http://localhost:8100";

/// Default timeout for a single verification call in seconds.
pub const DEFAULT_MFDS_TIMEOUT_SECS: u64 = 5;

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub cors: CorsConfig,
    pub import: ImportConfig,
    pub verification: VerificationConfig,
}

/// Server-specific configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub shutdown_timeout_secs: u64,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout_secs: u64,
    pub idle_timeout_secs: u64,
}

/// CORS configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorsConfig {
    pub allowed_origins: Vec<String>,
    pub allow_credentials: bool,
}

/// Limits applied to catalog uploads
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportConfig {
    pub max_rows: usize,
    pub max_file_bytes: usize,
    pub verify_concurrency: usize,
}

/// Regulatory verification client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationConfig {
    pub base_url: String,
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub timeout_secs: u64,
}

impl VerificationConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

impl Config {
    /// Load configuration from environment and defaults
    pub fn load() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let config = Config {
            server: ServerConfig {
                host: std::env::var("CATALOG_HOST")
                    .unwrap_or_else(|_| DEFAULT_SERVER_HOST.to_string()),
                port: env_or("CATALOG_PORT", DEFAULT_SERVER_PORT),
                shutdown_timeout_secs: env_or(
                    "CATALOG_SHUTDOWN_TIMEOUT",
                    DEFAULT_SHUTDOWN_TIMEOUT_SECS,
                ),
            },
            database: DatabaseConfig {
                url: std::env::var("DATABASE_URL")
                    .unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string()),
                max_connections: env_or(
                    "DATABASE_MAX_CONNECTIONS",
                    DEFAULT_DATABASE_MAX_CONNECTIONS,
                ),
                min_connections: env_or(
                    "DATABASE_MIN_CONNECTIONS",
                    DEFAULT_DATABASE_MIN_CONNECTIONS,
                ),
                connect_timeout_secs: env_or(
                    "DATABASE_CONNECT_TIMEOUT",
                    DEFAULT_DATABASE_CONNECT_TIMEOUT_SECS,
                ),
                idle_timeout_secs: env_or(
                    "DATABASE_IDLE_TIMEOUT",
                    DEFAULT_DATABASE_IDLE_TIMEOUT_SECS,
                ),
            },
            cors: CorsConfig {
                allowed_origins: std::env::var("CORS_ALLOWED_ORIGINS")
                    .unwrap_or_else(|_| DEFAULT_CORS_ALLOWED_ORIGIN.to_string())
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect(),
                allow_credentials: env_or("CORS_ALLOW_CREDENTIALS", true),
            },
            import: ImportConfig {
                max_rows: env_or("IMPORT_MAX_ROWS", DEFAULT_IMPORT_MAX_ROWS),
                max_file_bytes: env_or("IMPORT_MAX_FILE_BYTES", DEFAULT_IMPORT_MAX_FILE_BYTES),
                verify_concurrency: env_or(
                    "IMPORT_VERIFY_CONCURRENCY",
                    DEFAULT_IMPORT_VERIFY_CONCURRENCY,
                ),
            },
            verification: VerificationConfig {
                base_url: std::env::var("MFDS_BASE_URL")
                    .unwrap_or_else(|_| DEFAULT_MFDS_BASE_URL.to_string()),
                api_key: std::env::var("MFDS_API_KEY").ok().filter(|k| !k.is_empty()),
                timeout_secs: env_or("MFDS_TIMEOUT_SECS", DEFAULT_MFDS_TIMEOUT_SECS),
            },
        };

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.server.port == 0 {
            anyhow::bail!("Server port must be greater than 0");
        }

        if self.database.url.is_empty() {
            anyhow::bail!("Database URL cannot be empty");
        }

        if self.database.max_connections == 0 {
            anyhow::bail!("Database max_connections must be greater than 0");
        }

        if self.database.min_connections > self.database.max_connections {
            anyhow::bail!(
                "Database min_connections ({}) cannot be greater than max_connections ({})",
                self.database.min_connections,
                self.database.max_connections
            );
        }

        if self.import.max_rows == 0 {
            anyhow::bail!("IMPORT_MAX_ROWS must be greater than 0");
        }

        if self.import.max_file_bytes == 0 {
            anyhow::bail!("IMPORT_MAX_FILE_BYTES must be greater than 0");
        }

        if self.import.verify_concurrency == 0 {
            anyhow::bail!("IMPORT_VERIFY_CONCURRENCY must be greater than 0");
        }

        if self.verification.base_url.is_empty() {
            anyhow::bail!("MFDS_BASE_URL cannot be empty");
        }

        if self.verification.timeout_secs == 0 {
            anyhow::bail!("MFDS_TIMEOUT_SECS must be greater than 0");
        }

        if self.cors.allowed_origins.is_empty() {
            tracing::warn!("No CORS origins configured - all origins will be allowed");
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: DEFAULT_SERVER_HOST.to_string(),
                port: DEFAULT_SERVER_PORT,
                shutdown_timeout_secs: DEFAULT_SHUTDOWN_TIMEOUT_SECS,
            },
            database: DatabaseConfig {
                url: DEFAULT_DATABASE_URL.to_string(),
                max_connections: DEFAULT_DATABASE_MAX_CONNECTIONS,
                min_connections: DEFAULT_DATABASE_MIN_CONNECTIONS,
                connect_timeout_secs: DEFAULT_DATABASE_CONNECT_TIMEOUT_SECS,
                idle_timeout_secs: DEFAULT_DATABASE_IDLE_TIMEOUT_SECS,
            },
            cors: CorsConfig {
                allowed_origins: vec![DEFAULT_CORS_ALLOWED_ORIGIN.to_string()],
                allow_credentials: true,
            },
            import: ImportConfig {
                max_rows: DEFAULT_IMPORT_MAX_ROWS,
                max_file_bytes: DEFAULT_IMPORT_MAX_FILE_BYTES,
                verify_concurrency: DEFAULT_IMPORT_VERIFY_CONCURRENCY,
            },
            verification: VerificationConfig {
                base_url: DEFAULT_MFDS_BASE_URL.to_string(),
                api_key: None,
                timeout_secs: DEFAULT_MFDS_TIMEOUT_SECS,
            },
        }
    }
}
