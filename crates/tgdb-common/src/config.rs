//! Configuration management

use serde::{Deserialize, Serialize};

// ============================================================================
// Ingest Configuration Constants
// ============================================================================

/// Default number of records written per bulk insert.
pub const DEFAULT_BATCH_SIZE: usize = 1000;

/// Default delimiter for expression/binding data tables.
pub const DEFAULT_DATA_DELIMITER: char = ',';

/// Default database URL for local development.
pub const DEFAULT_DATABASE_URL: &str = "postgresql://localhost/tgdb";

/// Default maximum database connections in the pool.
pub const DEFAULT_DATABASE_MAX_CONNECTIONS: u32 = 5;

/// Ingest configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Records per bulk write inside an import transaction
    pub batch_size: usize,

    /// Whether annotation imports delete genes missing from the incoming file
    pub delete_existing: bool,

    /// Directionality assigned to edge types created by edge imports
    pub directional_edges: bool,

    pub data_delimiter: char,

    pub database: DatabaseConfig,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

impl IngestConfig {
    /// Load configuration from `.env`, the environment and defaults
    pub fn load() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let config = IngestConfig {
            batch_size: env_parse("TGDB_BATCH_SIZE").unwrap_or(DEFAULT_BATCH_SIZE),
            delete_existing: env_parse("TGDB_DELETE_EXISTING").unwrap_or(true),
            directional_edges: env_parse("TGDB_DIRECTIONAL_EDGES").unwrap_or(true),
            data_delimiter: env_parse("TGDB_DATA_DELIMITER").unwrap_or(DEFAULT_DATA_DELIMITER),
            database: DatabaseConfig {
                url: std::env::var("DATABASE_URL")
                    .unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string()),
                max_connections: env_parse("DATABASE_MAX_CONNECTIONS")
                    .unwrap_or(DEFAULT_DATABASE_MAX_CONNECTIONS),
            },
        };

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.batch_size == 0 {
            anyhow::bail!("Batch size must be greater than 0");
        }

        if !self.data_delimiter.is_ascii() {
            anyhow::bail!(
                "Data delimiter must be a single-byte character, got {:?}",
                self.data_delimiter
            );
        }

        if self.database.url.is_empty() {
            anyhow::bail!("Database URL cannot be empty");
        }

        if self.database.max_connections == 0 {
            anyhow::bail!("Database max_connections must be greater than 0");
        }

        Ok(())
    }
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            delete_existing: true,
            directional_edges: true,
            data_delimiter: DEFAULT_DATA_DELIMITER,
            database: DatabaseConfig {
                url: DEFAULT_DATABASE_URL.to_string(),
                max_connections: DEFAULT_DATABASE_MAX_CONNECTIONS,
            },
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.parse().ok())
}
