use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub ingest: IngestConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

/// Settings for a batch ingestion run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Root of the raw quote file tree
    pub source_dir: PathBuf,
    /// Number of concurrent storage workers
    pub workers: usize,
    /// Rows per insert transaction
    pub chunk_size: usize,
}

impl IngestConfig {
    /// One worker per core, leaving one core for the driver.
    #[must_use]
    pub fn default_workers() -> usize {
        std::thread::available_parallelism()
            .map(|n| n.get().saturating_sub(1))
            .unwrap_or(1)
            .max(1)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig::default(),
            ingest: IngestConfig::default(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "postgresql://localhost/bourse".to_string(),
            max_connections: 10,
        }
    }
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            source_dir: PathBuf::from("data/boursorama"),
            workers: Self::default_workers(),
            chunk_size: 1000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_workers_is_at_least_one() {
        assert!(IngestConfig::default_workers() >= 1);
    }

    #[test]
    fn test_default_config_values() {
        let config = AppConfig::default();
        assert_eq!(config.database.max_connections, 10);
        assert_eq!(config.ingest.chunk_size, 1000);
        assert_eq!(config.ingest.source_dir, PathBuf::from("data/boursorama"));
    }
}
