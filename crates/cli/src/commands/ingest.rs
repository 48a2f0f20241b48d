//! Ingest CLI command.
//!
//! Runs the batch pipeline over the source directory. Files already recorded
//! as ingested are skipped, so the command can be re-run after a failure or
//! when new dumps arrive.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use bourse_core::AppConfig;
use bourse_data::DatabaseClient;
use bourse_pipeline::{MemoryStore, Pipeline, RunReport};
use clap::Args;
use tracing::info;

/// Arguments for the ingest command.
#[derive(Args, Debug, Clone)]
pub struct IngestArgs {
    /// Directory holding the raw quote files (overrides the config file)
    #[arg(long)]
    pub source: Option<PathBuf>,

    /// Database connection URL (uses DATABASE_URL env var if not provided)
    #[arg(long, env = "DATABASE_URL")]
    pub db_url: Option<String>,

    /// Number of concurrent writer tasks
    #[arg(long)]
    pub workers: Option<usize>,

    /// Rows per insert transaction
    #[arg(long)]
    pub chunk_size: Option<usize>,

    /// Process everything against an in-memory store and only print the report
    #[arg(long)]
    pub dry_run: bool,
}

impl IngestArgs {
    /// Overrides configuration values with the flags that were given.
    pub fn apply(&self, config: &mut AppConfig) {
        if let Some(source) = &self.source {
            config.ingest.source_dir = source.clone();
        }
        if let Some(url) = &self.db_url {
            config.database.url = url.clone();
        }
        if let Some(workers) = self.workers {
            config.ingest.workers = workers;
        }
        if let Some(chunk_size) = self.chunk_size {
            config.ingest.chunk_size = chunk_size;
        }
    }
}

/// Runs the ingest command.
///
/// # Errors
/// Returns an error if the database is unreachable, the source directory
/// cannot be read, or a batch fails.
pub async fn run_ingest(args: IngestArgs, mut config: AppConfig) -> Result<()> {
    args.apply(&mut config);
    let source = config.ingest.source_dir.clone();
    let started = Instant::now();

    info!(
        source = %source.display(),
        workers = config.ingest.workers,
        chunk_size = config.ingest.chunk_size,
        dry_run = args.dry_run,
        "Starting ingest"
    );

    let report: RunReport = if args.dry_run {
        let store = Arc::new(MemoryStore::new());
        let mut pipeline = Pipeline::from_config(store, &config.ingest).await?;
        pipeline.run_dir(&source).await?
    } else {
        let client =
            DatabaseClient::connect(&config.database.url, config.database.max_connections).await?;
        let store = Arc::new(client.repositories());
        let mut pipeline = Pipeline::from_config(store, &config.ingest).await?;
        pipeline.run_dir(&source).await?
    };

    info!(
        elapsed_secs = started.elapsed().as_secs_f64(),
        batches = report.batches.len(),
        "Ingest finished"
    );

    println!();
    println!("{}", report.summary());
    if args.dry_run {
        println!("(dry run: nothing was written)");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args() -> IngestArgs {
        IngestArgs {
            source: None,
            db_url: None,
            workers: None,
            chunk_size: None,
            dry_run: true,
        }
    }

    // ============================================
    // IngestArgs Tests
    // ============================================

    #[test]
    fn test_apply_without_flags_keeps_config() {
        let mut config = AppConfig::default();
        args().apply(&mut config);
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn test_apply_overrides_given_flags() {
        let mut config = AppConfig::default();
        let args = IngestArgs {
            source: Some(PathBuf::from("/srv/dumps")),
            db_url: Some("postgresql://db/bourse".to_string()),
            workers: Some(6),
            chunk_size: Some(250),
            ..args()
        };

        args.apply(&mut config);

        assert_eq!(config.ingest.source_dir, PathBuf::from("/srv/dumps"));
        assert_eq!(config.database.url, "postgresql://db/bourse");
        assert_eq!(config.ingest.workers, 6);
        assert_eq!(config.ingest.chunk_size, 250);
    }

    // ============================================
    // Dry Run Tests
    // ============================================

    #[tokio::test]
    async fn test_dry_run_over_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("paris 2020-01-02 09:00:00.csv"),
            "symbol,last,volume,name\nA,10,5,ACME\n",
        )
        .unwrap();

        let args = IngestArgs {
            source: Some(dir.path().to_path_buf()),
            ..args()
        };

        run_ingest(args, AppConfig::default()).await.unwrap();
    }

    #[tokio::test]
    async fn test_dry_run_missing_source_fails() {
        let args = IngestArgs {
            source: Some(PathBuf::from("/nonexistent/bourse")),
            ..args()
        };

        assert!(run_ingest(args, AppConfig::default()).await.is_err());
    }
}
