//! Plan CLI command.
//!
//! Lists the batches the next ingest would process, without reading any
//! file contents. With a database URL, batches whose files were all
//! ingested are left out.

use std::path::PathBuf;

use anyhow::Result;
use bourse_core::AppConfig;
use bourse_data::DatabaseClient;
use bourse_pipeline::{discover_files, plan_batches, Batch, MemoryStore, SourceFile};
use clap::Args;

/// Arguments for the plan command.
#[derive(Args, Debug, Clone)]
pub struct PlanArgs {
    /// Directory holding the raw quote files (overrides the config file)
    #[arg(long)]
    pub source: Option<PathBuf>,

    /// Database to check for already ingested files (all files are listed if omitted)
    #[arg(long)]
    pub db_url: Option<String>,
}

/// Runs the plan command.
///
/// # Errors
/// Returns an error if the source directory cannot be read or the database
/// is unreachable.
pub async fn run_plan(args: PlanArgs, config: AppConfig) -> Result<()> {
    let source = args.source.unwrap_or(config.ingest.source_dir);
    let files = discover_files(&source)?;

    let (batches, already_processed) = match args.db_url {
        Some(url) => {
            let client = DatabaseClient::connect(&url, config.database.max_connections).await?;
            plan_batches(&client.repositories(), files).await?
        }
        None => plan_batches(&MemoryStore::new(), files).await?,
    };

    println!();
    println!(
        "{:<10} {:>6} {:>7}  {:<19}  {:<19}",
        "batch", "files", "pending", "first", "last"
    );
    for batch in &batches {
        println!("{}", format_batch_line(batch));
    }
    println!();
    println!(
        "{} batches, {} files pending, {} already ingested",
        batches.len(),
        batches.iter().map(Batch::pending_count).sum::<usize>(),
        already_processed
    );

    Ok(())
}

fn format_batch_line(batch: &Batch) -> String {
    let stamp = |file: Option<&SourceFile>| {
        file.map(|f| f.timestamp.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| "N/A".to_string())
    };

    format!(
        "{:<10} {:>6} {:>7}  {:<19}  {:<19}",
        batch.key.to_string(),
        batch.files.len(),
        batch.pending_count(),
        stamp(batch.files.first()),
        stamp(batch.files.last())
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use bourse_pipeline::group_into_batches;
    use std::path::Path;

    fn source(name: &str) -> SourceFile {
        SourceFile::from_path(PathBuf::from(name), Path::new("")).unwrap()
    }

    #[test]
    fn test_format_batch_line() {
        let batches = group_into_batches(vec![
            source("paris 2020-01-02 09:00:00.csv"),
            source("paris 2020-01-03 17:30:00.csv"),
        ]);

        let line = format_batch_line(&batches[0]);

        assert!(line.starts_with("2020-01/0"));
        assert!(line.contains("2020-01-02 09:00:00"));
        assert!(line.contains("2020-01-03 17:30:00"));
    }

    #[tokio::test]
    async fn test_plan_without_database() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("paris 2020-01-02 09:00:00.csv"), "symbol,last\n").unwrap();

        let args = PlanArgs {
            source: Some(dir.path().to_path_buf()),
            db_url: None,
        };

        run_plan(args, AppConfig::default()).await.unwrap();
    }
}
