//! Status CLI command.
//!
//! Prints the row count of every table the pipeline maintains.

use anyhow::Result;
use bourse_core::AppConfig;
use bourse_data::DatabaseClient;
use clap::Args;

/// Arguments for the status command.
#[derive(Args, Debug, Clone)]
pub struct StatusArgs {
    /// Database connection URL (uses DATABASE_URL env var if not provided)
    #[arg(long, env = "DATABASE_URL")]
    pub db_url: Option<String>,
}

/// Runs the status command.
///
/// # Errors
/// Returns an error if the database is unreachable or a count query fails.
pub async fn run_status(args: StatusArgs, config: AppConfig) -> Result<()> {
    let url = args.db_url.unwrap_or(config.database.url);
    let client = DatabaseClient::connect(&url, config.database.max_connections).await?;
    let counts = client.table_counts().await?;

    println!();
    print!("{}", format_counts(&counts));

    Ok(())
}

fn format_counts(counts: &[(&str, i64)]) -> String {
    let mut out = format!("{:<15} {:>12}\n", "Table", "Rows");
    out.push_str(&"-".repeat(28));
    out.push('\n');
    for (table, rows) in counts {
        out.push_str(&format!("{table:<15} {rows:>12}\n"));
    }
    out
}
