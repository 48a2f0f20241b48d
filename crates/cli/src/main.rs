use clap::{Parser, Subcommand};

mod commands;

use bourse_core::config_loader::DEFAULT_CONFIG_PATH;
use bourse_core::ConfigLoader;
use commands::{IngestArgs, PlanArgs, StatusArgs};

#[derive(Parser)]
#[command(name = "bourse")]
#[command(about = "Batch ingestion of raw stock quote dumps", long_about = None)]
struct Cli {
    /// Config file path
    #[arg(short, long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest every raw quote file not yet processed
    Ingest(IngestArgs),
    /// List the batches the next ingestion would process
    Plan(PlanArgs),
    /// Show row counts of the quote tables
    Status(StatusArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = ConfigLoader::load_from(&cli.config)?;

    match cli.command {
        Commands::Ingest(args) => {
            commands::run_ingest(args, config).await?;
        }
        Commands::Plan(args) => {
            commands::run_plan(args, config).await?;
        }
        Commands::Status(args) => {
            commands::run_status(args, config).await?;
        }
    }

    Ok(())
}
