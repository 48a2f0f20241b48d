//! Batch driver.
//!
//! Processes batches strictly in chronological order. Within a batch the
//! steps are:
//!
//! ```text
//! parse every file of the batch (blocking pool, one task per file)
//!   -> reconcile -> companies / volume deltas / variance
//!   -> write companies
//!   -> purge newly excluded symbols
//!   -> write daystocks            (barrier)
//!   -> resample + dedup -> write stocks (barrier)
//!   -> save symbol statistics -> mark files done
//! ```
//!
//! A batch with at least one new file is processed whole, files ingested by
//! an earlier run included, so day and hourly rows always cover every file
//! of the period. Quotes of those earlier files only rebuild rows: they are
//! not folded again into company names or price statistics.
//!
//! A failing batch aborts the run. Its files are not marked done, so the
//! next run retries it; every write is an idempotent upsert.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use bourse_core::IngestConfig;
use bourse_data::{CompanyRecord, DayStockRecord, StockRecord};
use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::batch::{discover_files, group_into_batches, Batch, BatchKey, SourceFile};
use crate::daily::aggregate_days;
use crate::parser::{parse_file, ParseError, RawQuote};
use crate::reconcile::{reconcile, ReconciledQuote};
use crate::report::{BatchReport, RunReport};
use crate::resample::{dedup_against, resample_hourly};
use crate::state::PipelineState;
use crate::store::{tables, QuoteStore};
use crate::volume::{VolumeOutcome, VolumePoint};
use crate::writer::StorageWriter;

/// Batches with at least one file still to ingest, and how many files were
/// already ingested.
///
/// # Errors
/// Returns an error if the store cannot list processed files.
pub async fn plan_batches<S: QuoteStore>(
    store: &S,
    files: Vec<SourceFile>,
) -> Result<(Vec<Batch>, usize)> {
    let processed = store
        .processed_files()
        .await
        .context("Failed to load processed files")?;

    let mut batches = group_into_batches(files);
    let mut already_processed = 0;
    for batch in &mut batches {
        batch.mark_done(&processed);
        already_processed += batch.done.len();
    }
    batches.retain(|batch| batch.pending_count() > 0);

    Ok((batches, already_processed))
}

/// The ingestion pipeline over one store.
pub struct Pipeline<S> {
    writer: StorageWriter<S>,
    state: PipelineState,
}

impl<S: QuoteStore> Pipeline<S> {
    /// Creates a pipeline and loads its state from the store.
    ///
    /// # Errors
    /// Returns an error if the state cannot be loaded.
    pub async fn new(store: Arc<S>, workers: usize, chunk_size: usize) -> Result<Self> {
        let state = PipelineState::load(store.as_ref()).await?;
        Ok(Self {
            writer: StorageWriter::new(store, workers, chunk_size),
            state,
        })
    }

    /// Creates a pipeline sized by the ingest configuration.
    ///
    /// # Errors
    /// Returns an error if the state cannot be loaded.
    pub async fn from_config(store: Arc<S>, config: &IngestConfig) -> Result<Self> {
        Self::new(store, config.workers, config.chunk_size).await
    }

    /// Discovers the files under `root` and ingests them.
    ///
    /// # Errors
    /// Returns an error if discovery or any batch fails.
    pub async fn run_dir(&mut self, root: &Path) -> Result<RunReport> {
        let files = discover_files(root)?;
        self.run(files).await
    }

    /// Ingests every file not yet processed, batch by batch.
    ///
    /// # Errors
    /// Returns the error of the first failing batch.
    pub async fn run(&mut self, files: Vec<SourceFile>) -> Result<RunReport> {
        let (batches, already_processed) = plan_batches(self.writer.store().as_ref(), files).await?;
        info!(
            batches = batches.len(),
            already_processed,
            workers = self.writer.workers(),
            "Starting ingestion"
        );

        let mut report = RunReport {
            batches: Vec::with_capacity(batches.len()),
            already_processed,
        };

        for batch in &batches {
            let batch_report = process_batch(&self.writer, &mut self.state, batch)
                .await
                .with_context(|| format!("Batch {} failed", batch.key))?;

            info!(
                batch = %batch.key,
                files = batch_report.files,
                quotes = batch_report.quotes,
                day_rows = batch_report.day_rows,
                stock_rows = batch_report.stock_rows,
                "Batch committed"
            );
            report.batches.push(batch_report);
        }

        Ok(report)
    }
}

/// Runs every step of one batch.
///
/// # Errors
/// Returns an error if a file cannot be read or any store operation fails.
pub async fn process_batch<S: QuoteStore>(
    writer: &StorageWriter<S>,
    state: &mut PipelineState,
    batch: &Batch,
) -> Result<BatchReport> {
    let store = writer.store();
    let mut report = BatchReport::new(batch.key);
    report.files = batch.files.len();

    let BatchQuotes { quotes, replayed } = parse_batch(batch, &mut report).await?;
    let reconciliation = reconcile(quotes);
    report.merged = reconciliation.merged;
    report.quotes = reconciliation.quote_count();

    let mut companies: Vec<CompanyRecord> = Vec::new();
    let mut classified: Vec<(String, Vec<VolumePoint>)> =
        Vec::with_capacity(reconciliation.series.len());

    for (symbol, series) in reconciliation.series {
        let seen = replayed.get(&symbol);
        let fresh: Vec<ReconciledQuote> = series
            .iter()
            .filter(|q| !seen.is_some_and(|s| s.contains(&q.timestamp)))
            .cloned()
            .collect();
        if let Some(record) = state.companies.observe_series(&symbol, &fresh) {
            companies.push(record);
        }
        if !fresh.is_empty() {
            state
                .variance
                .observe(&symbol, fresh.iter().map(|q| q.price));
        }

        let points = state.volumes.apply(&symbol, &series);
        for point in &points {
            match point.outcome {
                VolumeOutcome::Negative => report.negative_volumes += 1,
                VolumeOutcome::Overflow => report.overflow_volumes += 1,
                VolumeOutcome::Valid(_) => {}
            }
        }
        classified.push((symbol, points));
    }

    let newly_excluded = state.variance.settle();
    report.excluded_symbols = newly_excluded.len();

    report.companies = writer.write(tables::COMPANIES, companies).await?;

    if !newly_excluded.is_empty() {
        report.purged_rows = store
            .purge_symbols(&newly_excluded)
            .await
            .context("Failed to purge excluded symbols")?;
        debug!(symbols = ?newly_excluded, rows = report.purged_rows, "Purged excluded symbols");
    }

    classified.retain(|(symbol, _)| !state.variance.is_excluded(symbol));

    let day_rows: Vec<DayStockRecord> = classified
        .iter()
        .flat_map(|(symbol, points)| aggregate_days(symbol, points))
        .collect();
    let overflowed_days = day_rows.iter().filter(|r| r.has_overflowed_volume()).count();
    if overflowed_days > 0 {
        debug!(batch = %batch.key, days = overflowed_days, "Day volumes stored as overflow sentinel");
    }
    report.day_rows = writer.write(tables::DAY_STOCKS, day_rows).await?;

    let hourly: Vec<StockRecord> = classified
        .iter()
        .flat_map(|(symbol, points)| resample_hourly(symbol, points))
        .collect();
    let hourly_count = hourly.len();
    let unseen = dedup_stocks(store.as_ref(), hourly).await?;
    report.duplicate_rows = hourly_count - unseen.len();
    report.stock_rows = writer.write(tables::STOCKS, unseen).await?;

    state.save(store.as_ref()).await?;
    store
        .mark_files_processed(&batch.file_names())
        .await
        .context("Failed to mark files processed")?;

    Ok(report)
}

/// Parsed quotes of a batch.
struct BatchQuotes {
    quotes: Vec<RawQuote>,
    /// Timestamps per symbol read from files an earlier run ingested
    replayed: HashMap<String, HashSet<DateTime<Utc>>>,
}

async fn parse_batch(batch: &Batch, report: &mut BatchReport) -> Result<BatchQuotes> {
    let handles: Vec<_> = batch
        .files
        .iter()
        .map(|file| {
            let path = file.path.clone();
            let fallback = file.timestamp;
            tokio::task::spawn_blocking(move || parse_file(&path, Some(fallback)))
        })
        .collect();

    let mut out = BatchQuotes {
        quotes: Vec::new(),
        replayed: HashMap::new(),
    };
    for (file, handle) in batch.files.iter().zip(handles) {
        let parsed = handle
            .await
            .map_err(|e| anyhow!("Parser task for {} panicked: {e}", file.name))?;

        let mut parsed = match parsed {
            Ok(parsed) => parsed,
            Err(e) if e.downcast_ref::<ParseError>().is_some() => {
                warn!(file = %file.name, error = %e, "Rejected file");
                report.rejected_files += 1;
                continue;
            }
            Err(e) => return Err(e),
        };
        report.skipped_lines += parsed.skipped;

        // A day's rows are built by exactly one batch
        let read = parsed.quotes.len();
        parsed
            .quotes
            .retain(|q| BatchKey::for_date(q.timestamp.date_naive()) == batch.key);
        let stray = read - parsed.quotes.len();
        if stray > 0 {
            warn!(file = %file.name, quotes = stray, "Dropped quotes dated outside the batch");
            report.stray_quotes += stray;
        }

        if batch.is_done(file) {
            report.replayed_files += 1;
            for quote in &parsed.quotes {
                out.replayed
                    .entry(quote.symbol.clone())
                    .or_default()
                    .insert(quote.timestamp);
            }
        }
        out.quotes.extend(parsed.quotes);
    }

    Ok(out)
}

async fn dedup_stocks<S: QuoteStore>(store: &S, rows: Vec<StockRecord>) -> Result<Vec<StockRecord>> {
    let (Some(start), Some(end)) = (
        rows.iter().map(|r| r.timestamp).min(),
        rows.iter().map(|r| r.timestamp).max(),
    ) else {
        return Ok(rows);
    };

    let symbols: Vec<String> = rows
        .iter()
        .map(|r| r.symbol.as_str())
        .collect::<HashSet<_>>()
        .into_iter()
        .map(str::to_string)
        .collect();

    let existing = store
        .existing_stocks(&symbols, start, end)
        .await
        .context("Failed to load stored hourly points")?;

    Ok(dedup_against(rows, &existing))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use std::fs;

    fn write_file(dir: &Path, name: &str, body: &str) {
        fs::write(dir.join(name), body).unwrap();
    }

    async fn pipeline(store: &Arc<MemoryStore>) -> Pipeline<MemoryStore> {
        let config = IngestConfig {
            workers: 2,
            chunk_size: 10,
            ..IngestConfig::default()
        };
        Pipeline::from_config(Arc::clone(store), &config).await.unwrap()
    }

    #[tokio::test]
    async fn test_plan_skips_processed_files() {
        let dir = tempfile::tempdir().unwrap();
        write_file(dir.path(), "paris 2020-01-02 09:00:00.csv", "symbol,last\nA,1\n");
        write_file(dir.path(), "paris 2020-01-12 09:00:00.csv", "symbol,last\nA,1\n");

        let store = MemoryStore::new();
        store
            .mark_files_processed(&["paris 2020-01-02 09:00:00.csv".to_string()])
            .await
            .unwrap();

        let files = discover_files(dir.path()).unwrap();
        let (batches, already) = plan_batches(&store, files).await.unwrap();

        assert_eq!(already, 1);
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].key.to_string(), "2020-01/1");
    }

    #[tokio::test]
    async fn test_rejected_file_does_not_fail_batch() {
        let dir = tempfile::tempdir().unwrap();
        write_file(dir.path(), "paris 2020-01-02 09:00:00.csv", "ticker,last\nA,1\n");
        write_file(
            dir.path(),
            "paris 2020-01-02 10:00:00.csv",
            "symbol,last,volume,name\nA,10,5,ACME\nA,oops,5,ACME\n",
        );

        let store = Arc::new(MemoryStore::new());
        let report = pipeline(&store).await.run_dir(dir.path()).await.unwrap();

        let batch = &report.batches[0];
        assert_eq!(batch.files, 2);
        assert_eq!(batch.rejected_files, 1);
        assert_eq!(batch.skipped_lines, 1);
        assert_eq!(batch.quotes, 1);
        assert_eq!(store.snapshot().files.len(), 2);
    }

    #[tokio::test]
    async fn test_run_on_empty_directory() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(MemoryStore::new());

        let report = pipeline(&store).await.run_dir(dir.path()).await.unwrap();

        assert!(report.batches.is_empty());
        assert!(store.snapshot().commit_log.is_empty());
    }

    #[tokio::test]
    async fn test_failed_batch_is_not_marked_done() {
        let dir = tempfile::tempdir().unwrap();
        write_file(
            dir.path(),
            "paris 2020-01-02 09:00:00.csv",
            "symbol,last,volume,name\nA,10,5,ACME\n",
        );
        write_file(
            dir.path(),
            "paris 2020-01-02 10:00:00.csv",
            "symbol,last,volume,name\nA,11,9,ACME\n",
        );

        let store = Arc::new(MemoryStore::new());
        store.fail_writes_to(tables::STOCKS);

        let err = pipeline(&store).await.run_dir(dir.path()).await.unwrap_err();
        assert!(err.to_string().contains("2020-01/0"));

        let db = store.snapshot();
        assert!(db.files.is_empty());
        assert_eq!(db.day_stocks.len(), 1);
        assert!(db.stocks.is_empty());

        store.clear_failure();
        let report = pipeline(&store).await.run_dir(dir.path()).await.unwrap();
        assert_eq!(report.batches.len(), 1);
        assert_eq!(store.snapshot().files.len(), 2);
        assert_eq!(store.snapshot().stocks.len(), 2);
    }

    #[tokio::test]
    async fn test_missing_directory_is_error() {
        let store = Arc::new(MemoryStore::new());
        let result = pipeline(&store)
            .await
            .run_dir(Path::new("/nonexistent/bourse"))
            .await;
        assert!(result.is_err());
    }
}
