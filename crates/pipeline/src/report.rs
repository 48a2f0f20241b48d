//! Ingestion counters.

use std::fmt::Write as _;

use crate::batch::BatchKey;

/// Counters for one processed batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchReport {
    pub key: BatchKey,
    pub files: usize,
    /// Files an earlier run ingested, read again to rebuild the batch
    pub replayed_files: usize,
    /// Files rejected as a whole (unusable header)
    pub rejected_files: usize,
    pub skipped_lines: usize,
    /// Quotes dated outside the batch's period
    pub stray_quotes: usize,
    pub quotes: usize,
    pub merged: usize,
    pub negative_volumes: usize,
    pub overflow_volumes: usize,
    pub companies: u64,
    pub excluded_symbols: usize,
    pub purged_rows: u64,
    pub day_rows: u64,
    pub stock_rows: u64,
    /// Hourly rows identical to stored ones
    pub duplicate_rows: usize,
}

impl BatchReport {
    #[must_use]
    pub fn new(key: BatchKey) -> Self {
        Self {
            key,
            files: 0,
            replayed_files: 0,
            rejected_files: 0,
            skipped_lines: 0,
            stray_quotes: 0,
            quotes: 0,
            merged: 0,
            negative_volumes: 0,
            overflow_volumes: 0,
            companies: 0,
            excluded_symbols: 0,
            purged_rows: 0,
            day_rows: 0,
            stock_rows: 0,
            duplicate_rows: 0,
        }
    }
}

/// Counters for a whole run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    pub batches: Vec<BatchReport>,
    /// Files an earlier run ingested
    pub already_processed: usize,
}

impl RunReport {
    #[must_use]
    pub fn files(&self) -> usize {
        self.batches.iter().map(|b| b.files).sum()
    }

    #[must_use]
    pub fn day_rows(&self) -> u64 {
        self.batches.iter().map(|b| b.day_rows).sum()
    }

    #[must_use]
    pub fn stock_rows(&self) -> u64 {
        self.batches.iter().map(|b| b.stock_rows).sum()
    }

    /// Human-readable table of the run.
    #[must_use]
    pub fn summary(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "{:<10} {:>6} {:>9} {:>8} {:>8} {:>9} {:>9}",
            "batch", "files", "quotes", "skipped", "excluded", "days", "hourly"
        );
        for b in &self.batches {
            let _ = writeln!(
                out,
                "{:<10} {:>6} {:>9} {:>8} {:>8} {:>9} {:>9}",
                b.key.to_string(),
                b.files,
                b.quotes,
                b.skipped_lines,
                b.excluded_symbols,
                b.day_rows,
                b.stock_rows
            );
        }
        let _ = write!(
            out,
            "{} batches, {} files ({} already ingested), {} day rows, {} hourly rows",
            self.batches.len(),
            self.files(),
            self.already_processed,
            self.day_rows(),
            self.stock_rows()
        );
        out
    }
}
