//! Batch ingestion pipeline for raw stock quote dumps.
//!
//! Turns per-source CSV files into two ordered time series: one row per
//! (symbol, trading day) in `daystocks` and one row per (symbol, hour) in
//! `stocks`, plus the `companies` mapping.
//!
//! # Architecture
//!
//! ```text
//! parser -> batch -> reconcile -> company
//!                              -> volume -> daily    -> writer (daystocks)
//!                              -> variance  resample -> writer (stocks)
//! ```
//!
//! [`Pipeline`] drives batches in chronological order over any
//! [`QuoteStore`]: the `PostgreSQL` repositories of `bourse-data`, or the
//! in-memory [`MemoryStore`].

pub mod batch;
pub mod company;
pub mod daily;
pub mod driver;
pub mod parser;
pub mod reconcile;
pub mod report;
pub mod resample;
pub mod state;
pub mod store;
pub mod variance;
pub mod volume;
pub mod writer;

pub use batch::{discover_files, group_into_batches, Batch, BatchKey, SourceFile};
pub use company::{CompanyChange, CompanyRegistry};
pub use daily::aggregate_days;
pub use driver::{plan_batches, process_batch, Pipeline};
pub use parser::{parse_file, parse_reader, ParseError, ParsedFile, RawQuote};
pub use reconcile::{reconcile, ReconciledQuote, Reconciliation};
pub use report::{BatchReport, RunReport};
pub use resample::{dedup_against, floor_to_hour, resample_hourly};
pub use state::PipelineState;
pub use store::{BatchUpsert, MemoryStore, MemoryTables, QuoteStore};
pub use variance::{RunningStats, VarianceTracker};
pub use volume::{VolumeCarry, VolumeOutcome, VolumePoint, VolumeState, MAX_STORABLE_VOLUME};
pub use writer::{partition_by_symbol, StorageWriter, SymbolKeyed};
