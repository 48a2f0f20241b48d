//! Storage layer for the bourse quote pipeline.
//!
//! This crate provides:
//! - Database client for `PostgreSQL`/TimescaleDB with embedded migrations
//! - Row models for `companies`, `daystocks`, `stocks` and bookkeeping tables
//! - Repositories for typed database access

pub mod database;
pub mod models;
pub mod repositories;

pub use database::DatabaseClient;

pub use models::{
    CompanyRecord, DayStockRecord, StockRecord, SymbolStatsRecord, SRD_PREFIX,
    VOLUME_OVERFLOW_SENTINEL,
};

pub use repositories::{
    CompanyRepository, DayStockRepository, FileDoneRepository, Repositories, StockRepository,
    SymbolStatsRepository,
};
