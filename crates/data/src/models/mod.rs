//! Data models for the quote tables.
//!
//! Prices use `rust_decimal::Decimal` for exact storage.
//! Models derive `sqlx::FromRow` for database compatibility.

pub mod company;
pub mod day_stock;
pub mod stock;
pub mod symbol_stats;

pub use company::{CompanyRecord, SRD_PREFIX};
pub use day_stock::{DayStockRecord, VOLUME_OVERFLOW_SENTINEL};
pub use stock::StockRecord;
pub use symbol_stats::SymbolStatsRecord;
