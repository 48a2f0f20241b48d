//! Hourly intraday point records.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One row of the `stocks` table: a resampled point at the top of an hour.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::FromRow)]
pub struct StockRecord {
    /// Instrument symbol
    pub symbol: String,
    /// Start of the hour window
    pub timestamp: DateTime<Utc>,
    /// Last observed price in the hour
    pub price: Decimal,
    /// Volume traded during the hour
    pub volume: i32,
}
