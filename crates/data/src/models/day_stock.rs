//! Day-level aggregate records.
//!
//! One row per (symbol, trading day). The volume column is a 4-byte integer,
//! so a day whose traded volume does not fit keeps its prices and stores
//! [`VOLUME_OVERFLOW_SENTINEL`] instead.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Stored volume for a day whose true volume exceeds `i32::MAX`.
pub const VOLUME_OVERFLOW_SENTINEL: i32 = -1;

/// One row of the `daystocks` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct DayStockRecord {
    /// Instrument symbol
    pub symbol: String,
    /// Trading day
    pub day: NaiveDate,
    /// First price of the day
    pub open: Decimal,
    /// Highest price of the day
    pub high: Decimal,
    /// Lowest price of the day
    pub low: Decimal,
    /// Last price of the day
    pub close: Decimal,
    /// Traded volume, or [`VOLUME_OVERFLOW_SENTINEL`]
    pub volume: i32,
    /// Mean price over the day's points
    pub mean: Decimal,
    /// Sample standard deviation of the day's prices (None with a single point)
    pub std: Option<f64>,
}

impl DayStockRecord {
    /// Returns true if the day's volume was too large to store.
    #[must_use]
    pub fn has_overflowed_volume(&self) -> bool {
        self.volume == VOLUME_OVERFLOW_SENTINEL
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn sample(volume: i32) -> DayStockRecord {
        DayStockRecord {
            symbol: "FR0000120073".to_string(),
            day: NaiveDate::from_ymd_opt(2022, 6, 1).unwrap(),
            open: dec!(120.5),
            high: dec!(123.0),
            low: dec!(119.75),
            close: dec!(122.1),
            volume,
            mean: dec!(121.2),
            std: Some(0.8),
        }
    }

    #[test]
    fn test_sentinel_detection() {
        assert!(sample(VOLUME_OVERFLOW_SENTINEL).has_overflowed_volume());
        assert!(!sample(0).has_overflowed_volume());
        assert!(!sample(i32::MAX).has_overflowed_volume());
    }
}
