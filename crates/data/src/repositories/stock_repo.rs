//! Intraday (hourly) point repository.
//!
//! Upserts keyed by (symbol, timestamp). The range query over a set of
//! symbols feeds the resampler's deduplication pass.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::models::StockRecord;

/// Repository for `stocks` table operations.
#[derive(Debug, Clone)]
pub struct StockRepository {
    pool: PgPool,
}

impl StockRepository {
    /// Creates a new repository instance.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Upserts a batch of hourly points in one transaction.
    ///
    /// # Errors
    /// Returns an error if the database transaction fails.
    pub async fn upsert_batch(&self, records: &[StockRecord]) -> Result<u64> {
        if records.is_empty() {
            return Ok(0);
        }

        let mut tx = self
            .pool
            .begin()
            .await
            .context("Failed to begin transaction")?;
        let mut affected = 0u64;

        for record in records {
            let result = sqlx::query(
                r#"
                INSERT INTO stocks (symbol, timestamp, price, volume)
                VALUES ($1, $2, $3, $4)
                ON CONFLICT (symbol, timestamp) DO UPDATE
                SET price = EXCLUDED.price,
                    volume = EXCLUDED.volume
                "#,
            )
            .bind(&record.symbol)
            .bind(record.timestamp)
            .bind(record.price)
            .bind(record.volume)
            .execute(&mut *tx)
            .await
            .context("Failed to upsert intraday point")?;

            affected += result.rows_affected();
        }

        tx.commit().await.context("Failed to commit transaction")?;
        Ok(affected)
    }

    /// Queries points of the given symbols within an inclusive time range.
    ///
    /// # Errors
    /// Returns an error if the database query fails.
    pub async fn query_symbols_in_range(
        &self,
        symbols: &[String],
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<StockRecord>> {
        if symbols.is_empty() {
            return Ok(Vec::new());
        }

        let records = sqlx::query_as::<_, StockRecord>(
            r#"
            SELECT symbol, timestamp, price, volume
            FROM stocks
            WHERE symbol = ANY($1)
              AND timestamp >= $2 AND timestamp <= $3
            ORDER BY symbol ASC, timestamp ASC
            "#,
        )
        .bind(symbols)
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await
        .context("Failed to query intraday points")?;

        Ok(records)
    }

    /// Deletes every point of the given symbols.
    ///
    /// # Errors
    /// Returns an error if the database operation fails.
    pub async fn delete_symbols(&self, symbols: &[String]) -> Result<u64> {
        if symbols.is_empty() {
            return Ok(0);
        }

        let result = sqlx::query(
            r#"
            DELETE FROM stocks
            WHERE symbol = ANY($1)
            "#,
        )
        .bind(symbols)
        .execute(&self.pool)
        .await
        .context("Failed to delete intraday points")?;

        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn hour(h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2023, 5, 10, h, 0, 0).unwrap()
    }

    fn create_test_record(h: u32, volume: i32) -> StockRecord {
        StockRecord {
            symbol: "NL0000235190".to_string(),
            timestamp: hour(h),
            price: dec!(121.04),
            volume,
        }
    }

    #[test]
    fn test_records_with_same_key_and_values_are_equal() {
        assert_eq!(create_test_record(10, 500), create_test_record(10, 500));
        assert_ne!(create_test_record(10, 500), create_test_record(10, 501));
        assert_ne!(create_test_record(10, 500), create_test_record(11, 500));
    }

    #[test]
    fn test_decimal_scale_does_not_affect_equality() {
        let mut a = create_test_record(9, 1);
        let mut b = create_test_record(9, 1);
        a.price = dec!(121.0);
        b.price = dec!(121.000);

        // NUMERIC round trips may change the scale
        assert_eq!(a, b);
    }
}
