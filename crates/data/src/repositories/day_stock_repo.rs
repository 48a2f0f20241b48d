//! Day aggregate repository.
//!
//! Idempotent upserts keyed by (symbol, day) and per-symbol purges for
//! the variance filter.

use anyhow::{Context, Result};
use sqlx::PgPool;

use crate::models::DayStockRecord;

/// Repository for `daystocks` table operations.
#[derive(Debug, Clone)]
pub struct DayStockRepository {
    pool: PgPool,
}

impl DayStockRepository {
    /// Creates a new repository instance.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Upserts a batch of day aggregates in one transaction.
    ///
    /// Re-running a batch overwrites the same (symbol, day) rows, so the
    /// operation is idempotent.
    ///
    /// # Errors
    /// Returns an error if the database transaction fails.
    pub async fn upsert_batch(&self, records: &[DayStockRecord]) -> Result<u64> {
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
                INSERT INTO daystocks (symbol, day, open, high, low, close, volume, mean, std)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                ON CONFLICT (symbol, day) DO UPDATE
                SET open = EXCLUDED.open,
                    high = EXCLUDED.high,
                    low = EXCLUDED.low,
                    close = EXCLUDED.close,
                    volume = EXCLUDED.volume,
                    mean = EXCLUDED.mean,
                    std = EXCLUDED.std
                "#,
            )
            .bind(&record.symbol)
            .bind(record.day)
            .bind(record.open)
            .bind(record.high)
            .bind(record.low)
            .bind(record.close)
            .bind(record.volume)
            .bind(record.mean)
            .bind(record.std)
            .execute(&mut *tx)
            .await
            .context("Failed to upsert day aggregate")?;

            affected += result.rows_affected();
        }

        tx.commit().await.context("Failed to commit transaction")?;
        Ok(affected)
    }

    /// Deletes every day aggregate of the given symbols.
    ///
    /// # Errors
    /// Returns an error if the database operation fails.
    pub async fn delete_symbols(&self, symbols: &[String]) -> Result<u64> {
        if symbols.is_empty() {
            return Ok(0);
        }

        let result = sqlx::query(
            r#"
            DELETE FROM daystocks
            WHERE symbol = ANY($1)
            "#,
        )
        .bind(symbols)
        .execute(&self.pool)
        .await
        .context("Failed to delete day aggregates")?;

        Ok(result.rows_affected())
    }
}
