//! Running price statistics repository.

use anyhow::{Context, Result};
use sqlx::PgPool;

use crate::models::SymbolStatsRecord;

/// Repository for the `symbol_stats` table.
#[derive(Debug, Clone)]
pub struct SymbolStatsRepository {
    pool: PgPool,
}

impl SymbolStatsRepository {
    /// Creates a new repository instance.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Loads the statistics of every symbol seen so far.
    ///
    /// # Errors
    /// Returns an error if the database query fails.
    pub async fn load_all(&self) -> Result<Vec<SymbolStatsRecord>> {
        let records = sqlx::query_as::<_, SymbolStatsRecord>(
            r#"
            SELECT symbol, count, mean, m2, excluded
            FROM symbol_stats
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to load symbol statistics")?;

        Ok(records)
    }

    /// Upserts statistics rows.
    ///
    /// # Errors
    /// Returns an error if the database transaction fails.
    pub async fn upsert_batch(&self, records: &[SymbolStatsRecord]) -> Result<u64> {
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
                INSERT INTO symbol_stats (symbol, count, mean, m2, excluded)
                VALUES ($1, $2, $3, $4, $5)
                ON CONFLICT (symbol) DO UPDATE
                SET count = EXCLUDED.count,
                    mean = EXCLUDED.mean,
                    m2 = EXCLUDED.m2,
                    excluded = EXCLUDED.excluded
                "#,
            )
            .bind(&record.symbol)
            .bind(record.count)
            .bind(record.mean)
            .bind(record.m2)
            .bind(record.excluded)
            .execute(&mut *tx)
            .await
            .context("Failed to upsert symbol statistics")?;

            affected += result.rows_affected();
        }

        tx.commit().await.context("Failed to commit transaction")?;
        Ok(affected)
    }
}
