//! Company repository.
//!
//! Upserts and loads the `companies` identity table.

use anyhow::{Context, Result};
use sqlx::PgPool;

use crate::models::CompanyRecord;

/// Repository for `companies` table operations.
#[derive(Debug, Clone)]
pub struct CompanyRepository {
    pool: PgPool,
}

impl CompanyRepository {
    /// Creates a new repository instance.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Inserts new companies and overwrites the name of existing ones.
    ///
    /// # Returns
    /// The number of rows inserted or updated.
    ///
    /// # Errors
    /// Returns an error if the database transaction fails.
    pub async fn upsert_batch(&self, records: &[CompanyRecord]) -> Result<u64> {
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
                INSERT INTO companies (symbol, name, market)
                VALUES ($1, $2, $3)
                ON CONFLICT (symbol) DO UPDATE
                SET name = EXCLUDED.name,
                    market = EXCLUDED.market
                "#,
            )
            .bind(&record.symbol)
            .bind(&record.name)
            .bind(&record.market)
            .execute(&mut *tx)
            .await
            .context("Failed to upsert company")?;

            affected += result.rows_affected();
        }

        tx.commit().await.context("Failed to commit transaction")?;
        Ok(affected)
    }

    /// Loads every company.
    ///
    /// # Errors
    /// Returns an error if the database query fails.
    pub async fn load_all(&self) -> Result<Vec<CompanyRecord>> {
        let records = sqlx::query_as::<_, CompanyRecord>(
            r#"
            SELECT symbol, name, market
            FROM companies
            ORDER BY symbol ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to load companies")?;

        Ok(records)
    }
}
