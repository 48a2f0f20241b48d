//! Ingested-file bookkeeping.
//!
//! A file is recorded here only after every row of its batch is committed,
//! so a failed batch leaves its files unrecorded and they are retried on the
//! next run.

use std::collections::HashSet;

use anyhow::{Context, Result};
use sqlx::PgPool;

/// Repository for the `file_done` table.
#[derive(Debug, Clone)]
pub struct FileDoneRepository {
    pool: PgPool,
}

impl FileDoneRepository {
    /// Creates a new repository instance.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Loads the names of all ingested files.
    ///
    /// # Errors
    /// Returns an error if the database query fails.
    pub async fn load_all(&self) -> Result<HashSet<String>> {
        let rows: Vec<(String,)> = sqlx::query_as("SELECT name FROM file_done")
            .fetch_all(&self.pool)
            .await
            .context("Failed to load ingested files")?;

        Ok(rows.into_iter().map(|(name,)| name).collect())
    }

    /// Records files as ingested. Already recorded names are left untouched.
    ///
    /// # Errors
    /// Returns an error if the database transaction fails.
    pub async fn mark_done(&self, names: &[String]) -> Result<u64> {
        if names.is_empty() {
            return Ok(0);
        }

        let mut tx = self
            .pool
            .begin()
            .await
            .context("Failed to begin transaction")?;
        let mut inserted = 0u64;

        for name in names {
            let result = sqlx::query(
                r#"
                INSERT INTO file_done (name)
                VALUES ($1)
                ON CONFLICT (name) DO NOTHING
                "#,
            )
            .bind(name)
            .execute(&mut *tx)
            .await
            .context("Failed to record ingested file")?;

            inserted += result.rows_affected();
        }

        tx.commit().await.context("Failed to commit transaction")?;
        Ok(inserted)
    }
}
