use anyhow::{Context, Result};
use sqlx::{postgres::PgPoolOptions, PgPool};

use crate::repositories::Repositories;

/// Tables reported by [`DatabaseClient::table_counts`].
pub const QUOTE_TABLES: [&str; 5] = ["companies", "daystocks", "stocks", "file_done", "symbol_stats"];

pub struct DatabaseClient {
    pool: PgPool,
}

impl DatabaseClient {
    /// Connects to the `PostgreSQL` database and applies pending migrations.
    ///
    /// # Errors
    /// Returns an error if the connection cannot be established or a migration fails.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .context("Failed to connect to database")?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .context("Failed to run migrations")?;

        tracing::info!(max_connections, "Connected to database");
        Ok(Self { pool })
    }

    /// Builds the repository set over this client's pool.
    #[must_use]
    pub fn repositories(&self) -> Repositories {
        Repositories::new(self.pool.clone())
    }

    /// Counts the rows of every quote table.
    ///
    /// # Errors
    /// Returns an error if a count query fails.
    pub async fn table_counts(&self) -> Result<Vec<(&'static str, i64)>> {
        let mut counts = Vec::with_capacity(QUOTE_TABLES.len());

        for table in QUOTE_TABLES {
            // Table names come from a fixed list, never from input.
            let sql = format!("SELECT COUNT(*) FROM {table}");
            let row: (i64,) = sqlx::query_as(&sql)
                .fetch_one(&self.pool)
                .await
                .with_context(|| format!("Failed to count rows of {table}"))?;
            counts.push((table, row.0));
        }

        Ok(counts)
    }
}
