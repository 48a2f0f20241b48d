//! Storage seam between the pipeline and the database.
//!
//! The pipeline talks to a [`QuoteStore`]. The `PostgreSQL` repositories
//! implement it for real runs; [`MemoryStore`] implements it for dry runs and
//! tests.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use anyhow::{bail, Result};
use bourse_data::{CompanyRecord, DayStockRecord, Repositories, StockRecord, SymbolStatsRecord};
use chrono::{DateTime, NaiveDate, Utc};
use parking_lot::Mutex;

/// Table names as they appear in the schema.
pub mod tables {
    pub const COMPANIES: &str = "companies";
    pub const DAY_STOCKS: &str = "daystocks";
    pub const STOCKS: &str = "stocks";
}

/// Idempotent upsert of one chunk of rows, in one transaction.
#[async_trait::async_trait]
pub trait BatchUpsert<T>: Send + Sync {
    async fn upsert_rows(&self, rows: &[T]) -> Result<u64>;
}

/// Everything the pipeline reads from and writes to storage.
#[async_trait::async_trait]
pub trait QuoteStore:
    BatchUpsert<CompanyRecord> + BatchUpsert<DayStockRecord> + BatchUpsert<StockRecord> + 'static
{
    async fn load_companies(&self) -> Result<Vec<CompanyRecord>>;

    async fn load_symbol_stats(&self) -> Result<Vec<SymbolStatsRecord>>;

    async fn save_symbol_stats(&self, records: &[SymbolStatsRecord]) -> Result<u64>;

    /// Names of files whose batch is fully committed.
    async fn processed_files(&self) -> Result<HashSet<String>>;

    async fn mark_files_processed(&self, names: &[String]) -> Result<u64>;

    /// Stored hourly points of `symbols` within `[start, end]`.
    async fn existing_stocks(
        &self,
        symbols: &[String],
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<StockRecord>>;

    /// Deletes every day and hourly row of `symbols`.
    async fn purge_symbols(&self, symbols: &[String]) -> Result<u64>;
}

// ============================================
// PostgreSQL
// ============================================

#[async_trait::async_trait]
impl BatchUpsert<CompanyRecord> for Repositories {
    async fn upsert_rows(&self, rows: &[CompanyRecord]) -> Result<u64> {
        self.companies.upsert_batch(rows).await
    }
}

#[async_trait::async_trait]
impl BatchUpsert<DayStockRecord> for Repositories {
    async fn upsert_rows(&self, rows: &[DayStockRecord]) -> Result<u64> {
        self.day_stocks.upsert_batch(rows).await
    }
}

#[async_trait::async_trait]
impl BatchUpsert<StockRecord> for Repositories {
    async fn upsert_rows(&self, rows: &[StockRecord]) -> Result<u64> {
        self.stocks.upsert_batch(rows).await
    }
}

#[async_trait::async_trait]
impl QuoteStore for Repositories {
    async fn load_companies(&self) -> Result<Vec<CompanyRecord>> {
        self.companies.load_all().await
    }

    async fn load_symbol_stats(&self) -> Result<Vec<SymbolStatsRecord>> {
        self.symbol_stats.load_all().await
    }

    async fn save_symbol_stats(&self, records: &[SymbolStatsRecord]) -> Result<u64> {
        self.symbol_stats.upsert_batch(records).await
    }

    async fn processed_files(&self) -> Result<HashSet<String>> {
        self.files.load_all().await
    }

    async fn mark_files_processed(&self, names: &[String]) -> Result<u64> {
        self.files.mark_done(names).await
    }

    async fn existing_stocks(
        &self,
        symbols: &[String],
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<StockRecord>> {
        self.stocks.query_symbols_in_range(symbols, start, end).await
    }

    async fn purge_symbols(&self, symbols: &[String]) -> Result<u64> {
        let days = self.day_stocks.delete_symbols(symbols).await?;
        let points = self.stocks.delete_symbols(symbols).await?;
        Ok(days + points)
    }
}

// ============================================
// In-memory
// ============================================

/// Contents of a [`MemoryStore`].
#[derive(Debug, Default, Clone, PartialEq)]
pub struct MemoryTables {
    pub companies: BTreeMap<String, CompanyRecord>,
    pub day_stocks: BTreeMap<(String, NaiveDate), DayStockRecord>,
    pub stocks: BTreeMap<(String, DateTime<Utc>), StockRecord>,
    pub files: BTreeSet<String>,
    pub symbol_stats: BTreeMap<String, SymbolStatsRecord>,
    /// Table name of every committed chunk, in commit order
    pub commit_log: Vec<&'static str>,
}

/// In-memory store with the same upsert semantics as the database.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<MemoryTables>,
    failing_table: Mutex<Option<&'static str>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of the current contents.
    #[must_use]
    pub fn snapshot(&self) -> MemoryTables {
        self.tables.lock().clone()
    }

    /// Makes every later upsert into `table` fail.
    pub fn fail_writes_to(&self, table: &'static str) {
        *self.failing_table.lock() = Some(table);
    }

    pub fn clear_failure(&self) {
        *self.failing_table.lock() = None;
    }

    fn check_writable(&self, table: &'static str) -> Result<()> {
        if *self.failing_table.lock() == Some(table) {
            bail!("Simulated write failure on {table}");
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl BatchUpsert<CompanyRecord> for MemoryStore {
    async fn upsert_rows(&self, rows: &[CompanyRecord]) -> Result<u64> {
        self.check_writable(tables::COMPANIES)?;
        let mut db = self.tables.lock();
        for row in rows {
            db.companies.insert(row.symbol.clone(), row.clone());
        }
        db.commit_log.push(tables::COMPANIES);
        Ok(rows.len() as u64)
    }
}

#[async_trait::async_trait]
impl BatchUpsert<DayStockRecord> for MemoryStore {
    async fn upsert_rows(&self, rows: &[DayStockRecord]) -> Result<u64> {
        self.check_writable(tables::DAY_STOCKS)?;
        let mut db = self.tables.lock();
        for row in rows {
            db.day_stocks.insert((row.symbol.clone(), row.day), row.clone());
        }
        db.commit_log.push(tables::DAY_STOCKS);
        Ok(rows.len() as u64)
    }
}

#[async_trait::async_trait]
impl BatchUpsert<StockRecord> for MemoryStore {
    async fn upsert_rows(&self, rows: &[StockRecord]) -> Result<u64> {
        self.check_writable(tables::STOCKS)?;
        let mut db = self.tables.lock();
        for row in rows {
            db.stocks.insert((row.symbol.clone(), row.timestamp), row.clone());
        }
        db.commit_log.push(tables::STOCKS);
        Ok(rows.len() as u64)
    }
}

#[async_trait::async_trait]
impl QuoteStore for MemoryStore {
    async fn load_companies(&self) -> Result<Vec<CompanyRecord>> {
        Ok(self.tables.lock().companies.values().cloned().collect())
    }

    async fn load_symbol_stats(&self) -> Result<Vec<SymbolStatsRecord>> {
        Ok(self.tables.lock().symbol_stats.values().cloned().collect())
    }

    async fn save_symbol_stats(&self, records: &[SymbolStatsRecord]) -> Result<u64> {
        let mut db = self.tables.lock();
        for record in records {
            db.symbol_stats.insert(record.symbol.clone(), record.clone());
        }
        Ok(records.len() as u64)
    }

    async fn processed_files(&self) -> Result<HashSet<String>> {
        Ok(self.tables.lock().files.iter().cloned().collect())
    }

    async fn mark_files_processed(&self, names: &[String]) -> Result<u64> {
        let mut db = self.tables.lock();
        let inserted = names
            .iter()
            .filter(|name| db.files.insert((*name).clone()))
            .count();
        Ok(inserted as u64)
    }

    async fn existing_stocks(
        &self,
        symbols: &[String],
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<StockRecord>> {
        let wanted: HashSet<&str> = symbols.iter().map(String::as_str).collect();
        Ok(self
            .tables
            .lock()
            .stocks
            .values()
            .filter(|row| wanted.contains(row.symbol.as_str()))
            .filter(|row| row.timestamp >= start && row.timestamp <= end)
            .cloned()
            .collect())
    }

    async fn purge_symbols(&self, symbols: &[String]) -> Result<u64> {
        let purged: HashSet<&str> = symbols.iter().map(String::as_str).collect();
        let mut db = self.tables.lock();

        let before = db.day_stocks.len() + db.stocks.len();
        db.day_stocks.retain(|(symbol, _), _| !purged.contains(symbol.as_str()));
        db.stocks.retain(|(symbol, _), _| !purged.contains(symbol.as_str()));
        let after = db.day_stocks.len() + db.stocks.len();

        Ok((before - after) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn stock(symbol: &str, hour: u32, volume: i32) -> StockRecord {
        StockRecord {
            symbol: symbol.to_string(),
            timestamp: Utc.with_ymd_and_hms(2020, 1, 2, hour, 0, 0).unwrap(),
            price: dec!(10),
            volume,
        }
    }

    fn day(symbol: &str) -> DayStockRecord {
        DayStockRecord {
            symbol: symbol.to_string(),
            day: NaiveDate::from_ymd_opt(2020, 1, 2).unwrap(),
            open: dec!(10),
            high: dec!(10),
            low: dec!(10),
            close: dec!(10),
            volume: 5,
            mean: dec!(10),
            std: None,
        }
    }

    #[tokio::test]
    async fn test_upsert_overwrites_same_key() {
        let store = MemoryStore::new();
        store.upsert_rows(&[stock("A", 9, 1)]).await.unwrap();
        store.upsert_rows(&[stock("A", 9, 2)]).await.unwrap();

        let db = store.snapshot();
        assert_eq!(db.stocks.len(), 1);
        assert_eq!(db.stocks.values().next().unwrap().volume, 2);
        assert_eq!(db.commit_log, vec![tables::STOCKS, tables::STOCKS]);
    }

    #[tokio::test]
    async fn test_existing_stocks_filters_symbols_and_range() {
        let store = MemoryStore::new();
        store
            .upsert_rows(&[stock("A", 9, 1), stock("A", 12, 1), stock("B", 9, 1)])
            .await
            .unwrap();

        let start = Utc.with_ymd_and_hms(2020, 1, 2, 9, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2020, 1, 2, 11, 0, 0).unwrap();
        let rows = store
            .existing_stocks(&["A".to_string()], start, end)
            .await
            .unwrap();

        assert_eq!(rows, vec![stock("A", 9, 1)]);
    }

    #[tokio::test]
    async fn test_purge_removes_both_tables() {
        let store = MemoryStore::new();
        store.upsert_rows(&[day("A"), day("B")]).await.unwrap();
        store.upsert_rows(&[stock("A", 9, 1), stock("B", 9, 1)]).await.unwrap();

        let purged = store.purge_symbols(&["A".to_string()]).await.unwrap();

        assert_eq!(purged, 2);
        let db = store.snapshot();
        assert_eq!(db.day_stocks.len(), 1);
        assert_eq!(db.stocks.len(), 1);
    }

    #[tokio::test]
    async fn test_mark_files_processed_ignores_known_names() {
        let store = MemoryStore::new();
        let names = vec!["a.csv".to_string(), "b.csv".to_string()];

        assert_eq!(store.mark_files_processed(&names).await.unwrap(), 2);
        assert_eq!(store.mark_files_processed(&names).await.unwrap(), 0);
        assert_eq!(store.processed_files().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_failure_injection() {
        let store = MemoryStore::new();
        store.fail_writes_to(tables::STOCKS);

        assert!(store.upsert_rows(&[stock("A", 9, 1)]).await.is_err());
        assert!(store.upsert_rows(&[day("A")]).await.is_ok());

        store.clear_failure();
        assert!(store.upsert_rows(&[stock("A", 9, 1)]).await.is_ok());
    }
}
