//! Concurrent storage writer.
//!
//! Rows of one table are partitioned by symbol hash onto a fixed number of
//! tokio tasks, so no two tasks ever write rows of the same symbol. Each task
//! upserts its partition in chunks, one transaction per chunk. [`write`]
//! returns only once every task has finished, which is the barrier between
//! two tables of the same batch.
//!
//! [`write`]: StorageWriter::write

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use bourse_data::{CompanyRecord, DayStockRecord, StockRecord};
use tokio::task::JoinHandle;
use tracing::{debug, error};

use crate::store::BatchUpsert;

/// Rows that belong to one symbol.
pub trait SymbolKeyed {
    fn symbol(&self) -> &str;
}

impl SymbolKeyed for CompanyRecord {
    fn symbol(&self) -> &str {
        &self.symbol
    }
}

impl SymbolKeyed for DayStockRecord {
    fn symbol(&self) -> &str {
        &self.symbol
    }
}

impl SymbolKeyed for StockRecord {
    fn symbol(&self) -> &str {
        &self.symbol
    }
}

fn partition_of(symbol: &str, partitions: usize) -> usize {
    let mut hasher = DefaultHasher::new();
    symbol.hash(&mut hasher);
    (hasher.finish() % partitions as u64) as usize
}

/// Splits rows into `partitions` groups, all rows of a symbol in one group.
#[must_use]
pub fn partition_by_symbol<T: SymbolKeyed>(rows: Vec<T>, partitions: usize) -> Vec<Vec<T>> {
    let partitions = partitions.max(1);
    let mut groups: Vec<Vec<T>> = (0..partitions).map(|_| Vec::new()).collect();
    for row in rows {
        groups[partition_of(row.symbol(), partitions)].push(row);
    }
    groups
}

/// Symbol-partitioned writer over a store.
#[derive(Debug)]
pub struct StorageWriter<S> {
    store: Arc<S>,
    workers: usize,
    chunk_size: usize,
}

impl<S> Clone for StorageWriter<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            workers: self.workers,
            chunk_size: self.chunk_size,
        }
    }
}

impl<S: Send + Sync + 'static> StorageWriter<S> {
    /// Creates a writer. Zero workers or chunk size are raised to one.
    #[must_use]
    pub fn new(store: Arc<S>, workers: usize, chunk_size: usize) -> Self {
        Self {
            store,
            workers: workers.max(1),
            chunk_size: chunk_size.max(1),
        }
    }

    #[must_use]
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    #[must_use]
    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Upserts every row and waits for all workers.
    ///
    /// Every worker runs to completion even if another fails, so no row of
    /// `table` is still in flight when this returns.
    ///
    /// # Errors
    /// Returns the first worker error.
    pub async fn write<T>(&self, table: &'static str, rows: Vec<T>) -> Result<u64>
    where
        S: BatchUpsert<T>,
        T: SymbolKeyed + Send + Sync + 'static,
    {
        if rows.is_empty() {
            return Ok(0);
        }
        let row_count = rows.len();

        let mut handles: Vec<JoinHandle<Result<u64>>> = Vec::with_capacity(self.workers);
        for (worker, partition) in partition_by_symbol(rows, self.workers)
            .into_iter()
            .enumerate()
            .filter(|(_, partition)| !partition.is_empty())
        {
            let store = Arc::clone(&self.store);
            let chunk_size = self.chunk_size;

            handles.push(tokio::spawn(async move {
                let mut written = 0u64;
                for chunk in partition.chunks(chunk_size) {
                    written += BatchUpsert::<T>::upsert_rows(store.as_ref(), chunk)
                        .await
                        .with_context(|| format!("Worker {worker} failed to write {table}"))?;
                }
                Ok(written)
            }));
        }

        let mut written = 0u64;
        let mut first_error = None;
        for handle in handles {
            let outcome = match handle.await {
                Ok(outcome) => outcome,
                Err(e) => Err(anyhow!("Writer task for {table} panicked: {e}")),
            };
            match outcome {
                Ok(count) => written += count,
                Err(e) => {
                    error!(table, error = %e, "Write failed");
                    first_error.get_or_insert(e);
                }
            }
        }

        if let Some(e) = first_error {
            return Err(e);
        }

        debug!(table, rows = row_count, written, workers = self.workers, "Table written");
        Ok(written)
    }
}
