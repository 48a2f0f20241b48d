//! Zero-variance symbol filter.
//!
//! A symbol whose price never moved over its whole history carries no
//! information and is excluded from both time-series tables. The decision
//! uses a running Welford accumulator per symbol, so history does not need
//! to be reloaded.

use std::collections::{HashMap, HashSet};

use bourse_data::SymbolStatsRecord;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use tracing::info;

/// Welford running mean and sum of squared deviations.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RunningStats {
    pub count: u64,
    pub mean: f64,
    pub m2: f64,
}

impl RunningStats {
    pub fn push(&mut self, value: f64) {
        self.count += 1;
        let delta = value - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (value - self.mean);
    }

    /// True once at least two observations were all equal.
    #[must_use]
    pub fn is_constant(&self) -> bool {
        self.count >= 2 && self.m2 == 0.0
    }
}

/// Running statistics and exclusion decisions for every symbol.
#[derive(Debug, Default, Clone)]
pub struct VarianceTracker {
    stats: HashMap<String, RunningStats>,
    excluded: HashSet<String>,
    dirty: HashSet<String>,
}

impl VarianceTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Restores the tracker from persisted statistics.
    #[must_use]
    pub fn from_records(records: Vec<SymbolStatsRecord>) -> Self {
        let mut tracker = Self::new();
        for record in records {
            if record.excluded {
                tracker.excluded.insert(record.symbol.clone());
            }
            tracker.stats.insert(
                record.symbol,
                RunningStats {
                    count: u64::try_from(record.count).unwrap_or(0),
                    mean: record.mean,
                    m2: record.m2,
                },
            );
        }
        tracker
    }

    /// Folds prices into a symbol's statistics. Excluded symbols are ignored.
    pub fn observe(&mut self, symbol: &str, prices: impl IntoIterator<Item = Decimal>) {
        if self.excluded.contains(symbol) {
            return;
        }
        let stats = self.stats.entry(symbol.to_string()).or_default();
        for price in prices {
            if let Some(value) = price.to_f64() {
                stats.push(value);
            }
        }
        self.dirty.insert(symbol.to_string());
    }

    /// Marks symbols observed since the last save whose prices never moved.
    ///
    /// Returns the newly excluded symbols, sorted.
    pub fn settle(&mut self) -> Vec<String> {
        let mut newly: Vec<String> = self
            .dirty
            .iter()
            .filter(|symbol| !self.excluded.contains(*symbol))
            .filter(|symbol| self.stats.get(*symbol).is_some_and(RunningStats::is_constant))
            .cloned()
            .collect();
        newly.sort();

        for symbol in &newly {
            self.excluded.insert(symbol.clone());
        }
        if !newly.is_empty() {
            info!(count = newly.len(), "Excluded zero-variance symbols");
        }
        newly
    }

    #[must_use]
    pub fn is_excluded(&self, symbol: &str) -> bool {
        self.excluded.contains(symbol)
    }

    /// Returns the records changed since the last call, sorted by symbol.
    pub fn take_dirty_records(&mut self) -> Vec<SymbolStatsRecord> {
        let mut symbols: Vec<String> = self.dirty.drain().collect();
        symbols.sort();

        symbols
            .into_iter()
            .filter_map(|symbol| {
                let stats = self.stats.get(&symbol)?;
                Some(SymbolStatsRecord {
                    count: i64::try_from(stats.count).unwrap_or(i64::MAX),
                    mean: stats.mean,
                    m2: stats.m2,
                    excluded: self.excluded.contains(&symbol),
                    symbol,
                })
            })
            .collect()
    }
}
