//! Persisted running price statistics per symbol.

use serde::{Deserialize, Serialize};

/// One row of the `symbol_stats` table.
///
/// Holds a Welford accumulator (`count`, `mean`, `m2`) over every price seen
/// for the symbol, and whether the symbol has been excluded for having a
/// constant price.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct SymbolStatsRecord {
    pub symbol: String,
    pub count: i64,
    pub mean: f64,
    pub m2: f64,
    pub excluded: bool,
}
