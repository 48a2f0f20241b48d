//! Company identity records.

use serde::{Deserialize, Serialize};

/// Name prefix used by the settlement-service (SRD) variant of an instrument.
///
/// A sighting carrying this prefix names the same underlying company and is
/// never treated as a rename.
pub const SRD_PREFIX: &str = "SRD";

/// One row of the `companies` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct CompanyRecord {
    /// Instrument symbol, primary key
    pub symbol: String,
    /// Most recent non-SRD declared name
    pub name: String,
    /// Always empty: markets are not distinguished
    pub market: String,
}

impl CompanyRecord {
    /// Creates a company record with an empty market.
    pub fn new(symbol: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            name: name.into(),
            market: String::new(),
        }
    }

    /// Returns true if `name` is a settlement-service variant name.
    #[must_use]
    pub fn is_srd_name(name: &str) -> bool {
        name.starts_with(SRD_PREFIX)
    }
}
