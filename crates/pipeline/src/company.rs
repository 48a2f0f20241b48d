//! Company registry.
//!
//! Keeps the authoritative symbol to name mapping across batches. The first
//! sighting of a symbol always creates it; later sightings rename it unless
//! the new name carries the SRD prefix.

use std::collections::HashMap;

use bourse_data::CompanyRecord;
use tracing::debug;

use crate::reconcile::ReconciledQuote;

/// What a sighting changed in the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompanyChange {
    Created,
    Renamed { previous: String },
}

/// In-memory symbol to name mapping.
#[derive(Debug, Default, Clone)]
pub struct CompanyRegistry {
    names: HashMap<String, String>,
}

impl CompanyRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the registry from stored company rows.
    #[must_use]
    pub fn from_records(records: Vec<CompanyRecord>) -> Self {
        let names = records.into_iter().map(|r| (r.symbol, r.name)).collect();
        Self { names }
    }

    #[must_use]
    pub fn name(&self, symbol: &str) -> Option<&str> {
        self.names.get(symbol).map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Applies one sighting and reports the change, if any.
    pub fn observe(&mut self, symbol: &str, name: &str) -> Option<CompanyChange> {
        match self.names.get_mut(symbol) {
            None => {
                self.names.insert(symbol.to_string(), name.to_string());
                Some(CompanyChange::Created)
            }
            Some(current) if current != name && !CompanyRecord::is_srd_name(name) => {
                let previous = std::mem::replace(current, name.to_string());
                Some(CompanyChange::Renamed { previous })
            }
            Some(_) => None,
        }
    }

    /// Applies a symbol's time-ordered sightings and returns the row to
    /// write if the registry changed.
    pub fn observe_series(
        &mut self,
        symbol: &str,
        quotes: &[ReconciledQuote],
    ) -> Option<CompanyRecord> {
        let mut changed = false;
        for quote in quotes {
            if let Some(change) = self.observe(symbol, &quote.name) {
                debug!(symbol, name = %quote.name, ?change, "Company updated");
                changed = true;
            }
        }

        if changed {
            self.name(symbol).map(|name| CompanyRecord::new(symbol, name))
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use rust_decimal_macros::dec;

    fn sightings(names: &[&str]) -> Vec<ReconciledQuote> {
        names
            .iter()
            .enumerate()
            .map(|(i, name)| ReconciledQuote {
                timestamp: Utc.with_ymd_and_hms(2020, 1, 2, 9, i as u32, 0).unwrap(),
                price: dec!(10),
                cumulative_volume: None,
                name: (*name).to_string(),
            })
            .collect()
    }

    #[test]
    fn test_first_sighting_creates() {
        let mut registry = CompanyRegistry::new();
        assert_eq!(registry.observe("A", "ACME"), Some(CompanyChange::Created));
        assert_eq!(registry.name("A"), Some("ACME"));
    }

    #[test]
    fn test_first_sighting_creates_even_with_srd_name() {
        let mut registry = CompanyRegistry::new();
        assert_eq!(registry.observe("A", "SRD ACME"), Some(CompanyChange::Created));
        assert_eq!(registry.name("A"), Some("SRD ACME"));
    }

    #[test]
    fn test_rename_and_srd_ignored() {
        let mut registry = CompanyRegistry::new();
        let record = registry.observe_series("A", &sightings(&["ACME", "SRD-ACME", "ACME2"]));
        assert_eq!(record, Some(CompanyRecord::new("A", "ACME2")));

        let mut registry = CompanyRegistry::new();
        let record = registry.observe_series("B", &sightings(&["ACME", "SRD-X"]));
        assert_eq!(record, Some(CompanyRecord::new("B", "ACME")));
    }

    #[test]
    fn test_unchanged_name_yields_nothing() {
        let mut registry = CompanyRegistry::from_records(vec![CompanyRecord::new("A", "ACME")]);
        assert_eq!(registry.observe_series("A", &sightings(&["ACME", "SRD ACME"])), None);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_rename_reports_previous() {
        let mut registry = CompanyRegistry::from_records(vec![CompanyRecord::new("A", "OLD")]);
        assert_eq!(
            registry.observe("A", "NEW"),
            Some(CompanyChange::Renamed {
                previous: "OLD".to_string()
            })
        );
    }
}
