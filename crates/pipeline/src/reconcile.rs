//! Cross-file reconciliation.
//!
//! Several source files may report the same (symbol, timestamp). Readings
//! are merged into one quote: identical readings count once, the price is
//! the mean of the distinct readings, and the cumulative volume the rounded
//! mean of the reported volumes.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};

use crate::parser::RawQuote;

/// One quote after merging every reading at its timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconciledQuote {
    pub timestamp: DateTime<Utc>,
    pub price: Decimal,
    pub cumulative_volume: Option<i64>,
    /// Name declared by the lexicographically last source file
    pub name: String,
}

/// Per-symbol, time-ordered reconciled streams.
#[derive(Debug, Default)]
pub struct Reconciliation {
    pub series: BTreeMap<String, Vec<ReconciledQuote>>,
    /// Readings folded into another reading of the same key
    pub merged: usize,
}

impl Reconciliation {
    /// Total number of reconciled quotes.
    #[must_use]
    pub fn quote_count(&self) -> usize {
        self.series.values().map(Vec::len).sum()
    }
}

/// Merges a batch's readings by (symbol, timestamp).
#[must_use]
pub fn reconcile(quotes: Vec<RawQuote>) -> Reconciliation {
    let total = quotes.len();
    let mut groups: BTreeMap<(String, DateTime<Utc>), Vec<RawQuote>> = BTreeMap::new();
    for quote in quotes {
        groups
            .entry((quote.symbol.clone(), quote.timestamp))
            .or_default()
            .push(quote);
    }

    let merged = total - groups.len();
    let mut series: BTreeMap<String, Vec<ReconciledQuote>> = BTreeMap::new();

    for ((symbol, timestamp), readings) in groups {
        if let Some(quote) = merge_readings(timestamp, &readings) {
            series.entry(symbol).or_default().push(quote);
        }
    }

    Reconciliation { series, merged }
}

fn merge_readings(timestamp: DateTime<Utc>, readings: &[RawQuote]) -> Option<ReconciledQuote> {
    let name = readings
        .iter()
        .max_by(|a, b| a.source.cmp(&b.source))?
        .name
        .clone();

    let mut distinct: Vec<&RawQuote> = Vec::with_capacity(readings.len());
    for reading in readings {
        let seen = distinct.iter().any(|d| {
            d.price == reading.price && d.cumulative_volume == reading.cumulative_volume
        });
        if !seen {
            distinct.push(reading);
        }
    }

    let count = Decimal::from(distinct.len());
    let price = distinct.iter().map(|r| r.price).sum::<Decimal>() / count;

    let volumes: Vec<i64> = distinct.iter().filter_map(|r| r.cumulative_volume).collect();
    let cumulative_volume = mean_volume(&volumes);

    Some(ReconciledQuote {
        timestamp,
        price,
        cumulative_volume,
        name,
    })
}

fn mean_volume(volumes: &[i64]) -> Option<i64> {
    if volumes.is_empty() {
        return None;
    }
    let sum: Decimal = volumes.iter().copied().map(Decimal::from).sum();
    (sum / Decimal::from(volumes.len()))
        .round_dp_with_strategy(0, RoundingStrategy::MidpointNearestEven)
        .to_i64()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;
    use std::sync::Arc;

    fn at(minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2020, 1, 2, 9, minute, 0).unwrap()
    }

    fn reading(symbol: &str, minute: u32, price: Decimal, volume: Option<i64>, source: &str) -> RawQuote {
        RawQuote {
            symbol: symbol.to_string(),
            timestamp: at(minute),
            price,
            cumulative_volume: volume,
            name: format!("{symbol} from {source}"),
            source: Arc::from(source),
        }
    }

    #[test]
    fn test_two_readings_average() {
        let result = reconcile(vec![
            reading("A", 0, dec!(10), Some(100), "a.csv"),
            reading("A", 0, dec!(12), Some(200), "b.csv"),
        ]);

        let series = &result.series["A"];
        assert_eq!(series.len(), 1);
        assert_eq!(series[0].price, dec!(11));
        assert_eq!(series[0].cumulative_volume, Some(150));
        assert_eq!(result.merged, 1);
    }

    #[test]
    fn test_mean_of_n_readings() {
        let result = reconcile(vec![
            reading("A", 0, dec!(10), None, "a.csv"),
            reading("A", 0, dec!(11), None, "b.csv"),
            reading("A", 0, dec!(15), None, "c.csv"),
        ]);

        assert_eq!(result.series["A"][0].price, dec!(12));
        assert_eq!(result.series["A"][0].cumulative_volume, None);
        assert_eq!(result.merged, 2);
    }

    #[test]
    fn test_identical_readings_count_once() {
        let result = reconcile(vec![
            reading("A", 0, dec!(10), Some(100), "a.csv"),
            reading("A", 0, dec!(10), Some(100), "copy/a.csv"),
            reading("A", 0, dec!(13), Some(100), "b.csv"),
        ]);

        // (10 + 13) / 2, not (10 + 10 + 13) / 3
        assert_eq!(result.series["A"][0].price, dec!(11.5));
    }

    #[test]
    fn test_volume_mean_rounds_half_to_even() {
        assert_eq!(mean_volume(&[1, 2]), Some(2));
        assert_eq!(mean_volume(&[2, 3]), Some(2));
        assert_eq!(mean_volume(&[1, 2, 4]), Some(2));
        assert_eq!(mean_volume(&[]), None);
    }

    #[test]
    fn test_absent_volumes_are_ignored_in_mean() {
        let result = reconcile(vec![
            reading("A", 0, dec!(10), Some(300), "a.csv"),
            reading("A", 0, dec!(12), None, "b.csv"),
        ]);

        assert_eq!(result.series["A"][0].cumulative_volume, Some(300));
    }

    #[test]
    fn test_name_from_last_source() {
        let result = reconcile(vec![
            reading("A", 0, dec!(10), None, "z.csv"),
            reading("A", 0, dec!(10), None, "m.csv"),
        ]);

        assert_eq!(result.series["A"][0].name, "A from z.csv");
    }

    #[test]
    fn test_series_are_time_ordered_per_symbol() {
        let result = reconcile(vec![
            reading("B", 5, dec!(1), None, "a.csv"),
            reading("A", 7, dec!(2), None, "a.csv"),
            reading("A", 3, dec!(3), None, "a.csv"),
        ]);

        assert_eq!(result.series.len(), 2);
        let a: Vec<_> = result.series["A"].iter().map(|q| q.timestamp).collect();
        assert_eq!(a, vec![at(3), at(7)]);
        assert_eq!(result.quote_count(), 3);
        assert_eq!(result.merged, 0);
    }

    #[test]
    fn test_empty_input() {
        let result = reconcile(Vec::new());
        assert!(result.series.is_empty());
        assert_eq!(result.merged, 0);
    }
}
