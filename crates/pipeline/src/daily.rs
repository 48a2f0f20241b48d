//! Day aggregation.
//!
//! Folds a symbol's classified points into one `daystocks` row per trading
//! day. Prices of `Valid` and `Overflow` points shape the OHLC; only `Valid`
//! deltas add to the volume.

use bourse_data::{DayStockRecord, VOLUME_OVERFLOW_SENTINEL};
use chrono::NaiveDate;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use crate::volume::{VolumeOutcome, VolumePoint, MAX_STORABLE_VOLUME};

/// Builds the day rows of one symbol from its time-ordered points.
#[must_use]
pub fn aggregate_days(symbol: &str, points: &[VolumePoint]) -> Vec<DayStockRecord> {
    let mut records = Vec::new();
    let mut start = 0;

    while start < points.len() {
        let day = points[start].timestamp.date_naive();
        let end = points[start..]
            .iter()
            .position(|p| p.timestamp.date_naive() != day)
            .map_or(points.len(), |offset| start + offset);

        if let Some(record) = aggregate_day(symbol, day, &points[start..end]) {
            records.push(record);
        }
        start = end;
    }

    records
}

fn aggregate_day(symbol: &str, day: NaiveDate, points: &[VolumePoint]) -> Option<DayStockRecord> {
    let counted: Vec<&VolumePoint> = points
        .iter()
        .filter(|p| p.outcome.counts_for_day())
        .collect();

    let open = counted.first()?.price;
    let close = counted.last()?.price;
    let high = counted.iter().map(|p| p.price).max()?;
    let low = counted.iter().map(|p| p.price).min()?;

    let traded: i64 = counted
        .iter()
        .map(|p| match p.outcome {
            VolumeOutcome::Valid(delta) => delta,
            _ => 0,
        })
        .sum();
    let last_cumulative = counted.iter().rev().find_map(|p| p.cumulative_volume);

    let overflowed = last_cumulative.is_some_and(|v| v > MAX_STORABLE_VOLUME);
    let volume = match i32::try_from(traded) {
        Ok(volume) if !overflowed => volume,
        _ => VOLUME_OVERFLOW_SENTINEL,
    };

    let prices: Vec<Decimal> = counted.iter().map(|p| p.price).collect();
    let mean = prices.iter().sum::<Decimal>() / Decimal::from(prices.len());

    Some(DayStockRecord {
        symbol: symbol.to_string(),
        day,
        open,
        high,
        low,
        close,
        volume,
        mean,
        std: sample_std(&prices),
    })
}

/// Sample standard deviation, `None` below two values.
fn sample_std(prices: &[Decimal]) -> Option<f64> {
    if prices.len() < 2 {
        return None;
    }
    let values: Vec<f64> = prices.iter().filter_map(ToPrimitive::to_f64).collect();
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let squares: f64 = values.iter().map(|v| (v - mean).powi(2)).sum();
    Some((squares / (n - 1.0)).sqrt())
}
