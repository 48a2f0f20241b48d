//! Hourly resampling of intraday points.

use std::collections::{BTreeMap, HashSet};

use bourse_data::StockRecord;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tracing::debug;

use crate::volume::{VolumeOutcome, VolumePoint};

const SECONDS_PER_HOUR: i64 = 3_600;

/// Truncates a timestamp to the top of its hour.
#[must_use]
pub fn floor_to_hour(timestamp: DateTime<Utc>) -> DateTime<Utc> {
    let seconds = timestamp.timestamp();
    let floored = seconds - seconds.rem_euclid(SECONDS_PER_HOUR);
    DateTime::from_timestamp(floored, 0).unwrap_or(timestamp)
}

/// Downsamples one symbol's points to one row per hour.
///
/// Only `Valid` points take part: the row carries the last price observed in
/// the hour and the summed volume.
#[must_use]
pub fn resample_hourly(symbol: &str, points: &[VolumePoint]) -> Vec<StockRecord> {
    let mut hours: BTreeMap<DateTime<Utc>, (Decimal, i64)> = BTreeMap::new();

    for point in points {
        let VolumeOutcome::Valid(delta) = point.outcome else {
            continue;
        };
        let slot = hours
            .entry(floor_to_hour(point.timestamp))
            .or_insert((point.price, 0));
        slot.0 = point.price;
        slot.1 += delta;
    }

    hours
        .into_iter()
        .filter_map(|(timestamp, (price, volume))| match i32::try_from(volume) {
            Ok(volume) => Some(StockRecord {
                symbol: symbol.to_string(),
                timestamp,
                price,
                volume,
            }),
            Err(_) => {
                debug!(symbol, %timestamp, volume, "Dropping hourly point with unstorable volume");
                None
            }
        })
        .collect()
}

/// Drops rows identical to already-persisted ones.
#[must_use]
pub fn dedup_against(rows: Vec<StockRecord>, existing: &[StockRecord]) -> Vec<StockRecord> {
    if existing.is_empty() {
        return rows;
    }
    let persisted: HashSet<&StockRecord> = existing.iter().collect();
    rows.into_iter().filter(|row| !persisted.contains(row)).collect()
}
