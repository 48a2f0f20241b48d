//! Volume delta engine.
//!
//! Sources report the volume traded since market open. Each point's own
//! volume is the difference with the previous accepted reading of the same
//! day. Readings that go backwards are rejected without moving the carry, so
//! one bad reading does not poison the deltas that follow it.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;

use crate::reconcile::ReconciledQuote;

/// Widest volume the storage columns hold.
pub const MAX_STORABLE_VOLUME: i64 = i32::MAX as i64;

/// Classification of one point's volume.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VolumeOutcome {
    /// Traded volume since the previous accepted reading
    Valid(i64),
    /// Cumulative volume went backwards
    Negative,
    /// Cumulative volume or delta does not fit in the storage width
    Overflow,
}

impl VolumeOutcome {
    /// True if the point's price belongs to the day's OHLC.
    #[must_use]
    pub fn counts_for_day(&self) -> bool {
        !matches!(self, Self::Negative)
    }
}

/// A reconciled quote with its volume outcome.
#[derive(Debug, Clone, PartialEq)]
pub struct VolumePoint {
    pub timestamp: DateTime<Utc>,
    pub price: Decimal,
    pub cumulative_volume: Option<i64>,
    pub outcome: VolumeOutcome,
}

/// Per-symbol carry within one trading day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VolumeState {
    pub day: NaiveDate,
    pub last_timestamp: Option<DateTime<Utc>>,
    /// Last accepted cumulative volume, `None` before the first one
    pub last_cumulative: Option<i64>,
}

impl VolumeState {
    #[must_use]
    pub fn starting(day: NaiveDate) -> Self {
        Self {
            day,
            last_timestamp: None,
            last_cumulative: None,
        }
    }

    /// Classifies one reading and advances the carry when it is accepted.
    ///
    /// The carry restarts on a new day, and when a reading is not later than
    /// the last one seen (the day is being replayed).
    pub fn step(&mut self, timestamp: DateTime<Utc>, cumulative: Option<i64>) -> VolumeOutcome {
        let day = timestamp.date_naive();
        let replayed = self.last_timestamp.is_some_and(|last| timestamp <= last);
        if day != self.day || replayed {
            *self = Self::starting(day);
        }
        self.last_timestamp = Some(timestamp);

        let Some(cumulative) = cumulative else {
            return VolumeOutcome::Valid(0);
        };

        let delta = cumulative - self.last_cumulative.unwrap_or(0);
        if delta < 0 {
            return VolumeOutcome::Negative;
        }

        self.last_cumulative = Some(cumulative);
        if cumulative > MAX_STORABLE_VOLUME || delta > MAX_STORABLE_VOLUME {
            VolumeOutcome::Overflow
        } else {
            VolumeOutcome::Valid(delta)
        }
    }
}

/// Volume carry for every symbol.
#[derive(Debug, Default, Clone)]
pub struct VolumeCarry {
    states: HashMap<String, VolumeState>,
}

impl VolumeCarry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Computes the outcome of each quote of a time-ordered series.
    pub fn apply(&mut self, symbol: &str, quotes: &[ReconciledQuote]) -> Vec<VolumePoint> {
        let Some(first) = quotes.first() else {
            return Vec::new();
        };

        let state = self
            .states
            .entry(symbol.to_string())
            .or_insert_with(|| VolumeState::starting(first.timestamp.date_naive()));

        quotes
            .iter()
            .map(|quote| VolumePoint {
                timestamp: quote.timestamp,
                price: quote.price,
                cumulative_volume: quote.cumulative_volume,
                outcome: state.step(quote.timestamp, quote.cumulative_volume),
            })
            .collect()
    }
}
