//! Raw quote file parser.
//!
//! Reads one upstream dump (CSV with a header row) into strictly typed
//! [`RawQuote`] records. Lines that do not conform are skipped and counted;
//! they never fail the file.
//!
//! Expected columns (case-insensitive, any order):
//!
//! ```text
//! symbol,timestamp,last,volume,name,market
//! ```
//!
//! `price` is accepted in place of `last`. `timestamp`, `volume` and `name`
//! are optional; a missing timestamp falls back to the one encoded in the
//! file name (`<market> YYYY-MM-DD HH:MM:SS[.ffffff].<ext>`). The market tag
//! is ignored.

use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use thiserror::Error;
use tracing::{debug, warn};

/// Why a file or a line was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// The header lacks a required column.
    #[error("missing required column: {0}")]
    MissingColumn(&'static str),

    /// The symbol field is empty.
    #[error("empty symbol")]
    EmptySymbol,

    /// The price field holds no number.
    #[error("invalid price: {0:?}")]
    InvalidPrice(String),

    /// The volume field is not an integer.
    #[error("invalid volume: {0:?}")]
    InvalidVolume(String),

    /// The volume field is below zero.
    #[error("negative volume: {0}")]
    NegativeVolume(i64),

    /// The timestamp field has an unknown format.
    #[error("invalid timestamp: {0:?}")]
    InvalidTimestamp(String),

    /// Neither the line nor the file name carries a timestamp.
    #[error("no timestamp in line or file name")]
    MissingTimestamp,

    /// The line could not be split into fields.
    #[error("malformed line: {0}")]
    Malformed(String),
}

/// One normalized quote reading from one source file.
#[derive(Debug, Clone, PartialEq)]
pub struct RawQuote {
    pub symbol: String,
    /// Observation instant, millisecond precision
    pub timestamp: DateTime<Utc>,
    pub price: Decimal,
    /// Volume traded since market open, if reported
    pub cumulative_volume: Option<i64>,
    /// Company name declared by the source
    pub name: String,
    /// Source file identifier
    pub source: Arc<str>,
}

/// Result of parsing one file.
#[derive(Debug, Default)]
pub struct ParsedFile {
    pub quotes: Vec<RawQuote>,
    /// Number of lines rejected
    pub skipped: usize,
}

#[derive(Debug, Clone, Copy)]
struct Columns {
    symbol: usize,
    price: usize,
    timestamp: Option<usize>,
    volume: Option<usize>,
    name: Option<usize>,
}

impl Columns {
    fn from_headers(headers: &csv::StringRecord) -> Result<Self, ParseError> {
        let find = |names: &[&str]| {
            headers
                .iter()
                .position(|h| names.iter().any(|n| h.trim().eq_ignore_ascii_case(n)))
        };

        Ok(Self {
            symbol: find(&["symbol"]).ok_or(ParseError::MissingColumn("symbol"))?,
            price: find(&["last", "price"]).ok_or(ParseError::MissingColumn("last"))?,
            timestamp: find(&["timestamp", "date"]),
            volume: find(&["volume"]),
            name: find(&["name"]),
        })
    }
}

/// Parses one file from disk.
///
/// `fallback` is used for lines without a timestamp; when `None`, the
/// timestamp encoded in the file name is tried.
///
/// # Errors
/// Returns an error if the file cannot be read, or a [`ParseError`] if its
/// header lacks a required column.
pub fn parse_file(path: &Path, fallback: Option<DateTime<Utc>>) -> Result<ParsedFile> {
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let source: Arc<str> = Arc::from(path.to_string_lossy().as_ref());
    let fallback = fallback.or_else(|| timestamp_from_file_name(path));

    let parsed = parse_reader(file, source, fallback)
        .with_context(|| format!("Failed to parse {}", path.display()))?;

    if parsed.skipped > 0 {
        warn!(
            file = %path.display(),
            skipped = parsed.skipped,
            kept = parsed.quotes.len(),
            "Skipped malformed lines"
        );
    }

    Ok(parsed)
}

/// Parses CSV quote data from any reader.
///
/// # Errors
/// Returns [`ParseError::MissingColumn`] if the header lacks `symbol` or
/// `last`/`price`, or an I/O error if the header cannot be read.
pub fn parse_reader<R: Read>(
    reader: R,
    source: Arc<str>,
    fallback: Option<DateTime<Utc>>,
) -> Result<ParsedFile> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = csv_reader.headers().context("Failed to read header")?.clone();
    let columns = Columns::from_headers(&headers)?;

    let mut parsed = ParsedFile::default();
    for (index, result) in csv_reader.records().enumerate() {
        let line = index + 2;
        let quote = result
            .map_err(|e| ParseError::Malformed(e.to_string()))
            .and_then(|record| parse_record(&record, columns, &source, fallback));

        match quote {
            Ok(quote) => parsed.quotes.push(quote),
            Err(e) => {
                debug!(source = %source, line, error = %e, "Skipping line");
                parsed.skipped += 1;
            }
        }
    }

    Ok(parsed)
}

fn parse_record(
    record: &csv::StringRecord,
    columns: Columns,
    source: &Arc<str>,
    fallback: Option<DateTime<Utc>>,
) -> Result<RawQuote, ParseError> {
    let field = |index: Option<usize>| index.and_then(|i| record.get(i)).unwrap_or("");

    let symbol = field(Some(columns.symbol));
    if symbol.is_empty() {
        return Err(ParseError::EmptySymbol);
    }

    let raw_price = field(Some(columns.price));
    let price = floatify(raw_price).ok_or_else(|| ParseError::InvalidPrice(raw_price.to_string()))?;

    let raw_timestamp = field(columns.timestamp);
    let timestamp = if raw_timestamp.is_empty() {
        fallback.ok_or(ParseError::MissingTimestamp)?
    } else {
        parse_timestamp(raw_timestamp)?
    };

    let cumulative_volume = parse_volume(field(columns.volume))?;

    let name = match field(columns.name) {
        "" => symbol.to_string(),
        name => name.to_string(),
    };

    Ok(RawQuote {
        symbol: symbol.to_string(),
        timestamp: truncate_to_millis(timestamp),
        price,
        cumulative_volume,
        name,
        source: Arc::clone(source),
    })
}

/// Extracts a price from a loosely formatted field.
///
/// Everything other than digits and `.` is dropped, so thousands separators
/// and trailing markers are tolerated: `"12 222.222"` and `"34.23 (c)"` both
/// parse.
#[must_use]
pub fn floatify(raw: &str) -> Option<Decimal> {
    let cleaned: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect();

    if cleaned.is_empty() {
        return None;
    }
    Decimal::from_str(&cleaned).ok()
}

/// Parses a cumulative volume. Empty means not reported.
///
/// # Errors
/// Returns an error for non-integral or negative values.
pub fn parse_volume(raw: &str) -> Result<Option<i64>, ParseError> {
    let cleaned: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
    if cleaned.is_empty() {
        return Ok(None);
    }

    let volume = match cleaned.parse::<i64>() {
        Ok(v) => v,
        Err(_) => Decimal::from_str(&cleaned)
            .ok()
            .filter(|d| d.fract().is_zero())
            .and_then(|d| d.to_i64())
            .ok_or_else(|| ParseError::InvalidVolume(raw.to_string()))?,
    };

    if volume < 0 {
        return Err(ParseError::NegativeVolume(volume));
    }
    Ok(Some(volume))
}

/// Parses `YYYY-MM-DD HH:MM:SS[.fff]`, its `T`-separated form, or RFC 3339.
///
/// Naive timestamps are taken as UTC.
///
/// # Errors
/// Returns [`ParseError::InvalidTimestamp`] for any other format.
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, ParseError> {
    const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];

    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Ok(truncate_to_millis(naive.and_utc()));
        }
    }

    DateTime::parse_from_rfc3339(raw)
        .map(|ts| truncate_to_millis(ts.with_timezone(&Utc)))
        .map_err(|_| ParseError::InvalidTimestamp(raw.to_string()))
}

/// Reads the timestamp encoded in an upstream file name.
///
/// `"paris 2020-01-02 09:02:02.532411.csv"` yields 2020-01-02 09:02:02.532.
#[must_use]
pub fn timestamp_from_file_name(path: &Path) -> Option<DateTime<Utc>> {
    let file_name = path.file_name()?.to_str()?;
    let mut parts = file_name.rsplitn(3, ' ');
    let time = parts.next()?;
    let date = parts.next()?;
    let rest = format!("{date} {time}");

    let without_extension = rest.rsplit_once('.').map_or(rest.as_str(), |(stem, _)| stem);
    parse_timestamp(without_extension)
        .or_else(|_| parse_timestamp(&rest))
        .ok()
}

fn truncate_to_millis(ts: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ts.timestamp_millis()).unwrap_or(ts)
}
