//! Import adapters
//!
//! This module provides adapters that parse vendor exports and map them to
//! canonical log entries. Every adapter rejects structurally malformed rows
//! instead of letting them reach the merge stage.

mod libreview;
mod mysugr;
mod records;

pub use libreview::LibreViewAdapter;
pub use mysugr::MySugrAdapter;
pub use records::RecordsAdapter;

use chrono::{FixedOffset, NaiveDateTime, TimeZone, Utc};

use crate::error::ComputeError;
use crate::types::{LogEntry, Source};

/// Trait for import adapters
pub trait ImportAdapter {
    /// Source identifier for provenance
    fn source(&self) -> Source;

    /// Parse a raw export into log entries.
    ///
    /// `offset` is the UTC offset that naive local timestamps in the export are
    /// interpreted in.
    fn parse(&self, raw: &str, offset: FixedOffset) -> Result<Vec<LogEntry>, ComputeError>;
}

/// Look up an adapter by source name (`libreview`, `mysugr`, `records`)
pub fn adapter_for(name: &str) -> Result<Box<dyn ImportAdapter>, ComputeError> {
    match name.trim().to_ascii_lowercase().as_str() {
        "libreview" => Ok(Box::new(LibreViewAdapter)),
        "mysugr" => Ok(Box::new(MySugrAdapter::default())),
        "records" | "json" | "ndjson" => Ok(Box::new(RecordsAdapter)),
        other => Err(ComputeError::UnsupportedSource(other.to_string())),
    }
}

/// Build a headerless, flexible CSV reader over an export
fn csv_reader(raw: &str) -> csv::Reader<&[u8]> {
    csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(raw.as_bytes())
}

/// Interpret a naive local timestamp in `offset`
fn localize(naive: NaiveDateTime, offset: FixedOffset) -> Option<chrono::DateTime<Utc>> {
    offset
        .from_local_datetime(&naive)
        .single()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Parse a glucose value, accepting a decimal comma
fn parse_reading(field: &str) -> Option<f64> {
    let value: f64 = field.trim().replace(',', ".").parse().ok()?;
    (value.is_finite() && value > 0.0).then_some(value)
}

/// Parse offsets such as `+02:00`, `-0530`, `UTC+1` or `GMT-03:30`
fn parse_utc_offset(field: &str) -> Option<FixedOffset> {
    let trimmed = field.trim();
    let body = trimmed
        .strip_prefix("UTC")
        .or_else(|| trimmed.strip_prefix("GMT"))
        .unwrap_or(trimmed);

    if body.is_empty() {
        return if trimmed.is_empty() {
            None
        } else {
            FixedOffset::east_opt(0)
        };
    }

    let (sign, digits) = match body.as_bytes()[0] {
        b'+' => (1, &body[1..]),
        b'-' => (-1, &body[1..]),
        _ => return None,
    };

    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit() || b == b':') {
        return None;
    }

    let (hours, minutes) = match digits.split_once(':') {
        Some((h, m)) => (h.parse::<u32>().ok()?, m.parse::<u32>().ok()?),
        None if digits.len() > 2 => {
            let (h, m) = digits.split_at(digits.len() - 2);
            (h.parse::<u32>().ok()?, m.parse::<u32>().ok()?)
        }
        None => (digits.parse::<u32>().ok()?, 0),
    };

    if hours > 23 || minutes >= 60 {
        return None;
    }
    let seconds = (hours * 3600 + minutes * 60) as i32;
    FixedOffset::east_opt(sign * seconds)
}
