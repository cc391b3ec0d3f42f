//! LibreView CGM export adapter
//!
//! Parses the LibreView CSV export. The first two rows are a title line and the
//! column header; every following row is one device record:
//!
//! | column | content                                  |
//! |--------|------------------------------------------|
//! | 2      | device timestamp, `DD-MM-YYYY HH:MM`      |
//! | 3      | record type (0 historic, 1 scan, ...)    |
//! | 4      | historic glucose (mmol/L)                |
//! | 5      | scan glucose (mmol/L)                    |

use chrono::{FixedOffset, NaiveDateTime};

use super::{csv_reader, localize, parse_reading, ImportAdapter};
use crate::error::ComputeError;
use crate::types::{LogEntry, Source};

const HEADER_ROWS: usize = 2;
const TIMESTAMP_COLUMN: usize = 2;
const RECORD_TYPE_COLUMN: usize = 3;
const HISTORIC_COLUMN: usize = 4;
const SCAN_COLUMN: usize = 5;
const TIMESTAMP_FORMAT: &str = "%d-%m-%Y %H:%M";

/// LibreView export adapter
pub struct LibreViewAdapter;

impl ImportAdapter for LibreViewAdapter {
    fn source(&self) -> Source {
        Source::LibreView
    }

    fn parse(&self, raw: &str, offset: FixedOffset) -> Result<Vec<LogEntry>, ComputeError> {
        let mut entries = Vec::new();
        let mut skipped = 0usize;

        let mut reader = csv_reader(raw);
        for (row, record) in reader.records().enumerate().skip(HEADER_ROWS) {
            let record = record?;

            let record_type = record.get(RECORD_TYPE_COLUMN).unwrap_or("");
            if record_type != "0" && record_type != "1" {
                continue;
            }

            let timestamp = record.get(TIMESTAMP_COLUMN).unwrap_or("");
            let date = NaiveDateTime::parse_from_str(timestamp, TIMESTAMP_FORMAT)
                .ok()
                .and_then(|naive| localize(naive, offset))
                .ok_or_else(|| {
                    ComputeError::MalformedRecord(format!(
                        "libreview row {}: invalid timestamp '{}'",
                        row + 1,
                        timestamp
                    ))
                })?;

            let value = record
                .get(HISTORIC_COLUMN)
                .and_then(parse_reading)
                .or_else(|| record.get(SCAN_COLUMN).and_then(parse_reading));

            match value {
                Some(cgm) => entries.push(LogEntry::cgm(date, cgm)),
                None => skipped += 1,
            }
        }

        tracing::debug!(
            entries = entries.len(),
            skipped,
            "parsed libreview export"
        );

        Ok(entries)
    }
}
