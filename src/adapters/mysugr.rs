//! mySugr logbook export adapter
//!
//! The mySugr CSV export has a single header row. Column 0 holds the date,
//! column 1 the time of day and column 3 the meter reading. Rows without a
//! reading (boluses, notes, carbs) are ignored. Column 25, when present,
//! carries the device UTC offset and overrides the configured one.

use chrono::{FixedOffset, NaiveDateTime};

use super::{csv_reader, localize, parse_reading, parse_utc_offset, ImportAdapter};
use crate::error::ComputeError;
use crate::types::{LogEntry, Source};
use crate::units::{GlucoseUnit, MMOL_TO_MGDL};

const HEADER_ROWS: usize = 1;
const DATE_COLUMN: usize = 0;
const TIME_COLUMN: usize = 1;
const READING_COLUMN: usize = 3;
const OFFSET_COLUMN: usize = 25;

const DATE_FORMATS: [&str; 6] = [
    "%b %d, %Y %I:%M:%S %p",
    "%b %d, %Y %H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%d.%m.%Y %H:%M:%S",
    "%d.%m.%Y %H:%M",
];

/// mySugr export adapter
#[derive(Debug, Clone, Copy, Default)]
pub struct MySugrAdapter {
    unit: GlucoseUnit,
}

impl MySugrAdapter {
    /// Adapter for an export whose readings are in `unit`
    pub fn with_unit(unit: GlucoseUnit) -> Self {
        Self { unit }
    }

    fn to_mmol(&self, value: f64) -> f64 {
        match self.unit {
            GlucoseUnit::MmolL => value,
            GlucoseUnit::MgDl => value / MMOL_TO_MGDL,
        }
    }
}

fn parse_local(date: &str, time: &str) -> Option<NaiveDateTime> {
    let joined = format!("{} {}", date, time);
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(&joined, format).ok())
}

impl ImportAdapter for MySugrAdapter {
    fn source(&self) -> Source {
        Source::MySugr
    }

    fn parse(&self, raw: &str, offset: FixedOffset) -> Result<Vec<LogEntry>, ComputeError> {
        let mut entries = Vec::new();

        let mut reader = csv_reader(raw);
        for (row, record) in reader.records().enumerate().skip(HEADER_ROWS) {
            let record = record?;

            let Some(value) = record.get(READING_COLUMN).and_then(parse_reading) else {
                continue;
            };

            let row_offset = record
                .get(OFFSET_COLUMN)
                .and_then(parse_utc_offset)
                .unwrap_or(offset);

            let date_field = record.get(DATE_COLUMN).unwrap_or("");
            let time_field = record.get(TIME_COLUMN).unwrap_or("");
            let date = parse_local(date_field, time_field)
                .and_then(|naive| localize(naive, row_offset))
                .ok_or_else(|| {
                    ComputeError::MalformedRecord(format!(
                        "mysugr row {}: invalid date '{} {}'",
                        row + 1,
                        date_field,
                        time_field
                    ))
                })?;

            entries.push(LogEntry::bgm(date, self.to_mmol(value)));
        }

        tracing::debug!(entries = entries.len(), unit = self.unit.label(), "parsed mysugr export");

        Ok(entries)
    }
}
