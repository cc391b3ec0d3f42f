//! Canonical record import
//!
//! Accepts glucose.raw_record.v1 payloads either as a JSON array or as NDJSON.
//! Record timestamps are absolute, so the configured offset is not consulted.

use chrono::FixedOffset;

use super::ImportAdapter;
use crate::error::ComputeError;
use crate::schema::RecordAdapter;
use crate::types::{LogEntry, Source};

/// JSON / NDJSON record adapter
pub struct RecordsAdapter;

impl ImportAdapter for RecordsAdapter {
    fn source(&self) -> Source {
        Source::Records
    }

    fn parse(&self, raw: &str, _offset: FixedOffset) -> Result<Vec<LogEntry>, ComputeError> {
        let records = if raw.trim_start().starts_with('[') {
            RecordAdapter::parse_array(raw)?
        } else {
            RecordAdapter::parse_ndjson(raw)?
        };
        RecordAdapter::to_entries(records)
    }
}
