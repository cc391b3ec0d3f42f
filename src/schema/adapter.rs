//! Adapter for converting glucose.raw_record.v1 payloads to log entries
//!
//! Structural problems are rejected here so that nothing malformed reaches
//! the merge stage.

use crate::error::ComputeError;
use crate::schema::raw_record::{RawRecord, ValidationError};
use crate::types::LogEntry;

/// Adapter for converting raw records to log entries
pub struct RecordAdapter;

impl RecordAdapter {
    /// Parse a JSON string containing an array of RawRecords
    pub fn parse_array(json: &str) -> Result<Vec<RawRecord>, ComputeError> {
        let records: Vec<RawRecord> = serde_json::from_str(json)?;
        Ok(records)
    }

    /// Parse NDJSON (newline-delimited JSON) containing RawRecords
    pub fn parse_ndjson(ndjson: &str) -> Result<Vec<RawRecord>, ComputeError> {
        let mut records = Vec::new();
        for (line_num, line) in ndjson.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            match serde_json::from_str::<RawRecord>(trimmed) {
                Ok(record) => records.push(record),
                Err(e) => {
                    return Err(ComputeError::ParseError(format!(
                        "Failed to parse line {}: {}",
                        line_num + 1,
                        e
                    )));
                }
            }
        }
        Ok(records)
    }

    /// Convert raw records to log entries, failing on the first malformed record
    pub fn to_entries(records: Vec<RawRecord>) -> Result<Vec<LogEntry>, ComputeError> {
        records
            .into_iter()
            .enumerate()
            .map(|(index, record)| {
                let record_id = record.record_id.clone();
                record.into_entry().map_err(|e| {
                    tracing::warn!(index, record_id = ?record_id, error = %e, "rejected record");
                    ComputeError::MalformedRecord(format!("record {index}: {e}"))
                })
            })
            .collect()
    }

    /// Validate a batch of records
    pub fn validate_records(records: &[RawRecord]) -> Vec<ValidationResult> {
        records
            .iter()
            .enumerate()
            .filter_map(|(index, record)| {
                record.validate().err().map(|error| ValidationResult {
                    index,
                    record_id: record.record_id.clone(),
                    error,
                })
            })
            .collect()
    }
}

/// A record that failed validation
#[derive(Debug)]
pub struct ValidationResult {
    pub index: usize,
    pub record_id: Option<String>,
    pub error: ValidationError,
}
