//! glucose.raw_record.v1 schema definition
//!
//! The canonical intermediate record every import path produces before merge.
//! All fields are optional on the wire so that malformed records can be
//! reported instead of failing the whole payload at deserialization.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{EventType, LogEntry};

/// Current schema version
pub const SCHEMA_VERSION: &str = "glucose.raw_record.v1";

/// One imported reading or event, before validation
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawRecord {
    /// Optional record identifier, echoed in validation reports
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record_id: Option<String>,
    /// Observation time (UTC); required
    #[serde(default)]
    pub date: Option<DateTime<Utc>>,
    /// Continuous glucose value (mmol/L)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cgm: Option<f64>,
    /// Blood glucose meter value (mmol/L)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bgm: Option<f64>,
    /// Event kind
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub event_type: Option<EventType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl RawRecord {
    /// Check the record can enter the canonical log
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.date.is_none() {
            return Err(ValidationError::MissingDate);
        }

        for (field, value) in [("cgm", self.cgm), ("bgm", self.bgm)] {
            if let Some(v) = value {
                if !v.is_finite() || v < 0.0 {
                    return Err(ValidationError::InvalidReading {
                        field: field.to_string(),
                        value: v,
                    });
                }
            }
        }

        if self.cgm.is_none() && self.bgm.is_none() && self.event_type.is_none() {
            return Err(ValidationError::NoFacet);
        }

        Ok(())
    }

    /// Validate and convert into a log entry
    pub fn into_entry(self) -> Result<LogEntry, ValidationError> {
        self.validate()?;
        let date = self.date.ok_or(ValidationError::MissingDate)?;

        Ok(LogEntry {
            date,
            cgm: self.cgm,
            bgm: self.bgm,
            event_type: self.event_type,
            note: self.note,
            is_fasting: false,
        })
    }
}

impl From<&LogEntry> for RawRecord {
    fn from(entry: &LogEntry) -> Self {
        RawRecord {
            record_id: None,
            date: Some(entry.date),
            cgm: entry.cgm,
            bgm: entry.bgm,
            event_type: entry.event_type,
            note: entry.note.clone(),
        }
    }
}

/// Validation errors for raw records
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("record has no date")]
    MissingDate,

    #[error("record carries no cgm, bgm or event type")]
    NoFacet,

    #[error("invalid {field} reading: {value}")]
    InvalidReading { field: String, value: f64 },
}
