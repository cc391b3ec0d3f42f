//! Error types for Glucoflux

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Errors that can occur during import or computation
#[derive(Debug, Error)]
pub enum ComputeError {
    #[error("Failed to parse import payload: {0}")]
    ParseError(String),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Invalid CSV: {0}")]
    CsvError(#[from] csv::Error),

    #[error("Malformed record: {0}")]
    MalformedRecord(String),

    #[error("Date parse error: {0}")]
    DateParseError(String),

    #[error("No CGM baseline in correlation window for event at {0}")]
    MissingBaseline(DateTime<Utc>),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Unsupported import source: {0}")]
    UnsupportedSource(String),
}
