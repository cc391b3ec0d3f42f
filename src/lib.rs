//! Glucoflux - In-memory glucose analytics engine
//!
//! Glucoflux fuses continuous glucose monitor (CGM) samples, blood glucose
//! meter (BGM) readings and logged events into one canonical log, then derives
//! analytics from it through a deterministic pipeline: import adaptation →
//! merge and normalization → event correlation, segmentation and statistics →
//! report encoding.
//!
//! ## Modules
//!
//! - **Import**: LibreView and mySugr CSV exports, canonical JSON/NDJSON records
//! - **Canonical log**: Ordered, deduplicated, fasting-flagged entries
//! - **Analytics**: Event excursions, CGM segments, eAG/A1C, fasting trend, quartiles
//! - **Presentation**: mmol/L to mg/dL display conversion

pub mod adapters;
pub mod config;
pub mod encoder;
pub mod error;
pub mod excursion;
pub mod normalizer;
pub mod pipeline;
pub mod schema;
pub mod segments;
pub mod stats;
pub mod types;
pub mod units;

pub use config::{AnalyticsConfig, BaselinePolicy};
pub use error::ComputeError;
pub use excursion::{correlate, Correlator};
pub use normalizer::{merge, normalize, Normalizer};
pub use pipeline::{analyze_log_json, GlucoseProcessor};
pub use segments::segment;
pub use stats::{eswa, estimated_average_glucose};
pub use types::{EventEntry, EventType, LogEntry, Sample};
pub use units::{convert_unit, GlucoseUnit, Settings};

// Schema exports
pub use schema::{RawRecord, RecordAdapter, SCHEMA_VERSION};

/// Glucoflux version embedded in all reports
pub const GLUCOFLUX_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name for reports
pub const PRODUCER_NAME: &str = "glucoflux";
