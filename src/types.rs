//! Core types for the Glucoflux pipeline
//!
//! This module defines the data structures that flow through each stage of the
//! pipeline: canonical log entries, derived event excursions, aggregate
//! statistics and the encoded analytics report.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::units::Settings;

/// Import source identifier for provenance tracking
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    LibreView,
    MySugr,
    Records,
}

impl Source {
    pub fn as_str(&self) -> &'static str {
        match self {
            Source::LibreView => "libreview",
            Source::MySugr => "mysugr",
            Source::Records => "records",
        }
    }
}

/// Discrete event kinds that can be attached to a log entry.
///
/// Serialized as a snake_case name. Deserialization also accepts the legacy
/// numeric index (position in `EventType::ALL`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    Fasting,
    Breakfast,
    Lunch,
    Dinner,
    Snack,
    Sport,
}

impl<'de> Deserialize<'de> for EventType {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        use serde::de::{self, Unexpected, Visitor};
        use std::fmt;

        const NAMES: &[&str] = &["fasting", "breakfast", "lunch", "dinner", "snack", "sport"];

        struct EventTypeVisitor;

        impl<'de> Visitor<'de> for EventTypeVisitor {
            type Value = EventType;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("an event type name or an index from 0 to 5")
            }

            fn visit_u64<E>(self, value: u64) -> Result<EventType, E>
            where
                E: de::Error,
            {
                usize::try_from(value)
                    .ok()
                    .and_then(|index| EventType::ALL.get(index).copied())
                    .ok_or_else(|| E::invalid_value(Unexpected::Unsigned(value), &self))
            }

            fn visit_i64<E>(self, value: i64) -> Result<EventType, E>
            where
                E: de::Error,
            {
                match u64::try_from(value) {
                    Ok(index) => self.visit_u64(index),
                    Err(_) => Err(E::invalid_value(Unexpected::Signed(value), &self)),
                }
            }

            fn visit_str<E>(self, value: &str) -> Result<EventType, E>
            where
                E: de::Error,
            {
                NAMES
                    .iter()
                    .position(|name| *name == value)
                    .map(|index| EventType::ALL[index])
                    .ok_or_else(|| E::unknown_variant(value, NAMES))
            }
        }

        deserializer.deserialize_any(EventTypeVisitor)
    }
}

impl EventType {
    /// Every event type, in declaration order
    pub const ALL: [EventType; 6] = [
        EventType::Fasting,
        EventType::Breakfast,
        EventType::Lunch,
        EventType::Dinner,
        EventType::Snack,
        EventType::Sport,
    ];

    /// Event types that get a per-type summary row
    pub const SUMMARIZED: [EventType; 5] = [
        EventType::Breakfast,
        EventType::Lunch,
        EventType::Dinner,
        EventType::Snack,
        EventType::Sport,
    ];

    /// Display name
    pub fn name(&self) -> &'static str {
        match self {
            EventType::Fasting => "Fasting",
            EventType::Breakfast => "Breakfast",
            EventType::Lunch => "Lunch",
            EventType::Dinner => "Dinner",
            EventType::Snack => "Snack",
            EventType::Sport => "Sport",
        }
    }

    /// Display colour used for event bands on charts
    pub fn color(&self) -> &'static str {
        match self {
            EventType::Breakfast | EventType::Lunch | EventType::Dinner => "#B3F7CA",
            EventType::Snack => "#E0F7B3",
            EventType::Sport => "#B3F7EC",
            EventType::Fasting => "#B3E0F7",
        }
    }
}

/// One instant-in-time observation or event in the canonical log.
///
/// `cgm`, `bgm` and `event_type` are independent facets: a single entry can be
/// a meter reading and a meal at the same time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    /// Observation time (UTC)
    pub date: DateTime<Utc>,
    /// Continuous glucose value (mmol/L)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cgm: Option<f64>,
    /// Blood glucose meter value (mmol/L)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bgm: Option<f64>,
    /// Event kind, if this entry marks a meal or exercise
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub event_type: Option<EventType>,
    /// Free text note
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    /// First meter reading of its calendar day (derived during normalization)
    #[serde(default)]
    pub is_fasting: bool,
}

impl LogEntry {
    /// Create a bare entry with no facets set
    pub fn new(date: DateTime<Utc>) -> Self {
        Self {
            date,
            cgm: None,
            bgm: None,
            event_type: None,
            note: None,
            is_fasting: false,
        }
    }

    /// Create a CGM sample
    pub fn cgm(date: DateTime<Utc>, value: f64) -> Self {
        Self {
            cgm: Some(value),
            ..Self::new(date)
        }
    }

    /// Create a BGM reading
    pub fn bgm(date: DateTime<Utc>, value: f64) -> Self {
        Self {
            bgm: Some(value),
            ..Self::new(date)
        }
    }

    /// Create an event marker
    pub fn event(date: DateTime<Utc>, event_type: EventType) -> Self {
        Self {
            event_type: Some(event_type),
            ..Self::new(date)
        }
    }

    /// Attach a note
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    /// Attach an event type
    pub fn with_event(mut self, event_type: EventType) -> Self {
        self.event_type = Some(event_type);
        self
    }

    /// Whether the entry carries at least one reading or event facet
    pub fn has_facet(&self) -> bool {
        self.cgm.is_some() || self.bgm.is_some() || self.event_type.is_some()
    }
}

/// A timestamped numeric sample (used for series rendering and segmentation)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub date: DateTime<Utc>,
    pub value: f64,
}

impl Sample {
    pub fn new(date: DateTime<Utc>, value: f64) -> Self {
        Self { date, value }
    }
}

/// One point of an event excursion curve, relative to the window baseline
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OffsetPoint {
    /// Milliseconds since the baseline sample
    pub elapsed_ms: i64,
    /// Signed concentration change since the baseline sample (mmol/L)
    pub delta: f64,
}

/// Glucose response following a single event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEntry {
    /// Event time (UTC)
    pub date: DateTime<Utc>,
    #[serde(rename = "type")]
    pub event_type: EventType,
    pub note: Option<String>,
    /// CGM curve relative to the first sample in the window
    pub offset_cgm: Vec<OffsetPoint>,
    /// Largest-magnitude deviation inside the peak window
    pub max_delta: Option<f64>,
    /// Elapsed milliseconds at which `max_delta` first occurs
    pub time_delta: Option<i64>,
}

/// Aggregated response statistics for one event type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventTypeSummary {
    #[serde(rename = "type")]
    pub event_type: EventType,
    pub event_count: usize,
    /// Mean time-to-peak over events with a defined peak (ms)
    pub mean_time_delta_ms: Option<f64>,
    /// Mean peak deviation over events with a defined peak (mmol/L)
    pub mean_max_delta: Option<f64>,
}

/// Difference between a meter reading and the CGM trace right after it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BgmCalibration {
    pub date: DateTime<Utc>,
    pub bgm: f64,
    /// Mean CGM value in the calibration window
    pub cgm_average: Option<f64>,
    /// `cgm_average - bgm`
    pub delta: Option<f64>,
}

/// Estimated average glucose and its A1C approximation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EagSummary {
    /// Approximate A1C (%)
    pub a1c: f64,
    /// Mean CGM value (mmol/L)
    pub average_cgm: f64,
    pub sample_count: usize,
}

/// Smoothed fasting trend point
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrendPoint {
    pub date: DateTime<Utc>,
    pub value: f64,
}

/// Five-number summary of a sample set
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoxStats {
    pub min: f64,
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
    pub max: f64,
}

/// Box statistics of the CGM values of one calendar day
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DailyBoxStats {
    pub day: NaiveDate,
    pub sample_count: usize,
    pub stats: BoxStats,
}

/// Report producer metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportProducer {
    pub name: String,
    pub version: String,
    pub instance_id: String,
}

/// Time span covered by a report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportWindow {
    pub from_utc: Option<String>,
    pub to_utc: Option<String>,
    pub entry_count: usize,
}

/// Complete analytics report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyticsReport {
    pub report_version: String,
    pub producer: ReportProducer,
    pub computed_at_utc: String,
    pub window: ReportWindow,
    pub settings: Settings,
    pub eag: EagSummary,
    pub fasting_trend: Vec<TrendPoint>,
    pub daily_boxes: Vec<DailyBoxStats>,
    pub events: Vec<EventEntry>,
    pub event_summaries: Vec<EventTypeSummary>,
    pub cgm_segments: Vec<Vec<Sample>>,
    /// Box statistics of each entry of `cgm_segments`
    pub segment_boxes: Vec<BoxStats>,
    pub calibrations: Vec<BgmCalibration>,
}
