//! Event excursion correlation
//!
//! This module correlates discrete events (meals, exercise) with the CGM trace
//! that follows them:
//! - Offset curves relative to the first CGM sample after the event
//! - Peak deviation and time-to-peak inside the peak window
//! - Per-type response summaries
//! - Meter versus sensor calibration deltas

use chrono::{DateTime, Duration, Utc};

use crate::config::{
    AnalyticsConfig, BaselinePolicy, DEFAULT_PEAK_HOURS, DEFAULT_WINDOW_HOURS, MAX_WINDOW_HOURS,
};
use crate::error::ComputeError;
use crate::types::{BgmCalibration, EventEntry, EventType, EventTypeSummary, LogEntry, OffsetPoint};

/// Correlator for computing per-event excursion curves
#[derive(Debug, Clone, Copy)]
pub struct Correlator {
    window: Duration,
    peak_window_ms: i64,
    policy: BaselinePolicy,
}

impl Default for Correlator {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW_HOURS, DEFAULT_PEAK_HOURS, BaselinePolicy::Skip)
    }
}

impl Correlator {
    /// Create a correlator with explicit window lengths (hours).
    ///
    /// Lengths are clamped to `0..=MAX_WINDOW_HOURS`.
    pub fn new(window_hours: i64, peak_hours: i64, policy: BaselinePolicy) -> Self {
        Self {
            window: Duration::hours(window_hours.clamp(0, MAX_WINDOW_HOURS)),
            peak_window_ms: Duration::hours(peak_hours.clamp(0, MAX_WINDOW_HOURS)).num_milliseconds(),
            policy,
        }
    }

    /// Create a correlator from pipeline configuration
    pub fn from_config(config: &AnalyticsConfig) -> Self {
        Self::new(config.window_hours, config.peak_hours, config.baseline_policy)
    }

    /// Correlate every typed entry of `log` with the CGM samples that follow it.
    ///
    /// Events without any CGM sample in their window are dropped under
    /// `BaselinePolicy::Skip` and rejected under `BaselinePolicy::Strict`.
    pub fn correlate(&self, log: &[LogEntry]) -> Result<Vec<EventEntry>, ComputeError> {
        let mut events = Vec::new();

        for entry in log.iter().filter(|e| e.event_type.is_some()) {
            match self.correlate_event(entry, log) {
                Some(event) => events.push(event),
                None => match self.policy {
                    BaselinePolicy::Skip => {
                        tracing::debug!(date = %entry.date, "no CGM baseline for event, skipping");
                    }
                    BaselinePolicy::Strict => return Err(ComputeError::MissingBaseline(entry.date)),
                },
            }
        }

        tracing::debug!(events = events.len(), "correlated events");
        Ok(events)
    }

    /// Build the excursion for a single event entry.
    ///
    /// Returns `None` when the entry carries no event type or no CGM sample
    /// falls inside `[event.date, event.date + window]`.
    pub fn correlate_event(&self, event: &LogEntry, log: &[LogEntry]) -> Option<EventEntry> {
        let event_type = event.event_type?;
        let start = event.date;
        let end = start + self.window;

        let window: Vec<(DateTime<Utc>, f64)> = log
            .iter()
            .filter(|e| start <= e.date && e.date <= end)
            .filter_map(|e| e.cgm.map(|cgm| (e.date, cgm)))
            .collect();

        let &(base_date, base_cgm) = window.first()?;

        let offset_cgm: Vec<OffsetPoint> = window
            .iter()
            .map(|(date, cgm)| OffsetPoint {
                elapsed_ms: (*date - base_date).num_milliseconds(),
                delta: cgm - base_cgm,
            })
            .collect();

        let peak = find_peak(&offset_cgm, self.peak_window_ms);

        Some(EventEntry {
            date: event.date,
            event_type,
            note: event.note.clone(),
            offset_cgm,
            max_delta: peak.map(|p| p.delta),
            time_delta: peak.map(|p| p.elapsed_ms),
        })
    }
}

/// Correlate events with default windows, skipping events without CGM data
pub fn correlate(log: &[LogEntry]) -> Vec<EventEntry> {
    let correlator = Correlator::default();
    log.iter()
        .filter_map(|entry| correlator.correlate_event(entry, log))
        .collect()
}

/// Largest-magnitude deviation among points earlier than `peak_window_ms`.
///
/// The first occurrence of the minimum and maximum are tracked in one pass;
/// equal magnitudes resolve to the maximum.
fn find_peak(points: &[OffsetPoint], peak_window_ms: i64) -> Option<OffsetPoint> {
    let mut lowest: Option<OffsetPoint> = None;
    let mut highest: Option<OffsetPoint> = None;

    for point in points.iter().filter(|p| p.elapsed_ms < peak_window_ms) {
        if lowest.map_or(true, |l| point.delta < l.delta) {
            lowest = Some(*point);
        }
        if highest.map_or(true, |h| point.delta > h.delta) {
            highest = Some(*point);
        }
    }

    match (lowest, highest) {
        (Some(low), Some(high)) if low.delta.abs() > high.delta.abs() => Some(low),
        (_, high) => high,
    }
}

/// Average response per event type (Breakfast, Lunch, Dinner, Snack, Sport)
pub fn summarize_by_type(events: &[EventEntry]) -> Vec<EventTypeSummary> {
    EventType::SUMMARIZED
        .iter()
        .map(|&event_type| {
            let of_type: Vec<&EventEntry> =
                events.iter().filter(|e| e.event_type == event_type).collect();

            EventTypeSummary {
                event_type,
                event_count: of_type.len(),
                mean_time_delta_ms: mean(of_type.iter().filter_map(|e| e.time_delta.map(|t| t as f64))),
                mean_max_delta: mean(of_type.iter().filter_map(|e| e.max_delta)),
            }
        })
        .collect()
}

/// Compare each meter reading with the mean CGM value in the `window` after it
pub fn bgm_calibrations(log: &[LogEntry], window: Duration) -> Vec<BgmCalibration> {
    log.iter()
        .filter_map(|entry| entry.bgm.map(|bgm| (entry.date, bgm)))
        .map(|(date, bgm)| {
            let end = date + window;
            let cgm_average = mean(
                log.iter()
                    .filter(|e| date <= e.date && e.date <= end)
                    .filter_map(|e| e.cgm),
            );

            BgmCalibration {
                date,
                bgm,
                cgm_average,
                delta: cgm_average.map(|avg| avg - bgm),
            }
        })
        .collect()
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values.fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    if count == 0 {
        None
    } else {
        Some(sum / count as f64)
    }
}
