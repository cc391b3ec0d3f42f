//! Gap segmentation
//!
//! Splits a chronological series into maximal runs so that a chart never draws
//! an interpolated line across a sensor outage.

use crate::types::{LogEntry, Sample};

const MILLIS_PER_HOUR: i64 = 60 * 60 * 1000;

/// Split `samples` wherever the gap to the previous sample exceeds `gap_hours`.
///
/// Gaps are measured in whole hours, rounded up, and a segment only breaks when
/// that count is strictly greater than `gap_hours`. Input must already be in
/// chronological order. Concatenating the result reproduces the input; an empty
/// input yields no segments.
pub fn segment(samples: &[Sample], gap_hours: f64) -> Vec<Vec<Sample>> {
    let mut segments: Vec<Vec<Sample>> = Vec::new();
    let mut current: Vec<Sample> = Vec::new();

    for sample in samples {
        if let Some(previous) = current.last() {
            if elapsed_hours_ceil(previous, sample) > gap_hours {
                segments.push(std::mem::take(&mut current));
            }
        }
        current.push(*sample);
    }

    if !current.is_empty() {
        segments.push(current);
    }

    tracing::debug!(
        samples = samples.len(),
        segments = segments.len(),
        "segmented series"
    );

    segments
}

/// CGM series of a canonical log, in log order
pub fn cgm_samples(log: &[LogEntry]) -> Vec<Sample> {
    log.iter()
        .filter_map(|entry| entry.cgm.map(|cgm| Sample::new(entry.date, cgm)))
        .collect()
}

/// Elapsed time between two samples in whole hours, rounding up
fn elapsed_hours_ceil(previous: &Sample, next: &Sample) -> f64 {
    let millis = (next.date - previous.date).num_milliseconds();
    (millis as f64 / MILLIS_PER_HOUR as f64).ceil()
}
