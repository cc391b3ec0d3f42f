//! Aggregate statistics
//!
//! Whole-log summaries derived from the canonical log:
//! - Estimated average glucose and its A1C approximation
//! - Exponentially smoothed fasting trend
//! - Quartile/box statistics per CGM segment and per calendar day

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use std::collections::BTreeMap;

use crate::error::ComputeError;
use crate::types::{BoxStats, DailyBoxStats, EagSummary, LogEntry, Sample, TrendPoint};
use crate::units::MMOL_TO_MGDL;

/// Intercept of the ADAG eAG/A1C regression (mg/dL)
const A1C_INTERCEPT_MGDL: f64 = 46.7;

/// Slope of the ADAG eAG/A1C regression (mg/dL per %)
const A1C_SLOPE_MGDL: f64 = 28.7;

/// Mean CGM value and the A1C it corresponds to.
///
/// With no CGM samples the average is 0.
pub fn estimated_average_glucose(log: &[LogEntry]) -> EagSummary {
    let (sum, sample_count) = log
        .iter()
        .filter_map(|e| e.cgm)
        .fold((0.0, 0usize), |(sum, count), cgm| (sum + cgm, count + 1));

    let average_cgm = if sample_count > 0 {
        sum / sample_count as f64
    } else {
        0.0
    };
    let a1c = (average_cgm * MMOL_TO_MGDL + A1C_INTERCEPT_MGDL) / A1C_SLOPE_MGDL;

    EagSummary {
        a1c,
        average_cgm,
        sample_count,
    }
}

/// Exponentially smoothed weighted average over chronological readings.
///
/// The first reading seeds the filter and is emitted unchanged; each later
/// reading yields `alpha * value + (1 - alpha) * previous`.
pub fn eswa(readings: &[(DateTime<Utc>, f64)], alpha: f64) -> Result<Vec<TrendPoint>, ComputeError> {
    if !(alpha > 0.0 && alpha < 1.0) {
        return Err(ComputeError::InvalidParameter(format!(
            "smoothing factor must be in (0, 1), got {alpha}"
        )));
    }

    let Some(&(first_date, first_value)) = readings.first() else {
        return Ok(Vec::new());
    };

    let mut trend = Vec::with_capacity(readings.len());
    trend.push(TrendPoint {
        date: first_date,
        value: first_value,
    });

    let mut previous = first_value;
    for &(date, value) in &readings[1..] {
        let current = alpha * value + (1.0 - alpha) * previous;
        trend.push(TrendPoint {
            date,
            value: current,
        });
        previous = current;
    }

    Ok(trend)
}

/// Smoothed trend of the fasting BGM readings of a canonical log
pub fn fasting_trend(log: &[LogEntry], alpha: f64) -> Result<Vec<TrendPoint>, ComputeError> {
    let readings: Vec<(DateTime<Utc>, f64)> = log
        .iter()
        .filter(|e| e.is_fasting)
        .filter_map(|e| e.bgm.map(|bgm| (e.date, bgm)))
        .collect();

    eswa(&readings, alpha)
}

impl BoxStats {
    /// Five-number summary using linear interpolation between order statistics.
    ///
    /// Returns `None` for an empty sample set.
    pub fn from_samples(values: &[f64]) -> Option<BoxStats> {
        let mut sorted = values.to_vec();
        sorted.sort_by(|a, b| a.total_cmp(b));

        let min = *sorted.first()?;
        let max = *sorted.last()?;

        Some(BoxStats {
            min,
            q1: quantile(&sorted, 0.25),
            median: quantile(&sorted, 0.5),
            q3: quantile(&sorted, 0.75),
            max,
        })
    }
}

/// Linear-interpolation quantile of an ascending, non-empty slice
fn quantile(sorted: &[f64], q: f64) -> f64 {
    let position = (sorted.len() - 1) as f64 * q;
    let base = position.floor() as usize;
    let rest = position - base as f64;

    match sorted.get(base + 1) {
        Some(next) => sorted[base] + rest * (next - sorted[base]),
        None => sorted[base],
    }
}

/// Box statistics of each segment, in segment order
pub fn segment_box_stats(segments: &[Vec<Sample>]) -> Vec<BoxStats> {
    segments
        .iter()
        .filter_map(|segment| {
            let values: Vec<f64> = segment.iter().map(|s| s.value).collect();
            BoxStats::from_samples(&values)
        })
        .collect()
}

/// Box statistics of the CGM values of each calendar day in `offset`, ascending by day
pub fn daily_box_stats(log: &[LogEntry], offset: FixedOffset) -> Vec<DailyBoxStats> {
    let mut by_day: BTreeMap<NaiveDate, Vec<f64>> = BTreeMap::new();

    for entry in log {
        if let Some(cgm) = entry.cgm {
            let day = entry.date.with_timezone(&offset).date_naive();
            by_day.entry(day).or_default().push(cgm);
        }
    }

    by_day
        .into_iter()
        .filter_map(|(day, values)| {
            BoxStats::from_samples(&values).map(|stats| DailyBoxStats {
                day,
                sample_count: values.len(),
                stats,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use pretty_assertions::assert_eq;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 15, 7, 0, 0).unwrap()
    }

    #[test]
    fn test_eag_formula() {
        let log = vec![
            LogEntry::cgm(t0(), 6.0),
            LogEntry::cgm(t0() + Duration::minutes(15), 8.0),
            LogEntry::bgm(t0(), 20.0),
        ];
        let eag = estimated_average_glucose(&log);

        assert_eq!(eag.sample_count, 2);
        assert!((eag.average_cgm - 7.0).abs() < 1e-9);
        let expected = (7.0 * 18.0182 + 46.7) / 28.7;
        assert!((eag.a1c - expected).abs() < 1e-9);
    }

    #[test]
    fn test_eag_empty() {
        let eag = estimated_average_glucose(&[LogEntry::bgm(t0(), 5.0)]);
        assert_eq!(eag.sample_count, 0);
        assert_eq!(eag.average_cgm, 0.0);
        assert!(eag.a1c.is_finite());
    }

    #[test]
    fn test_eswa_single_reading() {
        let trend = eswa(&[(t0(), 10.0)], 0.1).unwrap();
        assert_eq!(
            trend,
            vec![TrendPoint {
                date: t0(),
                value: 10.0
            }]
        );
    }

    #[test]
    fn test_eswa_two_readings() {
        let t1 = t0() + Duration::days(1);
        let trend = eswa(&[(t0(), 10.0), (t1, 12.0)], 0.1).unwrap();

        assert_eq!(trend.len(), 2);
        assert_eq!(trend[1].date, t1);
        assert!((trend[1].value - 10.2).abs() < 1e-9);
    }

    #[test]
    fn test_eswa_recurrence() {
        let readings: Vec<(DateTime<Utc>, f64)> = [6.0, 8.0, 4.0]
            .iter()
            .enumerate()
            .map(|(i, v)| (t0() + Duration::days(i as i64), *v))
            .collect();
        let trend = eswa(&readings, 0.5).unwrap();

        assert!((trend[1].value - 7.0).abs() < 1e-9);
        assert!((trend[2].value - 5.5).abs() < 1e-9);
    }

    #[test]
    fn test_eswa_empty_and_invalid_alpha() {
        assert!(eswa(&[], 0.1).unwrap().is_empty());
        assert!(matches!(
            eswa(&[(t0(), 5.0)], 0.0),
            Err(ComputeError::InvalidParameter(_))
        ));
        assert!(eswa(&[(t0(), 5.0)], 1.5).is_err());
    }

    #[test]
    fn test_fasting_trend_filters_log() {
        let mut fasting = LogEntry::bgm(t0(), 10.0);
        fasting.is_fasting = true;
        let mut next_day = LogEntry::bgm(t0() + Duration::days(1), 12.0);
        next_day.is_fasting = true;

        let log = vec![
            fasting,
            LogEntry::bgm(t0() + Duration::hours(10), 15.0),
            LogEntry::cgm(t0() + Duration::hours(11), 9.0),
            next_day,
        ];
        let trend = fasting_trend(&log, 0.1).unwrap();

        assert_eq!(trend.len(), 2);
        assert!((trend[1].value - 10.2).abs() < 1e-9);
    }

    #[test]
    fn test_quartiles_evenly_spaced() {
        let stats = BoxStats::from_samples(&[5.0, 3.0, 1.0, 4.0, 2.0]).unwrap();
        assert_eq!(
            stats,
            BoxStats {
                min: 1.0,
                q1: 2.0,
                median: 3.0,
                q3: 4.0,
                max: 5.0
            }
        );
    }

    #[test]
    fn test_quartiles_interpolate() {
        // n = 4: q1 at 0.75, median at 1.5, q3 at 2.25
        let stats = BoxStats::from_samples(&[1.0, 2.0, 3.0, 4.0]).unwrap();
        assert!((stats.q1 - 1.75).abs() < 1e-9);
        assert!((stats.median - 2.5).abs() < 1e-9);
        assert!((stats.q3 - 3.25).abs() < 1e-9);
    }

    #[test]
    fn test_quartiles_single_and_empty() {
        let stats = BoxStats::from_samples(&[6.2]).unwrap();
        assert_eq!(stats.min, 6.2);
        assert_eq!(stats.median, 6.2);
        assert_eq!(stats.max, 6.2);
        assert!(BoxStats::from_samples(&[]).is_none());
    }

    #[test]
    fn test_segment_box_stats() {
        let segments = vec![
            vec![
                Sample::new(t0(), 4.0),
                Sample::new(t0() + Duration::minutes(15), 6.0),
            ],
            vec![Sample::new(t0() + Duration::hours(6), 9.0)],
        ];
        let boxes = segment_box_stats(&segments);

        assert_eq!(boxes.len(), 2);
        assert_eq!(boxes[0].median, 5.0);
        assert_eq!(boxes[0].q1, 4.5);
        assert_eq!(boxes[1].min, 9.0);
        assert!(segment_box_stats(&[]).is_empty());
    }

    #[test]
    fn test_daily_box_stats_groups_by_local_day() {
        let log = vec![
            LogEntry::cgm(Utc.with_ymd_and_hms(2024, 1, 15, 10, 0, 0).unwrap(), 5.0),
            LogEntry::cgm(Utc.with_ymd_and_hms(2024, 1, 15, 22, 30, 0).unwrap(), 7.0),
            LogEntry::cgm(Utc.with_ymd_and_hms(2024, 1, 16, 8, 0, 0).unwrap(), 6.0),
            LogEntry::bgm(Utc.with_ymd_and_hms(2024, 1, 16, 8, 0, 0).unwrap(), 9.0),
        ];

        let utc = daily_box_stats(&log, FixedOffset::east_opt(0).unwrap());
        assert_eq!(utc.len(), 2);
        assert_eq!(utc[0].day, NaiveDate::from_ymd_opt(2024, 1, 15).unwrap());
        assert_eq!(utc[0].sample_count, 2);
        assert_eq!(utc[0].stats.median, 6.0);

        // At UTC+3 the 22:30 sample moves to the 16th
        let shifted = daily_box_stats(&log, FixedOffset::east_opt(3 * 3600).unwrap());
        assert_eq!(shifted[0].sample_count, 1);
        assert_eq!(shifted[1].sample_count, 2);
        assert_eq!(shifted[1].stats.min, 6.0);
        assert_eq!(shifted[1].stats.max, 7.0);
    }
}
