//! Report encoding
//!
//! This module assembles every derived view of a canonical log into one
//! serializable `AnalyticsReport` with producer metadata.

use chrono::{Duration, Utc};
use uuid::Uuid;

use crate::config::AnalyticsConfig;
use crate::error::ComputeError;
use crate::excursion::{bgm_calibrations, summarize_by_type, Correlator};
use crate::segments::{cgm_samples, segment};
use crate::stats::{
    daily_box_stats, estimated_average_glucose, fasting_trend, segment_box_stats,
};
use crate::types::{AnalyticsReport, LogEntry, ReportProducer, ReportWindow};
use crate::{GLUCOFLUX_VERSION, PRODUCER_NAME};

/// Current report format version
pub const REPORT_VERSION: &str = "1.0.0";

/// Encoder for analytics reports
pub struct ReportEncoder {
    instance_id: String,
}

impl Default for ReportEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl ReportEncoder {
    /// Create a new encoder with a unique instance ID
    pub fn new() -> Self {
        Self {
            instance_id: Uuid::new_v4().to_string(),
        }
    }

    /// Create an encoder with a specific instance ID
    pub fn with_instance_id(instance_id: String) -> Self {
        Self { instance_id }
    }

    /// Build the report for a normalized log
    pub fn encode(
        &self,
        log: &[LogEntry],
        config: &AnalyticsConfig,
    ) -> Result<AnalyticsReport, ComputeError> {
        config.validate()?;
        let offset = config.offset()?;

        let producer = ReportProducer {
            name: PRODUCER_NAME.to_string(),
            version: GLUCOFLUX_VERSION.to_string(),
            instance_id: self.instance_id.clone(),
        };

        let window = ReportWindow {
            from_utc: log.first().map(|e| e.date.to_rfc3339()),
            to_utc: log.last().map(|e| e.date.to_rfc3339()),
            entry_count: log.len(),
        };

        let events = Correlator::from_config(config).correlate(log)?;
        let event_summaries = summarize_by_type(&events);
        let cgm_segments = segment(&cgm_samples(log), config.gap_hours);
        let segment_boxes = segment_box_stats(&cgm_segments);
        let calibrations =
            bgm_calibrations(log, Duration::minutes(config.calibration_minutes));

        let report = AnalyticsReport {
            report_version: REPORT_VERSION.to_string(),
            producer,
            computed_at_utc: Utc::now().to_rfc3339(),
            window,
            settings: config.settings,
            eag: estimated_average_glucose(log),
            fasting_trend: fasting_trend(log, config.eswa_alpha)?,
            daily_boxes: daily_box_stats(log, offset),
            events,
            event_summaries,
            cgm_segments,
            segment_boxes,
            calibrations,
        };

        tracing::info!(
            entries = report.window.entry_count,
            events = report.events.len(),
            segments = report.cgm_segments.len(),
            "built analytics report"
        );

        Ok(report)
    }

    /// Encode to JSON string
    pub fn encode_to_json(
        &self,
        log: &[LogEntry],
        config: &AnalyticsConfig,
    ) -> Result<String, ComputeError> {
        let report = self.encode(log, config)?;
        serde_json::to_string_pretty(&report).map_err(ComputeError::JsonError)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalizer::normalize;
    use crate::types::EventType;
    use chrono::{DateTime, TimeZone};

    fn at(hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 15, hour, minute, 0).unwrap()
    }

    fn sample_log() -> Vec<LogEntry> {
        normalize(vec![
            LogEntry::bgm(at(7, 0), 5.4),
            LogEntry::event(at(7, 30), EventType::Breakfast),
            LogEntry::cgm(at(7, 30), 6.0),
            LogEntry::cgm(at(8, 0), 8.5),
            LogEntry::cgm(at(8, 30), 7.0),
            LogEntry::cgm(at(13, 0), 5.8),
        ])
    }

    #[test]
    fn test_encode_report() {
        let encoder = ReportEncoder::with_instance_id("test-instance".to_string());
        let report = encoder
            .encode(&sample_log(), &AnalyticsConfig::default())
            .unwrap();

        assert_eq!(report.report_version, REPORT_VERSION);
        assert_eq!(report.producer.name, "glucoflux");
        assert_eq!(report.producer.instance_id, "test-instance");
        assert_eq!(report.window.entry_count, 6);
        assert_eq!(report.eag.sample_count, 4);
        assert_eq!(report.fasting_trend.len(), 1);
        assert_eq!(report.events.len(), 1);
        assert_eq!(report.events[0].max_delta, Some(2.5));
        assert_eq!(report.cgm_segments.len(), 2);
        assert_eq!(report.segment_boxes.len(), 2);
        assert_eq!(report.segment_boxes[1].median, 5.8);
        assert_eq!(report.daily_boxes.len(), 1);
    }

    #[test]
    fn test_encode_empty_log() {
        let report = ReportEncoder::new()
            .encode(&[], &AnalyticsConfig::default())
            .unwrap();

        assert!(report.window.from_utc.is_none());
        assert_eq!(report.eag.average_cgm, 0.0);
        assert!(report.events.is_empty());
        assert!(report.cgm_segments.is_empty());
    }

    #[test]
    fn test_encode_to_json_shape() {
        let json = ReportEncoder::new()
            .encode_to_json(&sample_log(), &AnalyticsConfig::default())
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["producer"]["name"], "glucoflux");
        assert_eq!(value["settings"]["unit"], "mmol/L");
        assert_eq!(value["events"][0]["type"], "breakfast");
        assert!(value["event_summaries"].is_array());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = AnalyticsConfig {
            eswa_alpha: 1.5,
            ..Default::default()
        };
        let result = ReportEncoder::new().encode(&sample_log(), &config);
        assert!(matches!(result, Err(ComputeError::InvalidParameter(_))));
    }
}
