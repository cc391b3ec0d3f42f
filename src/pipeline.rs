//! Pipeline orchestration
//!
//! This module provides the public API for glucoflux.
//! It orchestrates the full pipeline from raw exports to analytics reports.
//!
//! Pipeline stages:
//! 1. ImportAdapter - Parse a vendor export into log entries
//! 2. Normalizer - Merge into the canonical log
//! 3. Correlator / stats / segments - Derive analytics views
//! 4. ReportEncoder - Encode to report JSON

use chrono::{DateTime, Duration, Utc};

use crate::adapters::{adapter_for, ImportAdapter};
use crate::config::{AnalyticsConfig, MAX_RECENT_DAYS};
use crate::encoder::ReportEncoder;
use crate::error::ComputeError;
use crate::excursion::Correlator;
use crate::normalizer::Normalizer;
use crate::types::{AnalyticsReport, EventEntry, LogEntry};

/// Analyze a JSON log in one shot.
///
/// # Arguments
/// * `log_json` - JSON array of log entries (any order, duplicates allowed)
/// * `config` - Analytics configuration
///
/// # Returns
/// Pretty-printed report JSON
///
/// # Example
/// ```ignore
/// let report = analyze_log_json(&log_json, &AnalyticsConfig::default())?;
/// ```
pub fn analyze_log_json(log_json: &str, config: &AnalyticsConfig) -> Result<String, ComputeError> {
    let mut processor = GlucoseProcessor::with_config(config.clone())?;
    processor.load_log(log_json)?;
    let report = processor.report(Utc::now())?;
    serde_json::to_string_pretty(&report).map_err(ComputeError::JsonError)
}

/// Keep the entries dated at or after `cutoff`
pub fn filter_since(log: &[LogEntry], cutoff: DateTime<Utc>) -> Vec<LogEntry> {
    log.iter().filter(|e| e.date >= cutoff).cloned().collect()
}

/// Stateful processor holding the canonical log across imports.
///
/// Use this when entries arrive from several exports over time.
pub struct GlucoseProcessor {
    log: Vec<LogEntry>,
    config: AnalyticsConfig,
    encoder: ReportEncoder,
}

impl Default for GlucoseProcessor {
    fn default() -> Self {
        Self {
            log: Vec::new(),
            config: AnalyticsConfig::default(),
            encoder: ReportEncoder::new(),
        }
    }
}

impl GlucoseProcessor {
    /// Create a new processor with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a processor with a validated configuration
    pub fn with_config(config: AnalyticsConfig) -> Result<Self, ComputeError> {
        config.validate()?;
        Ok(Self {
            config,
            ..Self::default()
        })
    }

    pub fn config(&self) -> &AnalyticsConfig {
        &self.config
    }

    /// The canonical log
    pub fn log(&self) -> &[LogEntry] {
        &self.log
    }

    fn normalizer(&self) -> Result<Normalizer, ComputeError> {
        Ok(Normalizer::new(self.config.offset()?))
    }

    /// Parse an export with `adapter` and merge it into the log.
    ///
    /// Returns the number of entries the export contributed.
    pub fn import(&mut self, adapter: &dyn ImportAdapter, raw: &str) -> Result<usize, ComputeError> {
        let offset = self.config.offset()?;
        let incoming = adapter.parse(raw, offset)?;
        let before = self.log.len();

        self.log = self.normalizer()?.merge(&self.log, &incoming);
        let added = self.log.len() - before;

        tracing::info!(
            source = adapter.source().as_str(),
            parsed = incoming.len(),
            added,
            total = self.log.len(),
            "imported entries"
        );

        Ok(added)
    }

    /// Import an export by source name (`libreview`, `mysugr`, `records`)
    pub fn import_source(&mut self, source: &str, raw: &str) -> Result<usize, ComputeError> {
        let adapter = adapter_for(source)?;
        self.import(adapter.as_ref(), raw)
    }

    /// Merge already-built entries into the log
    pub fn append(&mut self, entries: &[LogEntry]) -> Result<(), ComputeError> {
        self.log = self.normalizer()?.merge(&self.log, entries);
        Ok(())
    }

    /// Drop every entry
    pub fn clear(&mut self) {
        self.log.clear();
    }

    /// Replace the log with a JSON array of entries, normalizing on load
    pub fn load_log(&mut self, json: &str) -> Result<(), ComputeError> {
        let entries: Vec<LogEntry> = serde_json::from_str(json)?;
        self.log = self.normalizer()?.normalize(entries);
        Ok(())
    }

    /// Save the log as a JSON array
    pub fn save_log(&self) -> Result<String, ComputeError> {
        serde_json::to_string_pretty(&self.log).map_err(ComputeError::JsonError)
    }

    /// Entries from the last `days` days before `now`.
    ///
    /// `days` is clamped to `0..=MAX_RECENT_DAYS`.
    pub fn recent(&self, now: DateTime<Utc>, days: i64) -> Vec<LogEntry> {
        match now.checked_sub_signed(Duration::days(days.clamp(0, MAX_RECENT_DAYS))) {
            Some(cutoff) => filter_since(&self.log, cutoff),
            None => self.log.clone(),
        }
    }

    /// The slice of the log analytics run over, honouring `recent_days`
    fn analysis_window(&self, now: DateTime<Utc>) -> Vec<LogEntry> {
        match self.config.recent_days {
            Some(days) => self.recent(now, days),
            None => self.log.clone(),
        }
    }

    /// Correlate events in the analysis window
    pub fn events(&self, now: DateTime<Utc>) -> Result<Vec<EventEntry>, ComputeError> {
        Correlator::from_config(&self.config).correlate(&self.analysis_window(now))
    }

    /// Build the full analytics report
    pub fn report(&self, now: DateTime<Utc>) -> Result<AnalyticsReport, ComputeError> {
        self.encoder.encode(&self.analysis_window(now), &self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::LibreViewAdapter;
    use crate::config::BaselinePolicy;
    use crate::types::EventType;
    use chrono::TimeZone;

    fn sample_libreview_csv() -> &'static str {
        "\
Glucose Data,Generated on,16-01-2024 10:00
Device,Serial Number,Device Timestamp,Record Type,Historic Glucose mmol/L,Scan Glucose mmol/L
FreeStyle LibreLink,ABC,15-01-2024 07:30,0,6.0,
FreeStyle LibreLink,ABC,15-01-2024 08:00,0,8.5,
FreeStyle LibreLink,ABC,15-01-2024 08:30,1,,7.0
"
    }

    fn sample_records() -> &'static str {
        r#"{"date":"2024-01-15T07:00:00Z","bgm":5.4}
{"date":"2024-01-15T07:30:00Z","type":"breakfast","note":"oats"}"#
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 16, 10, 0, 0).unwrap()
    }

    #[test]
    fn test_import_merges_sources() {
        let mut processor = GlucoseProcessor::new();

        assert_eq!(processor.import(&LibreViewAdapter, sample_libreview_csv()).unwrap(), 3);
        assert_eq!(processor.import_source("records", sample_records()).unwrap(), 2);

        let log = processor.log();
        assert_eq!(log.len(), 5);
        assert!(log.windows(2).all(|w| w[0].date <= w[1].date));
        assert!(log[0].is_fasting);
    }

    #[test]
    fn test_reimport_is_idempotent() {
        let mut processor = GlucoseProcessor::new();
        processor.import(&LibreViewAdapter, sample_libreview_csv()).unwrap();
        let added = processor.import(&LibreViewAdapter, sample_libreview_csv()).unwrap();

        assert_eq!(added, 0);
        assert_eq!(processor.log().len(), 3);
    }

    #[test]
    fn test_events_from_imports() {
        let mut processor = GlucoseProcessor::new();
        processor.import(&LibreViewAdapter, sample_libreview_csv()).unwrap();
        processor.import_source("records", sample_records()).unwrap();

        let events = processor.events(now()).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, EventType::Breakfast);
        assert_eq!(events[0].note.as_deref(), Some("oats"));
        assert_eq!(events[0].max_delta, Some(2.5));
        assert_eq!(events[0].time_delta, Some(30 * 60 * 1000));
    }

    #[test]
    fn test_save_and_load_log() {
        let mut processor = GlucoseProcessor::new();
        processor.import_source("records", sample_records()).unwrap();
        let saved = processor.save_log().unwrap();

        let mut restored = GlucoseProcessor::new();
        restored.load_log(&saved).unwrap();
        assert_eq!(restored.log(), processor.log());
    }

    #[test]
    fn test_recent_window() {
        let mut processor = GlucoseProcessor::new();
        processor
            .append(&[
                LogEntry::cgm(now() - Duration::days(5), 6.0),
                LogEntry::cgm(now() - Duration::days(1), 7.0),
            ])
            .unwrap();

        let recent = processor.recent(now(), 3);
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].cgm, Some(7.0));

        processor.clear();
        assert!(processor.log().is_empty());
    }

    #[test]
    fn test_recent_window_clamps_extreme_days() {
        let mut processor = GlucoseProcessor::new();
        processor
            .append(&[
                LogEntry::cgm(now() - Duration::days(400), 6.0),
                LogEntry::cgm(now() - Duration::hours(1), 7.0),
            ])
            .unwrap();

        assert_eq!(processor.recent(now(), i64::MAX).len(), 2);
        assert!(processor.recent(now(), i64::MIN).is_empty());

        let config = AnalyticsConfig {
            recent_days: Some(i64::MAX),
            ..Default::default()
        };
        assert!(matches!(
            GlucoseProcessor::with_config(config),
            Err(ComputeError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_report_honours_recent_days() {
        let config = AnalyticsConfig {
            recent_days: Some(3),
            ..Default::default()
        };
        let mut processor = GlucoseProcessor::with_config(config).unwrap();
        processor
            .append(&[
                LogEntry::cgm(now() - Duration::days(10), 6.0),
                LogEntry::cgm(now() - Duration::hours(2), 7.0),
            ])
            .unwrap();

        let report = processor.report(now()).unwrap();
        assert_eq!(report.window.entry_count, 1);
        assert_eq!(report.eag.average_cgm, 7.0);
    }

    #[test]
    fn test_strict_policy_surfaces_missing_baseline() {
        let config = AnalyticsConfig {
            baseline_policy: BaselinePolicy::Strict,
            ..Default::default()
        };
        let mut processor = GlucoseProcessor::with_config(config).unwrap();
        processor.import_source("records", sample_records()).unwrap();

        assert!(matches!(
            processor.events(now()),
            Err(ComputeError::MissingBaseline(_))
        ));
    }

    #[test]
    fn test_analyze_log_json() {
        let log = r#"[
            {"date":"2024-01-15T08:00:00Z","cgm":8.5},
            {"date":"2024-01-15T07:30:00Z","type":"lunch"},
            {"date":"2024-01-15T07:30:00Z","cgm":6.0}
        ]"#;
        let json = analyze_log_json(log, &AnalyticsConfig::default()).unwrap();
        let report: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(report["window"]["entry_count"], 3);
        assert_eq!(report["events"][0]["type"], "lunch");
    }

    #[test]
    fn test_invalid_json() {
        let result = analyze_log_json("not json", &AnalyticsConfig::default());
        assert!(matches!(result, Err(ComputeError::JsonError(_))));
    }

    #[test]
    fn test_unsupported_source() {
        let mut processor = GlucoseProcessor::new();
        assert!(matches!(
            processor.import_source("dexcom", ""),
            Err(ComputeError::UnsupportedSource(_))
        ));
    }
}
