//! Analytics configuration
//!
//! Tunable windows, smoothing factor and calendar offset for the pipeline.
//! Loaded from JSON and overridden field by field by the CLI.

use chrono::FixedOffset;
use serde::{Deserialize, Serialize};

use crate::error::ComputeError;
use crate::units::Settings;

/// Default gap (hours) above which a CGM series is split
pub const DEFAULT_GAP_HOURS: f64 = 2.0;

/// Default ESWA smoothing factor
pub const DEFAULT_ESWA_ALPHA: f64 = 0.1;

/// Default event correlation window (hours)
pub const DEFAULT_WINDOW_HOURS: i64 = 4;

/// Default peak search window (hours)
pub const DEFAULT_PEAK_HOURS: i64 = 2;

/// Default BGM calibration window (minutes)
pub const DEFAULT_CALIBRATION_MINUTES: i64 = 20;

/// Longest accepted correlation or peak window (hours)
pub const MAX_WINDOW_HOURS: i64 = 24 * 365;

/// Longest accepted BGM calibration window (minutes)
pub const MAX_CALIBRATION_MINUTES: i64 = 24 * 60;

/// Longest accepted recent-days window
pub const MAX_RECENT_DAYS: i64 = 36_500;

/// What to do with an event that has no CGM sample in its window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BaselinePolicy {
    /// Leave the event out of the result
    #[default]
    Skip,
    /// Fail with `ComputeError::MissingBaseline`
    Strict,
}

/// Pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyticsConfig {
    /// Offset from UTC used for calendar-day grouping (minutes)
    pub utc_offset_minutes: i32,
    /// Maximum gap inside one CGM segment (hours)
    pub gap_hours: f64,
    /// Smoothing factor for the fasting trend, in (0, 1)
    pub eswa_alpha: f64,
    /// Length of the event correlation window (hours)
    pub window_hours: i64,
    /// Length of the peak search window (hours)
    pub peak_hours: i64,
    /// Length of the BGM calibration window (minutes)
    pub calibration_minutes: i64,
    /// Restrict analytics to the last N days (all data if unset)
    pub recent_days: Option<i64>,
    pub baseline_policy: BaselinePolicy,
    pub settings: Settings,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            utc_offset_minutes: 0,
            gap_hours: DEFAULT_GAP_HOURS,
            eswa_alpha: DEFAULT_ESWA_ALPHA,
            window_hours: DEFAULT_WINDOW_HOURS,
            peak_hours: DEFAULT_PEAK_HOURS,
            calibration_minutes: DEFAULT_CALIBRATION_MINUTES,
            recent_days: None,
            baseline_policy: BaselinePolicy::Skip,
            settings: Settings::default(),
        }
    }
}

impl AnalyticsConfig {
    /// Calendar offset as a chrono offset
    pub fn offset(&self) -> Result<FixedOffset, ComputeError> {
        FixedOffset::east_opt(self.utc_offset_minutes * 60).ok_or_else(|| {
            ComputeError::InvalidParameter(format!(
                "utc_offset_minutes out of range: {}",
                self.utc_offset_minutes
            ))
        })
    }

    /// Check every field is within its valid range
    pub fn validate(&self) -> Result<(), ComputeError> {
        self.offset()?;

        if !(self.eswa_alpha > 0.0 && self.eswa_alpha < 1.0) {
            return Err(ComputeError::InvalidParameter(format!(
                "eswa_alpha must be in (0, 1), got {}",
                self.eswa_alpha
            )));
        }
        if !(self.gap_hours >= 0.0) {
            return Err(ComputeError::InvalidParameter(format!(
                "gap_hours must be non-negative, got {}",
                self.gap_hours
            )));
        }
        for (name, hours) in [("window_hours", self.window_hours), ("peak_hours", self.peak_hours)] {
            if !(1..=MAX_WINDOW_HOURS).contains(&hours) {
                return Err(ComputeError::InvalidParameter(format!(
                    "{name} must be in 1..={MAX_WINDOW_HOURS}, got {hours}"
                )));
            }
        }
        if !(1..=MAX_CALIBRATION_MINUTES).contains(&self.calibration_minutes) {
            return Err(ComputeError::InvalidParameter(format!(
                "calibration_minutes must be in 1..={MAX_CALIBRATION_MINUTES}, got {}",
                self.calibration_minutes
            )));
        }
        if let Some(days) = self.recent_days {
            if !(1..=MAX_RECENT_DAYS).contains(&days) {
                return Err(ComputeError::InvalidParameter(format!(
                    "recent_days must be in 1..={MAX_RECENT_DAYS}, got {days}"
                )));
            }
        }
        Ok(())
    }

    /// Load configuration from JSON; missing fields take their defaults
    pub fn from_json(json: &str) -> Result<Self, ComputeError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize configuration to JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
