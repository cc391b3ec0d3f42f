//! Display unit conversion
//!
//! The analytics core always works in mmol/L. Conversion to the user's display
//! unit happens only at the presentation boundary.

use serde::{Deserialize, Serialize};

/// mmol/L to mg/dL conversion factor for glucose
pub const MMOL_TO_MGDL: f64 = 18.0182;

/// Display unit for glucose concentrations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum GlucoseUnit {
    #[serde(rename = "mmol/L")]
    #[default]
    MmolL,
    #[serde(rename = "mg/dL")]
    MgDl,
}

impl GlucoseUnit {
    /// Unit label
    pub fn label(self) -> &'static str {
        match self {
            GlucoseUnit::MmolL => "mmol/L",
            GlucoseUnit::MgDl => "mg/dL",
        }
    }

    /// Multiplier from mmol/L into this unit
    pub fn multiplier(self) -> f64 {
        match self {
            GlucoseUnit::MmolL => 1.0,
            GlucoseUnit::MgDl => MMOL_TO_MGDL,
        }
    }

    /// Parse a unit label (`mmol/L`, `mg/dL`, case-insensitive)
    pub fn parse(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "mmol/l" | "mmol" => Some(GlucoseUnit::MmolL),
            "mg/dl" | "mgdl" => Some(GlucoseUnit::MgDl),
            _ => None,
        }
    }
}

/// Display preferences handed to the converter
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    pub unit: GlucoseUnit,
    pub unit_multiplier: f64,
    /// Lower bound of the target range (mmol/L)
    pub range_min: f64,
    /// Upper bound of the target range (mmol/L)
    pub range_max: f64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            unit: GlucoseUnit::MmolL,
            unit_multiplier: 1.0,
            range_min: 4.0,
            range_max: 8.5,
        }
    }
}

impl Settings {
    /// Settings for the given unit with the default target range
    pub fn with_unit(unit: GlucoseUnit) -> Self {
        Self {
            unit,
            unit_multiplier: unit.multiplier(),
            ..Self::default()
        }
    }

    /// Target range converted to the display unit
    pub fn display_range(&self) -> (f64, f64) {
        (
            convert_unit(self.range_min, self),
            convert_unit(self.range_max, self),
        )
    }
}

/// Convert a mmol/L concentration to the configured display unit.
///
/// mg/dL values are rounded to whole numbers; mmol/L values pass through.
pub fn convert_unit(mmol: f64, settings: &Settings) -> f64 {
    match settings.unit {
        GlucoseUnit::MgDl => (mmol * MMOL_TO_MGDL).round(),
        GlucoseUnit::MmolL => mmol,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mmol_passthrough() {
        let settings = Settings::default();
        assert_eq!(convert_unit(5.55, &settings), 5.55);
    }

    #[test]
    fn test_mgdl_rounding() {
        let settings = Settings::with_unit(GlucoseUnit::MgDl);
        // 5.5 * 18.0182 = 99.1
        assert_eq!(convert_unit(5.5, &settings), 99.0);
        assert_eq!(convert_unit(10.0, &settings), 180.0);
        assert!((settings.unit_multiplier - MMOL_TO_MGDL).abs() < 1e-9);
    }

    #[test]
    fn test_display_range() {
        let settings = Settings::with_unit(GlucoseUnit::MgDl);
        // 4.0 -> 72.07, 8.5 -> 153.15
        assert_eq!(settings.display_range(), (72.0, 153.0));
        assert_eq!(Settings::default().display_range(), (4.0, 8.5));
    }

    #[test]
    fn test_unit_serde_labels() {
        let json = serde_json::to_string(&Settings::with_unit(GlucoseUnit::MgDl)).unwrap();
        assert!(json.contains("\"mg/dL\""));
        assert!(json.contains("rangeMin"));

        assert_eq!(GlucoseUnit::parse("MG/DL"), Some(GlucoseUnit::MgDl));
        assert_eq!(GlucoseUnit::parse("mmol/L"), Some(GlucoseUnit::MmolL));
        assert_eq!(GlucoseUnit::parse("furlongs"), None);
    }
}
