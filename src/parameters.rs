//! Risk calculation parameters delivered with the application configuration.
//!
//! Normalized time is mapped to a [`RiskLevel`] through an ordered table of
//! ranges. Each range carries its own inclusive/exclusive flags and the first
//! range containing a value decides its level.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::RiskLevel;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("io error: {0}")]
    Io(String),
    #[error("parse error: {0}")]
    Parse(String),
}

fn unbounded_max() -> f64 {
    f64::MAX
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Range {
    #[serde(default)]
    pub min: f64,
    #[serde(default = "unbounded_max")]
    pub max: f64,
    #[serde(default)]
    pub min_exclusive: bool,
    #[serde(default)]
    pub max_exclusive: bool,
}

impl Range {
    pub fn inclusive(min: f64, max: f64) -> Self {
        Self {
            min,
            max,
            min_exclusive: false,
            max_exclusive: false,
        }
    }

    /// `(min, f64::MAX]`
    pub fn above(min: f64) -> Self {
        Self {
            min,
            max: f64::MAX,
            min_exclusive: true,
            max_exclusive: false,
        }
    }

    pub fn contains(&self, value: f64) -> bool {
        let above_min = if self.min_exclusive {
            value > self.min
        } else {
            value >= self.min
        };
        let below_max = if self.max_exclusive {
            value < self.max
        } else {
            value <= self.max
        };
        above_min && below_max
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransmissionRiskValueMapping {
    pub transmission_risk_level: i32,
    pub transmission_risk_value: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedTimeToRiskLevelMapping {
    pub normalized_time_range: Range,
    pub risk_level: RiskLevel,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RiskLevelTable(pub Vec<NormalizedTimeToRiskLevelMapping>);

impl RiskLevelTable {
    pub fn new(mappings: Vec<NormalizedTimeToRiskLevelMapping>) -> Self {
        Self(mappings)
    }

    /// Level of the first range containing `normalized_time`, or `None` when no range does.
    pub fn risk_level(&self, normalized_time: f64) -> RiskLevel {
        self.0
            .iter()
            .find(|mapping| mapping.normalized_time_range.contains(normalized_time))
            .map(|mapping| mapping.risk_level)
            .unwrap_or(RiskLevel::None)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskCalculationParameters {
    #[serde(default)]
    pub transmission_risk_value_mapping: Vec<TransmissionRiskValueMapping>,
    #[serde(default, rename = "normalizedTimePerCheckInToRiskLevelMapping")]
    pub normalized_time_per_checkin_to_risk_level_mapping: RiskLevelTable,
    #[serde(default)]
    pub normalized_time_per_day_to_risk_level_mapping: RiskLevelTable,
    #[serde(default = "default_max_checkin_age_in_days", rename = "maxCheckInAgeInDays")]
    pub max_checkin_age_in_days: u32,
}

fn default_max_checkin_age_in_days() -> u32 {
    14
}

impl RiskCalculationParameters {
    /// Unknown levels weigh nothing.
    pub fn transmission_risk_value(&self, transmission_risk_level: i32) -> f64 {
        self.transmission_risk_value_mapping
            .iter()
            .find(|mapping| mapping.transmission_risk_level == transmission_risk_level)
            .map(|mapping| mapping.transmission_risk_value)
            .unwrap_or(0.0)
    }
}

impl Default for RiskCalculationParameters {
    fn default() -> Self {
        let transmission_risk_value_mapping = (1..=8)
            .map(|level| TransmissionRiskValueMapping {
                transmission_risk_level: level,
                transmission_risk_value: f64::from(level),
            })
            .collect();

        Self {
            transmission_risk_value_mapping,
            normalized_time_per_checkin_to_risk_level_mapping: RiskLevelTable::new(vec![
                NormalizedTimeToRiskLevelMapping {
                    normalized_time_range: Range::inclusive(5.0, 15.0),
                    risk_level: RiskLevel::Low,
                },
                NormalizedTimeToRiskLevelMapping {
                    normalized_time_range: Range::above(15.0),
                    risk_level: RiskLevel::High,
                },
            ]),
            normalized_time_per_day_to_risk_level_mapping: RiskLevelTable::new(vec![
                NormalizedTimeToRiskLevelMapping {
                    normalized_time_range: Range::inclusive(30.0, 50.0),
                    risk_level: RiskLevel::Low,
                },
                NormalizedTimeToRiskLevelMapping {
                    normalized_time_range: Range::above(50.0),
                    risk_level: RiskLevel::High,
                },
            ]),
            max_checkin_age_in_days: default_max_checkin_age_in_days(),
        }
    }
}

pub fn parse_parameters(json: &str) -> Result<RiskCalculationParameters, ConfigError> {
    serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))
}

pub fn load_parameters(
    path: impl AsRef<Path>,
) -> Result<RiskCalculationParameters, ConfigError> {
    let json = std::fs::read_to_string(path).map_err(|e| ConfigError::Io(e.to_string()))?;
    parse_parameters(&json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn mapping(range: Range, risk_level: RiskLevel) -> NormalizedTimeToRiskLevelMapping {
        NormalizedTimeToRiskLevelMapping {
            normalized_time_range: range,
            risk_level,
        }
    }

    #[test]
    fn range_flags_control_bounds() {
        let closed = Range::inclusive(5.0, 15.0);
        assert!(closed.contains(5.0));
        assert!(closed.contains(15.0));
        assert!(!closed.contains(4.99));

        let open = Range {
            min: 5.0,
            max: 15.0,
            min_exclusive: true,
            max_exclusive: true,
        };
        assert!(!open.contains(5.0));
        assert!(!open.contains(15.0));
        assert!(open.contains(10.0));
    }

    #[test]
    fn unbounded_range_accepts_large_values() {
        let high = Range::above(15.0);
        assert!(!high.contains(15.0));
        assert!(high.contains(15.0001));
        assert!(high.contains(1.0e300));
    }

    #[test]
    fn first_matching_range_wins() {
        let table = RiskLevelTable::new(vec![
            mapping(Range::inclusive(0.0, 20.0), RiskLevel::Low),
            mapping(Range::inclusive(10.0, 30.0), RiskLevel::High),
        ]);
        assert_eq!(table.risk_level(15.0), RiskLevel::Low);
        assert_eq!(table.risk_level(25.0), RiskLevel::High);
    }

    #[test]
    fn unmapped_values_have_no_risk() {
        let table = RiskLevelTable::new(vec![mapping(Range::inclusive(5.0, 15.0), RiskLevel::Low)]);
        assert_eq!(table.risk_level(4.0), RiskLevel::None);
        assert_eq!(table.risk_level(16.0), RiskLevel::None);
        assert_eq!(RiskLevelTable::default().risk_level(100.0), RiskLevel::None);
    }

    #[test]
    fn unknown_transmission_level_weighs_nothing() {
        let params = RiskCalculationParameters::default();
        assert_eq!(params.transmission_risk_value(3), 3.0);
        assert_eq!(params.transmission_risk_value(42), 0.0);
    }

    #[test]
    fn parses_configuration_json_with_defaults() {
        let json = r#"{
            "transmissionRiskValueMapping": [
                { "transmissionRiskLevel": 1, "transmissionRiskValue": 1.5 }
            ],
            "normalizedTimePerCheckInToRiskLevelMapping": [
                { "normalizedTimeRange": { "min": 5, "max": 15 }, "riskLevel": "low" },
                { "normalizedTimeRange": { "min": 15, "minExclusive": true }, "riskLevel": "high" }
            ],
            "normalizedTimePerDayToRiskLevelMapping": [],
            "maxCheckInAgeInDays": 3
        }"#;

        let params = parse_parameters(json).unwrap();
        assert_eq!(params.max_checkin_age_in_days, 3);
        assert_eq!(params.transmission_risk_value(1), 1.5);

        let checkin_table = &params.normalized_time_per_checkin_to_risk_level_mapping;
        assert_eq!(checkin_table.0.len(), 2);
        assert_eq!(checkin_table.0[1].normalized_time_range.max, f64::MAX);
        assert_eq!(checkin_table.risk_level(15.0), RiskLevel::Low);
        assert_eq!(checkin_table.risk_level(15.5), RiskLevel::High);
        assert_eq!(
            params.normalized_time_per_day_to_risk_level_mapping.risk_level(100.0),
            RiskLevel::None
        );
    }

    #[test]
    fn missing_age_falls_back_to_default() {
        let params = parse_parameters("{}").unwrap();
        assert_eq!(params.max_checkin_age_in_days, 14);
        assert!(params.transmission_risk_value_mapping.is_empty());
    }

    #[test]
    fn loads_parameters_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "maxCheckInAgeInDays": 10 }}"#).unwrap();

        let params = load_parameters(file.path()).unwrap();
        assert_eq!(params.max_checkin_age_in_days, 10);
    }

    #[test]
    fn reports_missing_and_malformed_files() {
        let missing = load_parameters("/nonexistent/risk-parameters.json");
        assert!(matches!(missing, Err(ConfigError::Io(_))));

        let malformed = parse_parameters("{ not json");
        assert!(matches!(malformed, Err(ConfigError::Parse(_))));
    }
}
