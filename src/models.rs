use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type CheckinId = i64;

/// Length of one warning interval in seconds.
pub const INTERVAL_SECONDS: i64 = 600;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkin {
    pub id: CheckinId,
    pub trace_location_id: Uuid,
    pub description: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub submitted: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewCheckin {
    pub trace_location_id: Uuid,
    pub description: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    #[serde(default)]
    pub submitted: bool,
}

/// A checkin clipped to one calendar day.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckinSegment {
    pub checkin_id: CheckinId,
    pub date: NaiveDate,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceWarningMatch {
    pub id: i64,
    pub checkin_id: CheckinId,
    pub trace_warning_package_id: i64,
    pub trace_location_id: Uuid,
    pub transmission_risk_level: i32,
    pub start_interval_number: i64,
    pub end_interval_number: i64,
}

impl TraceWarningMatch {
    pub fn start(&self) -> DateTime<Utc> {
        interval_start(self.start_interval_number)
    }

    pub fn end(&self) -> DateTime<Utc> {
        interval_start(self.end_interval_number)
    }
}

/// Start of a 10-minute epoch interval. Numbers outside chrono's range clamp to its bounds.
pub fn interval_start(interval_number: i64) -> DateTime<Utc> {
    let seconds = interval_number.saturating_mul(INTERVAL_SECONDS);
    match Utc.timestamp_opt(seconds, 0).single() {
        Some(timestamp) => timestamp,
        None if seconds < 0 => DateTime::<Utc>::MIN_UTC,
        None => DateTime::<Utc>::MAX_UTC,
    }
}

pub fn interval_number(timestamp: DateTime<Utc>) -> i64 {
    timestamp.timestamp().div_euclid(INTERVAL_SECONDS)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TraceTimeIntervalWarning {
    pub trace_location_id: Uuid,
    pub start_interval_number: i64,
    pub period: i64,
    pub transmission_risk_level: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TraceWarningPackage {
    pub id: i64,
    pub warnings: Vec<TraceTimeIntervalWarning>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    #[default]
    None,
    Low,
    High,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::None => "none",
            RiskLevel::Low => "low",
            RiskLevel::High => "high",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckinIdWithRisk {
    pub checkin_id: CheckinId,
    pub risk_level: RiskLevel,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckinRiskCalculationResult {
    pub calculation_date: DateTime<Utc>,
    pub checkin_ids_with_risk_per_date: BTreeMap<NaiveDate, Vec<CheckinIdWithRisk>>,
    pub risk_level_per_date: BTreeMap<NaiveDate, RiskLevel>,
}

impl CheckinRiskCalculationResult {
    /// Highest day-level risk across all dates.
    pub fn risk_level(&self) -> RiskLevel {
        self.risk_level_per_date
            .values()
            .copied()
            .max()
            .unwrap_or(RiskLevel::None)
    }

    pub fn most_recent_date_with(&self, level: RiskLevel) -> Option<NaiveDate> {
        self.risk_level_per_date
            .iter()
            .rev()
            .find(|(_, risk)| **risk == level)
            .map(|(date, _)| *date)
    }

    pub fn number_of_days_with(&self, level: RiskLevel) -> usize {
        self.risk_level_per_date
            .values()
            .filter(|risk| **risk == level)
            .count()
    }

    pub fn number_of_checkins_with(&self, level: RiskLevel) -> usize {
        self.checkin_ids_with_risk_per_date
            .values()
            .flatten()
            .filter(|entry| entry.risk_level == level)
            .count()
    }
}
