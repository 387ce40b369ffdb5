//! Checkin based risk calculation.
//!
//! Every checkin that is neither submitted nor older than the configured age
//! is split into calendar-day segments. Each segment's overlap with the
//! checkin's warning matches is weighted by transmission risk and summed into
//! a normalized time, once per checkin and day and once per day. Both sums
//! are mapped to risk levels through their own range tables.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use tracing::debug;

use crate::matcher::{overlap_minutes, TraceWarningMatcher};
use crate::models::{
    Checkin, CheckinId, CheckinIdWithRisk, CheckinRiskCalculationResult, CheckinSegment,
    RiskLevel, TraceWarningMatch,
};
use crate::parameters::RiskCalculationParameters;
use crate::splitting::CheckinSplitter;
use crate::store::CheckinStore;

pub struct CheckinRiskCalculation<'a, S: ?Sized> {
    store: &'a S,
    splitter: CheckinSplitter,
    matcher: TraceWarningMatcher<&'a S>,
}

#[derive(Debug, Default)]
struct NormalizedTimes {
    per_checkin: BTreeMap<(NaiveDate, CheckinId), f64>,
    per_date: BTreeMap<NaiveDate, f64>,
}

impl NormalizedTimes {
    fn add(&mut self, segment: &CheckinSegment, normalized_time: f64) {
        *self
            .per_checkin
            .entry((segment.date, segment.checkin_id))
            .or_insert(0.0) += normalized_time;
        *self.per_date.entry(segment.date).or_insert(0.0) += normalized_time;
    }
}

impl<'a, S: CheckinStore + ?Sized> CheckinRiskCalculation<'a, S> {
    pub fn new(store: &'a S, splitter: CheckinSplitter) -> Self {
        Self {
            store,
            splitter,
            matcher: TraceWarningMatcher::new(store),
        }
    }

    pub fn calculate_risk(
        &self,
        parameters: &RiskCalculationParameters,
        now: DateTime<Utc>,
    ) -> CheckinRiskCalculationResult {
        let checkins = relevant_checkins(self.store.checkins(), parameters, now);
        let mut times = NormalizedTimes::default();

        for checkin in &checkins {
            let matches = self.matcher.matches(checkin.id);
            if matches.is_empty() {
                continue;
            }

            for segment in self.splitter.split(checkin) {
                let normalized_time = segment_normalized_time(&segment, &matches, parameters);
                if let Some(normalized_time) = normalized_time {
                    times.add(&segment, normalized_time);
                }
            }
        }

        let result = assemble(times, parameters, now);
        debug!(
            checkins = checkins.len(),
            dates_with_risk = result.risk_level_per_date.len(),
            dates_with_checkin_risk = result.checkin_ids_with_risk_per_date.len(),
            "calculated checkin risk"
        );
        result
    }
}

fn relevant_checkins(
    checkins: Vec<Checkin>,
    parameters: &RiskCalculationParameters,
    now: DateTime<Utc>,
) -> Vec<Checkin> {
    // An age reaching past chrono's range keeps every checkin.
    let cutoff = Duration::try_days(i64::from(parameters.max_checkin_age_in_days))
        .and_then(|max_age| now.checked_sub_signed(max_age));
    let total = checkins.len();
    let relevant: Vec<Checkin> = checkins
        .into_iter()
        .filter(|checkin| !checkin.submitted)
        .filter(|checkin| cutoff.map_or(true, |cutoff| checkin.end >= cutoff))
        .collect();

    debug!(
        total,
        relevant = relevant.len(),
        cutoff = ?cutoff,
        "filtered submitted and expired checkins"
    );
    relevant
}

/// Weighted overlap of a segment with its matches; `None` when no match overlaps it.
fn segment_normalized_time(
    segment: &CheckinSegment,
    matches: &[TraceWarningMatch],
    parameters: &RiskCalculationParameters,
) -> Option<f64> {
    let mut overlapping = false;
    let mut normalized_time = 0.0;

    for warning_match in matches {
        let minutes = overlap_minutes(segment, warning_match);
        if minutes <= 0 {
            continue;
        }
        overlapping = true;
        let value = parameters.transmission_risk_value(warning_match.transmission_risk_level);
        normalized_time += minutes as f64 * value;
    }

    overlapping.then_some(normalized_time)
}

fn assemble(
    times: NormalizedTimes,
    parameters: &RiskCalculationParameters,
    now: DateTime<Utc>,
) -> CheckinRiskCalculationResult {
    let mut checkin_ids_with_risk_per_date: BTreeMap<NaiveDate, Vec<CheckinIdWithRisk>> =
        BTreeMap::new();
    let mut risk_level_per_date = BTreeMap::new();

    for ((date, checkin_id), normalized_time) in times.per_checkin {
        let risk_level = parameters
            .normalized_time_per_checkin_to_risk_level_mapping
            .risk_level(normalized_time);
        if risk_level == RiskLevel::None {
            continue;
        }
        checkin_ids_with_risk_per_date
            .entry(date)
            .or_default()
            .push(CheckinIdWithRisk {
                checkin_id,
                risk_level,
            });
    }

    for (date, normalized_time) in times.per_date {
        let risk_level = parameters
            .normalized_time_per_day_to_risk_level_mapping
            .risk_level(normalized_time);
        if risk_level >= RiskLevel::Low {
            risk_level_per_date.insert(date, risk_level);
        }
    }

    CheckinRiskCalculationResult {
        calculation_date: now,
        checkin_ids_with_risk_per_date,
        risk_level_per_date,
    }
}
