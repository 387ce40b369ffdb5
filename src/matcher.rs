use chrono::{DateTime, Utc};
use tracing::debug;

use crate::models::{
    interval_start, Checkin, CheckinId, CheckinSegment, TraceWarningMatch, TraceWarningPackage,
};
use crate::store::CheckinStore;

/// Looks up the warning matches that were recorded for a checkin.
#[derive(Debug, Clone)]
pub struct TraceWarningMatcher<S> {
    store: S,
}

impl<S: CheckinStore> TraceWarningMatcher<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn matches(&self, checkin_id: CheckinId) -> Vec<TraceWarningMatch> {
        self.store.matches_for_checkin(checkin_id)
    }
}

fn overlap_seconds(
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    other_start: DateTime<Utc>,
    other_end: DateTime<Utc>,
) -> i64 {
    let overlap = (end.min(other_end) - start.max(other_start)).num_seconds();
    overlap.max(0)
}

/// Overlap of a segment and a match, rounded to whole minutes.
pub fn overlap_minutes(segment: &CheckinSegment, warning_match: &TraceWarningMatch) -> i64 {
    let seconds = overlap_seconds(
        segment.start,
        segment.end,
        warning_match.start(),
        warning_match.end(),
    );
    (seconds as f64 / 60.0).round() as i64
}

/// Matches a freshly downloaded warning package against the stored checkins.
///
/// Submitted checkins never receive new matches. Returned rows carry id `0`;
/// the store assigns ids on insert.
pub fn match_package(
    package: &TraceWarningPackage,
    checkins: &[Checkin],
) -> Vec<TraceWarningMatch> {
    let mut matches = Vec::new();

    for checkin in checkins.iter().filter(|checkin| !checkin.submitted) {
        for warning in package
            .warnings
            .iter()
            .filter(|warning| warning.trace_location_id == checkin.trace_location_id)
        {
            let end_interval_number = warning.start_interval_number.saturating_add(warning.period);
            let overlap = overlap_seconds(
                checkin.start,
                checkin.end,
                interval_start(warning.start_interval_number),
                interval_start(end_interval_number),
            );
            if overlap == 0 {
                continue;
            }

            matches.push(TraceWarningMatch {
                id: 0,
                checkin_id: checkin.id,
                trace_warning_package_id: package.id,
                trace_location_id: warning.trace_location_id,
                transmission_risk_level: warning.transmission_risk_level,
                start_interval_number: warning.start_interval_number,
                end_interval_number,
            });
        }
    }

    debug!(
        package_id = package.id,
        warnings = package.warnings.len(),
        matches = matches.len(),
        "matched warning package"
    );
    matches
}
