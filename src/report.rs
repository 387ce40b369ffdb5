use std::collections::BTreeMap;
use std::fmt::Write;

use crate::models::{Checkin, CheckinId, CheckinRiskCalculationResult, RiskLevel};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RiskLevelSummary {
    pub risk_level: RiskLevel,
    pub days: usize,
    pub checkins: usize,
}

pub fn summarize_by_level(result: &CheckinRiskCalculationResult) -> Vec<RiskLevelSummary> {
    [RiskLevel::High, RiskLevel::Low]
        .into_iter()
        .map(|risk_level| RiskLevelSummary {
            risk_level,
            days: result.number_of_days_with(risk_level),
            checkins: result.number_of_checkins_with(risk_level),
        })
        .collect()
}

pub fn build_report(result: &CheckinRiskCalculationResult, checkins: &[Checkin]) -> String {
    let descriptions: BTreeMap<CheckinId, &str> = checkins
        .iter()
        .map(|checkin| (checkin.id, checkin.description.as_str()))
        .collect();

    let mut output = String::new();

    let _ = writeln!(output, "# Checkin Risk Report");
    let _ = writeln!(
        output,
        "Calculated at {} (overall risk: {})",
        result.calculation_date.to_rfc3339(),
        result.risk_level().as_str()
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Summary");

    for summary in summarize_by_level(result) {
        let _ = writeln!(
            output,
            "- {}: {} days, {} checkin days",
            summary.risk_level.as_str(),
            summary.days,
            summary.checkins
        );
    }

    if let Some(date) = result.most_recent_date_with(result.risk_level()) {
        let _ = writeln!(output, "- most recent day at overall risk: {date}");
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Risk Per Day");

    if result.risk_level_per_date.is_empty() {
        let _ = writeln!(output, "No day reached low risk.");
    } else {
        for (date, risk_level) in result.risk_level_per_date.iter().rev() {
            let _ = writeln!(output, "- {}: {}", date, risk_level.as_str());
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Checkins With Risk");

    if result.checkin_ids_with_risk_per_date.is_empty() {
        let _ = writeln!(output, "No checkins with risk.");
    } else {
        for (date, entries) in result.checkin_ids_with_risk_per_date.iter().rev() {
            for entry in entries {
                let description = descriptions
                    .get(&entry.checkin_id)
                    .copied()
                    .unwrap_or("unknown location");
                let _ = writeln!(
                    output,
                    "- {} checkin #{} ({}): {}",
                    date,
                    entry.checkin_id,
                    description,
                    entry.risk_level.as_str()
                );
            }
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CheckinIdWithRisk;
    use chrono::{NaiveDate, TimeZone, Utc};
    use uuid::Uuid;

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2021, 3, day).unwrap()
    }

    fn sample_result() -> CheckinRiskCalculationResult {
        let mut checkin_ids_with_risk_per_date = BTreeMap::new();
        checkin_ids_with_risk_per_date.insert(
            date(4),
            vec![CheckinIdWithRisk {
                checkin_id: 1,
                risk_level: RiskLevel::High,
            }],
        );
        checkin_ids_with_risk_per_date.insert(
            date(5),
            vec![CheckinIdWithRisk {
                checkin_id: 2,
                risk_level: RiskLevel::Low,
            }],
        );
        let mut risk_level_per_date = BTreeMap::new();
        risk_level_per_date.insert(date(4), RiskLevel::High);

        CheckinRiskCalculationResult {
            calculation_date: Utc.with_ymd_and_hms(2021, 3, 6, 12, 0, 0).unwrap(),
            checkin_ids_with_risk_per_date,
            risk_level_per_date,
        }
    }

    #[test]
    fn summary_counts_days_and_checkins() {
        let summaries = summarize_by_level(&sample_result());
        assert_eq!(
            summaries,
            vec![
                RiskLevelSummary {
                    risk_level: RiskLevel::High,
                    days: 1,
                    checkins: 1
                },
                RiskLevelSummary {
                    risk_level: RiskLevel::Low,
                    days: 0,
                    checkins: 1
                },
            ]
        );
    }

    #[test]
    fn report_lists_days_and_checkins() {
        let checkins = vec![Checkin {
            id: 1,
            trace_location_id: Uuid::nil(),
            description: "Concert Hall".to_string(),
            start: Utc.with_ymd_and_hms(2021, 3, 4, 19, 0, 0).unwrap(),
            end: Utc.with_ymd_and_hms(2021, 3, 4, 22, 0, 0).unwrap(),
            submitted: false,
        }];

        let report = build_report(&sample_result(), &checkins);
        assert!(report.contains("overall risk: high"));
        assert!(report.contains("- 2021-03-04: high"));
        assert!(report.contains("checkin #1 (Concert Hall): high"));
        assert!(report.contains("checkin #2 (unknown location): low"));
        assert!(report.contains("most recent day at overall risk: 2021-03-04"));
    }

    #[test]
    fn empty_result_renders_placeholders() {
        let result = CheckinRiskCalculationResult {
            calculation_date: Utc::now(),
            checkin_ids_with_risk_per_date: BTreeMap::new(),
            risk_level_per_date: BTreeMap::new(),
        };
        let report = build_report(&result, &[]);
        assert!(report.contains("No day reached low risk."));
        assert!(report.contains("No checkins with risk."));
    }
}
