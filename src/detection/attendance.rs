//! Attendance signal evaluator
//!
//! Pure rules over the trailing attendance window. Records arrive newest
//! first; the streak rule walks from the most recent day backwards and any
//! non-ABSENT status breaks it.

use serde_json::json;

use crate::models::{AttendanceRecord, STATUS_ABSENT};
use super::config::{match_tier, AttendanceThresholds};
use super::signal::{CandidateSignal, RiskType};

pub fn evaluate(
    records: &[AttendanceRecord],
    config: &AttendanceThresholds,
) -> Vec<CandidateSignal> {
    let mut signals = Vec::new();

    let streak = consecutive_absences(records);
    if let Some(severity) = match_tier(&config.consecutive_tiers, streak) {
        signals.push(CandidateSignal::auto(
            RiskType::Attendance,
            severity,
            "Consecutive absences",
            format!("{} consecutive school days absent", streak),
            json!({
                "rule": "consecutive_absences",
                "streak": streak,
                "window_days": config.window_days,
            }),
        ));
    }

    if records.len() >= config.rate_min_records {
        let absent = records.iter().filter(|r| r.status == STATUS_ABSENT).count();
        let rate = absent as f64 / records.len() as f64;
        if let Some(severity) = match_tier(&config.rate_tiers, rate) {
            signals.push(CandidateSignal::auto(
                RiskType::Attendance,
                severity,
                "Chronic absenteeism",
                format!(
                    "Absent {} of {} recorded days ({:.0}%)",
                    absent,
                    records.len(),
                    rate * 100.0
                ),
                json!({
                    "rule": "absence_rate",
                    "absent": absent,
                    "recorded": records.len(),
                    "rate": rate,
                }),
            ));
        }
    }

    signals
}

/// Length of the current absence streak, counted from the newest record
fn consecutive_absences(records: &[AttendanceRecord]) -> u32 {
    records
        .iter()
        .take_while(|r| r.status == STATUS_ABSENT)
        .count() as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::signal::Severity;
    use crate::models::{STATUS_EXCUSED, STATUS_PRESENT};
    use chrono::{Duration, NaiveDate};
    use uuid::Uuid;

    fn record(days_ago: i64, status: &str) -> AttendanceRecord {
        let base = NaiveDate::from_ymd_opt(2026, 3, 20).unwrap();
        AttendanceRecord {
            id: Uuid::new_v4(),
            student_id: Uuid::new_v4(),
            school_id: Uuid::new_v4(),
            record_date: base - Duration::days(days_ago),
            status: status.to_string(),
            reason: None,
            recorded_by: None,
            created_at: None,
        }
    }

    #[test]
    fn three_consecutive_absences_is_high() {
        // Newest first: three absences then two presents in a 5-day window
        let records = vec![
            record(0, STATUS_ABSENT),
            record(1, STATUS_ABSENT),
            record(2, STATUS_ABSENT),
            record(3, STATUS_PRESENT),
            record(4, STATUS_PRESENT),
        ];
        let signals = evaluate(&records, &AttendanceThresholds::default());

        let streak = signals
            .iter()
            .find(|s| s.title == "Consecutive absences")
            .expect("streak signal");
        assert_eq!(streak.severity, Severity::High);
        assert_eq!(streak.risk_type, RiskType::Attendance);
    }

    #[test]
    fn five_consecutive_absences_is_critical() {
        let records: Vec<_> = (0..5).map(|d| record(d, STATUS_ABSENT)).collect();
        let signals = evaluate(&records, &AttendanceThresholds::default());
        assert!(signals.iter().any(|s| s.severity == Severity::Critical));
    }

    #[test]
    fn late_is_not_absent() {
        use crate::models::STATUS_LATE;
        let records = vec![
            record(0, STATUS_ABSENT),
            record(1, STATUS_LATE),
            record(2, STATUS_ABSENT),
            record(3, STATUS_ABSENT),
        ];
        assert_eq!(consecutive_absences(&records), 1);
    }

    #[test]
    fn excused_absence_breaks_the_streak() {
        let records = vec![
            record(0, STATUS_ABSENT),
            record(1, STATUS_ABSENT),
            record(2, STATUS_EXCUSED),
            record(3, STATUS_ABSENT),
        ];
        assert_eq!(consecutive_absences(&records), 2);
        let signals = evaluate(&records, &AttendanceThresholds::default());
        assert!(signals
            .iter()
            .all(|s| s.title != "Consecutive absences"));
    }

    #[test]
    fn absence_rate_needs_minimum_records() {
        // 2 of 3 absent is above every rate tier, but the sample is too small
        let records = vec![
            record(0, STATUS_PRESENT),
            record(1, STATUS_ABSENT),
            record(2, STATUS_ABSENT),
        ];
        let signals = evaluate(&records, &AttendanceThresholds::default());
        assert!(signals.iter().all(|s| s.title != "Chronic absenteeism"));
    }

    #[test]
    fn scattered_absences_trigger_rate_rule_only() {
        let records = vec![
            record(0, STATUS_PRESENT),
            record(1, STATUS_ABSENT),
            record(2, STATUS_PRESENT),
            record(3, STATUS_ABSENT),
            record(4, STATUS_ABSENT),
            record(5, STATUS_PRESENT),
        ];
        let signals = evaluate(&records, &AttendanceThresholds::default());
        assert_eq!(signals.len(), 1);
        assert_eq!(signals[0].title, "Chronic absenteeism");
        assert_eq!(signals[0].severity, Severity::High); // 3/6 = 50%
    }

    #[test]
    fn clean_attendance_is_silent() {
        let records: Vec<_> = (0..10).map(|d| record(d, STATUS_PRESENT)).collect();
        assert!(evaluate(&records, &AttendanceThresholds::default()).is_empty());
    }
}
