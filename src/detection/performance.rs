//! Performance signal evaluator
//!
//! Two independent rules: failing letter grades on recent records, and a
//! per-subject term-over-term average drop. A later passing score never
//! retracts an earlier signal; flag resolution is an explicit action.

use std::collections::BTreeMap;

use serde_json::json;

use crate::models::PerformanceRecord;
use super::config::{match_tier, PerformanceThresholds};
use super::signal::{CandidateSignal, RiskType};

pub fn evaluate(
    records: &[PerformanceRecord],
    config: &PerformanceThresholds,
) -> Vec<CandidateSignal> {
    let mut signals = Vec::new();

    for record in records {
        let severity = match record.grade.as_str() {
            "F" => Some(config.grade_f_severity),
            "E" => Some(config.grade_e_severity),
            _ => None,
        };
        if let Some(severity) = severity {
            signals.push(CandidateSignal::auto(
                RiskType::Performance,
                severity,
                "Failing grade",
                format!(
                    "Scored {} ({:.0}/{:.0}) in {}, {} {}",
                    record.grade, record.score, record.max_score,
                    record.subject, record.term, record.academic_year
                ),
                json!({
                    "rule": "failing_grade",
                    "subject": record.subject,
                    "term": record.term,
                    "academic_year": record.academic_year,
                    "grade": record.grade,
                    "score": record.score,
                    "max_score": record.max_score,
                }),
            ));
        }
    }

    signals.extend(term_drop_signals(records, config));
    signals
}

/// Per-subject average drop between the two most recent terms
fn term_drop_signals(
    records: &[PerformanceRecord],
    config: &PerformanceThresholds,
) -> Vec<CandidateSignal> {
    // subject -> (year, term) -> percentages; BTreeMap keeps term keys
    // ordered so the last two entries are the latest and previous terms
    let mut by_subject: BTreeMap<&str, BTreeMap<(&str, &str), Vec<f64>>> = BTreeMap::new();
    for record in records {
        by_subject
            .entry(record.subject.as_str())
            .or_default()
            .entry((record.academic_year.as_str(), record.term.as_str()))
            .or_default()
            .push(record.percentage());
    }

    let mut signals = Vec::new();
    for (subject, terms) in by_subject {
        if terms.len() < 2 {
            continue;
        }
        let mut averages: Vec<((&str, &str), f64)> = terms
            .into_iter()
            .map(|(key, scores)| {
                let avg = scores.iter().sum::<f64>() / scores.len() as f64;
                (key, avg)
            })
            .collect();
        // Ascending by (year, term); the tail holds previous and latest
        let (latest, previous) = match (averages.pop(), averages.pop()) {
            (Some(latest), Some(previous)) => (latest, previous),
            _ => continue,
        };
        let ((latest_year, latest_term), latest_avg) = latest;
        let ((prev_year, prev_term), prev_avg) = previous;

        let drop = prev_avg - latest_avg;
        if let Some(severity) = match_tier(&config.drop_tiers, drop) {
            signals.push(CandidateSignal::auto(
                RiskType::Performance,
                severity,
                "Performance drop",
                format!(
                    "{} average fell {:.0} points, {} {} ({:.0}%) to {} {} ({:.0}%)",
                    subject, drop,
                    prev_term, prev_year, prev_avg,
                    latest_term, latest_year, latest_avg
                ),
                json!({
                    "rule": "term_drop",
                    "subject": subject,
                    "previous_term": { "term": prev_term, "academic_year": prev_year, "average": prev_avg },
                    "latest_term": { "term": latest_term, "academic_year": latest_year, "average": latest_avg },
                    "drop": drop,
                }),
            ));
        }
    }
    signals
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::signal::Severity;
    use crate::models::performance::letter_grade;
    use uuid::Uuid;

    fn record(subject: &str, term: &str, year: &str, score: f32) -> PerformanceRecord {
        PerformanceRecord {
            id: Uuid::new_v4(),
            student_id: Uuid::new_v4(),
            school_id: Uuid::new_v4(),
            subject: subject.to_string(),
            term: term.to_string(),
            academic_year: year.to_string(),
            score,
            max_score: 100.0,
            grade: letter_grade(score, 100.0).to_string(),
            recorded_by: None,
            created_at: None,
        }
    }

    #[test]
    fn grade_f_emits_high_signal() {
        let records = vec![record("Mathematics", "Term 1", "2026", 45.0)];
        let signals = evaluate(&records, &PerformanceThresholds::default());
        assert_eq!(signals.len(), 1);
        assert_eq!(signals[0].severity, Severity::High);
        assert_eq!(signals[0].risk_type, RiskType::Performance);
    }

    #[test]
    fn grade_e_emits_medium_signal() {
        let records = vec![record("Kinyarwanda", "Term 1", "2026", 52.0)];
        let signals = evaluate(&records, &PerformanceThresholds::default());
        assert_eq!(signals.len(), 1);
        assert_eq!(signals[0].severity, Severity::Medium);
    }

    #[test]
    fn later_passing_grade_does_not_retract_signal() {
        // The failing record still produces its signal; resolution of the
        // resulting flag is a manual action, never an evaluator output.
        let records = vec![
            record("Mathematics", "Term 1", "2026", 45.0),
            record("Mathematics", "Term 1", "2026", 85.0),
        ];
        let signals = evaluate(&records, &PerformanceThresholds::default());
        assert_eq!(signals.len(), 1);
        assert_eq!(signals[0].title, "Failing grade");
    }

    #[test]
    fn term_over_term_drop_is_detected() {
        let records = vec![
            record("Science", "Term 1", "2026", 88.0),
            record("Science", "Term 1", "2026", 92.0),
            record("Science", "Term 2", "2026", 65.0),
            record("Science", "Term 2", "2026", 69.0),
        ];
        // 90 -> 67: a 23-point drop
        let signals = evaluate(&records, &PerformanceThresholds::default());
        let drop = signals
            .iter()
            .find(|s| s.title == "Performance drop")
            .expect("drop signal");
        assert_eq!(drop.severity, Severity::Medium);
    }

    #[test]
    fn steep_drop_is_high() {
        let records = vec![
            record("Science", "Term 1", "2026", 90.0),
            record("Science", "Term 2", "2026", 62.0),
        ];
        let signals = evaluate(&records, &PerformanceThresholds::default());
        assert!(signals
            .iter()
            .any(|s| s.title == "Performance drop" && s.severity == Severity::High));
    }

    #[test]
    fn small_dip_and_single_term_are_silent() {
        let records = vec![
            record("History", "Term 1", "2026", 80.0),
            record("History", "Term 2", "2026", 74.0),
            record("Geography", "Term 2", "2026", 71.0),
        ];
        assert!(evaluate(&records, &PerformanceThresholds::default()).is_empty());
    }
}
