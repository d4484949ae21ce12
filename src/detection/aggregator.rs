//! Flag aggregator
//!
//! Reconciles candidate signals against the stored flag set under the
//! (student, type) dedup key. Candidates are merged per type first, then
//! pushed through the storage-level conditional upsert, so concurrent
//! evaluations of the same student cannot produce duplicate active flags.

use std::collections::HashMap;

use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{NewRiskFlag, RiskFlag};
use super::signal::{CandidateSignal, RiskType};

/// What the upsert did for one candidate
#[derive(Debug)]
pub enum FlagOutcome {
    Created(RiskFlag),
    Escalated(RiskFlag),
    /// An active flag of this type already covers the candidate's severity
    Unchanged,
}

impl FlagOutcome {
    pub fn flag(&self) -> Option<&RiskFlag> {
        match self {
            FlagOutcome::Created(flag) | FlagOutcome::Escalated(flag) => Some(flag),
            FlagOutcome::Unchanged => None,
        }
    }
}

/// Collapse candidates to one per risk type, keeping the most severe.
/// Evaluators may emit several signals of the same type (streak and rate,
/// distance and weighted profile); only one active flag may exist per type.
pub fn merge_candidates(candidates: Vec<CandidateSignal>) -> Vec<CandidateSignal> {
    let mut merged: HashMap<RiskType, CandidateSignal> = HashMap::new();
    for candidate in candidates {
        match merged.get(&candidate.risk_type) {
            Some(existing) if existing.severity >= candidate.severity => {}
            _ => {
                merged.insert(candidate.risk_type, candidate);
            }
        }
    }
    let mut out: Vec<CandidateSignal> = merged.into_values().collect();
    out.sort_by_key(|c| std::cmp::Reverse(c.severity));
    out
}

/// Apply one merged candidate through the atomic upsert
pub async fn apply(
    pool: &PgPool,
    student_id: Uuid,
    school_id: Uuid,
    actor_id: Option<Uuid>,
    candidate: &CandidateSignal,
) -> Result<FlagOutcome, sqlx::Error> {
    let data = NewRiskFlag {
        student_id,
        school_id,
        flag_type: candidate.risk_type.as_str().to_string(),
        severity: candidate.severity.as_str().to_string(),
        severity_rank: candidate.severity.rank(),
        title: candidate.title.clone(),
        description: Some(candidate.description.clone()),
        evidence: Some(candidate.evidence.clone()),
        auto_generated: candidate.auto_generated,
        created_by: actor_id,
    };

    match RiskFlag::upsert_active(pool, data).await? {
        Some((flag, true)) => {
            tracing::info!(
                "Risk flag created: {} {} for student {}",
                flag.severity, flag.flag_type, student_id
            );
            Ok(FlagOutcome::Created(flag))
        }
        Some((flag, false)) => {
            tracing::info!(
                "Risk flag escalated to {}: {} for student {}",
                flag.severity, flag.flag_type, student_id
            );
            Ok(FlagOutcome::Escalated(flag))
        }
        None => Ok(FlagOutcome::Unchanged),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::signal::Severity;
    use serde_json::json;

    fn candidate(risk_type: RiskType, severity: Severity, title: &str) -> CandidateSignal {
        CandidateSignal::auto(risk_type, severity, title, "test", json!({}))
    }

    #[test]
    fn merge_keeps_one_candidate_per_type() {
        let merged = merge_candidates(vec![
            candidate(RiskType::Attendance, Severity::High, "Consecutive absences"),
            candidate(RiskType::Attendance, Severity::Medium, "Chronic absenteeism"),
            candidate(RiskType::Performance, Severity::Medium, "Failing grade"),
        ]);
        assert_eq!(merged.len(), 2);
        let attendance = merged
            .iter()
            .find(|c| c.risk_type == RiskType::Attendance)
            .unwrap();
        assert_eq!(attendance.severity, Severity::High);
        assert_eq!(attendance.title, "Consecutive absences");
    }

    #[test]
    fn merge_prefers_first_seen_on_equal_severity() {
        let merged = merge_candidates(vec![
            candidate(RiskType::Socioeconomic, Severity::High, "Long distance to school"),
            candidate(RiskType::Socioeconomic, Severity::High, "Socioeconomic vulnerability"),
        ]);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].title, "Long distance to school");
    }

    #[test]
    fn merge_orders_most_severe_first() {
        let merged = merge_candidates(vec![
            candidate(RiskType::Performance, Severity::Low, "a"),
            candidate(RiskType::Socioeconomic, Severity::Critical, "b"),
            candidate(RiskType::Attendance, Severity::High, "c"),
        ]);
        let severities: Vec<_> = merged.iter().map(|c| c.severity).collect();
        assert_eq!(
            severities,
            vec![Severity::Critical, Severity::High, Severity::Low]
        );
    }

    #[test]
    fn merge_of_empty_is_empty() {
        assert!(merge_candidates(vec![]).is_empty());
    }
}
