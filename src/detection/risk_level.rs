//! Risk level calculator
//!
//! Derives the single aggregate level from a student's active flags and
//! persists it. Runs in the same request context as the flag mutation
//! that triggered it, so the projection never lags the flag store.

use std::collections::HashSet;

use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{RiskFlag, Student};
use super::config::EscalationPolicy;
use super::signal::{RiskLevel, Severity};

/// Aggregate level from active (severity_rank, flag_type) pairs.
/// Baseline is the maximum severity; enough distinct types at or above
/// the policy's severity floor bump it by the configured tiers.
pub fn derive(active: &[(i16, String)], policy: &EscalationPolicy) -> RiskLevel {
    let severities: Vec<(Severity, &str)> = active
        .iter()
        .filter_map(|(rank, flag_type)| {
            Severity::from_rank(*rank).map(|s| (s, flag_type.as_str()))
        })
        .collect();

    let Some(max) = severities.iter().map(|(s, _)| *s).max() else {
        return RiskLevel::None;
    };

    let baseline = RiskLevel::from_severity(max);

    let severe_types: HashSet<&str> = severities
        .iter()
        .filter(|(s, _)| *s >= policy.min_severity)
        .map(|(_, t)| *t)
        .collect();

    if severe_types.len() >= policy.min_distinct_types {
        baseline.escalate(policy.bump_tiers)
    } else {
        baseline
    }
}

/// Recompute and persist; returns the new level
pub async fn recompute_for_student(
    pool: &PgPool,
    student_id: Uuid,
    policy: &EscalationPolicy,
) -> Result<RiskLevel, sqlx::Error> {
    let active = RiskFlag::active_rank_pairs(pool, student_id).await?;
    let level = derive(&active, policy);
    Student::update_risk_level(pool, student_id, level.as_str()).await?;

    tracing::debug!(
        "Risk level for student {} recomputed to {} from {} active flags",
        student_id, level.as_str(), active.len()
    );
    Ok(level)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair(severity: Severity, flag_type: &str) -> (i16, String) {
        (severity.rank(), flag_type.to_string())
    }

    #[test]
    fn no_active_flags_is_none() {
        assert_eq!(derive(&[], &EscalationPolicy::default()), RiskLevel::None);
    }

    #[test]
    fn baseline_is_max_severity() {
        let active = vec![
            pair(Severity::Low, "ATTENDANCE"),
            pair(Severity::Medium, "PERFORMANCE"),
        ];
        assert_eq!(derive(&active, &EscalationPolicy::default()), RiskLevel::Medium);
    }

    #[test]
    fn two_distinct_high_types_escalate_one_tier() {
        let active = vec![
            pair(Severity::High, "ATTENDANCE"),
            pair(Severity::High, "PERFORMANCE"),
        ];
        assert_eq!(derive(&active, &EscalationPolicy::default()), RiskLevel::Critical);
    }

    #[test]
    fn single_high_flag_does_not_escalate() {
        let active = vec![
            pair(Severity::High, "ATTENDANCE"),
            pair(Severity::Low, "SOCIOECONOMIC"),
        ];
        assert_eq!(derive(&active, &EscalationPolicy::default()), RiskLevel::High);
    }

    #[test]
    fn escalation_caps_at_critical() {
        let active = vec![
            pair(Severity::Critical, "ATTENDANCE"),
            pair(Severity::Critical, "SOCIOECONOMIC"),
        ];
        assert_eq!(derive(&active, &EscalationPolicy::default()), RiskLevel::Critical);
    }

    #[test]
    fn resolving_down_to_remaining_flags() {
        // Monotone downgrade: after the only HIGH flag goes away, the level
        // is exactly what the remaining flags imply.
        let policy = EscalationPolicy::default();
        let before = vec![
            pair(Severity::High, "ATTENDANCE"),
            pair(Severity::Low, "SOCIOECONOMIC"),
        ];
        assert_eq!(derive(&before, &policy), RiskLevel::High);

        let after = vec![pair(Severity::Low, "SOCIOECONOMIC")];
        assert_eq!(derive(&after, &policy), RiskLevel::Low);

        assert_eq!(derive(&[], &policy), RiskLevel::None);
    }

    #[test]
    fn custom_policy_is_honored() {
        let policy = EscalationPolicy {
            min_severity: Severity::Medium,
            min_distinct_types: 3,
            bump_tiers: 2,
        };
        let active = vec![
            pair(Severity::Medium, "ATTENDANCE"),
            pair(Severity::Medium, "PERFORMANCE"),
            pair(Severity::Medium, "SOCIOECONOMIC"),
        ];
        assert_eq!(derive(&active, &policy), RiskLevel::Critical);
    }
}
