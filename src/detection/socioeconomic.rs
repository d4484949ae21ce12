//! Socioeconomic signal evaluator
//!
//! Evaluated at registration and whenever the profile changes. Distance to
//! school maps directly to a severity tier; the remaining factors combine
//! into a weighted score bucketed to a tier.

use serde_json::json;

use crate::models::Student;
use super::config::{match_tier, SocioeconomicThresholds};
use super::signal::{CandidateSignal, RiskType};

pub const PRESENCE_BOTH: &str = "BOTH";
pub const PRESENCE_ONE: &str = "ONE";
pub const PRESENCE_NONE: &str = "NONE";

pub const EDUCATION_NONE: &str = "NONE";
pub const EDUCATION_PRIMARY: &str = "PRIMARY";

pub fn evaluate(student: &Student, config: &SocioeconomicThresholds) -> Vec<CandidateSignal> {
    let mut signals = Vec::new();

    if let Some(distance) = student.distance_to_school_km {
        if let Some(severity) = match_tier(&config.distance_tiers, distance) {
            signals.push(CandidateSignal::auto(
                RiskType::Socioeconomic,
                severity,
                "Long distance to school",
                format!("Student lives {:.1} km from school", distance),
                json!({
                    "rule": "distance_to_school",
                    "distance_km": distance,
                }),
            ));
        }
    }

    let (score, factors) = weighted_score(student, config);
    if let Some(severity) = match_tier(&config.score_tiers, score) {
        signals.push(CandidateSignal::auto(
            RiskType::Socioeconomic,
            severity,
            "Socioeconomic vulnerability",
            format!("Weighted vulnerability score of {} ({})", score, factors.join(", ")),
            json!({
                "rule": "weighted_profile",
                "score": score,
                "factors": factors,
            }),
        ));
    }

    signals
}

/// Weighted vulnerability score with the human-readable factors behind it
fn weighted_score(student: &Student, config: &SocioeconomicThresholds) -> (u32, Vec<String>) {
    let mut score = 0u32;
    let mut factors = Vec::new();

    if let Some(tier) = student.ubudehe_tier {
        // Tier 1 is the poorest; points fall as the tier rises
        let idx = (tier.max(1) as usize) - 1;
        let points = config.ubudehe_points.get(idx).copied().unwrap_or(0);
        if points > 0 {
            score += points;
            factors.push(format!("ubudehe tier {}", tier));
        }
    }

    match student.parental_presence.as_deref() {
        Some(PRESENCE_NONE) => {
            score += config.no_parent_points;
            factors.push("no parents present".to_string());
        }
        Some(PRESENCE_ONE) => {
            score += config.single_parent_points;
            factors.push("single parent".to_string());
        }
        _ => {}
    }

    if student.family_stable == Some(false) {
        score += config.family_instability_points;
        factors.push("unstable family situation".to_string());
    }

    if let Some(count) = student.sibling_count {
        if count >= config.sibling_count_threshold {
            score += config.sibling_points;
            factors.push(format!("{} siblings", count));
        }
    }

    match student.parent_education.as_deref() {
        Some(EDUCATION_NONE) => {
            score += config.parent_no_education_points;
            factors.push("parent without formal education".to_string());
        }
        Some(EDUCATION_PRIMARY) => {
            score += config.parent_primary_education_points;
            factors.push("parent with primary education only".to_string());
        }
        _ => {}
    }

    (score, factors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::signal::Severity;
    use uuid::Uuid;

    fn student() -> Student {
        Student {
            id: Uuid::new_v4(),
            school_id: Uuid::new_v4(),
            first_name: "Aline".to_string(),
            last_name: "Uwase".to_string(),
            is_active: Some(true),
            ubudehe_tier: Some(3),
            parental_presence: Some(PRESENCE_BOTH.to_string()),
            family_stable: Some(true),
            distance_to_school_km: Some(1.0),
            sibling_count: Some(2),
            parent_education: Some("SECONDARY".to_string()),
            risk_level: "NONE".to_string(),
            created_at: None,
            updated_at: None,
        }
    }

    #[test]
    fn eight_km_distance_is_critical() {
        let mut s = student();
        s.distance_to_school_km = Some(8.0);
        let signals = evaluate(&s, &SocioeconomicThresholds::default());
        let distance = signals
            .iter()
            .find(|s| s.title == "Long distance to school")
            .expect("distance signal");
        assert_eq!(distance.severity, Severity::Critical);
        assert_eq!(distance.risk_type, RiskType::Socioeconomic);
    }

    #[test]
    fn distance_tiers_step_down() {
        let config = SocioeconomicThresholds::default();
        for (km, expected) in [(7.0, Severity::Critical), (5.0, Severity::High), (3.5, Severity::Medium)] {
            let mut s = student();
            s.distance_to_school_km = Some(km);
            let signals = evaluate(&s, &config);
            assert_eq!(signals[0].severity, expected, "at {} km", km);
        }
    }

    #[test]
    fn stable_nearby_household_is_silent() {
        let signals = evaluate(&student(), &SocioeconomicThresholds::default());
        assert!(signals.is_empty());
    }

    #[test]
    fn compounded_factors_reach_critical() {
        let mut s = student();
        s.ubudehe_tier = Some(1); // 3 points
        s.parental_presence = Some(PRESENCE_NONE.to_string()); // 3 points
        s.family_stable = Some(false); // 2 points
        let signals = evaluate(&s, &SocioeconomicThresholds::default());
        let weighted = signals
            .iter()
            .find(|s| s.title == "Socioeconomic vulnerability")
            .expect("weighted signal");
        assert_eq!(weighted.severity, Severity::Critical);
    }

    #[test]
    fn single_parent_alone_is_below_threshold() {
        let mut s = student();
        s.ubudehe_tier = Some(4); // no points at tier 4
        s.parental_presence = Some(PRESENCE_ONE.to_string()); // 1 point, below lowest tier
        let signals = evaluate(&s, &SocioeconomicThresholds::default());
        assert!(signals.is_empty());
    }
}
