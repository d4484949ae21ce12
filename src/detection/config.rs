//! Detection threshold configuration
//!
//! All rule thresholds live here so deployments can tune them without
//! touching the evaluators. Defaults are set in code; a JSON file named
//! by `RISK_CONFIG_PATH` overrides them wholesale.

use serde::{Deserialize, Serialize};

use super::signal::Severity;

/// A severity tier: values at or above `at_least` map to `severity`.
/// Tier tables are kept sorted descending and the first match wins.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tier<T> {
    pub at_least: T,
    pub severity: Severity,
}

/// Attendance rule thresholds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttendanceThresholds {
    /// Trailing window length in days
    pub window_days: i64,
    /// Consecutive-absence tiers (count, descending)
    pub consecutive_tiers: Vec<Tier<u32>>,
    /// Absence-rate tiers (fraction of recorded days, descending)
    pub rate_tiers: Vec<Tier<f64>>,
    /// Minimum records in the window before the rate rule applies
    pub rate_min_records: usize,
}

impl Default for AttendanceThresholds {
    fn default() -> Self {
        Self {
            window_days: 30,
            consecutive_tiers: vec![
                Tier { at_least: 5, severity: Severity::Critical },
                Tier { at_least: 3, severity: Severity::High },
            ],
            rate_tiers: vec![
                Tier { at_least: 0.5, severity: Severity::High },
                Tier { at_least: 0.3, severity: Severity::Medium },
            ],
            rate_min_records: 5,
        }
    }
}

/// Performance rule thresholds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceThresholds {
    /// Severity of a failing grade (F)
    pub grade_f_severity: Severity,
    /// Severity of a near-failing grade (E)
    pub grade_e_severity: Severity,
    /// Term-over-term average drop tiers (percentage points, descending)
    pub drop_tiers: Vec<Tier<f64>>,
}

impl Default for PerformanceThresholds {
    fn default() -> Self {
        Self {
            grade_f_severity: Severity::High,
            grade_e_severity: Severity::Medium,
            drop_tiers: vec![
                Tier { at_least: 25.0, severity: Severity::High },
                Tier { at_least: 15.0, severity: Severity::Medium },
            ],
        }
    }
}

/// Socioeconomic rule thresholds and factor weights
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SocioeconomicThresholds {
    /// Distance-to-school tiers in km (descending)
    pub distance_tiers: Vec<Tier<f32>>,
    /// Points per ubudehe tier, indexed by tier - 1 (tier 1 = poorest)
    pub ubudehe_points: Vec<u32>,
    /// Points when no parent is present
    pub no_parent_points: u32,
    /// Points when a single parent is present
    pub single_parent_points: u32,
    /// Points for an unstable family situation
    pub family_instability_points: u32,
    /// Sibling count at or above which points are added
    pub sibling_count_threshold: i32,
    pub sibling_points: u32,
    /// Points when the parent has no formal education
    pub parent_no_education_points: u32,
    /// Points when the parent has only primary education
    pub parent_primary_education_points: u32,
    /// Weighted-score tiers (descending)
    pub score_tiers: Vec<Tier<u32>>,
}

impl Default for SocioeconomicThresholds {
    fn default() -> Self {
        Self {
            distance_tiers: vec![
                Tier { at_least: 7.0, severity: Severity::Critical },
                Tier { at_least: 5.0, severity: Severity::High },
                Tier { at_least: 3.0, severity: Severity::Medium },
            ],
            ubudehe_points: vec![3, 2, 1, 0],
            no_parent_points: 3,
            single_parent_points: 1,
            family_instability_points: 2,
            sibling_count_threshold: 6,
            sibling_points: 1,
            parent_no_education_points: 2,
            parent_primary_education_points: 1,
            score_tiers: vec![
                Tier { at_least: 8, severity: Severity::Critical },
                Tier { at_least: 6, severity: Severity::High },
                Tier { at_least: 4, severity: Severity::Medium },
                Tier { at_least: 2, severity: Severity::Low },
            ],
        }
    }
}

/// How co-occurring severe flags escalate the aggregate risk level.
/// Kept as data rather than code: the rule is policy, not arithmetic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EscalationPolicy {
    /// Flags at or above this severity count toward co-occurrence
    pub min_severity: Severity,
    /// Distinct flag types required before the bump applies
    pub min_distinct_types: usize,
    /// Tiers added to the baseline level (saturating at CRITICAL)
    pub bump_tiers: u8,
}

impl Default for EscalationPolicy {
    fn default() -> Self {
        Self {
            min_severity: Severity::High,
            min_distinct_types: 2,
            bump_tiers: 1,
        }
    }
}

/// Full detection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskThresholds {
    pub attendance: AttendanceThresholds,
    pub performance: PerformanceThresholds,
    pub socioeconomic: SocioeconomicThresholds,
    pub escalation: EscalationPolicy,
    /// Minimum severity of a flag event that pages guardians automatically
    pub notify_min_severity: Severity,
}

impl Default for RiskThresholds {
    fn default() -> Self {
        Self {
            attendance: AttendanceThresholds::default(),
            performance: PerformanceThresholds::default(),
            socioeconomic: SocioeconomicThresholds::default(),
            escalation: EscalationPolicy::default(),
            notify_min_severity: Severity::High,
        }
    }
}

impl RiskThresholds {
    /// Load from a JSON file, falling back to defaults when no path is set
    pub fn load(path: Option<&str>) -> anyhow::Result<Self> {
        match path {
            Some(p) => {
                let raw = std::fs::read_to_string(p)?;
                let thresholds = serde_json::from_str(&raw)?;
                tracing::info!("Detection thresholds loaded from {}", p);
                Ok(thresholds)
            }
            None => Ok(Self::default()),
        }
    }
}

/// First tier whose bound the value meets, assuming descending order
pub fn match_tier<T: PartialOrd + Copy>(tiers: &[Tier<T>], value: T) -> Option<Severity> {
    tiers
        .iter()
        .find(|tier| value >= tier.at_least)
        .map(|tier| tier.severity)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_attendance_tiers() {
        let config = AttendanceThresholds::default();
        assert_eq!(match_tier(&config.consecutive_tiers, 3), Some(Severity::High));
        assert_eq!(match_tier(&config.consecutive_tiers, 5), Some(Severity::Critical));
        assert_eq!(match_tier(&config.consecutive_tiers, 2), None);
    }

    #[test]
    fn test_distance_tiers_match_policy() {
        let config = SocioeconomicThresholds::default();
        assert_eq!(match_tier(&config.distance_tiers, 8.0), Some(Severity::Critical));
        assert_eq!(match_tier(&config.distance_tiers, 5.5), Some(Severity::High));
        assert_eq!(match_tier(&config.distance_tiers, 3.0), Some(Severity::Medium));
        assert_eq!(match_tier(&config.distance_tiers, 2.9), None);
    }

    #[test]
    fn test_default_escalation_policy() {
        let config = EscalationPolicy::default();
        assert_eq!(config.min_severity, Severity::High);
        assert_eq!(config.min_distinct_types, 2);
        assert_eq!(config.bump_tiers, 1);
    }

    #[test]
    fn test_thresholds_survive_json_round_trip() {
        let config = RiskThresholds::default();
        let json = serde_json::to_string(&config).unwrap();
        let back: RiskThresholds = serde_json::from_str(&json).unwrap();
        assert_eq!(back.attendance.window_days, config.attendance.window_days);
        assert_eq!(back.notify_min_severity, Severity::High);
    }
}
