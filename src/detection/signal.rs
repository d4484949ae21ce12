//! Signal and severity types
//!
//! Typed severities and risk categories used by the detection logic.
//! The database stores their text codes; `rank()` gives the numeric
//! ordering bound into `risk_flags.severity_rank`.

use serde::{Deserialize, Serialize};

/// Severity of a single risk signal or flag
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "LOW",
            Severity::Medium => "MEDIUM",
            Severity::High => "HIGH",
            Severity::Critical => "CRITICAL",
        }
    }

    /// Numeric rank stored alongside the text code for SQL-side comparison
    pub fn rank(&self) -> i16 {
        match self {
            Severity::Low => 1,
            Severity::Medium => 2,
            Severity::High => 3,
            Severity::Critical => 4,
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "LOW" => Some(Severity::Low),
            "MEDIUM" => Some(Severity::Medium),
            "HIGH" => Some(Severity::High),
            "CRITICAL" => Some(Severity::Critical),
            _ => None,
        }
    }

    pub fn from_rank(rank: i16) -> Option<Self> {
        match rank {
            1 => Some(Severity::Low),
            2 => Some(Severity::Medium),
            3 => Some(Severity::High),
            4 => Some(Severity::Critical),
            _ => None,
        }
    }
}

/// Aggregate risk classification for a student
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskLevel {
    None,
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::None => "NONE",
            RiskLevel::Low => "LOW",
            RiskLevel::Medium => "MEDIUM",
            RiskLevel::High => "HIGH",
            RiskLevel::Critical => "CRITICAL",
        }
    }

    pub fn from_severity(severity: Severity) -> Self {
        match severity {
            Severity::Low => RiskLevel::Low,
            Severity::Medium => RiskLevel::Medium,
            Severity::High => RiskLevel::High,
            Severity::Critical => RiskLevel::Critical,
        }
    }

    /// Bump the level by `tiers`, saturating at CRITICAL
    pub fn escalate(&self, tiers: u8) -> Self {
        let mut level = *self;
        for _ in 0..tiers {
            level = match level {
                RiskLevel::None => RiskLevel::Low,
                RiskLevel::Low => RiskLevel::Medium,
                RiskLevel::Medium => RiskLevel::High,
                RiskLevel::High => RiskLevel::Critical,
                RiskLevel::Critical => RiskLevel::Critical,
            };
        }
        level
    }
}

/// Category of a risk signal / flag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskType {
    Attendance,
    Performance,
    Behavior,
    Socioeconomic,
    Other,
}

impl RiskType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskType::Attendance => "ATTENDANCE",
            RiskType::Performance => "PERFORMANCE",
            RiskType::Behavior => "BEHAVIOR",
            RiskType::Socioeconomic => "SOCIOECONOMIC",
            RiskType::Other => "OTHER",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "ATTENDANCE" => Some(RiskType::Attendance),
            "PERFORMANCE" => Some(RiskType::Performance),
            "BEHAVIOR" => Some(RiskType::Behavior),
            "SOCIOECONOMIC" => Some(RiskType::Socioeconomic),
            "OTHER" => Some(RiskType::Other),
            _ => None,
        }
    }
}

/// Transient output of an evaluator, not yet reconciled against stored flags
#[derive(Debug, Clone, Serialize)]
pub struct CandidateSignal {
    pub risk_type: RiskType,
    pub severity: Severity,
    pub title: String,
    pub description: String,
    pub evidence: serde_json::Value,
    pub auto_generated: bool,
}

impl CandidateSignal {
    pub fn auto(
        risk_type: RiskType,
        severity: Severity,
        title: impl Into<String>,
        description: impl Into<String>,
        evidence: serde_json::Value,
    ) -> Self {
        Self {
            risk_type,
            severity,
            title: title.into(),
            description: description.into(),
            evidence,
            auto_generated: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_ordering_follows_rank() {
        assert!(Severity::Low < Severity::Medium);
        assert!(Severity::Medium < Severity::High);
        assert!(Severity::High < Severity::Critical);
        assert!(Severity::Low.rank() < Severity::Critical.rank());
    }

    #[test]
    fn severity_codes_round_trip() {
        for sev in [Severity::Low, Severity::Medium, Severity::High, Severity::Critical] {
            assert_eq!(Severity::parse(sev.as_str()), Some(sev));
            assert_eq!(Severity::from_rank(sev.rank()), Some(sev));
        }
        assert_eq!(Severity::parse("SEVERE"), None);
    }

    #[test]
    fn escalate_saturates_at_critical() {
        assert_eq!(RiskLevel::High.escalate(1), RiskLevel::Critical);
        assert_eq!(RiskLevel::Critical.escalate(1), RiskLevel::Critical);
        assert_eq!(RiskLevel::Medium.escalate(3), RiskLevel::Critical);
        assert_eq!(RiskLevel::None.escalate(0), RiskLevel::None);
    }
}
