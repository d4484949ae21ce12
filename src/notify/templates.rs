//! Alert templates
//!
//! Message content is rendered server-side from a template keyed by alert
//! kind; callers supply variables, the dispatcher adds the student and
//! guardian built-ins. Unknown placeholders are left in place so a bad
//! variable set is visible in the stored body rather than silently empty.

use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertKind {
    RiskAlert,
    AttendanceAlert,
    PerformanceAlert,
    General,
}

impl AlertKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertKind::RiskAlert => "RISK_ALERT",
            AlertKind::AttendanceAlert => "ATTENDANCE_ALERT",
            AlertKind::PerformanceAlert => "PERFORMANCE_ALERT",
            AlertKind::General => "GENERAL",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "RISK_ALERT" => Some(AlertKind::RiskAlert),
            "ATTENDANCE_ALERT" => Some(AlertKind::AttendanceAlert),
            "PERFORMANCE_ALERT" => Some(AlertKind::PerformanceAlert),
            "GENERAL" => Some(AlertKind::General),
            _ => None,
        }
    }
}

/// Rendered subject and body for one alert
pub fn render(kind: AlertKind, vars: &HashMap<String, String>) -> (String, String) {
    let (subject, body) = match kind {
        AlertKind::RiskAlert => (
            "Risk alert for {student_name}",
            "Dear {guardian_name}, {student_name} has been flagged: {title} (severity {severity}). \
             Current risk level: {risk_level}. Please contact the school to discuss support options.",
        ),
        AlertKind::AttendanceAlert => (
            "Attendance concern for {student_name}",
            "Dear {guardian_name}, we have recorded repeated absences for {student_name}. \
             {details} Please contact the school.",
        ),
        AlertKind::PerformanceAlert => (
            "Academic concern for {student_name}",
            "Dear {guardian_name}, {student_name}'s recent results need attention. \
             {details} Please contact the class teacher.",
        ),
        AlertKind::General => (
            "Message from school about {student_name}",
            "Dear {guardian_name}, {message}",
        ),
    };

    (fill(subject, vars), fill(body, vars))
}

fn fill(template: &str, vars: &HashMap<String, String>) -> String {
    let mut out = template.to_string();
    for (key, value) in vars {
        out = out.replace(&format!("{{{}}}", key), value);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn risk_alert_renders_all_placeholders() {
        let vars = vars(&[
            ("student_name", "Aline Uwase"),
            ("guardian_name", "Jean Uwase"),
            ("title", "Consecutive absences"),
            ("severity", "HIGH"),
            ("risk_level", "HIGH"),
        ]);
        let (subject, body) = render(AlertKind::RiskAlert, &vars);
        assert_eq!(subject, "Risk alert for Aline Uwase");
        assert!(body.contains("Consecutive absences"));
        assert!(body.contains("severity HIGH"));
        assert!(!body.contains('{'));
    }

    #[test]
    fn missing_variable_stays_visible() {
        let (_, body) = render(AlertKind::General, &vars(&[("guardian_name", "Jean")]));
        assert!(body.contains("{message}"));
    }

    #[test]
    fn kind_codes_round_trip() {
        for kind in [
            AlertKind::RiskAlert,
            AlertKind::AttendanceAlert,
            AlertKind::PerformanceAlert,
            AlertKind::General,
        ] {
            assert_eq!(AlertKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(AlertKind::parse("SMS_BLAST"), None);
    }
}
