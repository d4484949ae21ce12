//! Risk detection engine
//!
//! Evaluators produce candidate signals, the aggregator reconciles them
//! against stored flags, and the risk level projection is recomputed in
//! the same request. Notification forks off sideways through the bounded
//! spawner and never feeds back into flag state.

pub mod config;
pub mod signal;
pub mod attendance;
pub mod performance;
pub mod socioeconomic;
pub mod aggregator;
pub mod risk_level;
pub mod sweep;

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Duration, Utc};
use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{AttendanceRecord, PerformanceRecord, RiskFlag, Student};
use crate::notify::dispatcher::{AlertRequest, Channel};
use crate::notify::templates::AlertKind;
use crate::notify::Notifier;
use aggregator::FlagOutcome;
use config::RiskThresholds;
use signal::{CandidateSignal, RiskLevel, Severity};

/// Performance rows loaded per student, enough for the current and
/// previous terms without pulling a full transcript
const PERFORMANCE_FETCH_LIMIT: i64 = 60;

#[derive(Debug, Default, Serialize)]
pub struct DetectionSummary {
    pub risks_detected: usize,
    pub flags_created: usize,
}

/// Full pipeline for one student, invoked inline from write paths
pub async fn detect_for_student(
    pool: &PgPool,
    notifier: &Arc<Notifier>,
    thresholds: &RiskThresholds,
    student_id: Uuid,
    school_id: Uuid,
    actor_id: Option<Uuid>,
) -> AppResult<DetectionSummary> {
    let student = Student::find_in_school(pool, student_id, school_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Student not found".to_string()))?;

    let since = Utc::now().date_naive() - Duration::days(thresholds.attendance.window_days);
    let attendance_records = AttendanceRecord::trailing_window(pool, student.id, since).await?;
    let performance_records =
        PerformanceRecord::list_recent(pool, student.id, PERFORMANCE_FETCH_LIMIT).await?;

    let mut candidates = attendance::evaluate(&attendance_records, &thresholds.attendance);
    candidates.extend(performance::evaluate(&performance_records, &thresholds.performance));
    candidates.extend(socioeconomic::evaluate(&student, &thresholds.socioeconomic));

    let (summary, _) = apply_candidates(pool, notifier, thresholds, &student, candidates, actor_id).await?;
    Ok(summary)
}

/// Narrow pipeline, socioeconomic rules only. Called right after student
/// registration and on profile changes.
pub async fn detect_socioeconomic(
    pool: &PgPool,
    notifier: &Arc<Notifier>,
    thresholds: &RiskThresholds,
    student_id: Uuid,
    school_id: Uuid,
    actor_id: Option<Uuid>,
) -> AppResult<DetectionSummary> {
    let student = Student::find_in_school(pool, student_id, school_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Student not found".to_string()))?;

    let candidates = socioeconomic::evaluate(&student, &thresholds.socioeconomic);
    let (summary, _) = apply_candidates(pool, notifier, thresholds, &student, candidates, actor_id).await?;
    Ok(summary)
}

/// Staff-entered signal, same aggregator policy as automatic detection
pub async fn submit_manual_signal(
    pool: &PgPool,
    notifier: &Arc<Notifier>,
    thresholds: &RiskThresholds,
    student_id: Uuid,
    school_id: Uuid,
    candidate: CandidateSignal,
    actor_id: Option<Uuid>,
) -> AppResult<RiskFlag> {
    let student = Student::find_in_school(pool, student_id, school_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Student not found".to_string()))?;

    let (_, mut flags) =
        apply_candidates(pool, notifier, thresholds, &student, vec![candidate], actor_id).await?;

    flags.pop().ok_or_else(|| {
        AppError::AlreadyExists(
            "An active flag of this type already covers this severity".to_string(),
        )
    })
}

/// Explicit recompute entry point for external flag mutations
pub async fn update_risk_level(
    pool: &PgPool,
    thresholds: &RiskThresholds,
    student_id: Uuid,
) -> AppResult<RiskLevel> {
    let student = Student::find_by_id(pool, student_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Student not found".to_string()))?;

    let level = risk_level::recompute_for_student(pool, student.id, &thresholds.escalation).await?;
    Ok(level)
}

/// Shared tail of every detection path: merge, upsert, recompute, notify.
/// Returns the summary and the flags that were created or escalated.
async fn apply_candidates(
    pool: &PgPool,
    notifier: &Arc<Notifier>,
    thresholds: &RiskThresholds,
    student: &Student,
    candidates: Vec<CandidateSignal>,
    actor_id: Option<Uuid>,
) -> AppResult<(DetectionSummary, Vec<RiskFlag>)> {
    let merged = aggregator::merge_candidates(candidates);

    let mut summary = DetectionSummary {
        risks_detected: merged.len(),
        flags_created: 0,
    };
    let mut changed = Vec::new();

    for candidate in &merged {
        match aggregator::apply(pool, student.id, student.school_id, actor_id, candidate).await? {
            FlagOutcome::Created(flag) => {
                summary.flags_created += 1;
                changed.push(flag);
            }
            FlagOutcome::Escalated(flag) => changed.push(flag),
            FlagOutcome::Unchanged => {}
        }
    }

    if changed.is_empty() {
        return Ok((summary, changed));
    }

    // Read-after-write: the projection observes the flags just written
    let level =
        risk_level::recompute_for_student(pool, student.id, &thresholds.escalation).await?;

    for flag in &changed {
        let severe_enough = Severity::parse(&flag.severity)
            .map(|s| s >= thresholds.notify_min_severity)
            .unwrap_or(false);
        if !severe_enough {
            continue;
        }

        let mut variables = HashMap::new();
        variables.insert("title".to_string(), flag.title.clone());
        variables.insert("severity".to_string(), flag.severity.clone());
        variables.insert("risk_level".to_string(), level.as_str().to_string());

        notifier.spawn_alert(
            pool.clone(),
            AlertRequest {
                student_id: student.id,
                channel: Channel::Both,
                alert_kind: AlertKind::RiskAlert,
                variables,
                actor_id,
            },
        );
    }

    Ok((summary, changed))
}
