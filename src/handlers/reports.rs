//! Reports handlers

use axum::{
    extract::{Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use sqlx::Row;
use uuid::Uuid;

use crate::models::{RiskFlag, School};
use crate::{AppError, AppResult, AppState};

#[derive(Debug, Deserialize)]
pub struct RiskSummaryQuery {
    pub school_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct RiskSummaryReport {
    pub school_id: Uuid,
    pub school_name: String,
    pub total_students: i64,
    pub students_at_risk: i64,
    pub critical_students: i64,
    pub high_students: i64,
    pub medium_students: i64,
    pub low_students: i64,
    pub active_flags: i64,
    pub critical_flags: i64,
    pub high_flags: i64,
    pub medium_flags: i64,
    pub low_flags: i64,
}

/// School-wide risk overview for administrators
pub async fn risk_summary(
    State(state): State<AppState>,
    Query(query): Query<RiskSummaryQuery>,
) -> AppResult<Json<RiskSummaryReport>> {
    let school = School::find_by_id(&state.pool, query.school_id)
        .await?
        .ok_or_else(|| AppError::NotFound("School not found".to_string()))?;

    let row = sqlx::query(
        r#"
        SELECT
            COUNT(*) as total,
            COUNT(*) FILTER (WHERE risk_level <> 'NONE') as at_risk,
            COUNT(*) FILTER (WHERE risk_level = 'CRITICAL') as critical,
            COUNT(*) FILTER (WHERE risk_level = 'HIGH') as high,
            COUNT(*) FILTER (WHERE risk_level = 'MEDIUM') as medium,
            COUNT(*) FILTER (WHERE risk_level = 'LOW') as low
        FROM students WHERE school_id = $1 AND is_active
        "#
    )
    .bind(query.school_id)
    .fetch_one(&state.pool)
    .await?;

    let flag_counts = RiskFlag::count_active_by_severity(&state.pool, query.school_id).await?;

    let mut critical_flags = 0i64;
    let mut high_flags = 0i64;
    let mut medium_flags = 0i64;
    let mut low_flags = 0i64;
    let mut active_flags = 0i64;

    for (severity, count) in &flag_counts {
        active_flags += count;
        match severity.as_str() {
            "CRITICAL" => critical_flags = *count,
            "HIGH" => high_flags = *count,
            "MEDIUM" => medium_flags = *count,
            "LOW" => low_flags = *count,
            _ => {}
        }
    }

    Ok(Json(RiskSummaryReport {
        school_id: school.id,
        school_name: school.name,
        total_students: row.get("total"),
        students_at_risk: row.get("at_risk"),
        critical_students: row.get("critical"),
        high_students: row.get("high"),
        medium_students: row.get("medium"),
        low_students: row.get("low"),
        active_flags,
        critical_flags,
        high_flags,
        medium_flags,
        low_flags,
    }))
}
