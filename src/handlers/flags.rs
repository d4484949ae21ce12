//! Risk flag handlers

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;
use validator::Validate;

use crate::detection::{self, signal::{CandidateSignal, RiskType, Severity}};
use crate::middleware::actor::ActorContext;
use crate::models::{RiskFlag, RiskFlagFilter};
use crate::{AppError, AppResult, AppState};

#[derive(Debug, Deserialize, Validate)]
pub struct CreateFlagRequest {
    pub student_id: Uuid,
    pub school_id: Uuid,
    pub flag_type: String,
    pub severity: String,
    #[validate(length(min = 3, max = 500))]
    pub title: String,
    pub description: Option<String>,
}

/// Manual flag entry; goes through the same aggregator dedup policy as
/// automatic detection
pub async fn create(
    State(state): State<AppState>,
    actor: ActorContext,
    Json(req): Json<CreateFlagRequest>,
) -> AppResult<Json<RiskFlag>> {
    req.validate()?;
    let actor_id = actor.require()?;

    let risk_type = RiskType::parse(&req.flag_type)
        .ok_or_else(|| AppError::ValidationError(format!("Unknown flag type '{}'", req.flag_type)))?;
    let severity = Severity::parse(&req.severity)
        .ok_or_else(|| AppError::ValidationError(format!("Unknown severity '{}'", req.severity)))?;

    let candidate = CandidateSignal {
        risk_type,
        severity,
        title: req.title,
        description: req.description.unwrap_or_default(),
        evidence: json!({ "rule": "manual" }),
        auto_generated: false,
    };

    let flag = detection::submit_manual_signal(
        &state.pool,
        &state.notifier,
        &state.thresholds,
        req.student_id,
        req.school_id,
        candidate,
        Some(actor_id),
    )
    .await?;

    Ok(Json(flag))
}

/// List flags with optional filters
pub async fn list(
    State(state): State<AppState>,
    Query(filter): Query<RiskFlagFilter>,
) -> AppResult<Json<Vec<RiskFlag>>> {
    let flags = RiskFlag::list(&state.pool, filter).await?;
    Ok(Json(flags))
}

/// Get single flag
pub async fn get(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<RiskFlag>> {
    let flag = RiskFlag::find_by_id(&state.pool, id)
        .await?
        .ok_or_else(|| AppError::NotFound("Risk flag not found".to_string()))?;

    Ok(Json(flag))
}

#[derive(Debug, Deserialize, Default)]
pub struct ResolveFlagRequest {
    pub notes: Option<String>,
}

/// Resolve a flag, then recompute the student's risk level
pub async fn resolve(
    State(state): State<AppState>,
    actor: ActorContext,
    Path(id): Path<Uuid>,
    Json(req): Json<ResolveFlagRequest>,
) -> AppResult<Json<RiskFlag>> {
    let actor_id = actor.require()?;

    let flag = match RiskFlag::resolve(&state.pool, id, actor_id, req.notes.as_deref()).await? {
        Some(flag) => flag,
        None => {
            // Distinguish a missing flag from one already resolved
            return match RiskFlag::find_by_id(&state.pool, id).await? {
                Some(_) => Err(AppError::AlreadyExists("Flag is already resolved".to_string())),
                None => Err(AppError::NotFound("Risk flag not found".to_string())),
            };
        }
    };

    detection::update_risk_level(&state.pool, &state.thresholds, flag.student_id).await?;

    tracing::info!("Flag {} resolved by {}", flag.id, actor_id);
    Ok(Json(flag))
}

/// Administrator hard delete; the student's risk level is recomputed in
/// the same request
pub async fn delete(
    State(state): State<AppState>,
    actor: ActorContext,
    Path(id): Path<Uuid>,
) -> AppResult<Json<serde_json::Value>> {
    let actor_id = actor.require()?;

    let flag = RiskFlag::delete(&state.pool, id)
        .await?
        .ok_or_else(|| AppError::NotFound("Risk flag not found".to_string()))?;

    let level =
        detection::update_risk_level(&state.pool, &state.thresholds, flag.student_id).await?;

    tracing::info!("Flag {} deleted by {}", flag.id, actor_id);
    Ok(Json(json!({
        "deleted": true,
        "student_id": flag.student_id,
        "risk_level": level.as_str(),
    })))
}
