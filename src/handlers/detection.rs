//! Detection handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::detection::{self, sweep, DetectionSummary};
use crate::middleware::actor::ActorContext;
use crate::{AppError, AppResult, AppState};

#[derive(Debug, Deserialize)]
pub struct DetectRequest {
    pub school_id: Uuid,
}

/// Run the full pipeline for one student, synchronously
pub async fn detect_student(
    State(state): State<AppState>,
    actor: ActorContext,
    Path(student_id): Path<Uuid>,
    Json(req): Json<DetectRequest>,
) -> AppResult<Json<DetectionSummary>> {
    let summary = detection::detect_for_student(
        &state.pool,
        &state.notifier,
        &state.thresholds,
        student_id,
        req.school_id,
        actor.actor_id,
    )
    .await?;

    Ok(Json(summary))
}

/// Socioeconomic rules only, used right after registration
pub async fn detect_student_socioeconomic(
    State(state): State<AppState>,
    actor: ActorContext,
    Path(student_id): Path<Uuid>,
    Json(req): Json<DetectRequest>,
) -> AppResult<Json<DetectionSummary>> {
    let summary = detection::detect_socioeconomic(
        &state.pool,
        &state.notifier,
        &state.thresholds,
        student_id,
        req.school_id,
        actor.actor_id,
    )
    .await?;

    Ok(Json(summary))
}

/// Accept a whole-school sweep; the work runs in the background
pub async fn detect_school(
    State(state): State<AppState>,
    actor: ActorContext,
    Path(school_id): Path<Uuid>,
) -> AppResult<(StatusCode, Json<serde_json::Value>)> {
    let run_id = sweep::start_school_sweep(
        &state.pool,
        &state.notifier,
        &state.thresholds,
        &state.sweeps,
        school_id,
        actor.actor_id,
        state.config.sweep_concurrency,
    )
    .await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(json!({
            "run_id": run_id,
            "status": sweep::STATUS_RUNNING,
        })),
    ))
}

/// Progress/result of a sweep run
pub async fn sweep_status(
    State(state): State<AppState>,
    Path(run_id): Path<Uuid>,
) -> AppResult<Json<sweep::SweepRun>> {
    let run = state
        .sweeps
        .get(run_id)
        .await
        .ok_or_else(|| AppError::NotFound("Sweep run not found".to_string()))?;

    Ok(Json(run))
}

/// Explicit recompute, called after external flag mutations
pub async fn recompute_risk_level(
    State(state): State<AppState>,
    Path(student_id): Path<Uuid>,
) -> AppResult<Json<serde_json::Value>> {
    let level = detection::update_risk_level(&state.pool, &state.thresholds, student_id).await?;

    Ok(Json(json!({
        "student_id": student_id,
        "risk_level": level.as_str(),
    })))
}
