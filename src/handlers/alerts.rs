//! Alert and message handlers

use std::collections::HashMap;

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::middleware::actor::ActorContext;
use crate::models::{Message, MessageFilter};
use crate::notify::dispatcher::{self, AlertRequest, Channel, PendingSummary};
use crate::notify::templates::AlertKind;
use crate::{AppError, AppResult, AppState};

#[derive(Debug, Deserialize)]
pub struct SendAlertRequest {
    pub student_id: Uuid,
    pub channel: String,
    pub alert_kind: String,
    #[serde(default)]
    pub variables: HashMap<String, String>,
}

/// Send an alert to the student's guardian
pub async fn send(
    State(state): State<AppState>,
    actor: ActorContext,
    Json(req): Json<SendAlertRequest>,
) -> AppResult<Json<Message>> {
    let channel = Channel::parse(&req.channel)
        .ok_or_else(|| AppError::ValidationError(format!("Unknown channel '{}'", req.channel)))?;
    let alert_kind = AlertKind::parse(&req.alert_kind)
        .ok_or_else(|| AppError::ValidationError(format!("Unknown alert kind '{}'", req.alert_kind)))?;

    let message = dispatcher::send_alert(
        &state.pool,
        &state.notifier,
        AlertRequest {
            student_id: req.student_id,
            channel,
            alert_kind,
            variables: req.variables,
            actor_id: actor.actor_id,
        },
    )
    .await?;

    Ok(Json(message))
}

/// List messages with optional filters
pub async fn list(
    State(state): State<AppState>,
    Query(filter): Query<MessageFilter>,
) -> AppResult<Json<Vec<Message>>> {
    let messages = Message::list(&state.pool, filter).await?;
    Ok(Json(messages))
}

/// Get single message
pub async fn get(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Message>> {
    let message = Message::find_by_id(&state.pool, id)
        .await?
        .ok_or_else(|| AppError::NotFound("Message not found".to_string()))?;

    Ok(Json(message))
}

/// Manual retry: fresh budget, all requested channels re-attempted
pub async fn retry(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Message>> {
    let message = dispatcher::retry_message(&state.pool, &state.notifier, id).await?;
    Ok(Json(message))
}

/// Run one pending-message sweep on demand
pub async fn process_pending(
    State(state): State<AppState>,
) -> AppResult<Json<PendingSummary>> {
    let summary = dispatcher::process_pending(&state.pool, &state.notifier, 50).await?;
    Ok(Json(summary))
}
