//! Entity lifecycle notifications from the CMS.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};

use super::ApiError;
use crate::state::AppState;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveEntity {
    #[serde(default)]
    content_id: String,
}

#[derive(Serialize)]
pub struct SaveResponse {
    saved: bool,
}

pub async fn save_entity(
    State(state): State<AppState>,
    Path((entity_type, entity_id)): Path<(String, i64)>,
    Json(payload): Json<SaveEntity>,
) -> Result<Json<SaveResponse>, ApiError> {
    let saved = state
        .lifecycle
        .save(&entity_type, entity_id, &payload.content_id, AppState::now())
        .await?;
    Ok(Json(SaveResponse { saved }))
}

pub async fn delete_entity(
    State(state): State<AppState>,
    Path((entity_type, entity_id)): Path<(String, i64)>,
) -> Result<StatusCode, ApiError> {
    state.lifecycle.delete(&entity_type, entity_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Deserialize)]
pub struct StatusChange {
    status: String,
}

#[derive(Serialize)]
pub struct FeedbackResponse {
    sent: bool,
}

pub async fn send_feedback(
    State(state): State<AppState>,
    Path((entity_type, entity_id)): Path<(String, i64)>,
    Json(payload): Json<StatusChange>,
) -> Result<Json<FeedbackResponse>, ApiError> {
    let sent = state
        .lifecycle
        .send_feedback(&entity_type, entity_id, &payload.status)
        .await?;
    Ok(Json(FeedbackResponse { sent }))
}
