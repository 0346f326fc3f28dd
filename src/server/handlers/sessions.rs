use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;

use crate::core::errors::ApiError;
use crate::history::escalate_session;
use crate::state::AppState;

const DEFAULT_MESSAGE_LIMIT: usize = 100;

fn session_not_found(session_id: &str) -> ApiError {
    ApiError::NotFound(format!("Session {} not found", session_id))
}

pub async fn list_sessions(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let sessions = state.sessions.list().await?;
    Ok(Json(json!({ "sessions": sessions })))
}

pub async fn get_session(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let session = state
        .sessions
        .get(&session_id)
        .await?
        .ok_or_else(|| session_not_found(&session_id))?;
    Ok(Json(json!({ "session": session })))
}

pub async fn get_session_messages(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<impl IntoResponse, ApiError> {
    let limit = params
        .get("limit")
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(DEFAULT_MESSAGE_LIMIT);

    let messages = state.sessions.recent(&session_id, limit).await?;
    if messages.is_empty() && state.sessions.get(&session_id).await?.is_none() {
        return Err(session_not_found(&session_id));
    }

    Ok(Json(json!({ "messages": messages })))
}

pub async fn escalate(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    escalate_session(state.sessions.as_ref(), &session_id).await?;
    Ok(Json(json!({ "session_id": session_id, "escalated": true })))
}

pub async fn clear_escalation(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    state.sessions.clear_escalation(&session_id).await?;
    tracing::info!(session_id = %session_id, "Escalation cleared");
    Ok(Json(json!({ "session_id": session_id, "escalated": false })))
}
