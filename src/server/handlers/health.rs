use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;

use crate::state::AppState;

pub async fn health(State(_state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Reports whether the language model service answers and which models it has.
pub async fn get_status(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let (llm_reachable, models) = match state.llm.list_models().await {
        Ok(models) => (true, models),
        Err(err) => {
            tracing::warn!("Language model service unreachable: {}", err);
            (false, Vec::new())
        }
    };
    let model_available = models.iter().any(|m| m == &state.settings.llm.model);

    Json(json!({
        "llm_reachable": llm_reachable,
        "model": state.settings.llm.model,
        "model_available": model_available,
        "models": models,
        "collection": state.settings.retrieval.collection,
        "degraded": !llm_reachable || !model_available
    }))
}
