use super::server::StatusState;
use crate::app::ComponentState;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use std::collections::BTreeMap;

/// Controller snapshot plus component lifecycle states
pub async fn status_handler(State(state): State<StatusState>) -> impl IntoResponse {
    let report = state.status.report();
    let components: BTreeMap<_, _> = state.components.lock().await.clone().into_iter().collect();

    Json(serde_json::json!({
        "controller": report,
        "components": components,
        "timestamp": chrono::Utc::now(),
    }))
}

/// Health check endpoint; degraded when any component has failed
pub async fn health_handler(State(state): State<StatusState>) -> impl IntoResponse {
    let failed: Vec<String> = state
        .components
        .lock()
        .await
        .iter()
        .filter(|(_, s)| **s == ComponentState::Failed)
        .map(|(name, _)| name.clone())
        .collect();

    let code = if failed.is_empty() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        code,
        Json(serde_json::json!({
            "status": if failed.is_empty() { "healthy" } else { "degraded" },
            "state": state.status.current_state(),
            "failed_components": failed,
        })),
    )
}
