use axum::{Json, extract::State};

use crate::core::metrics::TokenUsage;
use crate::interfaces::web::AppState;

/// Combined view: the latest system snapshot plus token counters.
pub async fn get_metrics(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "success": true,
        "system": state.metrics.snapshot(),
        "tokens": state.metrics.tokens_snapshot(),
    }))
}

pub async fn get_system_metrics(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({ "success": true, "metrics": state.metrics.snapshot() }))
}

pub async fn get_cpu_metrics(State(state): State<AppState>) -> Json<serde_json::Value> {
    let snapshot = state.metrics.snapshot();
    Json(serde_json::json!({
        "success": true,
        "cpu": snapshot.cpu,
        "timestamp": snapshot.timestamp,
    }))
}

pub async fn get_token_metrics(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({ "success": true, "tokens": state.metrics.tokens_snapshot() }))
}

pub async fn update_token_metrics(
    State(state): State<AppState>,
    Json(payload): Json<TokenUsage>,
) -> Json<serde_json::Value> {
    let tokens = state.metrics.update_tokens(&payload);
    Json(serde_json::json!({
        "success": true,
        "message": "Token metrics updated successfully",
        "tokens": tokens,
    }))
}
