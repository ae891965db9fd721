use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;

use crate::core::bench::run_benchmark;
use crate::core::llm::Provider;
use crate::interfaces::web::AppState;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BenchmarkRequest {
    pub provider: String,
    pub api_url: Option<String>,
    pub server_type: Option<String>,
    pub models: Vec<String>,
    pub categories: Option<Vec<String>>,
}

/// `POST /api/benchmark/run`. Runs sequentially; per-model failures are
/// reported inside the result, never as a failed request.
pub async fn run(
    State(state): State<AppState>,
    Json(payload): Json<BenchmarkRequest>,
) -> impl IntoResponse {
    let Some(provider) = Provider::parse(&payload.provider) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({
                "error": "Unknown provider",
                "message": format!("'{}' is not a known provider", payload.provider)
            })),
        )
            .into_response();
    };

    if payload.models.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({
                "error": "Invalid benchmark request",
                "message": "At least one model is required"
            })),
        )
            .into_response();
    }

    let api_url = match payload.api_url {
        Some(url) if !url.trim().is_empty() => url,
        _ => state.settings.read().await.get().provider(provider).api_url.clone(),
    };

    let report = run_benchmark(
        state.http.clone(),
        provider,
        &api_url,
        payload.server_type.as_deref(),
        &payload.models,
        payload.categories.as_deref(),
    )
    .await;

    Json(serde_json::json!({ "success": true, "report": report })).into_response()
}
