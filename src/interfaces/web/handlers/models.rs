use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;

use crate::core::llm::Provider;
use crate::interfaces::web::AppState;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelsQuery {
    pub api_url: Option<String>,
    pub server_type: Option<String>,
}

fn unknown_provider(raw: &str) -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::BAD_REQUEST,
        Json(serde_json::json!({
            "error": "Unknown provider",
            "message": format!(
                "'{}' is not a known provider (expected lmStudio, ollama, projectManager or agora)",
                raw
            )
        })),
    )
}

/// `GET /api/models/{provider}?apiUrl=&serverType=`. When `apiUrl` is
/// omitted the provider's configured URL from the settings document is used.
pub async fn get_models(
    Path(provider_raw): Path<String>,
    Query(query): Query<ModelsQuery>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    let Some(provider) = Provider::parse(&provider_raw) else {
        return unknown_provider(&provider_raw).into_response();
    };

    let api_url = match query.api_url {
        Some(url) if !url.trim().is_empty() => url,
        _ => state.settings.read().await.get().provider(provider).api_url.clone(),
    };

    match state
        .models
        .fetch_models(provider, &api_url, query.server_type.as_deref())
        .await
    {
        Ok(list) => Json(serde_json::json!({
            "success": true,
            "provider": provider.as_str(),
            "models": list.models,
            "cached": list.cached,
            "warning": list.warning,
        }))
        .into_response(),
        // Provider-level failure: embedded success flag, not an HTTP error.
        Err(e) => Json(serde_json::json!({
            "success": false,
            "provider": provider.as_str(),
            "error": e.to_string(),
        }))
        .into_response(),
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestConnectionRequest {
    pub provider: String,
    pub api_url: Option<String>,
    pub model: Option<String>,
    pub server_type: Option<String>,
}

pub async fn test_connection(
    State(state): State<AppState>,
    Json(payload): Json<TestConnectionRequest>,
) -> impl IntoResponse {
    let Some(provider) = Provider::parse(&payload.provider) else {
        return unknown_provider(&payload.provider).into_response();
    };

    let api_url = match payload.api_url {
        Some(url) if !url.trim().is_empty() => url,
        _ => state.settings.read().await.get().provider(provider).api_url.clone(),
    };

    let result = state
        .models
        .test_connection(
            provider,
            &api_url,
            payload.model.as_deref(),
            payload.server_type.as_deref(),
        )
        .await;
    Json(serde_json::to_value(result).unwrap_or_default()).into_response()
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidateRequest {
    pub model: String,
    pub provider: String,
}

pub async fn validate_model(
    State(state): State<AppState>,
    Json(payload): Json<ValidateRequest>,
) -> impl IntoResponse {
    let Some(provider) = Provider::parse(&payload.provider) else {
        return unknown_provider(&payload.provider).into_response();
    };

    let validation = state.models.validate_model(&payload.model, provider);
    Json(serde_json::to_value(validation).unwrap_or_default()).into_response()
}
