use axum::{Json, extract::State};

use crate::core::settings::Settings;
use crate::interfaces::web::AppState;

pub async fn get_settings(State(state): State<AppState>) -> Json<serde_json::Value> {
    let store = state.settings.read().await;
    Json(serde_json::json!({ "success": true, "settings": store.get() }))
}

/// Replace the settings document. Missing providers fall back to defaults
/// via serde, so partial documents are accepted. A failed write rolls the
/// in-memory document back, so reads never show unpersisted settings.
pub async fn update_settings(
    State(state): State<AppState>,
    Json(payload): Json<Settings>,
) -> Json<serde_json::Value> {
    let mut store = state.settings.write().await;
    let previous = store.get().clone();
    store.replace(payload);
    match store.save() {
        Ok(()) => Json(serde_json::json!({
            "success": true,
            "message": "Settings saved",
            "settings": store.get()
        })),
        Err(e) => {
            store.replace(previous);
            Json(serde_json::json!({ "success": false, "error": e.to_string() }))
        }
    }
}

pub async fn clear_settings(State(state): State<AppState>) -> Json<serde_json::Value> {
    let mut store = state.settings.write().await;
    match store.clear() {
        Ok(()) => Json(serde_json::json!({
            "success": true,
            "message": "Settings cleared",
            "settings": store.get()
        })),
        Err(e) => Json(serde_json::json!({ "success": false, "error": e.to_string() })),
    }
}

/// `/api/config/save` and `/api/config/load` operate on the same document;
/// they exist because the dashboard's backup page uses separate routes.
pub async fn save_config(
    state: State<AppState>,
    payload: Json<Settings>,
) -> Json<serde_json::Value> {
    update_settings(state, payload).await
}

pub async fn load_config(State(state): State<AppState>) -> Json<serde_json::Value> {
    let store = state.settings.read().await;
    Json(serde_json::json!({ "success": true, "settings": store.get() }))
}
