use axum::{Json, extract::State};

use crate::core::now_millis;
use crate::interfaces::web::AppState;

pub async fn health() -> &'static str {
    "Nexa Agents is running and healthy\n"
}

pub async fn get_status(State(state): State<AppState>) -> Json<serde_json::Value> {
    let agents = state.agents.read().await.len();
    let workflows = state.workflows.count().await;
    Json(serde_json::json!({
        "success": true,
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "uptime": state.started_at.elapsed().as_secs(),
        "agents": agents,
        "workflows": workflows,
        "subscribers": state.events.subscriber_count(),
        "timestamp": now_millis(),
    }))
}
