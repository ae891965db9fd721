use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};

use crate::core::workflows::WorkflowDraft;
use crate::interfaces::web::AppState;

fn not_found(id: &str) -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::NOT_FOUND,
        Json(serde_json::json!({
            "error": "Workflow not found",
            "message": format!("No workflow with id '{}'", id)
        })),
    )
}

pub async fn list_workflows(State(state): State<AppState>) -> Json<serde_json::Value> {
    let workflows = state.workflows.list().await;
    Json(serde_json::json!({ "success": true, "workflows": workflows }))
}

pub async fn create_workflow(
    State(state): State<AppState>,
    Json(draft): Json<WorkflowDraft>,
) -> impl IntoResponse {
    match state.workflows.create(draft).await {
        Ok(workflow) => {
            state
                .events
                .emit("task_assigned", serde_json::json!({ "workflow": workflow }));
            (StatusCode::CREATED, Json(serde_json::to_value(workflow).unwrap_or_default()))
        }
        Err(e) => (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({
                "error": e,
                "message": "A workflow requires a non-empty name"
            })),
        ),
    }
}

pub async fn get_workflow(
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    match state.workflows.get(&id).await {
        Some(workflow) => {
            Json(serde_json::to_value(workflow).unwrap_or_default()).into_response()
        }
        None => not_found(&id).into_response(),
    }
}

pub async fn update_workflow(
    Path(id): Path<String>,
    State(state): State<AppState>,
    Json(draft): Json<WorkflowDraft>,
) -> impl IntoResponse {
    match state.workflows.update(&id, draft).await {
        Some(workflow) => {
            state
                .events
                .emit("task_updated", serde_json::json!({ "workflow": workflow }));
            Json(serde_json::to_value(workflow).unwrap_or_default()).into_response()
        }
        None => not_found(&id).into_response(),
    }
}

pub async fn delete_workflow(
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    if state.workflows.delete(&id).await {
        Json(serde_json::json!({ "success": true, "message": "Workflow deleted" }))
            .into_response()
    } else {
        not_found(&id).into_response()
    }
}

/// No execution engine exists: running marks the workflow active and its
/// first step in_progress, then notifies websocket subscribers.
pub async fn run_workflow(
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    match state.workflows.run(&id).await {
        Some(workflow) => {
            state
                .events
                .emit("task_updated", serde_json::json!({ "workflow": workflow }));
            Json(serde_json::json!({ "success": true, "workflow": workflow })).into_response()
        }
        None => not_found(&id).into_response(),
    }
}
