use axum::{
    Router,
    body::Body,
    http::{HeaderValue, Request, header},
    middleware,
    middleware::Next,
    routing::{get, post},
};
use tower_http::cors::CorsLayer;

use super::AppState;
use super::handlers::{bench, metrics, models, settings, status, uplink, workflows};
use super::ws;

/// The dashboard may be served from any origin (file://, dev server,
/// packaged app), so CORS is wide open like the original deployment.
fn build_cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods(tower_http::cors::Any)
        .allow_headers(tower_http::cors::Any)
}

pub fn build_api_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(status::health))
        .route("/api/status", get(status::get_status))
        .route(
            "/api/settings",
            get(settings::get_settings)
                .post(settings::update_settings)
                .delete(settings::clear_settings),
        )
        .route("/api/config/save", post(settings::save_config))
        .route("/api/config/load", get(settings::load_config))
        .route("/api/models/{provider}", get(models::get_models))
        .route("/api/models/test-connection", post(models::test_connection))
        .route("/api/models/validate", post(models::validate_model))
        .route("/api/metrics", get(metrics::get_metrics))
        .route("/api/metrics/system", get(metrics::get_system_metrics))
        .route("/api/metrics/cpu", get(metrics::get_cpu_metrics))
        .route(
            "/api/metrics/tokens",
            get(metrics::get_token_metrics).post(metrics::update_token_metrics),
        )
        .route(
            "/api/workflows",
            get(workflows::list_workflows).post(workflows::create_workflow),
        )
        .route(
            "/api/workflows/{id}",
            get(workflows::get_workflow)
                .put(workflows::update_workflow)
                .delete(workflows::delete_workflow),
        )
        .route("/api/workflows/{id}/run", post(workflows::run_workflow))
        .route("/api/benchmark/run", post(bench::run))
        .route("/api/uplink/config", post(uplink::set_config))
        .route("/api/uplink/restart", post(uplink::restart))
        .route("/api/logs", get(super::sse_logs_endpoint))
        .route("/socket", get(ws::ws_handler))
        .layer(middleware::from_fn(security_headers))
        .layer(build_cors())
        .with_state(state)
}

async fn security_headers(req: Request<Body>, next: Next) -> axum::response::Response {
    let mut response = next.run(req).await;
    let headers = response.headers_mut();
    headers.insert(
        header::X_CONTENT_TYPE_OPTIONS,
        HeaderValue::from_static("nosniff"),
    );
    headers.insert(header::X_FRAME_OPTIONS, HeaderValue::from_static("DENY"));
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::llm::service::ModelService;
    use crate::core::metrics::MetricsSampler;
    use crate::core::settings::SettingsStore;
    use crate::core::uplink::{EventHub, new_agent_registry};
    use crate::core::workflows::WorkflowStore;
    use axum::http::{Method, StatusCode};
    use std::sync::Arc;
    use std::time::Instant;
    use tempfile::TempDir;
    use tower::util::ServiceExt;

    fn test_state() -> (AppState, TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let events = EventHub::new();
        let (log_tx, _) = tokio::sync::broadcast::channel(16);

        let state = AppState {
            settings: Arc::new(tokio::sync::RwLock::new(SettingsStore::load(
                dir.path().join("config").join("settings.json"),
            ))),
            models: Arc::new(ModelService::new(reqwest::Client::new())),
            metrics: MetricsSampler::new(dir.path().join("cache"), events.clone()),
            workflows: Arc::new(WorkflowStore::new()),
            agents: new_agent_registry(),
            events,
            log_tx,
            started_at: Instant::now(),
            http: reqwest::Client::new(),
        };
        (state, dir)
    }

    async fn json_request(
        app: Router,
        method: Method,
        path: &str,
        body: Option<serde_json::Value>,
    ) -> (StatusCode, serde_json::Value) {
        let body = match body {
            Some(json) => Body::from(serde_json::to_string(&json).unwrap()),
            None => Body::empty(),
        };

        let req = Request::builder()
            .method(method)
            .uri(path)
            .header("content-type", "application/json")
            .body(body)
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        let status = resp.status();
        let body_bytes = axum::body::to_bytes(resp.into_body(), 1024 * 1024)
            .await
            .unwrap();
        let json: serde_json::Value =
            serde_json::from_slice(&body_bytes).unwrap_or(serde_json::json!({}));
        (status, json)
    }

    #[tokio::test]
    async fn security_headers_present_on_responses() {
        let (state, _dir) = test_state();
        let app = build_api_router(state);

        let req = Request::builder()
            .method(Method::GET)
            .uri("/api/status")
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();

        assert_eq!(
            resp.headers().get("x-content-type-options").unwrap(),
            "nosniff"
        );
        assert_eq!(resp.headers().get("x-frame-options").unwrap(), "DENY");
    }

    #[tokio::test]
    async fn health_returns_ok() {
        let (state, _dir) = test_state();
        let app = build_api_router(state);
        let req = Request::builder()
            .method(Method::GET)
            .uri("/health")
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn status_reports_version_and_counts() {
        let (state, _dir) = test_state();
        let app = build_api_router(state);
        let (status, json) = json_request(app, Method::GET, "/api/status", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "ok");
        assert_eq!(json["workflows"], 0);
        assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));
    }

    #[tokio::test]
    async fn settings_default_then_update_roundtrip() {
        let (state, _dir) = test_state();

        let app = build_api_router(state.clone());
        let (status, json) = json_request(app, Method::GET, "/api/settings", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            json["settings"]["lmStudio"]["apiUrl"],
            "http://localhost:1234"
        );

        let app = build_api_router(state.clone());
        let (status, json) = json_request(
            app,
            Method::POST,
            "/api/settings",
            Some(serde_json::json!({
                "ollama": {
                    "apiUrl": "http://box:11434",
                    "defaultModel": "mistral",
                    "enabled": true
                }
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["success"], true);

        let app = build_api_router(state);
        let (_, json) = json_request(app, Method::GET, "/api/config/load", None).await;
        assert_eq!(json["settings"]["ollama"]["apiUrl"], "http://box:11434");
        // Providers absent from the POST fall back to defaults.
        assert_eq!(
            json["settings"]["lmStudio"]["apiUrl"],
            "http://localhost:1234"
        );
    }

    #[tokio::test]
    async fn failed_save_keeps_the_previous_settings() {
        let (state, dir) = test_state();

        // A regular file where the config directory should be makes
        // every save fail.
        let blocker = dir.path().join("blocked");
        std::fs::write(&blocker, "not a directory").unwrap();
        *state.settings.write().await =
            crate::core::settings::SettingsStore::load(blocker.join("settings.json"));

        let app = build_api_router(state.clone());
        let (status, json) = json_request(
            app,
            Method::POST,
            "/api/settings",
            Some(serde_json::json!({
                "ollama": { "apiUrl": "http://never:11434", "defaultModel": "phi3", "enabled": true }
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["success"], false);

        let app = build_api_router(state);
        let (_, json) = json_request(app, Method::GET, "/api/settings", None).await;
        assert_eq!(
            json["settings"]["ollama"]["apiUrl"],
            "http://localhost:11434"
        );
    }

    #[tokio::test]
    async fn clear_settings_resets_to_defaults() {
        let (state, _dir) = test_state();

        let app = build_api_router(state.clone());
        json_request(
            app,
            Method::POST,
            "/api/settings",
            Some(serde_json::json!({
                "ollama": { "apiUrl": "http://elsewhere:11434", "defaultModel": "phi3", "enabled": false }
            })),
        )
        .await;

        let app = build_api_router(state.clone());
        let (status, json) = json_request(app, Method::DELETE, "/api/settings", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["success"], true);
        assert_eq!(
            json["settings"]["ollama"]["apiUrl"],
            "http://localhost:11434"
        );
    }

    #[tokio::test]
    async fn create_workflow_without_name_is_rejected() {
        let (state, _dir) = test_state();
        let app = build_api_router(state);
        let (status, json) = json_request(
            app,
            Method::POST,
            "/api/workflows",
            Some(serde_json::json!({ "description": "no name" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "Invalid workflow data");
    }

    #[tokio::test]
    async fn create_workflow_returns_201_with_id() {
        let (state, _dir) = test_state();
        let app = build_api_router(state);
        let (status, json) = json_request(
            app,
            Method::POST,
            "/api/workflows",
            Some(serde_json::json!({ "name": "Nightly benchmark" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert!(!json["id"].as_str().unwrap().is_empty());
        assert_eq!(json["status"], "draft");
    }

    #[tokio::test]
    async fn workflow_crud_and_run_roundtrip() {
        let (state, _dir) = test_state();

        let app = build_api_router(state.clone());
        let (_, created) = json_request(
            app,
            Method::POST,
            "/api/workflows",
            Some(serde_json::json!({
                "name": "Model rollout",
                "steps": [ { "name": "probe" }, { "name": "deploy" } ]
            })),
        )
        .await;
        let id = created["id"].as_str().unwrap().to_string();

        let app = build_api_router(state.clone());
        let (status, json) = json_request(
            app,
            Method::PUT,
            &format!("/api/workflows/{}", id),
            Some(serde_json::json!({ "status": "paused" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "paused");

        let app = build_api_router(state.clone());
        let (status, json) = json_request(
            app,
            Method::POST,
            &format!("/api/workflows/{}/run", id),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["workflow"]["status"], "active");
        assert_eq!(json["workflow"]["steps"][0]["status"], "in_progress");
        assert_eq!(json["workflow"]["steps"][1]["status"], "pending");

        let app = build_api_router(state.clone());
        let (status, _) = json_request(
            app,
            Method::DELETE,
            &format!("/api/workflows/{}", id),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let app = build_api_router(state);
        let (status, _) =
            json_request(app, Method::GET, &format!("/api/workflows/{}", id), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn unknown_workflow_returns_404() {
        let (state, _dir) = test_state();
        let app = build_api_router(state);
        let (status, json) =
            json_request(app, Method::GET, "/api/workflows/nope", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["error"], "Workflow not found");
    }

    #[tokio::test]
    async fn token_metrics_accumulate_over_posts() {
        let (state, _dir) = test_state();
        let delta = serde_json::json!({
            "model": "gpt-4", "total": 100, "input": 40, "output": 60
        });

        let app = build_api_router(state.clone());
        json_request(app, Method::POST, "/api/metrics/tokens", Some(delta.clone())).await;
        let app = build_api_router(state.clone());
        let (status, json) =
            json_request(app, Method::POST, "/api/metrics/tokens", Some(delta)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["tokens"]["totalProcessed"], 200);
        assert_eq!(json["tokens"]["byModel"]["gpt-4"], 200);

        let app = build_api_router(state);
        let (_, json) = json_request(app, Method::GET, "/api/metrics/tokens", None).await;
        assert_eq!(json["tokens"]["inputTokens"], 80);
        assert_eq!(json["tokens"]["outputTokens"], 120);
    }

    #[tokio::test]
    async fn validate_model_is_permissive() {
        let (state, _dir) = test_state();

        let app = build_api_router(state.clone());
        let (status, json) = json_request(
            app,
            Method::POST,
            "/api/models/validate",
            Some(serde_json::json!({ "model": "qwen2.5-7b-instruct", "provider": "lmStudio" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["isValid"], true);
        assert!(json.get("warning").is_none());

        let app = build_api_router(state);
        let (_, json) = json_request(
            app,
            Method::POST,
            "/api/models/validate",
            Some(serde_json::json!({ "model": "brand-new-model", "provider": "lmStudio" })),
        )
        .await;
        assert_eq!(json["isValid"], true);
        assert!(json["warning"].as_str().is_some());
    }

    #[tokio::test]
    async fn unknown_provider_is_a_client_error() {
        let (state, _dir) = test_state();
        let app = build_api_router(state);
        let (status, json) =
            json_request(app, Method::GET, "/api/models/openai", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "Unknown provider");
    }

    #[tokio::test]
    async fn agora_models_come_from_static_catalog() {
        let (state, _dir) = test_state();
        let app = build_api_router(state);
        let (status, json) = json_request(app, Method::GET, "/api/models/agora", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["success"], true);
        assert!(!json["models"].as_array().unwrap().is_empty());
        assert!(json["warning"].as_str().is_some());
    }

    #[tokio::test]
    async fn uplink_config_rejects_tiny_interval() {
        let (state, _dir) = test_state();
        let app = build_api_router(state);
        let (status, json) = json_request(
            app,
            Method::POST,
            "/api/uplink/config",
            Some(serde_json::json!({ "enabled": true, "intervalMs": 10 })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["success"], false);
    }

    #[tokio::test]
    async fn benchmark_requires_models() {
        let (state, _dir) = test_state();
        let app = build_api_router(state);
        let (status, json) = json_request(
            app,
            Method::POST,
            "/api/benchmark/run",
            Some(serde_json::json!({ "provider": "lmStudio", "models": [] })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "Invalid benchmark request");
    }

    #[tokio::test]
    async fn api_route_contract_has_all_expected_paths() {
        let paths = [
            "/health",
            "/api/status",
            "/api/settings",
            "/api/config/save",
            "/api/config/load",
            "/api/models/lmStudio",
            "/api/models/test-connection",
            "/api/models/validate",
            "/api/metrics",
            "/api/metrics/system",
            "/api/metrics/cpu",
            "/api/metrics/tokens",
            "/api/workflows",
            "/api/workflows/wf_1",
            "/api/workflows/wf_1/run",
            "/api/benchmark/run",
            "/api/uplink/config",
            "/api/uplink/restart",
            "/api/logs",
            "/socket",
        ];

        let (state, _dir) = test_state();
        let app = build_api_router(state);
        for path in paths {
            let req = Request::builder()
                .method(Method::PATCH)
                .uri(path)
                .body(Body::empty())
                .expect("request should build");
            let resp = app
                .clone()
                .oneshot(req)
                .await
                .expect("router oneshot should succeed");
            assert_ne!(
                resp.status(),
                StatusCode::NOT_FOUND,
                "Route missing from router: {}",
                path
            );
        }
    }
}
