use axum::{Json, extract::State};

use crate::core::settings::UplinkConfig;
use crate::interfaces::web::AppState;

/// Store a new hub configuration. Takes effect on the next
/// `/api/uplink/restart` (mirroring the original's two-step flow).
pub async fn set_config(
    State(state): State<AppState>,
    Json(payload): Json<UplinkConfig>,
) -> Json<serde_json::Value> {
    if payload.interval_ms < 250 {
        return Json(serde_json::json!({
            "success": false,
            "error": "intervalMs must be at least 250"
        }));
    }

    let mut store = state.settings.write().await;
    let mut settings = store.get().clone();
    settings.uplink = payload;
    store.replace(settings);
    match store.save() {
        Ok(()) => Json(serde_json::json!({
            "success": true,
            "message": "Uplink configuration saved. Restart the uplink to apply it.",
            "uplink": store.get().uplink,
        })),
        Err(e) => Json(serde_json::json!({ "success": false, "error": e.to_string() })),
    }
}

/// Re-arm the metrics sampler with the stored configuration.
pub async fn restart(State(state): State<AppState>) -> Json<serde_json::Value> {
    let uplink = state.settings.read().await.get().uplink.clone();
    if uplink.enabled {
        state.metrics.restart(uplink.interval_ms);
        Json(serde_json::json!({
            "success": true,
            "message": format!("Uplink restarted at {} ms interval", uplink.interval_ms)
        }))
    } else {
        state.metrics.stop();
        Json(serde_json::json!({
            "success": true,
            "message": "Uplink disabled; metrics broadcasting stopped"
        }))
    }
}
