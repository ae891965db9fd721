use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
};
use serde::Deserialize;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::core::now_millis;
use crate::core::uplink::AgentInfo;

use super::AppState;

/// Messages a dashboard or agent client may send over the socket.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum Inbound {
    RegisterAgent {
        #[serde(default)]
        id: Option<String>,
        name: String,
        #[serde(default)]
        capabilities: Vec<String>,
    },
    AssignTask {
        #[serde(rename = "agentId")]
        agent_id: String,
        task: serde_json::Value,
    },
    UpdateTask {
        #[serde(rename = "taskId")]
        task_id: String,
        #[serde(default)]
        status: Option<String>,
        #[serde(default)]
        data: serde_json::Value,
    },
    SystemMetrics {
        data: serde_json::Value,
    },
}

pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Per-connection loop: inbound messages are rebroadcast as acknowledgment
/// events; every hub event is fanned out to the socket. At-most-once; a
/// lagging client just skips the dropped events.
async fn handle_socket(mut socket: WebSocket, state: AppState) {
    let mut events = state.events.subscribe();
    debug!("Websocket client connected");

    loop {
        tokio::select! {
            inbound = socket.recv() => {
                match inbound {
                    Some(Ok(Message::Text(text))) => {
                        handle_inbound(&text, &state).await;
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {} // binary/ping/pong ignored
                    Some(Err(e)) => {
                        debug!("Websocket receive error: {}", e);
                        break;
                    }
                }
            }
            event = events.recv() => {
                match event {
                    Ok(event) => {
                        let Ok(payload) = serde_json::to_string(&event) else { continue };
                        if socket.send(Message::Text(payload.into())).await.is_err() {
                            break; // client went away
                        }
                    }
                    Err(RecvError::Lagged(missed)) => {
                        warn!("Websocket client lagged, dropped {} events", missed);
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        }
    }

    debug!("Websocket client disconnected");
}

async fn handle_inbound(text: &str, state: &AppState) {
    let parsed: Inbound = match serde_json::from_str(text) {
        Ok(msg) => msg,
        Err(e) => {
            debug!("Ignoring malformed websocket message: {}", e);
            return;
        }
    };

    match parsed {
        Inbound::RegisterAgent {
            id,
            name,
            capabilities,
        } => {
            let agent = AgentInfo {
                id: id.unwrap_or_else(|| Uuid::new_v4().to_string()),
                name,
                capabilities,
                registered_at: now_millis(),
            };
            info!("Agent '{}' registered ({})", agent.name, agent.id);
            state
                .agents
                .write()
                .await
                .insert(agent.id.clone(), agent.clone());
            state
                .events
                .emit("agent_registered", serde_json::json!({ "agent": agent }));
        }
        Inbound::AssignTask { agent_id, task } => {
            state.events.emit(
                "task_assigned",
                serde_json::json!({ "agentId": agent_id, "task": task }),
            );
        }
        Inbound::UpdateTask {
            task_id,
            status,
            data,
        } => {
            state.events.emit(
                "task_updated",
                serde_json::json!({ "taskId": task_id, "status": status, "data": data }),
            );
        }
        Inbound::SystemMetrics { data } => {
            // Client-reported metrics are rebroadcast untouched so other
            // dashboard tabs see them.
            state.events.emit("metrics_updated", data);
        }
    }
}
