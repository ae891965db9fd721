use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{RwLock, broadcast};

/// Capacity of the fan-out channel. Lagging websocket clients drop events
/// rather than exerting backpressure (at-most-once, best-effort).
const EVENT_CAPACITY: usize = 256;

/// A tagged JSON event as delivered to websocket subscribers.
#[derive(Debug, Clone, Serialize)]
pub struct Event {
    #[serde(rename = "type")]
    pub kind: String,
    pub data: serde_json::Value,
}

/// Process-wide publish/subscribe hub backing the websocket uplink.
#[derive(Clone)]
pub struct EventHub {
    tx: broadcast::Sender<Event>,
}

impl EventHub {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(EVENT_CAPACITY);
        Self { tx }
    }

    /// Fire-and-forget broadcast; a send with no subscribers is not an error.
    pub fn emit(&self, kind: &str, data: serde_json::Value) {
        let _ = self.tx.send(Event {
            kind: kind.to_string(),
            data,
        });
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventHub {
    fn default() -> Self {
        Self::new()
    }
}

/// An agent announced over the websocket via `register_agent`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentInfo {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub capabilities: Vec<String>,
    pub registered_at: u64,
}

pub type AgentRegistry = Arc<RwLock<HashMap<String, AgentInfo>>>;

pub fn new_agent_registry() -> AgentRegistry {
    Arc::new(RwLock::new(HashMap::new()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn events_reach_subscribers() {
        let hub = EventHub::new();
        let mut rx = hub.subscribe();
        hub.emit("metrics_update", serde_json::json!({ "cpu": 1 }));
        let ev = rx.recv().await.unwrap();
        assert_eq!(ev.kind, "metrics_update");
        assert_eq!(ev.data["cpu"], 1);
    }

    #[tokio::test]
    async fn emit_without_subscribers_is_silent() {
        let hub = EventHub::new();
        hub.emit("task_updated", serde_json::json!({}));
        assert_eq!(hub.subscriber_count(), 0);
    }

    #[test]
    fn event_serializes_with_type_tag() {
        let ev = Event {
            kind: "agent_registered".to_string(),
            data: serde_json::json!({ "id": "a1" }),
        };
        let json = serde_json::to_value(&ev).unwrap();
        assert_eq!(json["type"], "agent_registered");
        assert_eq!(json["data"]["id"], "a1");
    }
}
