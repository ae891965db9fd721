pub mod bench;
pub mod llm;
pub mod metrics;
pub mod paths;
pub mod settings;
pub mod terminal;
pub mod uplink;
pub mod workflows;

use std::time::{SystemTime, UNIX_EPOCH};

/// Milliseconds since the Unix epoch, the timestamp unit the dashboard expects.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
