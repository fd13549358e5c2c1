use serde::Serialize;
use tracing::{error, info};

/// Structured event sink for the reporting/telemetry stream. Events land
/// on the `custodia::events` tracing target as JSON; a broker-backed
/// sink can replace this behind the same signature.
#[derive(Clone, Default)]
pub struct EventLog;

impl EventLog {
    pub fn new() -> Self {
        Self
    }

    pub fn publish<T: Serialize>(&self, topic: &str, key: &str, event: &T) {
        match serde_json::to_string(event) {
            Ok(payload) => {
                info!(target: "custodia::events", topic, key, payload, "event published");
            }
            Err(e) => {
                error!(topic, key, "failed to serialize event: {}", e);
            }
        }
    }
}
