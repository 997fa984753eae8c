//! Broadcast of tracking decisions as JSON lines.

use crate::outcome::{TrackStatus, Transition};
use chrono::Utc;
use kci_common::{DocId, LineageKey, RegressionScope};
use serde::Serialize;
use serde_json::json;
use tokio::sync::broadcast;
use tracing::warn;

const DEFAULT_BUFFER: usize = 256;

pub const REGRESSION_CREATED: &str = "regression_created";
pub const REGRESSION_EXTENDED: &str = "regression_extended";
pub const REGRESSION_SKIPPED: &str = "regression_skipped";

/// Payload shared by every tracking event.
#[derive(Debug, Clone, Serialize)]
pub struct RegressionEvent {
    pub report_id: DocId,
    pub scope: RegressionScope,
    pub key: LineageKey,
    pub transition: Transition,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub regression_id: Option<DocId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<TrackStatus>,
}

impl RegressionEvent {
    /// Event name for this payload.
    pub fn name(&self) -> &'static str {
        match (self.transition, self.status) {
            (Transition::NewRegression, Some(TrackStatus::Created)) => REGRESSION_CREATED,
            (t, _) if t.tracks() => REGRESSION_EXTENDED,
            _ => REGRESSION_SKIPPED,
        }
    }
}

/// Broadcast channel for tracking events.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<String>,
}

impl EventBus {
    /// The buffer is clamped to at least `DEFAULT_BUFFER`.
    pub fn new(buffer: usize) -> Self {
        let buffer = buffer.max(DEFAULT_BUFFER);
        let (sender, _) = broadcast::channel(buffer);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<String> {
        self.sender.subscribe()
    }

    /// Emit a structured event with payload.
    pub fn emit<T: Serialize>(&self, event: &str, data: &T) {
        let payload = json!({
            "event": event,
            "data": data,
            "timestamp": Utc::now().to_rfc3339(),
        });
        match serde_json::to_string(&payload) {
            Ok(serialized) => {
                // No subscribers is fine.
                let _ = self.sender.send(serialized);
            }
            Err(err) => warn!("Failed to serialize event {}: {}", event, err),
        }
    }

    pub fn emit_regression(&self, event: &RegressionEvent) {
        self.emit(event.name(), event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_BUFFER)
    }
}
