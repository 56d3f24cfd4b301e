//! Engine events emitted at the pause/resume boundary.
//!
//! Emission is best-effort over an unbounded channel so a slow or absent
//! listener can never stall the resume path.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::mpsc;

use crate::domain::interaction::ChannelType;

/// Pause/resume engine event.
#[derive(Clone, Debug, Serialize)]
pub enum HilEvent {
    /// A pending interaction was created by a human-input node.
    InteractionCreated {
        interaction_id: String,
        execution_id: String,
        node_id: String,
        timeout_at: i64,
        timestamp: DateTime<Utc>,
    },

    /// The initial request notification was dispatched (or failed to be).
    NotificationDispatched {
        interaction_id: String,
        channel: ChannelType,
        delivered: bool,
        timestamp: DateTime<Utc>,
    },

    /// An execution halted awaiting human input.
    ExecutionPaused {
        execution_id: String,
        node_id: String,
        interaction_id: String,
        timestamp: DateTime<Utc>,
    },

    /// A pre-expiry warning was sent for a pending interaction.
    TimeoutWarningSent {
        interaction_id: String,
        remaining_secs: i64,
        timestamp: DateTime<Utc>,
    },

    /// A pending interaction reached its deadline.
    InteractionExpired {
        interaction_id: String,
        timestamp: DateTime<Utc>,
    },

    /// An inbound response matched a pending interaction.
    ResponseMatched {
        response_id: String,
        interaction_id: String,
        relevance_score: f64,
        timestamp: DateTime<Utc>,
    },

    /// An inbound response was filtered out as irrelevant.
    ResponseFiltered {
        response_id: String,
        relevance_score: f64,
        timestamp: DateTime<Utc>,
    },

    /// An inbound response scored in the uncertain band; recorded for
    /// operator visibility, never auto-resumed.
    ResponseUncertain {
        response_id: String,
        relevance_score: f64,
        timestamp: DateTime<Utc>,
    },

    /// A paused execution continued past its human-input node.
    ExecutionResumed {
        execution_id: String,
        node_id: String,
        source: String,
        port: String,
        timestamp: DateTime<Utc>,
    },

    /// A paused execution ended in error (timeout_action = fail).
    ExecutionFailed {
        execution_id: String,
        interaction_id: String,
        error: String,
        timestamp: DateTime<Utc>,
    },

    /// A paused execution was cancelled while waiting.
    ExecutionCancelled {
        execution_id: String,
        reason: String,
        timestamp: DateTime<Utc>,
    },

    /// An inbound delivery could not be scored at all.
    ResponseCorrupt {
        response_id: String,
        error: String,
        timestamp: DateTime<Utc>,
    },
}

impl HilEvent {
    /// Event payload as JSON, for log/audit sinks.
    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// Event sender handed to engine components.
pub type EventSender = mpsc::UnboundedSender<HilEvent>;

/// Event receiver handed to the host.
pub type EventReceiver = mpsc::UnboundedReceiver<HilEvent>;

/// Create an event channel pair.
pub fn create_event_channel() -> (EventSender, EventReceiver) {
    mpsc::unbounded_channel()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_event_channel() {
        let (sender, mut receiver) = create_event_channel();

        sender
            .send(HilEvent::InteractionExpired {
                interaction_id: "int-1".to_string(),
                timestamp: Utc::now(),
            })
            .unwrap();

        let event = receiver.recv().await.unwrap();
        match event {
            HilEvent::InteractionExpired { interaction_id, .. } => {
                assert_eq!(interaction_id, "int-1");
            }
            _ => panic!("Unexpected event type"),
        }
    }

    #[test]
    fn test_event_to_json() {
        let event = HilEvent::ResponseFiltered {
            response_id: "resp-1".to_string(),
            relevance_score: 0.12,
            timestamp: Utc::now(),
        };
        let json = event.to_json();
        assert!(json["ResponseFiltered"]["relevance_score"].as_f64().unwrap() < 0.3);
    }
}
