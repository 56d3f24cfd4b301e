//! Interaction — one outstanding request for human input.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

use crate::dsl::schema::{FormFieldDefinition, TimeoutAction};

/// What kind of input is being requested.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum InteractionType {
    Approval,
    Input,
    Selection,
    Review,
}

/// The external channel the request is delivered through.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ChannelType {
    Slack,
    Email,
    Webhook,
    InApp,
}

impl std::fmt::Display for ChannelType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ChannelType::Slack => "slack",
            ChannelType::Email => "email",
            ChannelType::Webhook => "webhook",
            ChannelType::InApp => "in_app",
        };
        write!(f, "{}", s)
    }
}

/// Interaction lifecycle. `Pending` is the only non-terminal state and is
/// never re-entered.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum InteractionStatus {
    Pending,
    Responded,
    Timeout,
    Cancelled,
    Error,
}

impl InteractionStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, InteractionStatus::Pending)
    }
}

/// What was asked, captured at creation. Persisted with the interaction so
/// the timeout monitor and classifier can operate without the node config.
#[derive(Deserialize, Serialize, Debug, Clone, Default)]
pub struct RequestData {
    /// Message template as configured on the node (rendered at dispatch).
    #[serde(default)]
    pub message_template: Option<String>,
    /// Execution variables snapshotted for template rendering.
    #[serde(default)]
    pub template_context: HashMap<String, Value>,
    /// Form fields for `input` interactions.
    #[serde(default)]
    pub form_fields: Vec<FormFieldDefinition>,
    /// Choices for `selection` interactions.
    #[serde(default)]
    pub options: Vec<String>,
    /// Channel recipient (Slack channel, email address, webhook target key).
    pub recipient: String,
    /// Channel-specific delivery config, passed through untouched.
    #[serde(default)]
    pub delivery: HashMap<String, Value>,
    /// Correlation token echoed back by well-behaved responders; an exact
    /// match short-circuits relevance classification.
    pub correlation_id: String,
    /// Behavior when the deadline elapses without a response.
    #[serde(default)]
    pub timeout_action: TimeoutAction,
    /// Payload used when `timeout_action` is `default_response`.
    #[serde(default)]
    pub timeout_default: Option<Value>,
}

/// One outstanding request for human input. Never physically deleted;
/// terminal rows are retained for audit.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct Interaction {
    pub id: String,
    pub workflow_id: String,
    pub execution_id: String,
    pub node_id: String,
    pub interaction_type: InteractionType,
    pub channel_type: ChannelType,
    pub status: InteractionStatus,
    pub request_data: RequestData,
    #[serde(default)]
    pub response_data: Option<Value>,
    /// Absolute deadline, fixed at creation: `created_at + timeout_secs`.
    pub timeout_at: i64,
    #[serde(default)]
    pub warning_sent: bool,
    pub created_at: i64,
    #[serde(default)]
    pub responded_at: Option<i64>,
}

impl Interaction {
    pub fn is_pending(&self) -> bool {
        self.status == InteractionStatus::Pending
    }

    /// Whether the deadline falls inside `(now, now + window_secs]`.
    pub fn expires_within(&self, now: i64, window_secs: i64) -> bool {
        self.timeout_at > now && self.timeout_at <= now.saturating_add(window_secs)
    }

    pub fn is_expired(&self, now: i64) -> bool {
        self.timeout_at <= now
    }

    /// Seconds left before the deadline (zero once expired).
    pub fn remaining_secs(&self, now: i64) -> i64 {
        (self.timeout_at - now).max(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(timeout_at: i64) -> Interaction {
        Interaction {
            id: "int-1".into(),
            workflow_id: "wf-1".into(),
            execution_id: "exec-1".into(),
            node_id: "approval".into(),
            interaction_type: InteractionType::Approval,
            channel_type: ChannelType::Slack,
            status: InteractionStatus::Pending,
            request_data: RequestData {
                recipient: "#releases".into(),
                correlation_id: "corr-1".into(),
                ..Default::default()
            },
            response_data: None,
            timeout_at,
            warning_sent: false,
            created_at: 1_000,
            responded_at: None,
        }
    }

    #[test]
    fn test_status_terminality() {
        assert!(!InteractionStatus::Pending.is_terminal());
        assert!(InteractionStatus::Responded.is_terminal());
        assert!(InteractionStatus::Timeout.is_terminal());
        assert!(InteractionStatus::Cancelled.is_terminal());
        assert!(InteractionStatus::Error.is_terminal());
    }

    #[test]
    fn test_expiry_window() {
        let interaction = sample(2_000);
        assert!(!interaction.is_expired(1_999));
        assert!(interaction.is_expired(2_000));
        assert!(interaction.expires_within(1_500, 600));
        assert!(!interaction.expires_within(1_000, 600));
        assert!(!interaction.expires_within(2_000, 600));
        assert_eq!(interaction.remaining_secs(1_400), 600);
        assert_eq!(interaction.remaining_secs(3_000), 0);
    }

    #[test]
    fn test_serde_round_trip_uses_snake_case_tags() {
        let interaction = sample(2_000);
        let json = serde_json::to_value(&interaction).unwrap();
        assert_eq!(json["interaction_type"], "approval");
        assert_eq!(json["channel_type"], "slack");
        assert_eq!(json["status"], "pending");

        let back: Interaction = serde_json::from_value(json).unwrap();
        assert_eq!(back.id, "int-1");
        assert!(back.is_pending());
    }
}
