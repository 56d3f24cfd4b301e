//! Inbound asynchronous deliveries and their per-channel payload shapes.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};

use super::interaction::ChannelType;
use crate::error::HilError;

/// Generic envelope handed to the engine by whatever HTTP layer receives the
/// webhook. The engine never depends on any specific platform's wire format
/// beyond the per-channel payload parsers below.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct WebhookEnvelope {
    pub source_channel: ChannelType,
    pub raw_payload: Value,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    #[serde(default)]
    pub received_at: Option<i64>,
}

impl WebhookEnvelope {
    pub fn new(source_channel: ChannelType, raw_payload: Value) -> Self {
        Self {
            source_channel,
            raw_payload,
            headers: HashMap::new(),
            received_at: None,
        }
    }

    /// Deduplication key: channel + external message id. Envelopes without a
    /// recognizable message id fall back to a content hash so a byte-identical
    /// redelivery is still recognized.
    pub fn dedup_key(&self, message_id: Option<&str>) -> String {
        match message_id {
            Some(id) => format!("{}:{}", self.source_channel, id),
            None => {
                let mut hasher = std::collections::hash_map::DefaultHasher::new();
                self.raw_payload.to_string().hash(&mut hasher);
                format!("{}:sha:{:016x}", self.source_channel, hasher.finish())
            }
        }
    }
}

/// Processing lifecycle of an inbound delivery. Mutated exactly once, from
/// `Unprocessed` to a terminal status.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingStatus {
    Unprocessed,
    Matched,
    FilteredOut,
    Error,
}

impl ProcessingStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ProcessingStatus::Unprocessed)
    }
}

/// A raw asynchronous delivery from an external channel, retained for audit.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct IncomingResponse {
    pub id: String,
    pub source_channel: ChannelType,
    pub raw_payload: Value,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    /// Unique across all deliveries; a redelivered webhook is skipped.
    pub dedup_key: String,
    pub received_at: i64,
    pub status: ProcessingStatus,
    #[serde(default)]
    pub matched_interaction_id: Option<String>,
    #[serde(default)]
    pub relevance_score: Option<f64>,
    #[serde(default)]
    pub reasoning: Option<String>,
}

// ================================
// Per-channel payload shapes
// ================================

#[derive(Deserialize, Serialize, Debug, Clone, Default)]
pub struct SlackUser {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
}

#[derive(Deserialize, Serialize, Debug, Clone, Default)]
pub struct SlackAction {
    #[serde(default)]
    pub action_id: Option<String>,
    #[serde(default)]
    pub value: Option<String>,
}

#[derive(Deserialize, Serialize, Debug, Clone, Default)]
pub struct SlackContainer {
    #[serde(default)]
    pub message_ts: Option<String>,
    #[serde(default)]
    pub thread_ts: Option<String>,
}

/// Slack-style interactive-component payload (`block_actions` shape).
#[derive(Deserialize, Serialize, Debug, Clone, Default)]
pub struct SlackInteractivePayload {
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub user: Option<SlackUser>,
    #[serde(default)]
    pub actions: Vec<SlackAction>,
    #[serde(default)]
    pub callback_id: Option<String>,
    #[serde(default)]
    pub container: Option<SlackContainer>,
    #[serde(default)]
    pub text: Option<String>,
}

/// A parsed inbound email reply.
#[derive(Deserialize, Serialize, Debug, Clone, Default)]
pub struct EmailReplyPayload {
    #[serde(default)]
    pub from: Option<String>,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub in_reply_to: Option<String>,
    #[serde(default)]
    pub message_id: Option<String>,
}

/// A reply submitted through the host application's own UI.
#[derive(Deserialize, Serialize, Debug, Clone, Default)]
pub struct InAppPayload {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub interaction_id: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub client_msg_id: Option<String>,
    #[serde(default)]
    pub form_data: Option<Value>,
}

/// A generic JSON webhook body.
#[derive(Deserialize, Serialize, Debug, Clone, Default)]
pub struct GenericJsonPayload {
    #[serde(default, alias = "message", alias = "body")]
    pub text: Option<String>,
    #[serde(default, alias = "interaction_id")]
    pub correlation_id: Option<String>,
    #[serde(default, alias = "user", alias = "from")]
    pub sender: Option<String>,
    #[serde(default, alias = "id", alias = "event_id")]
    pub message_id: Option<String>,
    #[serde(default)]
    pub workflow_id: Option<String>,
    #[serde(default)]
    pub data: Option<Value>,
}

/// Tagged union over the inbound payload shapes, one variant per source
/// channel, each exposing the shared capability set the classifier needs.
#[derive(Debug, Clone)]
pub enum ResponsePayload {
    SlackInteractive(SlackInteractivePayload),
    EmailReply(EmailReplyPayload),
    InApp(InAppPayload),
    GenericJson(GenericJsonPayload),
}

impl ResponsePayload {
    /// Parse the raw body according to its declared source channel.
    pub fn parse(channel: ChannelType, raw: &Value) -> Result<Self, HilError> {
        if !raw.is_object() {
            return Err(HilError::MalformedPayload(format!(
                "expected a JSON object from {} payload",
                channel
            )));
        }
        let parsed = match channel {
            ChannelType::Slack => ResponsePayload::SlackInteractive(
                serde_json::from_value(raw.clone())
                    .map_err(|e| HilError::MalformedPayload(e.to_string()))?,
            ),
            ChannelType::Email => ResponsePayload::EmailReply(
                serde_json::from_value(raw.clone())
                    .map_err(|e| HilError::MalformedPayload(e.to_string()))?,
            ),
            ChannelType::InApp => ResponsePayload::InApp(
                serde_json::from_value(raw.clone())
                    .map_err(|e| HilError::MalformedPayload(e.to_string()))?,
            ),
            ChannelType::Webhook => ResponsePayload::GenericJson(
                serde_json::from_value(raw.clone())
                    .map_err(|e| HilError::MalformedPayload(e.to_string()))?,
            ),
        };
        Ok(parsed)
    }

    pub fn channel(&self) -> ChannelType {
        match self {
            ResponsePayload::SlackInteractive(_) => ChannelType::Slack,
            ResponsePayload::EmailReply(_) => ChannelType::Email,
            ResponsePayload::InApp(_) => ChannelType::InApp,
            ResponsePayload::GenericJson(_) => ChannelType::Webhook,
        }
    }

    /// Free-form response text, best effort per channel shape.
    pub fn text(&self) -> String {
        match self {
            ResponsePayload::SlackInteractive(p) => {
                let action_values: Vec<&str> = p
                    .actions
                    .iter()
                    .filter_map(|a| a.value.as_deref().or(a.action_id.as_deref()))
                    .collect();
                if action_values.is_empty() {
                    p.text.clone().unwrap_or_default()
                } else {
                    action_values.join(" ")
                }
            }
            ResponsePayload::EmailReply(p) => {
                let body = p.body.as_deref().unwrap_or_default();
                match p.subject.as_deref() {
                    Some(subject) if !subject.is_empty() => format!("{} {}", subject, body),
                    _ => body.to_string(),
                }
            }
            ResponsePayload::InApp(p) => p.text.clone().unwrap_or_default(),
            ResponsePayload::GenericJson(p) => p.text.clone().unwrap_or_default(),
        }
    }

    /// Correlation/thread reference, when the channel carries one.
    pub fn correlation_id(&self) -> Option<&str> {
        match self {
            ResponsePayload::SlackInteractive(p) => p
                .callback_id
                .as_deref()
                .or_else(|| p.container.as_ref().and_then(|c| c.thread_ts.as_deref())),
            ResponsePayload::EmailReply(p) => p.in_reply_to.as_deref(),
            ResponsePayload::InApp(p) => p.interaction_id.as_deref(),
            ResponsePayload::GenericJson(p) => p.correlation_id.as_deref(),
        }
    }

    /// Responding user/address, when the channel carries one.
    pub fn sender(&self) -> Option<&str> {
        match self {
            ResponsePayload::SlackInteractive(p) => p
                .user
                .as_ref()
                .and_then(|u| u.id.as_deref().or(u.username.as_deref())),
            ResponsePayload::EmailReply(p) => p.from.as_deref(),
            ResponsePayload::InApp(p) => p.user_id.as_deref(),
            ResponsePayload::GenericJson(p) => p.sender.as_deref(),
        }
    }

    /// External message id used for deduplication.
    pub fn message_id(&self) -> Option<&str> {
        match self {
            ResponsePayload::SlackInteractive(p) => p
                .container
                .as_ref()
                .and_then(|c| c.message_ts.as_deref())
                .or(p.callback_id.as_deref()),
            ResponsePayload::EmailReply(p) => p.message_id.as_deref(),
            ResponsePayload::InApp(p) => p.client_msg_id.as_deref(),
            ResponsePayload::GenericJson(p) => p.message_id.as_deref(),
        }
    }

    /// Workflow hint for candidate scoping, when declared in the payload.
    pub fn workflow_id(&self) -> Option<&str> {
        match self {
            ResponsePayload::GenericJson(p) => p.workflow_id.as_deref(),
            _ => None,
        }
    }
}
