//! Outbound channel dispatch.
//!
//! [`ChannelDispatcher`] renders the request message and hands it to the
//! channel registered for the interaction's channel type. Nothing in this
//! module raises across the dispatch boundary: channel failures, missing
//! registrations, and template problems surface as a `false` delivery result
//! and a log line, and the interaction stays resumable through every path.

pub mod in_app;
pub mod template;
pub mod webhook;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;

use crate::domain::interaction::{ChannelType, Interaction};
pub use in_app::{InAppChannel, InAppMessage};
pub use template::MessageRenderer;
pub use webhook::{WebhookChannel, WebhookChannelConfig};

/// Correlation metadata delivered alongside every outbound message so the
/// responder (or its tooling) can echo it back.
#[derive(Debug, Clone)]
pub struct CorrelationMetadata {
    pub interaction_id: String,
    pub correlation_id: String,
    pub workflow_id: String,
    pub execution_id: String,
}

/// One outbound channel implementation. `send` must never panic or error
/// across this boundary; implementations catch their own failures and report
/// delivery as a boolean.
#[async_trait]
pub trait Channel: Send + Sync {
    async fn send(
        &self,
        recipient: &str,
        rendered_text: &str,
        correlation: &CorrelationMetadata,
    ) -> bool;
}

/// Registry of channels by channel type, plus message rendering.
pub struct ChannelDispatcher {
    channels: RwLock<HashMap<ChannelType, Arc<dyn Channel>>>,
    renderer: MessageRenderer,
}

impl ChannelDispatcher {
    pub fn new() -> Self {
        Self {
            channels: RwLock::new(HashMap::new()),
            renderer: MessageRenderer::new(),
        }
    }

    pub fn register(&self, channel_type: ChannelType, channel: Arc<dyn Channel>) {
        self.channels.write().insert(channel_type, channel);
    }

    fn channel_for(&self, channel_type: ChannelType) -> Option<Arc<dyn Channel>> {
        self.channels.read().get(&channel_type).cloned()
    }

    /// Render and send the initial request notification for an interaction.
    pub async fn dispatch(&self, interaction: &Interaction) -> bool {
        let text = self.render_request_message(interaction);
        self.send_to_channel(interaction, &text).await
    }

    /// Send a pre-expiry warning for a still-pending interaction.
    pub async fn dispatch_warning(&self, interaction: &Interaction, remaining_secs: i64) -> bool {
        let text = format!(
            "Reminder: a pending {} request expires in {} minute(s). {}",
            serde_json::to_value(interaction.interaction_type)
                .ok()
                .and_then(|v| v.as_str().map(str::to_string))
                .unwrap_or_default(),
            (remaining_secs.max(0) + 59) / 60,
            self.render_request_message(interaction),
        );
        self.send_to_channel(interaction, &text).await
    }

    fn render_request_message(&self, interaction: &Interaction) -> String {
        let Some(template) = interaction.request_data.message_template.as_deref() else {
            return default_request_text(interaction);
        };
        let mut vars = interaction.request_data.template_context.clone();
        vars.insert("interaction".to_string(), interaction_vars(interaction));
        vars.insert("workflow".to_string(), json!({"id": interaction.workflow_id}));
        vars.insert(
            "execution".to_string(),
            json!({"id": interaction.execution_id}),
        );
        match self.renderer.render(template, &vars) {
            Ok((rendered, unresolved)) => {
                if !unresolved.is_empty() {
                    tracing::warn!(
                        interaction_id = %interaction.id,
                        "unresolved template placeholders: {}",
                        unresolved.join(", ")
                    );
                }
                rendered
            }
            Err(e) => {
                tracing::warn!(
                    interaction_id = %interaction.id,
                    "message template failed to render, falling back to raw template: {}",
                    e
                );
                template.to_string()
            }
        }
    }

    async fn send_to_channel(&self, interaction: &Interaction, text: &str) -> bool {
        let Some(channel) = self.channel_for(interaction.channel_type) else {
            tracing::warn!(
                interaction_id = %interaction.id,
                channel = %interaction.channel_type,
                "no channel registered, notification not delivered"
            );
            return false;
        };
        let correlation = CorrelationMetadata {
            interaction_id: interaction.id.clone(),
            correlation_id: interaction.request_data.correlation_id.clone(),
            workflow_id: interaction.workflow_id.clone(),
            execution_id: interaction.execution_id.clone(),
        };
        channel
            .send(&interaction.request_data.recipient, text, &correlation)
            .await
    }
}

impl Default for ChannelDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

fn interaction_vars(interaction: &Interaction) -> Value {
    json!({
        "id": interaction.id,
        "node_id": interaction.node_id,
        "type": interaction.interaction_type,
        "timeout_at": interaction.timeout_at,
    })
}

fn default_request_text(interaction: &Interaction) -> String {
    match interaction.interaction_type {
        crate::domain::interaction::InteractionType::Approval => format!(
            "Approval requested for node '{}' (reply approve/reject, ref {})",
            interaction.node_id, interaction.request_data.correlation_id
        ),
        crate::domain::interaction::InteractionType::Selection => format!(
            "Selection requested for node '{}': {} (ref {})",
            interaction.node_id,
            interaction.request_data.options.join(" | "),
            interaction.request_data.correlation_id
        ),
        _ => format!(
            "Input requested for node '{}' (ref {})",
            interaction.node_id, interaction.request_data.correlation_id
        ),
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use tokio::sync::Mutex;

    /// Records every send; delivery result is configurable.
    pub struct RecordingChannel {
        pub sent: Mutex<Vec<(String, String, String)>>,
        pub deliver: bool,
    }

    impl RecordingChannel {
        pub fn new(deliver: bool) -> Self {
            Self {
                sent: Mutex::new(Vec::new()),
                deliver,
            }
        }
    }

    #[async_trait]
    impl Channel for RecordingChannel {
        async fn send(
            &self,
            recipient: &str,
            rendered_text: &str,
            correlation: &CorrelationMetadata,
        ) -> bool {
            self.sent.lock().await.push((
                recipient.to_string(),
                rendered_text.to_string(),
                correlation.correlation_id.clone(),
            ));
            self.deliver
        }
    }
}
