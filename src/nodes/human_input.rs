//! Human-input node executor: validates the node configuration, creates the
//! pending interaction, and requests the initial channel notification.
//!
//! Validation failures fail the node with no side effects — no interaction
//! exists until the configuration has passed. Dispatch failures do not fail
//! the node: the interaction stays resumable through a direct response,
//! manual resume, or timeout even if the notification never arrived.

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

use crate::channel::ChannelDispatcher;
use crate::core::event_bus::HilEvent;
use crate::core::runtime_context::RuntimeContext;
use crate::domain::execution::ExecutionContext;
use crate::domain::interaction::{Interaction, InteractionStatus, RequestData};
use crate::dsl::schema::{HumanInputNodeData, NodeExecutionStatus, NodeRunResult};
use crate::error::HilError;
use crate::nodes::executor::NodeExecutor;
use crate::store::InteractionStore;

pub(crate) const INTERACTION_ID_KEY: &str = "interaction_id";
pub(crate) const TIMEOUT_AT_KEY: &str = "timeout_at";
pub(crate) const CORRELATION_ID_KEY: &str = "correlation_id";

pub struct HumanInputExecutor {
    interactions: Arc<dyn InteractionStore>,
    dispatcher: Arc<ChannelDispatcher>,
}

impl HumanInputExecutor {
    pub fn new(
        interactions: Arc<dyn InteractionStore>,
        dispatcher: Arc<ChannelDispatcher>,
    ) -> Self {
        Self {
            interactions,
            dispatcher,
        }
    }
}

#[async_trait]
impl NodeExecutor for HumanInputExecutor {
    async fn execute(
        &self,
        node_id: &str,
        config: &Value,
        execution: &ExecutionContext,
        context: &RuntimeContext,
    ) -> Result<NodeRunResult, HilError> {
        let cfg: HumanInputNodeData = serde_json::from_value(config.clone())
            .map_err(|e| HilError::ConfigError(e.to_string()))?;
        cfg.validate()?;

        let now = context.now();
        let interaction = Interaction {
            id: context.next_id(),
            workflow_id: execution.workflow_id.clone(),
            execution_id: execution.execution_id.clone(),
            node_id: node_id.to_string(),
            interaction_type: cfg.interaction_type,
            channel_type: cfg.channel_type,
            status: InteractionStatus::Pending,
            request_data: RequestData {
                message_template: cfg.message_template,
                template_context: execution.variables.clone(),
                form_fields: cfg.form_fields,
                options: cfg.options,
                recipient: cfg.recipient,
                delivery: cfg.delivery,
                correlation_id: context.next_id(),
                timeout_action: cfg.timeout_action,
                timeout_default: cfg.timeout_default,
            },
            response_data: None,
            timeout_at: now.saturating_add(cfg.timeout_secs as i64),
            warning_sent: false,
            created_at: now,
            responded_at: None,
        };

        self.interactions.create(interaction.clone()).await?;
        context.emit(HilEvent::InteractionCreated {
            interaction_id: interaction.id.clone(),
            execution_id: interaction.execution_id.clone(),
            node_id: node_id.to_string(),
            timeout_at: interaction.timeout_at,
            timestamp: Utc::now(),
        });

        let delivered = self.dispatcher.dispatch(&interaction).await;
        if !delivered {
            tracing::warn!(
                interaction_id = %interaction.id,
                channel = %interaction.channel_type,
                "initial notification not delivered; interaction remains resumable"
            );
        }
        context.emit(HilEvent::NotificationDispatched {
            interaction_id: interaction.id.clone(),
            channel: interaction.channel_type,
            delivered,
            timestamp: Utc::now(),
        });

        let mut metadata = HashMap::new();
        metadata.insert(
            INTERACTION_ID_KEY.to_string(),
            Value::String(interaction.id.clone()),
        );
        metadata.insert(
            TIMEOUT_AT_KEY.to_string(),
            Value::from(interaction.timeout_at),
        );
        metadata.insert(
            CORRELATION_ID_KEY.to_string(),
            Value::String(interaction.request_data.correlation_id.clone()),
        );

        Ok(NodeRunResult {
            status: NodeExecutionStatus::Paused,
            metadata,
            ..Default::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::testing::RecordingChannel;
    use crate::core::runtime_context::{FakeIdGenerator, FakeTimeProvider};
    use crate::domain::interaction::{ChannelType, InteractionType};
    use crate::store::MemoryInteractionStore;
    use serde_json::json;

    fn test_context() -> RuntimeContext {
        RuntimeContext::default()
            .with_time_provider(Arc::new(FakeTimeProvider::new(1_000)))
            .with_id_generator(Arc::new(FakeIdGenerator::new("id".to_string())))
    }

    fn approval_config() -> Value {
        json!({
            "interaction_type": "approval",
            "channel_type": "slack",
            "timeout_secs": 600,
            "recipient": "#releases",
            "message_template": "Deploy {{ version }}?"
        })
    }

    #[tokio::test]
    async fn test_execute_creates_pending_interaction_and_pauses() {
        let interactions = Arc::new(MemoryInteractionStore::new());
        let dispatcher = Arc::new(ChannelDispatcher::new());
        let channel = Arc::new(RecordingChannel::new(true));
        dispatcher.register(ChannelType::Slack, channel.clone());

        let executor = HumanInputExecutor::new(interactions.clone(), dispatcher);
        let execution = ExecutionContext::new("wf-1", "exec-1")
            .with_variable("version", json!("1.4.2"));

        let result = executor
            .execute("approval", &approval_config(), &execution, &test_context())
            .await
            .unwrap();

        assert_eq!(result.status, NodeExecutionStatus::Paused);
        let interaction_id = result.metadata[INTERACTION_ID_KEY].as_str().unwrap();
        assert_eq!(result.metadata[TIMEOUT_AT_KEY], json!(1_600));

        let row = interactions.get(interaction_id).await.unwrap().unwrap();
        assert!(row.is_pending());
        assert_eq!(row.interaction_type, InteractionType::Approval);
        assert_eq!(row.created_at, 1_000);
        assert_eq!(row.timeout_at, 1_600);
        assert_eq!(row.request_data.recipient, "#releases");

        let sent = channel.sent.lock().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].1, "Deploy 1.4.2?");
    }

    #[tokio::test]
    async fn test_invalid_config_creates_nothing() {
        let interactions = Arc::new(MemoryInteractionStore::new());
        let executor = HumanInputExecutor::new(
            interactions.clone(),
            Arc::new(ChannelDispatcher::new()),
        );
        let execution = ExecutionContext::new("wf-1", "exec-1");

        let bad = json!({
            "interaction_type": "approval",
            "channel_type": "slack",
            "timeout_secs": 10,
            "recipient": "#releases"
        });
        let err = executor
            .execute("approval", &bad, &execution, &test_context())
            .await
            .unwrap_err();
        assert!(matches!(err, HilError::ConfigError(_)));
        assert!(interactions.list_pending().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_dispatch_failure_does_not_fail_the_node() {
        let interactions = Arc::new(MemoryInteractionStore::new());
        // No channel registered at all: worst-case delivery failure.
        let executor = HumanInputExecutor::new(
            interactions.clone(),
            Arc::new(ChannelDispatcher::new()),
        );
        let execution = ExecutionContext::new("wf-1", "exec-1");

        let result = executor
            .execute("approval", &approval_config(), &execution, &test_context())
            .await
            .unwrap();
        assert_eq!(result.status, NodeExecutionStatus::Paused);
        assert_eq!(interactions.list_pending().await.unwrap().len(), 1);
    }
}
