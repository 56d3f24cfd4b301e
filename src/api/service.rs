//! High-level service facade and builder.
//!
//! [`HilService`] (constructed via [`HilServiceBuilder`]) wires the stores,
//! channel dispatcher, classifier, timeout monitor, and resume coordinator
//! together. All collaborators are dependency-injected and owned by the
//! service; there are no process-wide singletons.

use chrono::Utc;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::channel::{Channel, ChannelDispatcher};
use crate::classify::{ClassifierStrategy, HeuristicClassifier, IngestOutcome, ResponseProcessor};
use crate::core::event_bus::{create_event_channel, EventReceiver, HilEvent};
use crate::core::runtime_context::{IdGenerator, RuntimeContext, TimeProvider};
use crate::domain::execution::{ExecutionContext, ExecutionSnapshot};
use crate::domain::interaction::{ChannelType, Interaction, InteractionStatus, InteractionType};
use crate::domain::response::WebhookEnvelope;
use crate::dsl::schema::{validate_form_data, NodeExecutionStatus};
use crate::error::{HilError, StoreResult};
use crate::monitor::{TimeoutMonitor, TimeoutMonitorConfig};
use crate::nodes::executor::NodeExecutor;
use crate::nodes::human_input::{HumanInputExecutor, INTERACTION_ID_KEY, TIMEOUT_AT_KEY};
use crate::resume::{
    GraphResumer, NoopResumer, ResumeCoordinator, ResumeOutcome, ResumeSource,
};
use crate::store::{
    ExecutionStore, InteractionStore, MemoryExecutionStore, MemoryInteractionStore,
    MemoryPauseStore, MemoryResponseStore, PauseStore, ResponseStore,
};
use crate::domain::pause::PauseRecord;

/// Result of executing a human-input node: what the engine needs to record
/// before walking away from the paused node.
#[derive(Debug, Clone)]
pub struct PausedNode {
    pub interaction_id: String,
    pub pause_id: String,
    pub timeout_at: i64,
}

pub struct HilService {
    interactions: Arc<dyn InteractionStore>,
    pauses: Arc<dyn PauseStore>,
    executions: Arc<dyn ExecutionStore>,
    dispatcher: Arc<ChannelDispatcher>,
    coordinator: Arc<ResumeCoordinator>,
    processor: ResponseProcessor,
    executor: HumanInputExecutor,
    monitor_config: TimeoutMonitorConfig,
    context: RuntimeContext,
}

impl HilService {
    pub fn builder() -> HilServiceBuilder {
        HilServiceBuilder::new()
    }

    /// Execute a human-input node and halt the execution on success: the
    /// pending interaction, the active pause record, and the
    /// `WaitingForHuman` status are created as one logical transaction.
    /// Validation failures leave no state behind.
    pub async fn execute_node(
        &self,
        node_id: &str,
        config: &Value,
        execution: &ExecutionContext,
    ) -> Result<PausedNode, HilError> {
        if self
            .pauses
            .get_active(&execution.execution_id, node_id)
            .await?
            .is_some()
        {
            return Err(HilError::ConfigError(format!(
                "execution '{}' is already paused at node '{}'",
                execution.execution_id, node_id
            )));
        }
        let result = self
            .executor
            .execute(node_id, config, execution, &self.context)
            .await?;
        if result.status != NodeExecutionStatus::Paused {
            return Err(HilError::InternalError(format!(
                "human-input node '{}' returned non-paused status {:?}",
                node_id, result.status
            )));
        }
        let interaction_id = result
            .metadata
            .get(INTERACTION_ID_KEY)
            .and_then(Value::as_str)
            .ok_or_else(|| {
                HilError::InternalError("paused node missing interaction id".to_string())
            })?
            .to_string();
        let timeout_at = result
            .metadata
            .get(TIMEOUT_AT_KEY)
            .and_then(Value::as_i64)
            .unwrap_or_default();

        let now = self.context.now();
        let pause = PauseRecord::waiting_for_human(
            self.context.next_id(),
            execution.execution_id.clone(),
            node_id.to_string(),
            interaction_id.clone(),
            now,
        );
        let pause_id = pause.id.clone();
        if let Err(e) = self.pauses.create(pause).await {
            // A concurrent pause won the slot; retract the interaction so it
            // cannot linger pending with no pause to resolve.
            let _ = self
                .interactions
                .resolve_if_pending(&interaction_id, InteractionStatus::Cancelled, None, now)
                .await;
            return Err(e.into());
        }
        if let Err(e) = self
            .executions
            .set_waiting(
                &execution.execution_id,
                &execution.workflow_id,
                node_id,
                &interaction_id,
                now,
            )
            .await
        {
            let _ = self
                .pauses
                .cancel_if_active(&pause_id, "execution unavailable", now)
                .await;
            let _ = self
                .interactions
                .resolve_if_pending(&interaction_id, InteractionStatus::Cancelled, None, now)
                .await;
            return Err(e.into());
        }
        self.context.emit(HilEvent::ExecutionPaused {
            execution_id: execution.execution_id.clone(),
            node_id: node_id.to_string(),
            interaction_id: interaction_id.clone(),
            timestamp: Utc::now(),
        });

        Ok(PausedNode {
            interaction_id,
            pause_id,
            timeout_at,
        })
    }

    /// Process one inbound webhook delivery.
    pub async fn ingest_response(
        &self,
        envelope: WebhookEnvelope,
    ) -> Result<IngestOutcome, HilError> {
        self.processor.ingest(envelope).await
    }

    /// Resume API for manual/external callers. For `input` interactions the
    /// payload's `form_data` object is validated against the configured
    /// form fields before any state changes.
    pub async fn resume(
        &self,
        execution_id: &str,
        node_id: &str,
        payload: Value,
        source: ResumeSource,
    ) -> Result<ResumeOutcome, HilError> {
        if source == ResumeSource::Manual {
            self.validate_manual_payload(execution_id, node_id, &payload)
                .await?;
        }
        self.coordinator
            .resume(execution_id, node_id, payload, source)
            .await
    }

    /// Cancel every active pause of an execution; returns how many were
    /// cancelled. A concurrent resume attempt and this call race on the same
    /// conditional guards, so the execution resolves exactly once either way.
    pub async fn cancel_execution(
        &self,
        execution_id: &str,
        reason: &str,
    ) -> Result<usize, HilError> {
        self.coordinator.cancel_execution(execution_id, reason).await
    }

    // Read-only query surface consumed by operational tooling.

    pub async fn pending_interactions(&self) -> StoreResult<Vec<Interaction>> {
        self.interactions.list_pending().await
    }

    pub async fn interactions_expiring_within(
        &self,
        window: Duration,
    ) -> StoreResult<Vec<Interaction>> {
        self.interactions
            .list_expiring_within(self.context.now(), window.as_secs() as i64)
            .await
    }

    pub async fn interaction(&self, id: &str) -> StoreResult<Option<Interaction>> {
        self.interactions.get(id).await
    }

    pub async fn execution(&self, id: &str) -> StoreResult<Option<ExecutionSnapshot>> {
        self.executions.get(id).await
    }

    /// Build a timeout monitor sharing this service's stores and coordinator.
    pub fn timeout_monitor(&self) -> TimeoutMonitor {
        TimeoutMonitor::new(
            self.interactions.clone(),
            self.coordinator.clone(),
            self.dispatcher.clone(),
            self.monitor_config.clone(),
            self.context.clone(),
        )
    }

    /// Spawn the timeout monitor loop on the current runtime.
    pub fn spawn_timeout_monitor(&self, shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        let monitor = Arc::new(self.timeout_monitor());
        tokio::spawn(monitor.run(shutdown))
    }

    async fn validate_manual_payload(
        &self,
        execution_id: &str,
        node_id: &str,
        payload: &Value,
    ) -> Result<(), HilError> {
        let Some(pause) = self.pauses.get_active(execution_id, node_id).await? else {
            return Ok(());
        };
        let Some(interaction) = self.interactions.get(&pause.interaction_id).await? else {
            return Ok(());
        };
        if interaction.interaction_type != InteractionType::Input {
            return Ok(());
        }
        let form_data: HashMap<String, Value> = payload
            .get("form_data")
            .and_then(Value::as_object)
            .map(|m| m.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
            .unwrap_or_default();
        validate_form_data(&interaction.request_data.form_fields, &form_data)
            .map_err(HilError::InputValidationError)
    }
}

/// Builder-based configuration for [`HilService`].
pub struct HilServiceBuilder {
    interactions: Option<Arc<dyn InteractionStore>>,
    pauses: Option<Arc<dyn PauseStore>>,
    responses: Option<Arc<dyn ResponseStore>>,
    executions: Option<Arc<dyn ExecutionStore>>,
    classifier: Option<Arc<dyn ClassifierStrategy>>,
    resumer: Option<Arc<dyn GraphResumer>>,
    channels: Vec<(ChannelType, Arc<dyn Channel>)>,
    monitor_config: TimeoutMonitorConfig,
    time_provider: Option<Arc<dyn TimeProvider>>,
    id_generator: Option<Arc<dyn IdGenerator>>,
    collect_events: bool,
}

impl HilServiceBuilder {
    pub fn new() -> Self {
        Self {
            interactions: None,
            pauses: None,
            responses: None,
            executions: None,
            classifier: None,
            resumer: None,
            channels: Vec::new(),
            monitor_config: TimeoutMonitorConfig::default(),
            time_provider: None,
            id_generator: None,
            collect_events: false,
        }
    }

    pub fn interaction_store(mut self, store: Arc<dyn InteractionStore>) -> Self {
        self.interactions = Some(store);
        self
    }

    pub fn pause_store(mut self, store: Arc<dyn PauseStore>) -> Self {
        self.pauses = Some(store);
        self
    }

    pub fn response_store(mut self, store: Arc<dyn ResponseStore>) -> Self {
        self.responses = Some(store);
        self
    }

    pub fn execution_store(mut self, store: Arc<dyn ExecutionStore>) -> Self {
        self.executions = Some(store);
        self
    }

    pub fn classifier(mut self, classifier: Arc<dyn ClassifierStrategy>) -> Self {
        self.classifier = Some(classifier);
        self
    }

    pub fn graph_resumer(mut self, resumer: Arc<dyn GraphResumer>) -> Self {
        self.resumer = Some(resumer);
        self
    }

    pub fn channel(mut self, channel_type: ChannelType, channel: Arc<dyn Channel>) -> Self {
        self.channels.push((channel_type, channel));
        self
    }

    pub fn monitor_config(mut self, config: TimeoutMonitorConfig) -> Self {
        self.monitor_config = config;
        self
    }

    pub fn time_provider(mut self, provider: Arc<dyn TimeProvider>) -> Self {
        self.time_provider = Some(provider);
        self
    }

    pub fn id_generator(mut self, generator: Arc<dyn IdGenerator>) -> Self {
        self.id_generator = Some(generator);
        self
    }

    /// Attach an event channel; the receiver is returned from
    /// [`build_with_events`](Self::build_with_events).
    pub fn collect_events(mut self) -> Self {
        self.collect_events = true;
        self
    }

    pub fn build(self) -> HilService {
        self.build_inner().0
    }

    /// Build the service along with the event receiver (when
    /// [`collect_events`](Self::collect_events) was requested).
    pub fn build_with_events(self) -> (HilService, Option<EventReceiver>) {
        self.build_inner()
    }

    fn build_inner(self) -> (HilService, Option<EventReceiver>) {
        let mut context = RuntimeContext::default();
        if let Some(time_provider) = self.time_provider {
            context = context.with_time_provider(time_provider);
        }
        if let Some(id_generator) = self.id_generator {
            context = context.with_id_generator(id_generator);
        }
        let event_rx = if self.collect_events {
            let (tx, rx) = create_event_channel();
            context = context.with_event_tx(tx);
            Some(rx)
        } else {
            None
        };

        let interactions = self
            .interactions
            .unwrap_or_else(|| Arc::new(MemoryInteractionStore::new()));
        let pauses = self
            .pauses
            .unwrap_or_else(|| Arc::new(MemoryPauseStore::new()));
        let responses = self
            .responses
            .unwrap_or_else(|| Arc::new(MemoryResponseStore::new()));
        let executions = self
            .executions
            .unwrap_or_else(|| Arc::new(MemoryExecutionStore::new()));
        let classifier = self
            .classifier
            .unwrap_or_else(|| Arc::new(HeuristicClassifier::new()));
        let resumer = self.resumer.unwrap_or_else(|| Arc::new(NoopResumer));

        let dispatcher = Arc::new(ChannelDispatcher::new());
        for (channel_type, channel) in self.channels {
            dispatcher.register(channel_type, channel);
        }

        let coordinator = Arc::new(ResumeCoordinator::new(
            pauses.clone(),
            interactions.clone(),
            executions.clone(),
            resumer,
            context.clone(),
        ));
        let processor = ResponseProcessor::new(
            responses,
            interactions.clone(),
            classifier,
            coordinator.clone(),
            context.clone(),
        );
        let executor = HumanInputExecutor::new(interactions.clone(), dispatcher.clone());

        (
            HilService {
                interactions,
                pauses,
                executions,
                dispatcher,
                coordinator,
                processor,
                executor,
                monitor_config: self.monitor_config,
                context,
            },
            event_rx,
        )
    }
}

impl Default for HilServiceBuilder {
    fn default() -> Self {
        Self::new()
    }
}
