//! The exactly-once resume state machine.
//!
//! Every resume attempt — classifier match, timeout expiry, manual override
//! — passes through [`ResumeCoordinator::resume`]. The two-step conditional
//! update (pause record first, then interaction), each guarded on the row's
//! current status, is the entire correctness mechanism: whichever attempt
//! wins the pause-record transition owns the resume, every other attempt
//! observes a zero-row update and becomes an idempotent no-op. The guards
//! are store-level conditional writes, not in-memory locks, so the property
//! holds across service instances.

use chrono::Utc;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::core::event_bus::HilEvent;
use crate::core::runtime_context::RuntimeContext;
use crate::domain::execution::{ExecutionSnapshot, ExecutionState};
use crate::domain::interaction::{Interaction, InteractionStatus, InteractionType};
use crate::dsl::schema::TimeoutAction;
use crate::error::HilError;
use crate::store::{ExecutionStore, InteractionStore, PauseStore};

use super::{GraphResumer, DEFAULT_PORT, PORT_APPROVED, PORT_REJECTED};

/// Which path is attempting the resume.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResumeSource {
    HumanResponse,
    Timeout,
    Manual,
}

impl ResumeSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResumeSource::HumanResponse => "human_response",
            ResumeSource::Timeout => "timeout",
            ResumeSource::Manual => "manual",
        }
    }

    fn terminal_status(&self) -> InteractionStatus {
        match self {
            ResumeSource::HumanResponse | ResumeSource::Manual => InteractionStatus::Responded,
            ResumeSource::Timeout => InteractionStatus::Timeout,
        }
    }
}

/// Result of a resume attempt.
#[derive(Debug, Clone)]
pub enum ResumeOutcome {
    /// This attempt won the race; the execution advanced.
    Resumed(ExecutionSnapshot),
    /// Another source already resolved the pause; nothing was changed.
    AlreadyResolved,
}

pub struct ResumeCoordinator {
    pauses: Arc<dyn PauseStore>,
    interactions: Arc<dyn InteractionStore>,
    executions: Arc<dyn ExecutionStore>,
    resumer: Arc<dyn GraphResumer>,
    context: RuntimeContext,
}

impl ResumeCoordinator {
    pub fn new(
        pauses: Arc<dyn PauseStore>,
        interactions: Arc<dyn InteractionStore>,
        executions: Arc<dyn ExecutionStore>,
        resumer: Arc<dyn GraphResumer>,
        context: RuntimeContext,
    ) -> Self {
        Self {
            pauses,
            interactions,
            executions,
            resumer,
            context,
        }
    }

    /// Resume a paused execution exactly once, regardless of which source
    /// triggers it or how many attempts race.
    pub async fn resume(
        &self,
        execution_id: &str,
        node_id: &str,
        payload: Value,
        source: ResumeSource,
    ) -> Result<ResumeOutcome, HilError> {
        let now = self.context.now();

        let Some(pause) = self.pauses.get_active(execution_id, node_id).await? else {
            tracing::debug!(
                execution_id = %execution_id,
                node_id = %node_id,
                source = source.as_str(),
                "no active pause, resume is a no-op"
            );
            return Ok(ResumeOutcome::AlreadyResolved);
        };

        // Step 1: the serialization point. Losing this conditional update
        // means another source already owns the resume.
        let Some(_) = self
            .pauses
            .resume_if_active(&pause.id, source.as_str(), Some(payload.clone()), now)
            .await?
        else {
            tracing::debug!(
                pause_id = %pause.id,
                source = source.as_str(),
                "lost the resume race"
            );
            return Ok(ResumeOutcome::AlreadyResolved);
        };

        // Step 2: resolve the interaction. A zero-row update here is normal
        // when the timeout monitor already transitioned it before invoking us.
        let resolved = self
            .interactions
            .resolve_if_pending(
                &pause.interaction_id,
                source.terminal_status(),
                Some(payload.clone()),
                now,
            )
            .await?;
        if resolved.is_none() {
            tracing::debug!(
                interaction_id = %pause.interaction_id,
                "interaction was already terminal when the pause resolved"
            );
        }
        let interaction = match resolved {
            Some(interaction) => interaction,
            None => self
                .interactions
                .get(&pause.interaction_id)
                .await?
                .ok_or_else(|| {
                    HilError::InteractionNotFound(pause.interaction_id.clone())
                })?,
        };

        // Timeout with a `fail` action ends the workflow in error instead of
        // continuing the walk.
        if source == ResumeSource::Timeout
            && interaction.request_data.timeout_action == TimeoutAction::Fail
        {
            return self.fail_execution(execution_id, &interaction, now).await;
        }

        let effective_payload = match source {
            ResumeSource::Timeout => {
                match interaction.request_data.timeout_action {
                    TimeoutAction::DefaultResponse => interaction
                        .request_data
                        .timeout_default
                        .clone()
                        .unwrap_or_else(|| json!({})),
                    _ => json!({}),
                }
            }
            _ => payload,
        };

        // Step 3: bring the execution back to running — unless another pause
        // of the same execution is still active (parallel branches), in which
        // case the status stays waiting and points at one of the survivors.
        let remaining = self.pauses.list_active_for_execution(execution_id).await?;
        let snapshot = if let Some(next) = remaining.first() {
            self.executions
                .set_waiting(
                    execution_id,
                    &interaction.workflow_id,
                    &next.node_id,
                    &next.interaction_id,
                    now,
                )
                .await?
        } else {
            let Some(snapshot) = self
                .executions
                .leave_waiting(execution_id, ExecutionState::Running, now)
                .await?
            else {
                tracing::warn!(
                    execution_id = %execution_id,
                    node_id = %node_id,
                    "pause resolved but execution was not waiting"
                );
                return Ok(ResumeOutcome::AlreadyResolved);
            };
            snapshot
        };

        // Steps 4–5: route the node output and reactivate the graph walk.
        let port = output_port(&interaction, &effective_payload);
        self.resumer
            .continue_from(execution_id, node_id, port, effective_payload)
            .await?;

        self.context.emit(HilEvent::ExecutionResumed {
            execution_id: execution_id.to_string(),
            node_id: node_id.to_string(),
            source: source.as_str().to_string(),
            port: port.to_string(),
            timestamp: Utc::now(),
        });
        Ok(ResumeOutcome::Resumed(snapshot))
    }

    /// Cancel every active pause of an execution. A late-arriving response
    /// or expiry then finds the pause already terminal and no-ops.
    pub async fn cancel_execution(
        &self,
        execution_id: &str,
        reason: &str,
    ) -> Result<usize, HilError> {
        let now = self.context.now();
        let mut cancelled = 0usize;
        for pause in self.pauses.list_active_for_execution(execution_id).await? {
            let Some(_) = self.pauses.cancel_if_active(&pause.id, reason, now).await? else {
                continue;
            };
            cancelled += 1;
            let resolved = self
                .interactions
                .resolve_if_pending(
                    &pause.interaction_id,
                    InteractionStatus::Cancelled,
                    None,
                    now,
                )
                .await?;
            if resolved.is_none() {
                tracing::debug!(
                    interaction_id = %pause.interaction_id,
                    "interaction already terminal during cancellation"
                );
            }
        }
        if cancelled > 0 {
            self.executions
                .leave_waiting(execution_id, ExecutionState::Cancelled, now)
                .await?;
            self.context.emit(HilEvent::ExecutionCancelled {
                execution_id: execution_id.to_string(),
                reason: reason.to_string(),
                timestamp: Utc::now(),
            });
        }
        Ok(cancelled)
    }

    async fn fail_execution(
        &self,
        execution_id: &str,
        interaction: &Interaction,
        now: i64,
    ) -> Result<ResumeOutcome, HilError> {
        let error = format!(
            "human input timed out for interaction '{}'",
            interaction.id
        );
        let snapshot = self
            .executions
            .leave_waiting(
                execution_id,
                ExecutionState::Failed {
                    error: error.clone(),
                    interaction_id: Some(interaction.id.clone()),
                },
                now,
            )
            .await?;
        self.context.emit(HilEvent::ExecutionFailed {
            execution_id: execution_id.to_string(),
            interaction_id: interaction.id.clone(),
            error,
            timestamp: Utc::now(),
        });
        match snapshot {
            Some(snapshot) => Ok(ResumeOutcome::Resumed(snapshot)),
            None => Ok(ResumeOutcome::AlreadyResolved),
        }
    }
}

/// Route approval responses to a named port derived from the response
/// content; everything else goes to the default port.
fn output_port(interaction: &Interaction, payload: &Value) -> &'static str {
    if interaction.interaction_type != InteractionType::Approval {
        return DEFAULT_PORT;
    }
    match approval_decision(payload) {
        Some(true) => PORT_APPROVED,
        Some(false) => PORT_REJECTED,
        None => DEFAULT_PORT,
    }
}

const APPROVE_WORDS: &[&str] = &["approve", "approved", "yes", "lgtm", "confirm", "confirmed"];
const REJECT_WORDS: &[&str] = &["reject", "rejected", "deny", "denied", "no"];

fn approval_decision(payload: &Value) -> Option<bool> {
    if let Some(approved) = payload.get("approved").and_then(Value::as_bool) {
        return Some(approved);
    }
    if let Some(decision) = payload.get("decision").and_then(Value::as_str) {
        let decision = decision.to_lowercase();
        if APPROVE_WORDS.contains(&decision.as_str()) {
            return Some(true);
        }
        if REJECT_WORDS.contains(&decision.as_str()) {
            return Some(false);
        }
    }
    if let Some(text) = payload.get("text").and_then(Value::as_str) {
        let lowered = text.to_lowercase();
        let words: Vec<&str> = lowered
            .split(|c: char| !c.is_ascii_alphanumeric())
            .filter(|w| !w.is_empty())
            .collect();
        if words.iter().any(|w| REJECT_WORDS.contains(w)) {
            return Some(false);
        }
        if words.iter().any(|w| APPROVE_WORDS.contains(w)) {
            return Some(true);
        }
    }
    None
}
