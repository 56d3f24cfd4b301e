//! Inbound response processing pipeline: dedup, candidate resolution,
//! classification, and the resume decision.

use chrono::Utc;
use serde_json::{json, Value};
use std::sync::Arc;

use super::{Classification, ClassifierStrategy, HeuristicClassifier};
use crate::core::event_bus::HilEvent;
use crate::core::runtime_context::RuntimeContext;
use crate::domain::interaction::Interaction;
use crate::domain::response::{
    IncomingResponse, ProcessingStatus, ResponsePayload, WebhookEnvelope,
};
use crate::error::HilError;
use crate::resume::{ResumeCoordinator, ResumeOutcome, ResumeSource};
use crate::store::{InteractionStore, ResponseStore};

/// Outcome of ingesting one inbound delivery.
#[derive(Debug, Clone, PartialEq)]
pub enum IngestOutcome {
    /// Same dedup_key as an earlier delivery; nothing was processed.
    Duplicate,
    /// Relevant and this delivery won the resume.
    Matched {
        response_id: String,
        interaction_id: String,
        relevance_score: f64,
    },
    /// Irrelevant, or relevant but the interaction was already resolved.
    Filtered {
        response_id: String,
        relevance_score: f64,
    },
    /// Ambiguous score band; recorded, never auto-resumed.
    Uncertain {
        response_id: String,
        relevance_score: f64,
    },
    /// Payload could not be scored at all.
    Corrupt { response_id: String },
}

pub struct ResponseProcessor {
    responses: Arc<dyn ResponseStore>,
    interactions: Arc<dyn InteractionStore>,
    classifier: Arc<dyn ClassifierStrategy>,
    coordinator: Arc<ResumeCoordinator>,
    context: RuntimeContext,
}

impl ResponseProcessor {
    pub fn new(
        responses: Arc<dyn ResponseStore>,
        interactions: Arc<dyn InteractionStore>,
        classifier: Arc<dyn ClassifierStrategy>,
        coordinator: Arc<ResumeCoordinator>,
        context: RuntimeContext,
    ) -> Self {
        Self {
            responses,
            interactions,
            classifier,
            coordinator,
            context,
        }
    }

    /// Process one inbound delivery exactly once. Redeliveries (same
    /// dedup_key) are recognized and skipped without touching any state.
    pub async fn ingest(&self, envelope: WebhookEnvelope) -> Result<IngestOutcome, HilError> {
        let received_at = envelope.received_at.unwrap_or_else(|| self.context.now());
        let parsed = ResponsePayload::parse(envelope.source_channel, &envelope.raw_payload);
        let dedup_key =
            envelope.dedup_key(parsed.as_ref().ok().and_then(|p| p.message_id()));

        let response_id = self.context.next_id();
        let inserted = self
            .responses
            .insert(IncomingResponse {
                id: response_id.clone(),
                source_channel: envelope.source_channel,
                raw_payload: envelope.raw_payload.clone(),
                headers: envelope.headers.clone(),
                dedup_key: dedup_key.clone(),
                received_at,
                status: ProcessingStatus::Unprocessed,
                matched_interaction_id: None,
                relevance_score: None,
                reasoning: None,
            })
            .await?;
        if !inserted {
            tracing::debug!(dedup_key = %dedup_key, "redelivered payload skipped");
            return Ok(IngestOutcome::Duplicate);
        }

        let payload = match parsed {
            Ok(payload) => payload,
            Err(e) => {
                self.responses
                    .finish(
                        &response_id,
                        ProcessingStatus::Error,
                        None,
                        None,
                        format!("unscorable payload: {}", e),
                    )
                    .await?;
                self.context.emit(HilEvent::ResponseCorrupt {
                    response_id: response_id.clone(),
                    error: e.to_string(),
                    timestamp: Utc::now(),
                });
                return Ok(IngestOutcome::Corrupt { response_id });
            }
        };

        let candidates = self.candidates_for(&payload).await?;
        let result = match self
            .classifier
            .classify(&payload, received_at, &candidates)
            .await
        {
            Ok(result) => result,
            Err(e) => {
                tracing::warn!(
                    response_id = %response_id,
                    "classifier strategy failed, degrading to heuristic: {}",
                    e
                );
                HeuristicClassifier::new()
                    .classify(&payload, received_at, &candidates)
                    .await?
            }
        };

        match result.classification {
            Classification::Relevant => {
                let Some(interaction_id) = result.matched_interaction_id.clone() else {
                    return self
                        .record_uncertain(&response_id, result.relevance_score, result.reasoning)
                        .await;
                };
                let Some(interaction) =
                    candidates.iter().find(|c| c.id == interaction_id)
                else {
                    return Err(HilError::InteractionNotFound(interaction_id));
                };

                let output = response_output(&payload, &envelope.raw_payload);
                let resumed = self
                    .coordinator
                    .resume(
                        &interaction.execution_id,
                        &interaction.node_id,
                        output,
                        ResumeSource::HumanResponse,
                    )
                    .await?;

                match resumed {
                    ResumeOutcome::Resumed(_) => {
                        self.responses
                            .finish(
                                &response_id,
                                ProcessingStatus::Matched,
                                Some(interaction_id.clone()),
                                Some(result.relevance_score),
                                result.reasoning,
                            )
                            .await?;
                        self.context.emit(HilEvent::ResponseMatched {
                            response_id: response_id.clone(),
                            interaction_id: interaction_id.clone(),
                            relevance_score: result.relevance_score,
                            timestamp: Utc::now(),
                        });
                        Ok(IngestOutcome::Matched {
                            response_id,
                            interaction_id,
                            relevance_score: result.relevance_score,
                        })
                    }
                    ResumeOutcome::AlreadyResolved => {
                        tracing::debug!(
                            response_id = %response_id,
                            interaction_id = %interaction_id,
                            "relevant response lost the resume race"
                        );
                        self.responses
                            .finish(
                                &response_id,
                                ProcessingStatus::FilteredOut,
                                None,
                                Some(result.relevance_score),
                                format!("{}; interaction already resolved", result.reasoning),
                            )
                            .await?;
                        Ok(IngestOutcome::Filtered {
                            response_id,
                            relevance_score: result.relevance_score,
                        })
                    }
                }
            }
            Classification::Uncertain => {
                self.record_uncertain(&response_id, result.relevance_score, result.reasoning)
                    .await
            }
            Classification::Filtered => {
                self.responses
                    .finish(
                        &response_id,
                        ProcessingStatus::FilteredOut,
                        None,
                        Some(result.relevance_score),
                        result.reasoning,
                    )
                    .await?;
                self.context.emit(HilEvent::ResponseFiltered {
                    response_id: response_id.clone(),
                    relevance_score: result.relevance_score,
                    timestamp: Utc::now(),
                });
                Ok(IngestOutcome::Filtered {
                    response_id,
                    relevance_score: result.relevance_score,
                })
            }
        }
    }

    async fn record_uncertain(
        &self,
        response_id: &str,
        score: f64,
        reasoning: String,
    ) -> Result<IngestOutcome, HilError> {
        self.responses
            .finish(
                response_id,
                ProcessingStatus::FilteredOut,
                None,
                Some(score),
                format!("uncertain: {}", reasoning),
            )
            .await?;
        self.context.emit(HilEvent::ResponseUncertain {
            response_id: response_id.to_string(),
            relevance_score: score,
            timestamp: Utc::now(),
        });
        Ok(IngestOutcome::Uncertain {
            response_id: response_id.to_string(),
            relevance_score: score,
        })
    }

    /// Resolve the candidate set, narrowest scope first: the single
    /// execution a correlation id resolves to, else the declared workflow,
    /// else everything pending on the payload's channel.
    async fn candidates_for(
        &self,
        payload: &ResponsePayload,
    ) -> Result<Vec<Interaction>, HilError> {
        let pending = self.interactions.list_pending().await?;

        if let Some(correlation) = payload.correlation_id() {
            if let Some(hit) = pending.iter().find(|i| {
                i.request_data.correlation_id == correlation || i.id == correlation
            }) {
                let execution_id = hit.execution_id.clone();
                return Ok(pending
                    .into_iter()
                    .filter(|i| i.execution_id == execution_id)
                    .collect());
            }
        }

        if let Some(workflow_id) = payload.workflow_id() {
            let scoped: Vec<Interaction> = pending
                .iter()
                .filter(|i| i.workflow_id == workflow_id)
                .cloned()
                .collect();
            if !scoped.is_empty() {
                return Ok(scoped);
            }
        }

        let channel = payload.channel();
        Ok(pending
            .into_iter()
            .filter(|i| i.channel_type == channel)
            .collect())
    }
}

/// Node output delivered to the engine when a response resumes a workflow.
fn response_output(payload: &ResponsePayload, raw: &Value) -> Value {
    let mut output = json!({
        "text": payload.text(),
        "sender": payload.sender(),
        "response": raw,
    });
    if let ResponsePayload::InApp(in_app) = payload {
        if let Some(form_data) = &in_app.form_data {
            output["form_data"] = form_data.clone();
        }
    }
    output
}
