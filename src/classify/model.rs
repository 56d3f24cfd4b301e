//! Model-backed classification with heuristic fallback.
//!
//! A [`ModelScorer`] wraps an external scoring model (LLM or otherwise)
//! behind the same strategy interface. The call is bounded by a hard
//! timeout; on timeout or failure the heuristic result is used instead, so a
//! slow or unavailable model can never fail or stall response processing.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use super::{Classification, ClassificationResult, ClassifierStrategy, HeuristicClassifier};
use crate::domain::interaction::Interaction;
use crate::domain::response::ResponsePayload;
use crate::error::HilError;

/// Default hard timeout for the model call.
pub const DEFAULT_MODEL_TIMEOUT: Duration = Duration::from_secs(4);

/// External scoring model. Implementations own their transport and prompt
/// format; the engine only consumes the scored result.
#[async_trait]
pub trait ModelScorer: Send + Sync {
    async fn score(
        &self,
        payload: &ResponsePayload,
        received_at: i64,
        candidates: &[Interaction],
    ) -> Result<ClassificationResult, HilError>;
}

pub struct ModelBackedClassifier {
    scorer: Arc<dyn ModelScorer>,
    fallback: HeuristicClassifier,
    timeout: Duration,
}

impl ModelBackedClassifier {
    pub fn new(scorer: Arc<dyn ModelScorer>) -> Self {
        Self {
            scorer,
            fallback: HeuristicClassifier::new(),
            timeout: DEFAULT_MODEL_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl ClassifierStrategy for ModelBackedClassifier {
    async fn classify(
        &self,
        payload: &ResponsePayload,
        received_at: i64,
        candidates: &[Interaction],
    ) -> Result<ClassificationResult, HilError> {
        let scored = tokio::time::timeout(
            self.timeout,
            self.scorer.score(payload, received_at, candidates),
        )
        .await;

        match scored {
            Ok(Ok(mut result)) => {
                // Re-derive the classification from the clamped score so a
                // misbehaving scorer cannot bypass the thresholds.
                result.relevance_score = result.relevance_score.clamp(0.0, 1.0);
                result.classification = Classification::from_score(result.relevance_score);
                if result.classification != Classification::Relevant {
                    result.matched_interaction_id = None;
                }
                Ok(result)
            }
            Ok(Err(e)) => {
                tracing::warn!("model scorer failed, falling back to heuristic: {}", e);
                self.fallback.classify(payload, received_at, candidates).await
            }
            Err(_) => {
                tracing::warn!(
                    "model scorer exceeded {:?}, falling back to heuristic",
                    self.timeout
                );
                self.fallback.classify(payload, received_at, candidates).await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::interaction::{
        ChannelType, InteractionStatus, InteractionType, RequestData,
    };
    use serde_json::json;

    fn candidate() -> Interaction {
        Interaction {
            id: "int-1".into(),
            workflow_id: "wf-1".into(),
            execution_id: "exec-1".into(),
            node_id: "approval".into(),
            interaction_type: InteractionType::Approval,
            channel_type: ChannelType::Email,
            status: InteractionStatus::Pending,
            request_data: RequestData {
                recipient: "ops@example.com".into(),
                correlation_id: "corr-1".into(),
                ..Default::default()
            },
            response_data: None,
            timeout_at: 1_060,
            warning_sent: false,
            created_at: 1_000,
            responded_at: None,
        }
    }

    fn payload(text: &str, in_reply_to: Option<&str>) -> ResponsePayload {
        ResponsePayload::parse(
            ChannelType::Email,
            &json!({"body": text, "in_reply_to": in_reply_to}),
        )
        .unwrap()
    }

    struct FixedScorer(f64);

    #[async_trait]
    impl ModelScorer for FixedScorer {
        async fn score(
            &self,
            _payload: &ResponsePayload,
            _received_at: i64,
            candidates: &[Interaction],
        ) -> Result<ClassificationResult, HilError> {
            Ok(ClassificationResult {
                relevance_score: self.0,
                classification: Classification::Relevant,
                matched_interaction_id: candidates.first().map(|c| c.id.clone()),
                reasoning: "model".into(),
            })
        }
    }

    struct FailingScorer;

    #[async_trait]
    impl ModelScorer for FailingScorer {
        async fn score(
            &self,
            _payload: &ResponsePayload,
            _received_at: i64,
            _candidates: &[Interaction],
        ) -> Result<ClassificationResult, HilError> {
            Err(HilError::ClassificationError("model unavailable".into()))
        }
    }

    struct SlowScorer;

    #[async_trait]
    impl ModelScorer for SlowScorer {
        async fn score(
            &self,
            _payload: &ResponsePayload,
            _received_at: i64,
            _candidates: &[Interaction],
        ) -> Result<ClassificationResult, HilError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            unreachable!("scorer should have been timed out")
        }
    }

    #[tokio::test]
    async fn test_model_result_used_when_available() {
        let classifier = ModelBackedClassifier::new(Arc::new(FixedScorer(0.85)));
        let result = classifier
            .classify(&payload("ship it", None), 1_010, &[candidate()])
            .await
            .unwrap();
        assert_eq!(result.relevance_score, 0.85);
        assert_eq!(result.matched_interaction_id.as_deref(), Some("int-1"));
        assert_eq!(result.reasoning, "model");
    }

    #[tokio::test]
    async fn test_model_score_clamped_and_rethresholded() {
        let classifier = ModelBackedClassifier::new(Arc::new(FixedScorer(12.0)));
        let result = classifier
            .classify(&payload("ship it", None), 1_010, &[candidate()])
            .await
            .unwrap();
        assert_eq!(result.relevance_score, 1.0);

        let classifier = ModelBackedClassifier::new(Arc::new(FixedScorer(0.5)));
        let result = classifier
            .classify(&payload("ship it", None), 1_010, &[candidate()])
            .await
            .unwrap();
        assert_eq!(result.classification, Classification::Uncertain);
        assert!(result.matched_interaction_id.is_none());
    }

    #[tokio::test]
    async fn test_failure_falls_back_to_heuristic() {
        let classifier = ModelBackedClassifier::new(Arc::new(FailingScorer));
        let result = classifier
            .classify(&payload("approve", Some("corr-1")), 1_010, &[candidate()])
            .await
            .unwrap();
        // The heuristic's correlation short-circuit decides.
        assert!(result.relevance_score >= 0.9);
        assert_eq!(result.matched_interaction_id.as_deref(), Some("int-1"));
    }

    #[tokio::test]
    async fn test_timeout_falls_back_to_heuristic() {
        let classifier = ModelBackedClassifier::new(Arc::new(SlowScorer))
            .with_timeout(Duration::from_millis(20));
        let result = classifier
            .classify(&payload("approve", Some("corr-1")), 1_010, &[candidate()])
            .await
            .unwrap();
        assert!(result.relevance_score >= 0.9);
    }
}
