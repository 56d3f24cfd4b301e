//! Relevance classification of inbound responses against pending
//! interactions.
//!
//! The scoring strategy is pluggable behind [`ClassifierStrategy`]: the
//! heuristic scorer is always available, and a model-backed scorer can wrap
//! it with a hard timeout and heuristic fallback. Decision thresholds are
//! fixed here, not in the strategies.

pub mod heuristic;
pub mod model;
pub mod processor;

use async_trait::async_trait;

use crate::domain::interaction::Interaction;
use crate::domain::response::ResponsePayload;
use crate::error::HilError;

pub use heuristic::{HeuristicClassifier, HeuristicWeights};
pub use model::{ModelBackedClassifier, ModelScorer};
pub use processor::{IngestOutcome, ResponseProcessor};

/// Score at or above which a response is considered a genuine reply.
pub const RELEVANT_THRESHOLD: f64 = 0.7;
/// Score at or below which a response is discarded as noise.
pub const FILTERED_THRESHOLD: f64 = 0.3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Relevant,
    Filtered,
    Uncertain,
}

impl Classification {
    /// Apply the decision thresholds. Scores strictly between the two
    /// thresholds are uncertain: recorded for visibility, never auto-resumed.
    pub fn from_score(score: f64) -> Self {
        if score >= RELEVANT_THRESHOLD {
            Classification::Relevant
        } else if score <= FILTERED_THRESHOLD {
            Classification::Filtered
        } else {
            Classification::Uncertain
        }
    }
}

#[derive(Debug, Clone)]
pub struct ClassificationResult {
    pub relevance_score: f64,
    pub classification: Classification,
    /// Highest-scoring candidate, set only when the response is relevant.
    pub matched_interaction_id: Option<String>,
    pub reasoning: String,
}

impl ClassificationResult {
    pub fn filtered(reasoning: impl Into<String>) -> Self {
        Self {
            relevance_score: 0.0,
            classification: Classification::Filtered,
            matched_interaction_id: None,
            reasoning: reasoning.into(),
        }
    }
}

/// Scores an inbound payload against the candidate set and selects the best
/// match. Implementations must not mutate any state.
#[async_trait]
pub trait ClassifierStrategy: Send + Sync {
    async fn classify(
        &self,
        payload: &ResponsePayload,
        received_at: i64,
        candidates: &[Interaction],
    ) -> Result<ClassificationResult, HilError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_threshold_bands() {
        assert_eq!(Classification::from_score(0.95), Classification::Relevant);
        assert_eq!(Classification::from_score(0.7), Classification::Relevant);
        assert_eq!(
            Classification::from_score(0.699),
            Classification::Uncertain
        );
        assert_eq!(Classification::from_score(0.301), Classification::Uncertain);
        assert_eq!(Classification::from_score(0.3), Classification::Filtered);
        assert_eq!(Classification::from_score(0.0), Classification::Filtered);
    }
}
