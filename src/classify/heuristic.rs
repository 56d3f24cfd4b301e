//! Weighted heuristic relevance scoring.

use std::collections::HashSet;
use std::sync::OnceLock;

use async_trait::async_trait;
use regex::Regex;

use super::{Classification, ClassificationResult, ClassifierStrategy};
use crate::domain::interaction::{Interaction, InteractionType};
use crate::domain::response::ResponsePayload;
use crate::error::HilError;

/// Score assigned on a channel-type mismatch; a hard filter, well below the
/// uncertain band.
const CHANNEL_MISMATCH_SCORE: f64 = 0.05;
/// Score assigned on an exact correlation-id match; short-circuits the
/// weighted path.
const CORRELATION_MATCH_SCORE: f64 = 0.95;

const APPROVE_KEYWORDS: &[&str] = &[
    "approve", "approved", "approval", "reject", "rejected", "deny", "denied", "yes", "no",
    "lgtm", "confirm", "confirmed",
];

/// Relative weights of the sub-scores on the non-short-circuit path.
#[derive(Debug, Clone, Copy)]
pub struct HeuristicWeights {
    pub temporal: f64,
    pub lexical: f64,
    pub sender: f64,
}

impl Default for HeuristicWeights {
    fn default() -> Self {
        Self {
            temporal: 0.2,
            lexical: 0.55,
            sender: 0.25,
        }
    }
}

#[derive(Default)]
pub struct HeuristicClassifier {
    weights: HeuristicWeights,
}

impl HeuristicClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_weights(weights: HeuristicWeights) -> Self {
        Self { weights }
    }

    /// Score one candidate. Returns the score and a human-readable breakdown.
    pub fn score_candidate(
        &self,
        payload: &ResponsePayload,
        received_at: i64,
        interaction: &Interaction,
    ) -> (f64, String) {
        if payload.channel() != interaction.channel_type {
            return (
                CHANNEL_MISMATCH_SCORE,
                format!(
                    "channel mismatch ({} vs {})",
                    payload.channel(),
                    interaction.channel_type
                ),
            );
        }

        if let Some(correlation) = payload.correlation_id() {
            if correlation == interaction.request_data.correlation_id
                || correlation == interaction.id
            {
                return (CORRELATION_MATCH_SCORE, "correlation id match".to_string());
            }
        }

        let temporal = temporal_score(received_at, interaction);
        let lexical = lexical_score(&payload.text(), interaction);
        let sender = sender_score(payload.sender(), interaction);

        let score = (self.weights.temporal * temporal
            + self.weights.lexical * lexical
            + self.weights.sender * sender)
            .clamp(0.0, 1.0);
        (
            score,
            format!(
                "temporal {:.2}, lexical {:.2}, sender {:.2}",
                temporal, lexical, sender
            ),
        )
    }
}

#[async_trait]
impl ClassifierStrategy for HeuristicClassifier {
    async fn classify(
        &self,
        payload: &ResponsePayload,
        received_at: i64,
        candidates: &[Interaction],
    ) -> Result<ClassificationResult, HilError> {
        if candidates.is_empty() {
            return Ok(ClassificationResult::filtered("no pending candidates"));
        }

        // Best match, not first match: score every candidate and keep the
        // highest so concurrently pending requests cannot be mis-bound.
        let mut best: Option<(f64, String, &Interaction)> = None;
        for candidate in candidates {
            let (score, breakdown) = self.score_candidate(payload, received_at, candidate);
            let replace = match &best {
                Some((best_score, _, _)) => score > *best_score,
                None => true,
            };
            if replace {
                best = Some((score, breakdown, candidate));
            }
        }

        let (score, breakdown, interaction) = best.ok_or_else(|| {
            HilError::ClassificationError("candidate scoring produced no result".to_string())
        })?;
        let classification = Classification::from_score(score);
        Ok(ClassificationResult {
            relevance_score: score,
            classification,
            matched_interaction_id: (classification == Classification::Relevant)
                .then(|| interaction.id.clone()),
            reasoning: format!(
                "best of {} candidate(s): '{}' scored {:.2} ({})",
                candidates.len(),
                interaction.id,
                score,
                breakdown
            ),
        })
    }
}

/// 1.0 at request creation, declining toward 0.3 at the deadline; zero
/// outside the request window.
fn temporal_score(received_at: i64, interaction: &Interaction) -> f64 {
    let window = interaction.timeout_at - interaction.created_at;
    if window <= 0 {
        return 0.0;
    }
    let position = (received_at - interaction.created_at) as f64 / window as f64;
    if !(0.0..=1.0).contains(&position) {
        return 0.0;
    }
    1.0 - 0.7 * position
}

fn lexical_score(response_text: &str, interaction: &Interaction) -> f64 {
    let response_tokens = tokenize(response_text);
    if response_tokens.is_empty() {
        return 0.0;
    }

    // Token containment against the request content.
    let mut request_text = String::new();
    if let Some(template) = &interaction.request_data.message_template {
        request_text.push_str(template);
        request_text.push(' ');
    }
    request_text.push_str(&interaction.node_id);
    for option in &interaction.request_data.options {
        request_text.push(' ');
        request_text.push_str(option);
    }
    for field in &interaction.request_data.form_fields {
        request_text.push(' ');
        request_text.push_str(&field.variable);
        request_text.push(' ');
        request_text.push_str(&field.label);
    }
    let request_tokens = tokenize(&request_text);
    let overlap = response_tokens
        .intersection(&request_tokens)
        .count() as f64
        / response_tokens.len() as f64;

    // Interaction-type keyword hints.
    let keyword_hit = match interaction.interaction_type {
        InteractionType::Approval | InteractionType::Review => APPROVE_KEYWORDS
            .iter()
            .any(|k| response_tokens.contains(*k)),
        InteractionType::Selection => interaction
            .request_data
            .options
            .iter()
            .any(|option| {
                let option_tokens = tokenize(option);
                !option_tokens.is_empty() && option_tokens.is_subset(&response_tokens)
            }),
        InteractionType::Input => interaction
            .request_data
            .form_fields
            .iter()
            .any(|field| response_tokens.contains(&field.variable.to_lowercase())),
    };

    if keyword_hit {
        overlap.max(0.9)
    } else {
        overlap
    }
}

fn sender_score(sender: Option<&str>, interaction: &Interaction) -> f64 {
    match sender {
        None => 0.5,
        Some(sender) => {
            if sender.eq_ignore_ascii_case(&interaction.request_data.recipient) {
                1.0
            } else {
                0.4
            }
        }
    }
}

fn tokenize(text: &str) -> HashSet<String> {
    static TOKEN_RE: OnceLock<Regex> = OnceLock::new();
    let re = TOKEN_RE.get_or_init(|| Regex::new(r"[A-Za-z0-9']+").unwrap());
    re.find_iter(text)
        .map(|m| m.as_str().to_lowercase())
        .collect()
}
