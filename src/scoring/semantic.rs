//! Semantic urgency scoring for unstructured email text.
//!
//! Batches model calls in small groups to respect provider rate limits:
//! concurrent within a batch, sequential across batches. A call that fails
//! (including rate limiting) skips that one item for the run and records a
//! message; a response that cannot be parsed falls back to a neutral score.
//! Neither case ever aborts the batch.

use async_trait::async_trait;
use futures::future::join_all;
use serde::Deserialize;
use thiserror::Error;

use crate::types::{CandidateItem, SourceMetadata, TriageScore};

/// Items scored per model round-trip window.
pub const AI_BATCH_SIZE: usize = 5;

/// Score returned when the model's response cannot be parsed.
const FALLBACK_SCORE: i64 = 50;
const FALLBACK_REASONING: &str = "Could not parse AI response";

// ============================================================================
// Capability
// ============================================================================

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("rate limited: {0}")]
    RateLimited(String),
    #[error("HTTP: {0}")]
    Http(#[from] reqwest::Error),
    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },
}

/// The external urgency-scoring capability: prompt in, raw completion out.
#[async_trait]
pub trait UrgencyModel: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, ModelError>;
}

// ============================================================================
// Batch scoring
// ============================================================================

/// Result of scoring one source's candidates.
#[derive(Debug, Default)]
pub struct SemanticOutcome {
    pub scored: Vec<(CandidateItem, TriageScore)>,
    /// Items excluded from admission this run because their call failed.
    pub skipped: usize,
    /// Messages for failed calls, surfaced in the sync report.
    pub errors: Vec<String>,
}

/// Score a set of candidates through the urgency model.
pub async fn score_candidates(
    model: &dyn UrgencyModel,
    items: Vec<CandidateItem>,
) -> SemanticOutcome {
    let mut outcome = SemanticOutcome::default();

    for batch in items.chunks(AI_BATCH_SIZE) {
        let prompts: Vec<String> = batch.iter().map(build_prompt).collect();
        let calls = prompts.iter().map(|prompt| model.complete(prompt));
        let responses = join_all(calls).await;

        for (item, response) in batch.iter().zip(responses) {
            match response {
                Ok(text) => {
                    let score = parse_verdict(&text);
                    outcome.scored.push((item.clone(), score));
                }
                Err(e) => {
                    log::warn!("semantic scoring failed for {}: {}", item.source_id, e);
                    outcome.skipped += 1;
                    outcome.errors.push(e.to_string());
                }
            }
        }
    }

    outcome
}

/// One short rubric plus the item's header fields.
fn build_prompt(item: &CandidateItem) -> String {
    let from = match &item.metadata {
        SourceMetadata::Email { from, .. } => from.as_str(),
        _ => "",
    };
    format!(
        "You are triaging a personal inbox. Rate how urgently this email needs \
         the user's attention on a 0-100 scale, where 100 means drop everything \
         and 0 means ignorable. Respond with a JSON object: \
         {{\"score\": <number>, \"reasoning\": \"<one sentence>\"}}.\n\n\
         From: {}\nSubject: {}\nPreview: {}",
        from, item.title, item.snippet
    )
}

#[derive(Debug, Deserialize)]
struct ModelVerdict {
    score: f64,
    #[serde(default)]
    reasoning: String,
}

/// Extract `{score, reasoning}` from the completion, tolerating prose around
/// the JSON object. Anything unparseable yields the neutral fallback; the
/// score is clamped into 0-100 even when the model wanders out of range.
fn parse_verdict(response: &str) -> TriageScore {
    let candidate = match (response.find('{'), response.rfind('}')) {
        (Some(start), Some(end)) if end > start => &response[start..=end],
        _ => response,
    };

    match serde_json::from_str::<ModelVerdict>(candidate) {
        Ok(verdict) => TriageScore::clamped(verdict.score.round() as i64, verdict.reasoning),
        Err(_) => TriageScore::clamped(FALLBACK_SCORE, FALLBACK_REASONING),
    }
}
