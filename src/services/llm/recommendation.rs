use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use super::{
    complete_within,
    parsing::{extract_list, value_as_f64, value_as_i64},
    ChatMessage, ChatRequest, ChatTransport, LlmOutcome,
};
use crate::{
    error::{AppError, AppResult},
    models::{AiRecommendation, CandidateRecipe},
};

/// Most candidates embedded in a single prompt
pub const PROMPT_CANDIDATE_LIMIT: usize = 20;
const MAX_TOKENS: u32 = 1500;
const DEFAULT_REASON: &str = "AI recommendation";
const RESPONSE_KEY: &str = "recommendations";

const SYSTEM_PROMPT: &str = "You are a professional chef AI assistant. You must respond with valid JSON only. \
Do not include markdown, explanations or any text outside the JSON object.";

/// Asks the model to pick recipes for a user out of a candidate list
#[derive(Clone)]
pub struct RecommendationClient {
    transport: Arc<dyn ChatTransport>,
    timeout: Duration,
}

impl RecommendationClient {
    pub fn new(transport: Arc<dyn ChatTransport>, timeout: Duration) -> Self {
        Self { transport, timeout }
    }

    /// Returns the model's picks in the order it gave them
    ///
    /// Transport failures are returned as errors. Output that cannot be parsed is
    /// `Ok(LlmOutcome::Unparseable)`.
    pub async fn get_recommendations(
        &self,
        user_context: &str,
        candidates: &[CandidateRecipe],
        limit: usize,
    ) -> AppResult<LlmOutcome<AiRecommendation>> {
        let request = ChatRequest {
            messages: vec![
                ChatMessage::system(SYSTEM_PROMPT),
                ChatMessage::user(build_prompt(user_context, candidates, limit)?),
            ],
            max_tokens: MAX_TOKENS,
        };

        let content = complete_within(self.transport.as_ref(), request, self.timeout).await?;
        tracing::debug!(content = %content, "Recommendation response content");

        let outcome = extract_list(&content, RESPONSE_KEY, decode_recommendation);
        if let LlmOutcome::Parsed(items) = &outcome {
            tracing::info!(items = items.len(), "AI recommendations parsed");
        }
        Ok(outcome)
    }
}

fn build_prompt(
    user_context: &str,
    candidates: &[CandidateRecipe],
    limit: usize,
) -> AppResult<String> {
    let shown = &candidates[..candidates.len().min(PROMPT_CANDIDATE_LIMIT)];
    let candidates_json = serde_json::to_string_pretty(shown).map_err(|e| {
        AppError::Internal(format!("Failed to serialize candidates: {}", e))
    })?;

    let context = if user_context.trim().is_empty() {
        "No profile information available."
    } else {
        user_context.trim()
    };

    Ok(format!(
        "Based on the user profile below, recommend up to {limit} recipes from the available list.\n\n\
         {context}\n\n\
         Available recipes:\n{candidates_json}\n\n\
         Respond with this exact JSON structure:\n\
         {{\"recommendations\": [{{\"recipe_id\": <id from the list>, \"confidence_score\": <number between 0 and 1>, \"reason\": \"<short explanation>\"}}]}}\n\n\
         Only use recipe_id values from the available list. \
         If no recipe is suitable, return {{\"recommendations\": []}}."
    ))
}

fn decode_recommendation(item: &Value) -> Option<AiRecommendation> {
    let recipe_id = value_as_i64(item.get("recipe_id")?)?;
    let confidence_score = item
        .get("confidence_score")
        .and_then(value_as_f64)
        .unwrap_or(0.0);
    let reason = item
        .get("reason")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .unwrap_or(DEFAULT_REASON)
        .to_string();

    Some(AiRecommendation {
        recipe_id,
        confidence_score,
        reason,
    })
}
