use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use super::{
    complete_within,
    parsing::{extract_array, extract_list, value_as_f64, value_as_i64, value_as_strings},
    ChatMessage, ChatRequest, ChatTransport, LlmOutcome,
};
use crate::{
    cached,
    db::{Cache, CacheKey},
    error::{AppError, AppResult},
    models::{CandidateRecipe, IngredientMatch, IngredientSearchResult, RecipeRecord},
};

/// Only this many leading ingredients are used for keyword narrowing
pub const NARROWING_INGREDIENTS: usize = 3;
/// Most candidates sent with an ingredient search
pub const SEARCH_CANDIDATE_LIMIT: usize = 30;
/// Score given to keyword-only matches
pub const KEYWORD_MATCH_SCORE: f64 = 0.5;
pub const DEFAULT_SUGGESTIONS: [&str; 5] = ["salt", "pepper", "olive oil", "garlic", "onion"];

const SUGGESTION_COUNT: usize = 5;
const SUGGESTION_CACHE_TTL_SECS: u64 = 24 * 60 * 60;
const SEARCH_MAX_TOKENS: u32 = 1500;
const SUGGESTION_MAX_TOKENS: u32 = 100;
const RESPONSE_KEY: &str = "recipes";

const SEARCH_SYSTEM_PROMPT: &str =
    "You are a culinary AI assistant. You must respond with valid JSON only. No explanations, no markdown, just pure JSON.";
const SUGGESTION_SYSTEM_PROMPT: &str = "You are a culinary expert. Respond with JSON array only.";

pub fn default_suggestions() -> Vec<String> {
    DEFAULT_SUGGESTIONS.iter().map(|s| s.to_string()).collect()
}

/// Recipes whose title or description mentions one of the first few ingredients
///
/// Matching is a case-insensitive substring test. Corpus order is preserved.
pub fn keyword_matches<'a>(
    ingredients: &[String],
    corpus: &'a [RecipeRecord],
    limit: usize,
) -> Vec<&'a RecipeRecord> {
    let needles: Vec<String> = ingredients
        .iter()
        .take(NARROWING_INGREDIENTS)
        .map(|i| i.trim().to_lowercase())
        .filter(|i| !i.is_empty())
        .collect();
    if needles.is_empty() {
        return Vec::new();
    }

    corpus
        .iter()
        .filter(|recipe| {
            let text = recipe.searchable_text();
            needles.iter().any(|needle| text.contains(needle.as_str()))
        })
        .take(limit)
        .collect()
}

/// Keyword matches, or the head of the corpus when nothing matches
pub fn narrow_candidates<'a>(
    ingredients: &[String],
    corpus: &'a [RecipeRecord],
) -> Vec<&'a RecipeRecord> {
    let matches = keyword_matches(ingredients, corpus, SEARCH_CANDIDATE_LIMIT);
    if matches.is_empty() {
        tracing::debug!("No keyword matches, using unfiltered candidates");
        corpus.iter().take(SEARCH_CANDIDATE_LIMIT).collect()
    } else {
        matches
    }
}

/// Search result built from keyword matching alone
pub fn keyword_search(
    ingredients: &[String],
    corpus: &[RecipeRecord],
    max_results: usize,
) -> IngredientSearchResult {
    let recipes = keyword_matches(ingredients, corpus, max_results)
        .into_iter()
        .map(|recipe| IngredientMatch {
            recipe_id: recipe.id,
            match_score: KEYWORD_MATCH_SCORE,
            available_ingredients: ingredients.to_vec(),
            missing_ingredients: Vec::new(),
        })
        .collect();

    IngredientSearchResult {
        recipes,
        ai_suggestions: default_suggestions(),
        ai_powered: false,
    }
}

/// Asks the model which recipes can be cooked from a set of ingredients
#[derive(Clone)]
pub struct IngredientMatchClient {
    transport: Arc<dyn ChatTransport>,
    timeout: Duration,
    cache: Option<Cache>,
}

impl IngredientMatchClient {
    pub fn new(transport: Arc<dyn ChatTransport>, timeout: Duration, cache: Option<Cache>) -> Self {
        Self {
            transport,
            timeout,
            cache,
        }
    }

    /// Returns the model's matches plus complementary ingredient suggestions
    ///
    /// Fails when the primary call fails or its output cannot be parsed. The
    /// suggestions call never fails; it falls back to [`DEFAULT_SUGGESTIONS`].
    pub async fn find_recipes(
        &self,
        ingredients: &[String],
        corpus: &[RecipeRecord],
        max_results: usize,
    ) -> AppResult<IngredientSearchResult> {
        let candidates: Vec<CandidateRecipe> = narrow_candidates(ingredients, corpus)
            .into_iter()
            .map(CandidateRecipe::from)
            .collect();

        let request = ChatRequest {
            messages: vec![
                ChatMessage::system(SEARCH_SYSTEM_PROMPT),
                ChatMessage::user(build_search_prompt(ingredients, &candidates, max_results)?),
            ],
            max_tokens: SEARCH_MAX_TOKENS,
        };

        let content = complete_within(self.transport.as_ref(), request, self.timeout).await?;
        tracing::debug!(content = %content, "Ingredient search response content");

        let recipes = match extract_list(&content, RESPONSE_KEY, decode_match) {
            LlmOutcome::Parsed(recipes) => recipes,
            LlmOutcome::Unparseable => {
                return Err(AppError::MalformedResponse(
                    "ingredient search response has no recipes list".to_string(),
                ))
            }
        };

        tracing::info!(
            candidates = candidates.len(),
            matches = recipes.len(),
            "Ingredient search parsed"
        );

        Ok(IngredientSearchResult {
            recipes,
            ai_suggestions: self.suggestions(ingredients).await,
            ai_powered: true,
        })
    }

    /// Complementary ingredients for `ingredients`, cached when a cache is configured
    pub async fn suggestions(&self, ingredients: &[String]) -> Vec<String> {
        let result = match &self.cache {
            Some(cache) => self.cached_suggestions(cache, ingredients).await,
            None => self.fetch_suggestions(ingredients).await,
        };

        result.unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Ingredient suggestions unavailable, using defaults");
            default_suggestions()
        })
    }

    async fn cached_suggestions(
        &self,
        cache: &Cache,
        ingredients: &[String],
    ) -> AppResult<Vec<String>> {
        let key = CacheKey::ingredient_suggestions(ingredients);
        cached!(
            cache,
            key,
            SUGGESTION_CACHE_TTL_SECS,
            self.fetch_suggestions(ingredients)
        )
    }

    async fn fetch_suggestions(&self, ingredients: &[String]) -> AppResult<Vec<String>> {
        let prompt = format!(
            "Ingredients: {}\n\
             Suggest {} complementary ingredients. Respond with JSON array only:\n\
             [\"ingredient1\", \"ingredient2\", \"ingredient3\", \"ingredient4\", \"ingredient5\"]",
            ingredients.join(", "),
            SUGGESTION_COUNT
        );
        let request = ChatRequest {
            messages: vec![
                ChatMessage::system(SUGGESTION_SYSTEM_PROMPT),
                ChatMessage::user(prompt),
            ],
            max_tokens: SUGGESTION_MAX_TOKENS,
        };

        let content = complete_within(self.transport.as_ref(), request, self.timeout).await?;
        let items = extract_array(&content).ok_or_else(|| {
            AppError::MalformedResponse("suggestions response is not a JSON array".to_string())
        })?;

        let suggestions: Vec<String> = value_as_strings(&Value::Array(items))
            .into_iter()
            .take(SUGGESTION_COUNT)
            .collect();
        if suggestions.is_empty() {
            return Err(AppError::MalformedResponse(
                "suggestions response has no ingredient names".to_string(),
            ));
        }
        Ok(suggestions)
    }
}

fn build_search_prompt(
    ingredients: &[String],
    candidates: &[CandidateRecipe],
    max_results: usize,
) -> AppResult<String> {
    let candidates_json = serde_json::to_string_pretty(candidates)
        .map_err(|e| AppError::Internal(format!("Failed to serialize candidates: {}", e)))?;

    Ok(format!(
        "Available Ingredients: {ingredients}\n\n\
         Available Recipes:\n{candidates_json}\n\n\
         Find up to {max_results} best recipes using these ingredients. Respond with this exact JSON format:\n\
         {{\"recipes\": [{{\"recipe_id\": 123, \"match_score\": 0.85, \"available_ingredients\": [\"ingredient1\"], \"missing_ingredients\": [\"ingredient2\"]}}]}}\n\n\
         IMPORTANT: Respond with valid JSON only. No explanations, no markdown, no extra text.\n\
         If you cannot find any suitable recipes, return an empty array in the recipes field.",
        ingredients = ingredients.join(", "),
    ))
}

fn decode_match(item: &Value) -> Option<IngredientMatch> {
    let recipe_id = value_as_i64(item.get("recipe_id")?)?;
    Some(IngredientMatch {
        recipe_id,
        match_score: item.get("match_score").and_then(value_as_f64).unwrap_or(0.0),
        available_ingredients: item
            .get("available_ingredients")
            .map(value_as_strings)
            .unwrap_or_default(),
        missing_ingredients: item
            .get("missing_ingredients")
            .map(value_as_strings)
            .unwrap_or_default(),
    })
}
