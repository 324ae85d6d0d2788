use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::RecipeRecord;

/// Clamps an externally produced score into [0.0, 1.0]; non-finite values become 0.0
pub fn clamp_score(score: f64) -> f64 {
    if score.is_finite() {
        score.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

/// A persisted recommendation, unique per (user, recipe)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Recommendation {
    pub user_id: i64,
    pub recipe_id: i64,
    pub confidence_score: f64,
    pub reason: String,
    pub created_at: DateTime<Utc>,
}

/// One recommendation item as returned by the LLM, before validation
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct AiRecommendation {
    pub recipe_id: i64,
    pub confidence_score: f64,
    pub reason: String,
}

/// Where a recommendation list came from
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationSource {
    /// Resolved from LLM output
    Ai,
    /// Similarity to the user's highly rated recipes
    ContentBased,
    /// Recipes the user has not viewed, newest first
    Unseen,
    /// Mean rating across all users
    TopRated,
}

/// A recipe together with the score and reason it was picked for
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RecommendedRecipe {
    pub recipe: RecipeRecord,
    pub confidence_score: f64,
    pub reason: String,
}

/// Result of one recommendation pass
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RecommendationOutcome {
    pub recipes: Vec<RecommendedRecipe>,
    pub source: RecommendationSource,
}

impl RecommendationOutcome {
    pub fn ai_powered(&self) -> bool {
        self.source == RecommendationSource::Ai
    }
}

/// One ingredient-search match
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IngredientMatch {
    pub recipe_id: i64,
    pub match_score: f64,
    pub available_ingredients: Vec<String>,
    pub missing_ingredients: Vec<String>,
}

/// Ingredient search output
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct IngredientSearchResult {
    pub recipes: Vec<IngredientMatch>,
    pub ai_suggestions: Vec<String>,
    pub ai_powered: bool,
}

/// A past ingredient search
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IngredientSearchRecord {
    pub user_id: Option<i64>,
    pub ingredients: Vec<String>,
    pub results_count: usize,
    pub searched_at: DateTime<Utc>,
}
