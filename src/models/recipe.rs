use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Read-only projection of a recipe owned by the recipe store
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RecipeRecord {
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Ingredient names, empty when the store does not provide them
    #[serde(default)]
    pub ingredients: Vec<String>,
    #[serde(default)]
    pub preparation_time: i32,
    #[serde(default)]
    pub cooking_time: i32,
    pub created_at: DateTime<Utc>,
}

impl RecipeRecord {
    /// Title and description lowercased, used for ingredient keyword matching
    pub fn searchable_text(&self) -> String {
        format!("{} {}", self.title, self.description).to_lowercase()
    }
}

/// Compact recipe summary embedded in LLM prompts
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CandidateRecipe {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub preparation_time: i32,
    pub cooking_time: i32,
}

/// Longest description fragment sent to the LLM, in characters
pub const PROMPT_DESCRIPTION_CHARS: usize = 200;

impl From<&RecipeRecord> for CandidateRecipe {
    fn from(recipe: &RecipeRecord) -> Self {
        Self {
            id: recipe.id,
            title: recipe.title.clone(),
            description: recipe
                .description
                .chars()
                .take(PROMPT_DESCRIPTION_CHARS)
                .collect(),
            preparation_time: recipe.preparation_time,
            cooking_time: recipe.cooking_time,
        }
    }
}

/// A user's rating of a recipe on a 0-5 scale
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct RecipeRating {
    pub user_id: i64,
    pub recipe_id: i64,
    pub value: i16,
}

/// Ratings at or above this value count as a liked recipe
pub const QUALIFYING_RATING: i16 = 4;

impl RecipeRating {
    pub fn is_qualifying(&self) -> bool {
        self.value >= QUALIFYING_RATING
    }
}
