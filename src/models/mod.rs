use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Display;

pub mod recipe;
pub mod recommendation;
pub mod user_preferences;

pub use recipe::{CandidateRecipe, RecipeRating, RecipeRecord, QUALIFYING_RATING};
pub use recommendation::{
    clamp_score, AiRecommendation, IngredientMatch, IngredientSearchRecord,
    IngredientSearchResult, Recommendation, RecommendationOutcome, RecommendationSource,
    RecommendedRecipe,
};
pub use user_preferences::{PreferenceUpdate, SkillLevel, UserPreference};

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum InteractionType {
    #[default]
    View,
    Like,
    Bookmark,
}

impl Display for InteractionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InteractionType::View => write!(f, "view"),
            InteractionType::Like => write!(f, "like"),
            InteractionType::Bookmark => write!(f, "bookmark"),
        }
    }
}

/// Append-only interaction log entry
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InteractionEvent {
    pub user_id: i64,
    pub recipe_id: i64,
    pub timestamp: DateTime<Utc>,
    pub interaction_type: InteractionType,
}

/// A recently viewed recipe, most recent first when listed
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RecentView {
    pub recipe_id: i64,
    pub title: String,
    pub viewed_at: DateTime<Utc>,
}
