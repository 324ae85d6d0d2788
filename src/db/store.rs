/// Storage seams for the recommender
///
/// Recipes, interactions, ratings and preferences are owned by other parts of the
/// platform; the recommender only reads them. Recommendations and ingredient-search
/// history are the only records it writes.
use std::collections::{HashMap, HashSet};

use crate::{
    error::AppResult,
    models::{
        IngredientSearchRecord, InteractionType, RecentView, RecipeRating, RecipeRecord,
        Recommendation, UserPreference,
    },
};

/// Page size used when reading the whole catalog
pub const CORPUS_PAGE_SIZE: usize = 500;

#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait RecipeCatalog: Send + Sync {
    /// Lists recipes newest first
    async fn list_recipes(&self, limit: usize, offset: usize) -> AppResult<Vec<RecipeRecord>>;

    async fn get_recipe(&self, id: i64) -> AppResult<Option<RecipeRecord>>;
}

#[async_trait::async_trait]
pub trait InteractionLog: Send + Sync {
    /// Distinct viewed recipes, most recent view first
    async fn list_recent_views(&self, user_id: i64, limit: usize) -> AppResult<Vec<RecentView>>;

    /// Every recipe the user has viewed, liked or bookmarked
    async fn interacted_recipe_ids(&self, user_id: i64) -> AppResult<HashSet<i64>>;

    /// Records an interaction, refreshing the timestamp of an existing one
    async fn record_interaction(
        &self,
        user_id: i64,
        recipe_id: i64,
        interaction_type: InteractionType,
    ) -> AppResult<()>;
}

#[async_trait::async_trait]
pub trait RatingStore: Send + Sync {
    async fn user_ratings(&self, user_id: i64) -> AppResult<Vec<RecipeRating>>;

    /// Mean rating per recipe across all users; unrated recipes are absent
    async fn mean_ratings(&self) -> AppResult<HashMap<i64, f64>>;
}

#[async_trait::async_trait]
pub trait PreferenceStore: Send + Sync {
    async fn get_preferences(&self, user_id: i64) -> AppResult<Option<UserPreference>>;

    async fn save_preferences(&self, user_id: i64, preferences: &UserPreference) -> AppResult<()>;
}

#[async_trait::async_trait]
pub trait RecommendationStore: Send + Sync {
    /// Inserts or updates the (user, recipe) row atomically
    async fn upsert(
        &self,
        user_id: i64,
        recipe_id: i64,
        confidence_score: f64,
        reason: &str,
    ) -> AppResult<()>;

    /// Stored recommendations, most recent first
    async fn history(&self, user_id: i64, limit: usize) -> AppResult<Vec<Recommendation>>;
}

#[async_trait::async_trait]
pub trait SearchHistoryStore: Send + Sync {
    async fn record_search(&self, record: IngredientSearchRecord) -> AppResult<()>;

    /// Past searches, most recent first
    async fn search_history(
        &self,
        user_id: i64,
        limit: usize,
    ) -> AppResult<Vec<IngredientSearchRecord>>;
}

/// Everything the recommendation service needs from storage
pub trait Store:
    RecipeCatalog
    + InteractionLog
    + RatingStore
    + PreferenceStore
    + RecommendationStore
    + SearchHistoryStore
{
}

impl<T> Store for T where
    T: RecipeCatalog
        + InteractionLog
        + RatingStore
        + PreferenceStore
        + RecommendationStore
        + SearchHistoryStore
{
}

/// Reads the whole catalog page by page, newest first
pub async fn load_corpus(catalog: &(impl RecipeCatalog + ?Sized)) -> AppResult<Vec<RecipeRecord>> {
    let mut corpus = Vec::new();
    loop {
        let page = catalog.list_recipes(CORPUS_PAGE_SIZE, corpus.len()).await?;
        let fetched = page.len();
        corpus.extend(page);
        if fetched < CORPUS_PAGE_SIZE {
            break;
        }
    }
    Ok(corpus)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use mockall::predicate::eq;

    fn recipes(start: i64, count: usize) -> Vec<RecipeRecord> {
        (0..count as i64)
            .map(|i| RecipeRecord {
                id: start + i,
                title: format!("Recipe {}", start + i),
                description: String::new(),
                category: None,
                tags: vec![],
                ingredients: vec![],
                preparation_time: 0,
                cooking_time: 0,
                created_at: Utc::now(),
            })
            .collect()
    }

    #[tokio::test]
    async fn test_load_corpus_pages_until_short_page() {
        let mut catalog = MockRecipeCatalog::new();
        catalog
            .expect_list_recipes()
            .with(eq(CORPUS_PAGE_SIZE), eq(0))
            .times(1)
            .returning(|limit, _| Ok(recipes(0, limit)));
        catalog
            .expect_list_recipes()
            .with(eq(CORPUS_PAGE_SIZE), eq(CORPUS_PAGE_SIZE))
            .times(1)
            .returning(|_, _| Ok(recipes(CORPUS_PAGE_SIZE as i64, 3)));

        let corpus = load_corpus(&catalog).await.unwrap();
        assert_eq!(corpus.len(), CORPUS_PAGE_SIZE + 3);
    }

    #[tokio::test]
    async fn test_load_corpus_empty_catalog() {
        let mut catalog = MockRecipeCatalog::new();
        catalog
            .expect_list_recipes()
            .times(1)
            .returning(|_, _| Ok(vec![]));

        let corpus = load_corpus(&catalog).await.unwrap();
        assert!(corpus.is_empty());
    }
}
