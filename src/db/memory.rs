use chrono::Utc;
use std::collections::{HashMap, HashSet};
use tokio::sync::RwLock;

use crate::{
    db::store::{
        InteractionLog, PreferenceStore, RatingStore, RecipeCatalog, RecommendationStore,
        SearchHistoryStore,
    },
    error::AppResult,
    models::{
        IngredientSearchRecord, InteractionEvent, InteractionType, RecentView, RecipeRating,
        RecipeRecord, Recommendation, UserPreference,
    },
};

#[derive(Default)]
struct MemoryState {
    recipes: Vec<RecipeRecord>,
    interactions: Vec<InteractionEvent>,
    ratings: HashMap<(i64, i64), RecipeRating>,
    preferences: HashMap<i64, UserPreference>,
    recommendations: HashMap<(i64, i64), Recommendation>,
    searches: Vec<IngredientSearchRecord>,
}

/// Process-local store used for development and tests
///
/// A single write lock around the state makes every upsert atomic.
#[derive(Default)]
pub struct InMemoryStore {
    state: RwLock<MemoryState>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_recipes(recipes: Vec<RecipeRecord>) -> Self {
        Self {
            state: RwLock::new(MemoryState {
                recipes,
                ..MemoryState::default()
            }),
        }
    }

    /// Sets a rating, replacing any earlier rating by the same user
    pub async fn add_rating(&self, user_id: i64, recipe_id: i64, value: i16) {
        let mut state = self.state.write().await;
        state.ratings.insert(
            (user_id, recipe_id),
            RecipeRating {
                user_id,
                recipe_id,
                value,
            },
        );
    }

    pub async fn recommendation_count(&self) -> usize {
        self.state.read().await.recommendations.len()
    }
}

#[async_trait::async_trait]
impl RecipeCatalog for InMemoryStore {
    async fn list_recipes(&self, limit: usize, offset: usize) -> AppResult<Vec<RecipeRecord>> {
        let state = self.state.read().await;
        let mut recipes = state.recipes.clone();
        recipes.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(recipes.into_iter().skip(offset).take(limit).collect())
    }

    async fn get_recipe(&self, id: i64) -> AppResult<Option<RecipeRecord>> {
        let state = self.state.read().await;
        Ok(state.recipes.iter().find(|r| r.id == id).cloned())
    }
}

#[async_trait::async_trait]
impl InteractionLog for InMemoryStore {
    async fn list_recent_views(&self, user_id: i64, limit: usize) -> AppResult<Vec<RecentView>> {
        let state = self.state.read().await;

        let mut latest: HashMap<i64, chrono::DateTime<Utc>> = HashMap::new();
        for event in state.interactions.iter().filter(|e| {
            e.user_id == user_id && e.interaction_type == InteractionType::View
        }) {
            let entry = latest.entry(event.recipe_id).or_insert(event.timestamp);
            if event.timestamp > *entry {
                *entry = event.timestamp;
            }
        }

        let mut views: Vec<RecentView> = latest
            .into_iter()
            .filter_map(|(recipe_id, viewed_at)| {
                state
                    .recipes
                    .iter()
                    .find(|r| r.id == recipe_id)
                    .map(|r| RecentView {
                        recipe_id,
                        title: r.title.clone(),
                        viewed_at,
                    })
            })
            .collect();
        views.sort_by(|a, b| {
            b.viewed_at
                .cmp(&a.viewed_at)
                .then(a.recipe_id.cmp(&b.recipe_id))
        });
        views.truncate(limit);
        Ok(views)
    }

    async fn interacted_recipe_ids(&self, user_id: i64) -> AppResult<HashSet<i64>> {
        let state = self.state.read().await;
        Ok(state
            .interactions
            .iter()
            .filter(|e| e.user_id == user_id)
            .map(|e| e.recipe_id)
            .collect())
    }

    async fn record_interaction(
        &self,
        user_id: i64,
        recipe_id: i64,
        interaction_type: InteractionType,
    ) -> AppResult<()> {
        let mut state = self.state.write().await;
        let now = Utc::now();
        match state.interactions.iter_mut().find(|e| {
            e.user_id == user_id
                && e.recipe_id == recipe_id
                && e.interaction_type == interaction_type
        }) {
            Some(existing) => existing.timestamp = now,
            None => state.interactions.push(InteractionEvent {
                user_id,
                recipe_id,
                timestamp: now,
                interaction_type,
            }),
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl RatingStore for InMemoryStore {
    async fn user_ratings(&self, user_id: i64) -> AppResult<Vec<RecipeRating>> {
        let state = self.state.read().await;
        let mut ratings: Vec<RecipeRating> = state
            .ratings
            .values()
            .filter(|r| r.user_id == user_id)
            .copied()
            .collect();
        ratings.sort_by_key(|r| r.recipe_id);
        Ok(ratings)
    }

    async fn mean_ratings(&self) -> AppResult<HashMap<i64, f64>> {
        let state = self.state.read().await;
        let mut sums: HashMap<i64, (f64, usize)> = HashMap::new();
        for rating in state.ratings.values() {
            let entry = sums.entry(rating.recipe_id).or_insert((0.0, 0));
            entry.0 += f64::from(rating.value);
            entry.1 += 1;
        }
        Ok(sums
            .into_iter()
            .map(|(id, (sum, count))| (id, sum / count as f64))
            .collect())
    }
}

#[async_trait::async_trait]
impl PreferenceStore for InMemoryStore {
    async fn get_preferences(&self, user_id: i64) -> AppResult<Option<UserPreference>> {
        Ok(self.state.read().await.preferences.get(&user_id).cloned())
    }

    async fn save_preferences(&self, user_id: i64, preferences: &UserPreference) -> AppResult<()> {
        self.state
            .write()
            .await
            .preferences
            .insert(user_id, preferences.clone());
        Ok(())
    }
}

#[async_trait::async_trait]
impl RecommendationStore for InMemoryStore {
    async fn upsert(
        &self,
        user_id: i64,
        recipe_id: i64,
        confidence_score: f64,
        reason: &str,
    ) -> AppResult<()> {
        self.state.write().await.recommendations.insert(
            (user_id, recipe_id),
            Recommendation {
                user_id,
                recipe_id,
                confidence_score,
                reason: reason.to_string(),
                created_at: Utc::now(),
            },
        );
        Ok(())
    }

    async fn history(&self, user_id: i64, limit: usize) -> AppResult<Vec<Recommendation>> {
        let state = self.state.read().await;
        let mut rows: Vec<Recommendation> = state
            .recommendations
            .values()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        rows.truncate(limit);
        Ok(rows)
    }
}

#[async_trait::async_trait]
impl SearchHistoryStore for InMemoryStore {
    async fn record_search(&self, record: IngredientSearchRecord) -> AppResult<()> {
        self.state.write().await.searches.push(record);
        Ok(())
    }

    async fn search_history(
        &self,
        user_id: i64,
        limit: usize,
    ) -> AppResult<Vec<IngredientSearchRecord>> {
        let state = self.state.read().await;
        let mut rows: Vec<IngredientSearchRecord> = state
            .searches
            .iter()
            .filter(|s| s.user_id == Some(user_id))
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.searched_at.cmp(&a.searched_at));
        rows.truncate(limit);
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn recipe(id: i64, title: &str, age_days: i64) -> RecipeRecord {
        RecipeRecord {
            id,
            title: title.to_string(),
            description: String::new(),
            category: None,
            tags: vec![],
            ingredients: vec![],
            preparation_time: 10,
            cooking_time: 20,
            created_at: Utc::now() - Duration::days(age_days),
        }
    }

    #[tokio::test]
    async fn test_list_recipes_newest_first_with_offset() {
        let store = InMemoryStore::with_recipes(vec![
            recipe(1, "Old", 10),
            recipe(2, "Newest", 0),
            recipe(3, "Middle", 5),
        ]);
        let page = store.list_recipes(2, 0).await.unwrap();
        assert_eq!(page.iter().map(|r| r.id).collect::<Vec<_>>(), vec![2, 3]);
        let page = store.list_recipes(2, 2).await.unwrap();
        assert_eq!(page.iter().map(|r| r.id).collect::<Vec<_>>(), vec![1]);
    }

    #[tokio::test]
    async fn test_upsert_keeps_one_row_with_latest_score() {
        let store = InMemoryStore::new();
        store.upsert(1, 10, 0.4, "first").await.unwrap();
        store.upsert(1, 10, 0.9, "second").await.unwrap();

        let history = store.history(1, 20).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].confidence_score, 0.9);
        assert_eq!(history[0].reason, "second");
    }

    #[tokio::test]
    async fn test_repeat_view_refreshes_timestamp() {
        let store = InMemoryStore::with_recipes(vec![recipe(1, "Suya", 1), recipe(2, "Fufu", 1)]);
        store.record_interaction(7, 1, InteractionType::View).await.unwrap();
        store.record_interaction(7, 2, InteractionType::View).await.unwrap();
        store.record_interaction(7, 1, InteractionType::View).await.unwrap();

        let views = store.list_recent_views(7, 5).await.unwrap();
        assert_eq!(views.len(), 2);
        assert_eq!(views[0].title, "Suya");
        assert_eq!(views[1].title, "Fufu");
    }

    #[tokio::test]
    async fn test_interacted_ids_include_likes() {
        let store = InMemoryStore::new();
        store.record_interaction(3, 11, InteractionType::Like).await.unwrap();
        store.record_interaction(3, 12, InteractionType::View).await.unwrap();
        store.record_interaction(4, 13, InteractionType::View).await.unwrap();

        let ids = store.interacted_recipe_ids(3).await.unwrap();
        assert_eq!(ids, HashSet::from([11, 12]));
    }

    #[tokio::test]
    async fn test_mean_ratings() {
        let store = InMemoryStore::new();
        store.add_rating(1, 5, 5).await;
        store.add_rating(2, 5, 3).await;
        store.add_rating(1, 6, 2).await;

        let means = store.mean_ratings().await.unwrap();
        assert_eq!(means.get(&5), Some(&4.0));
        assert_eq!(means.get(&6), Some(&2.0));
        assert_eq!(means.get(&7), None);
    }
}
