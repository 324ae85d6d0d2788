use chrono::{DateTime, Utc};
use sqlx::{postgres::PgPoolOptions, FromRow, PgPool};
use std::collections::{HashMap, HashSet};

use crate::{
    db::store::{
        InteractionLog, PreferenceStore, RatingStore, RecipeCatalog, RecommendationStore,
        SearchHistoryStore,
    },
    error::AppResult,
    models::{
        IngredientSearchRecord, InteractionType, RecentView, RecipeRating, RecipeRecord,
        Recommendation, SkillLevel, UserPreference,
    },
};

/// Creates a PostgreSQL connection pool
///
/// Establishes a pool of database connections for efficient reuse.
/// The pool automatically manages connection lifecycle and limits.
pub async fn create_pool(database_url: &str) -> anyhow::Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;

    Ok(pool)
}

/// Postgres-backed store
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(FromRow)]
struct RecipeRow {
    id: i64,
    title: String,
    description: Option<String>,
    category: Option<String>,
    tags: Vec<String>,
    ingredients: Vec<String>,
    preparation_time: i32,
    cooking_time: i32,
    created_at: DateTime<Utc>,
}

impl From<RecipeRow> for RecipeRecord {
    fn from(row: RecipeRow) -> Self {
        Self {
            id: row.id,
            title: row.title,
            description: row.description.unwrap_or_default(),
            category: row.category,
            tags: row.tags,
            ingredients: row.ingredients,
            preparation_time: row.preparation_time,
            cooking_time: row.cooking_time,
            created_at: row.created_at,
        }
    }
}

const RECIPE_COLUMNS: &str = r#"
    r.id, r.title, r.description, r.category,
    COALESCE(r.tags, '{}') AS tags,
    COALESCE(r.ingredients, '{}') AS ingredients,
    r.preparation_time, r.cooking_time, r.created_at
"#;

#[async_trait::async_trait]
impl RecipeCatalog for PgStore {
    async fn list_recipes(&self, limit: usize, offset: usize) -> AppResult<Vec<RecipeRecord>> {
        let rows: Vec<RecipeRow> = sqlx::query_as(&format!(
            "SELECT {} FROM recipes r ORDER BY r.created_at DESC, r.id DESC LIMIT $1 OFFSET $2",
            RECIPE_COLUMNS
        ))
        .bind(limit as i64)
        .bind(offset as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(RecipeRecord::from).collect())
    }

    async fn get_recipe(&self, id: i64) -> AppResult<Option<RecipeRecord>> {
        let row: Option<RecipeRow> = sqlx::query_as(&format!(
            "SELECT {} FROM recipes r WHERE r.id = $1",
            RECIPE_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(RecipeRecord::from))
    }
}

#[derive(FromRow)]
struct RecentViewRow {
    recipe_id: i64,
    title: String,
    viewed_at: DateTime<Utc>,
}

#[async_trait::async_trait]
impl InteractionLog for PgStore {
    async fn list_recent_views(&self, user_id: i64, limit: usize) -> AppResult<Vec<RecentView>> {
        let rows: Vec<RecentViewRow> = sqlx::query_as(
            r#"
            SELECT i.recipe_id, r.title, MAX(i.viewed_at) AS viewed_at
            FROM recipe_interactions i
            JOIN recipes r ON r.id = i.recipe_id
            WHERE i.user_id = $1 AND i.interaction_type = 'view'
            GROUP BY i.recipe_id, r.title
            ORDER BY viewed_at DESC, i.recipe_id ASC
            LIMIT $2
            "#,
        )
        .bind(user_id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| RecentView {
                recipe_id: row.recipe_id,
                title: row.title,
                viewed_at: row.viewed_at,
            })
            .collect())
    }

    async fn interacted_recipe_ids(&self, user_id: i64) -> AppResult<HashSet<i64>> {
        let ids: Vec<i64> = sqlx::query_scalar(
            "SELECT DISTINCT recipe_id FROM recipe_interactions WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(ids.into_iter().collect())
    }

    async fn record_interaction(
        &self,
        user_id: i64,
        recipe_id: i64,
        interaction_type: InteractionType,
    ) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO recipe_interactions (user_id, recipe_id, interaction_type, viewed_at)
            VALUES ($1, $2, $3, NOW())
            ON CONFLICT (user_id, recipe_id, interaction_type)
            DO UPDATE SET viewed_at = EXCLUDED.viewed_at
            "#,
        )
        .bind(user_id)
        .bind(recipe_id)
        .bind(interaction_type.to_string())
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[derive(FromRow)]
struct RatingRow {
    recipe_id: i64,
    value: i16,
}

#[derive(FromRow)]
struct MeanRatingRow {
    recipe_id: i64,
    mean: f64,
}

#[async_trait::async_trait]
impl RatingStore for PgStore {
    async fn user_ratings(&self, user_id: i64) -> AppResult<Vec<RecipeRating>> {
        let rows: Vec<RatingRow> = sqlx::query_as(
            "SELECT recipe_id, value FROM recipe_ratings WHERE user_id = $1 ORDER BY recipe_id",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| RecipeRating {
                user_id,
                recipe_id: row.recipe_id,
                value: row.value,
            })
            .collect())
    }

    async fn mean_ratings(&self) -> AppResult<HashMap<i64, f64>> {
        let rows: Vec<MeanRatingRow> = sqlx::query_as(
            "SELECT recipe_id, AVG(value)::DOUBLE PRECISION AS mean FROM recipe_ratings GROUP BY recipe_id",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|row| (row.recipe_id, row.mean)).collect())
    }
}

#[derive(FromRow)]
struct PreferenceRow {
    dietary_needs: Vec<String>,
    cuisine_preferences: Vec<String>,
    disliked_ingredients: Vec<String>,
    cooking_skill_level: String,
    preferred_cooking_time: i32,
}

#[async_trait::async_trait]
impl PreferenceStore for PgStore {
    async fn get_preferences(&self, user_id: i64) -> AppResult<Option<UserPreference>> {
        let row: Option<PreferenceRow> = sqlx::query_as(
            r#"
            SELECT dietary_needs, cuisine_preferences, disliked_ingredients,
                   cooking_skill_level, preferred_cooking_time
            FROM user_preferences
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let cooking_skill_level = row.cooking_skill_level.parse().unwrap_or_else(|_| {
            tracing::warn!(
                user_id,
                stored = %row.cooking_skill_level,
                "Unrecognised stored skill level, using default"
            );
            SkillLevel::default()
        });

        Ok(Some(UserPreference {
            dietary_needs: row.dietary_needs,
            cuisine_preferences: row.cuisine_preferences,
            disliked_ingredients: row.disliked_ingredients,
            cooking_skill_level,
            preferred_cooking_time: row.preferred_cooking_time,
        }))
    }

    async fn save_preferences(&self, user_id: i64, preferences: &UserPreference) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO user_preferences (user_id, dietary_needs, cuisine_preferences,
                disliked_ingredients, cooking_skill_level, preferred_cooking_time)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (user_id) DO UPDATE SET
                dietary_needs = EXCLUDED.dietary_needs,
                cuisine_preferences = EXCLUDED.cuisine_preferences,
                disliked_ingredients = EXCLUDED.disliked_ingredients,
                cooking_skill_level = EXCLUDED.cooking_skill_level,
                preferred_cooking_time = EXCLUDED.preferred_cooking_time
            "#,
        )
        .bind(user_id)
        .bind(&preferences.dietary_needs)
        .bind(&preferences.cuisine_preferences)
        .bind(&preferences.disliked_ingredients)
        .bind(preferences.cooking_skill_level.to_string())
        .bind(preferences.preferred_cooking_time)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[derive(FromRow)]
struct RecommendationRow {
    recipe_id: i64,
    confidence_score: f64,
    reason: String,
    created_at: DateTime<Utc>,
}

#[async_trait::async_trait]
impl RecommendationStore for PgStore {
    async fn upsert(
        &self,
        user_id: i64,
        recipe_id: i64,
        confidence_score: f64,
        reason: &str,
    ) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO ai_recommendations (user_id, recipe_id, confidence_score, reason, created_at)
            VALUES ($1, $2, $3, $4, NOW())
            ON CONFLICT (user_id, recipe_id) DO UPDATE SET
                confidence_score = EXCLUDED.confidence_score,
                reason = EXCLUDED.reason,
                created_at = EXCLUDED.created_at
            "#,
        )
        .bind(user_id)
        .bind(recipe_id)
        .bind(confidence_score)
        .bind(reason)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn history(&self, user_id: i64, limit: usize) -> AppResult<Vec<Recommendation>> {
        let rows: Vec<RecommendationRow> = sqlx::query_as(
            r#"
            SELECT recipe_id, confidence_score, reason, created_at
            FROM ai_recommendations
            WHERE user_id = $1
            ORDER BY created_at DESC
            LIMIT $2
            "#,
        )
        .bind(user_id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| Recommendation {
                user_id,
                recipe_id: row.recipe_id,
                confidence_score: row.confidence_score,
                reason: row.reason,
                created_at: row.created_at,
            })
            .collect())
    }
}

#[derive(FromRow)]
struct SearchRow {
    user_id: Option<i64>,
    ingredients: Vec<String>,
    results_count: i32,
    searched_at: DateTime<Utc>,
}

#[async_trait::async_trait]
impl SearchHistoryStore for PgStore {
    async fn record_search(&self, record: IngredientSearchRecord) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO ingredient_search_history (user_id, ingredients, results_count, searched_at)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(record.user_id)
        .bind(&record.ingredients)
        .bind(record.results_count as i32)
        .bind(record.searched_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn search_history(
        &self,
        user_id: i64,
        limit: usize,
    ) -> AppResult<Vec<IngredientSearchRecord>> {
        let rows: Vec<SearchRow> = sqlx::query_as(
            r#"
            SELECT user_id, ingredients, results_count, searched_at
            FROM ingredient_search_history
            WHERE user_id = $1
            ORDER BY searched_at DESC
            LIMIT $2
            "#,
        )
        .bind(user_id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| IngredientSearchRecord {
                user_id: row.user_id,
                ingredients: row.ingredients,
                results_count: row.results_count.max(0) as usize,
                searched_at: row.searched_at,
            })
            .collect())
    }
}
