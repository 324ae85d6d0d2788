use axum::{
    extract::{Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::{
    error::{AppError, AppResult},
    models::{Recommendation, RecommendationOutcome, RecommendationSource, RecommendedRecipe},
    state::AppState,
};

const DEFAULT_LIMIT: usize = 10;

fn default_limit() -> usize {
    DEFAULT_LIMIT
}

#[derive(Debug, Deserialize)]
pub struct RecommendationQuery {
    pub user_id: i64,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

#[derive(Debug, Deserialize)]
pub struct UserQuery {
    pub user_id: i64,
}

#[derive(Debug, Serialize)]
pub struct RecommendationsResponse {
    pub recommendations: Vec<RecommendedRecipe>,
    pub source: RecommendationSource,
    pub ai_powered: bool,
    pub total_count: usize,
}

impl From<RecommendationOutcome> for RecommendationsResponse {
    fn from(outcome: RecommendationOutcome) -> Self {
        Self {
            ai_powered: outcome.ai_powered(),
            total_count: outcome.recipes.len(),
            source: outcome.source,
            recommendations: outcome.recipes,
        }
    }
}

fn validate_limit(limit: usize) -> AppResult<usize> {
    if limit == 0 {
        return Err(AppError::InvalidInput("limit must be at least 1".to_string()));
    }
    Ok(limit)
}

/// Hybrid (AI first) recommendations
pub async fn recommend(
    State(state): State<Arc<AppState>>,
    Query(params): Query<RecommendationQuery>,
) -> AppResult<Json<RecommendationsResponse>> {
    let limit = validate_limit(params.limit)?;
    let outcome = state.recommender.recommend(params.user_id, limit).await?;
    Ok(Json(outcome.into()))
}

/// Similarity or rating based recommendations, no LLM involved
pub async fn content_based(
    State(state): State<Arc<AppState>>,
    Query(params): Query<RecommendationQuery>,
) -> AppResult<Json<RecommendationsResponse>> {
    let limit = validate_limit(params.limit)?;
    let outcome = state
        .recommender
        .recommend_content_based(params.user_id, limit)
        .await?;
    Ok(Json(outcome.into()))
}

pub async fn history(
    State(state): State<Arc<AppState>>,
    Query(params): Query<UserQuery>,
) -> AppResult<Json<Vec<Recommendation>>> {
    let rows = state.recommender.recommendation_history(params.user_id).await?;
    Ok(Json(rows))
}
