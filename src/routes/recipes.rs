use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::{error::AppResult, models::RecipeRecord, state::AppState};

fn default_k() -> usize {
    5
}

#[derive(Debug, Deserialize)]
pub struct SimilarQuery {
    #[serde(default = "default_k")]
    pub k: usize,
}

#[derive(Debug, Deserialize)]
pub struct ViewRequest {
    pub user_id: i64,
}

pub async fn similar(
    State(state): State<Arc<AppState>>,
    Path(recipe_id): Path<i64>,
    Query(params): Query<SimilarQuery>,
) -> AppResult<Json<Vec<RecipeRecord>>> {
    let recipes = state.recommender.similar_recipes(recipe_id, params.k).await?;
    Ok(Json(recipes))
}

pub async fn track_view(
    State(state): State<Arc<AppState>>,
    Path(recipe_id): Path<i64>,
    Json(request): Json<ViewRequest>,
) -> AppResult<(StatusCode, Json<Value>)> {
    state
        .recommender
        .track_view(request.user_id, recipe_id)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "user_id": request.user_id, "recipe_id": recipe_id })),
    ))
}
