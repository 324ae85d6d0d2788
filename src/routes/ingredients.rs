use axum::{
    extract::{Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::recommendations::UserQuery;
use crate::{
    error::AppResult,
    models::{IngredientSearchRecord, IngredientSearchResult},
    state::AppState,
};

fn default_max_results() -> usize {
    10
}

#[derive(Debug, Deserialize)]
pub struct IngredientQuery {
    /// Comma-separated ingredient names
    pub ingredients: String,
    #[serde(default = "default_max_results")]
    pub max_results: usize,
    pub user_id: Option<i64>,
}

impl IngredientQuery {
    pub fn ingredient_list(&self) -> Vec<String> {
        self.ingredients
            .split(',')
            .map(|i| i.trim().to_string())
            .filter(|i| !i.is_empty())
            .collect()
    }
}

#[derive(Debug, Serialize)]
pub struct IngredientSearchResponse {
    #[serde(flatten)]
    pub result: IngredientSearchResult,
    pub total_found: usize,
    /// The ingredients as parsed from the query
    pub search_ingredients: Vec<String>,
}

pub async fn search(
    State(state): State<Arc<AppState>>,
    Query(params): Query<IngredientQuery>,
) -> AppResult<Json<IngredientSearchResponse>> {
    let search_ingredients = params.ingredient_list();
    let result = state
        .recommender
        .search_by_ingredients(params.user_id, &search_ingredients, params.max_results)
        .await?;
    Ok(Json(IngredientSearchResponse {
        total_found: result.recipes.len(),
        search_ingredients,
        result,
    }))
}

pub async fn history(
    State(state): State<Arc<AppState>>,
    Query(params): Query<UserQuery>,
) -> AppResult<Json<Vec<IngredientSearchRecord>>> {
    Ok(Json(state.recommender.search_history(params.user_id).await?))
}
