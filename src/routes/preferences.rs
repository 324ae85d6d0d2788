use axum::{
    extract::{Query, State},
    Json,
};
use std::sync::Arc;

use super::recommendations::UserQuery;
use crate::{
    error::AppResult,
    models::{PreferenceUpdate, UserPreference},
    state::AppState,
};

/// Stored preferences, or defaults when the user has none
pub async fn get_preferences(
    State(state): State<Arc<AppState>>,
    Query(params): Query<UserQuery>,
) -> AppResult<Json<UserPreference>> {
    Ok(Json(state.recommender.preferences(params.user_id).await?))
}

/// Partial update; omitted fields keep their current value
pub async fn update_preferences(
    State(state): State<Arc<AppState>>,
    Query(params): Query<UserQuery>,
    Json(update): Json<PreferenceUpdate>,
) -> AppResult<Json<UserPreference>> {
    let updated = state
        .recommender
        .update_preferences(params.user_id, update)
        .await?;
    Ok(Json(updated))
}
