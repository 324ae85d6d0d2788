use axum::{
    http::StatusCode,
    middleware,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    middleware::{make_span_with_request_id, request_id_middleware},
    state::AppState,
};

pub mod ingredients;
pub mod preferences;
pub mod recipes;
pub mod recommendations;

/// Creates the application router with all routes
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .nest("/api/v1", api_routes())
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(middleware::from_fn(request_id_middleware))
                .layer(TraceLayer::new_for_http().make_span_with(make_span_with_request_id))
                .layer(CorsLayer::permissive()),
        )
}

/// API routes under /api/v1
fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/recommendations", get(recommendations::recommend))
        .route(
            "/recommendations/content",
            get(recommendations::content_based),
        )
        .route("/recommendations/history", get(recommendations::history))
        .route("/recipes/:id/similar", get(recipes::similar))
        .route("/recipes/:id/views", post(recipes::track_view))
        .route(
            "/preferences",
            get(preferences::get_preferences).post(preferences::update_preferences),
        )
        .route("/ingredients/search", get(ingredients::search))
        .route("/ingredients/history", get(ingredients::history))
}

/// Health check endpoint
async fn health_check() -> (StatusCode, Json<Value>) {
    (StatusCode::OK, Json(json!({ "status": "healthy" })))
}
