use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

/// Application-level errors
#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Cache error: {0}")]
    Cache(#[from] redis::RedisError),

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Network failure, timeout or non-2xx status from the LLM endpoint
    #[error("AI service unavailable: {0}")]
    UpstreamUnavailable(String),

    /// The LLM answered but nothing usable could be extracted
    #[error("Malformed AI response: {0}")]
    MalformedResponse(String),

    /// The LLM cited a recipe id that is not in the catalog
    #[error("Unknown recipe reference: {0}")]
    UnknownRecipeReference(i64),

    #[error("Cannot build a similarity model over an empty corpus")]
    EmptyCorpus,

    #[error("Recipe {0} not found")]
    RecipeNotFound(i64),

    #[error("Invalid preference: {0}")]
    InvalidPreference(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    /// Errors the recommender recovers from by falling back
    pub fn is_upstream(&self) -> bool {
        matches!(
            self,
            AppError::UpstreamUnavailable(_)
                | AppError::MalformedResponse(_)
                | AppError::HttpClient(_)
        )
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::RecipeNotFound(_) => (StatusCode::NOT_FOUND, self.to_string()),
            AppError::InvalidInput(msg) | AppError::InvalidPreference(msg) => {
                (StatusCode::BAD_REQUEST, msg)
            }
            AppError::Database(_) | AppError::Cache(_) | AppError::Internal(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, self.to_string())
            }
            AppError::UpstreamUnavailable(_)
            | AppError::MalformedResponse(_)
            | AppError::HttpClient(_) => (StatusCode::BAD_GATEWAY, self.to_string()),
            AppError::UnknownRecipeReference(_) | AppError::EmptyCorpus => {
                (StatusCode::UNPROCESSABLE_ENTITY, self.to_string())
            }
        };

        let body = Json(json!({
            "error": message
        }));

        (status, body).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
