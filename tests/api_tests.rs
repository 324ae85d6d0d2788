use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum_test::TestServer;
use chrono::{Duration, Utc};
use serde_json::{json, Value};

use recipe_recs_api::{
    config::Config,
    db::{store::InteractionLog, InMemoryStore},
    error::{AppError, AppResult},
    models::{InteractionType, RecipeRecord},
    routes::create_router,
    services::llm::{ChatRequest, ChatTransport},
    state::AppState,
};

/// Replies with queued responses in order, then reports the service as down
#[derive(Default)]
struct ScriptedTransport {
    replies: Mutex<VecDeque<AppResult<String>>>,
}

impl ScriptedTransport {
    fn replying(replies: Vec<&str>) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().map(|r| Ok(r.to_string())).collect()),
        }
    }
}

#[async_trait::async_trait]
impl ChatTransport for ScriptedTransport {
    async fn complete(&self, _request: ChatRequest) -> AppResult<String> {
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(AppError::UpstreamUnavailable("script exhausted".to_string())))
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

fn recipe(id: i64, title: &str, description: &str, category: &str, tags: &[&str]) -> RecipeRecord {
    RecipeRecord {
        id,
        title: title.to_string(),
        description: description.to_string(),
        category: Some(category.to_string()),
        tags: tags.iter().map(|t| t.to_string()).collect(),
        ingredients: vec![],
        preparation_time: 20,
        cooking_time: 40,
        created_at: Utc::now() - Duration::days(id),
    }
}

fn corpus() -> Vec<RecipeRecord> {
    vec![
        recipe(1, "Jollof Rice", "Tomato pepper rice stew", "West African", &["spicy", "stew"]),
        recipe(2, "Suya", "Grilled beef skewers", "Street Food", &["grill", "beef"]),
        recipe(3, "Ndolé", "Bitterleaf peanut stew", "West African", &["stew", "spicy"]),
    ]
}

fn test_config() -> Config {
    envy::from_iter(vec![("LLM_TIMEOUT_SECS".to_string(), "2".to_string())]).unwrap()
}

fn create_test_server(store: Arc<InMemoryStore>, transport: ScriptedTransport) -> TestServer {
    let state = AppState::build(&test_config(), store, Arc::new(transport), None);
    let app = create_router(state);
    TestServer::new(app).unwrap()
}

#[tokio::test]
async fn test_health_check() {
    let server = create_test_server(Arc::new(InMemoryStore::new()), ScriptedTransport::default());
    let response = server.get("/health").await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn test_request_id_is_echoed() {
    let server = create_test_server(Arc::new(InMemoryStore::new()), ScriptedTransport::default());
    let response = server
        .get("/health")
        .add_header(
            HeaderName::from_static("x-request-id"),
            HeaderValue::from_static("trace-abc"),
        )
        .await;
    assert_eq!(response.header("x-request-id"), "trace-abc");

    let response = server.get("/health").await;
    let generated = response.header("x-request-id");
    assert_eq!(generated.to_str().unwrap().len(), 36);
}

#[tokio::test]
async fn test_ai_recommendations() {
    let store = Arc::new(InMemoryStore::with_recipes(corpus()));
    let transport = ScriptedTransport::replying(vec![
        r#"```json
{"recommendations": [{"recipe_id": 3, "confidence_score": 0.92, "reason": "Hearty stew"}, {"recipe_id": 77, "confidence_score": 0.5, "reason": "Imaginary"}]}
```"#,
    ]);
    let server = create_test_server(store.clone(), transport);

    let response = server
        .get("/api/v1/recommendations")
        .add_query_param("user_id", 5)
        .add_query_param("limit", 5)
        .await;
    response.assert_status_ok();

    let body: Value = response.json();
    assert_eq!(body["ai_powered"], true);
    assert_eq!(body["source"], "ai");
    assert_eq!(body["total_count"], 1);
    assert_eq!(body["recommendations"][0]["recipe"]["title"], "Ndolé");
    assert_eq!(body["recommendations"][0]["reason"], "Hearty stew");

    let response = server
        .get("/api/v1/recommendations/history")
        .add_query_param("user_id", 5)
        .await;
    response.assert_status_ok();
    let history: Vec<Value> = response.json();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0]["recipe_id"], 3);
    assert_eq!(store.recommendation_count().await, 1);
}

#[tokio::test]
async fn test_llm_outage_falls_back_to_liked_similarity() {
    let store = Arc::new(InMemoryStore::with_recipes(corpus()));
    store.add_rating(5, 1, 5).await;
    store
        .record_interaction(5, 2, InteractionType::View)
        .await
        .unwrap();
    let server = create_test_server(store.clone(), ScriptedTransport::default());

    let response = server
        .get("/api/v1/recommendations")
        .add_query_param("user_id", 5)
        .await;
    response.assert_status_ok();

    let body: Value = response.json();
    assert_eq!(body["ai_powered"], false);
    assert_eq!(body["source"], "content_based");
    assert_eq!(body["recommendations"][0]["recipe"]["title"], "Ndolé");
    assert_eq!(store.recommendation_count().await, 0);
}

#[tokio::test]
async fn test_zero_limit_is_rejected() {
    let server = create_test_server(
        Arc::new(InMemoryStore::with_recipes(corpus())),
        ScriptedTransport::default(),
    );
    let response = server
        .get("/api/v1/recommendations")
        .add_query_param("user_id", 5)
        .add_query_param("limit", 0)
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_content_based_recommendations() {
    let store = Arc::new(InMemoryStore::with_recipes(corpus()));
    store.add_rating(9, 2, 5).await;
    let server = create_test_server(store, ScriptedTransport::default());

    let response = server
        .get("/api/v1/recommendations/content")
        .add_query_param("user_id", 5)
        .add_query_param("limit", 2)
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["source"], "top_rated");
    assert_eq!(body["total_count"], 2);
    assert_eq!(body["recommendations"][0]["recipe"]["id"], 2);
}

#[tokio::test]
async fn test_similar_recipes() {
    let server = create_test_server(
        Arc::new(InMemoryStore::with_recipes(corpus())),
        ScriptedTransport::default(),
    );

    let response = server
        .get("/api/v1/recipes/1/similar")
        .add_query_param("k", 1)
        .await;
    response.assert_status_ok();
    let similar: Vec<Value> = response.json();
    assert_eq!(similar.len(), 1);
    assert_eq!(similar[0]["title"], "Ndolé");

    let response = server.get("/api/v1/recipes/404/similar").await;
    response.assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_track_view() {
    let store = Arc::new(InMemoryStore::with_recipes(corpus()));
    let server = create_test_server(store.clone(), ScriptedTransport::default());

    let response = server
        .post("/api/v1/recipes/2/views")
        .json(&json!({ "user_id": 5 }))
        .await;
    response.assert_status(StatusCode::CREATED);
    assert!(store.interacted_recipe_ids(5).await.unwrap().contains(&2));

    let response = server
        .post("/api/v1/recipes/99/views")
        .json(&json!({ "user_id": 5 }))
        .await;
    response.assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_preferences_flow() {
    let server = create_test_server(Arc::new(InMemoryStore::new()), ScriptedTransport::default());

    let response = server
        .get("/api/v1/preferences")
        .add_query_param("user_id", 5)
        .await;
    response.assert_status_ok();
    let prefs: Value = response.json();
    assert_eq!(prefs["cooking_skill_level"], "beginner");
    assert_eq!(prefs["preferred_cooking_time"], 30);

    let response = server
        .post("/api/v1/preferences")
        .add_query_param("user_id", 5)
        .json(&json!({
            "cuisine_preferences": ["Cameroonian", "cameroonian"],
            "cooking_skill_level": "advanced"
        }))
        .await;
    response.assert_status_ok();
    let prefs: Value = response.json();
    assert_eq!(prefs["cuisine_preferences"], json!(["Cameroonian"]));
    assert_eq!(prefs["cooking_skill_level"], "advanced");

    let response = server
        .post("/api/v1/preferences")
        .add_query_param("user_id", 5)
        .json(&json!({ "cooking_skill_level": "wizard" }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);

    let response = server
        .get("/api/v1/preferences")
        .add_query_param("user_id", 5)
        .await;
    let prefs: Value = response.json();
    assert_eq!(prefs["cooking_skill_level"], "advanced");
}

#[tokio::test]
async fn test_ingredient_search_with_ai() {
    let transport = ScriptedTransport::replying(vec![
        r#"{"recipes": [{"recipe_id": 1, "match_score": 0.8, "available_ingredients": ["rice", "tomato"], "missing_ingredients": ["scotch bonnet"]}]}"#,
        r#"["thyme", "curry powder", "bay leaf", "stock", "ginger"]"#,
    ]);
    let server = create_test_server(Arc::new(InMemoryStore::with_recipes(corpus())), transport);

    let response = server
        .get("/api/v1/ingredients/search")
        .add_query_param("ingredients", "rice, tomato")
        .add_query_param("user_id", 5)
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["ai_powered"], true);
    assert_eq!(body["recipes"][0]["recipe_id"], 1);
    assert_eq!(body["recipes"][0]["missing_ingredients"], json!(["scotch bonnet"]));
    assert_eq!(body["ai_suggestions"].as_array().unwrap().len(), 5);
    assert_eq!(body["total_found"], 1);
    assert_eq!(body["search_ingredients"], json!(["rice", "tomato"]));

    let response = server
        .get("/api/v1/ingredients/history")
        .add_query_param("user_id", 5)
        .await;
    response.assert_status_ok();
    let history: Vec<Value> = response.json();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0]["ingredients"], json!(["rice", "tomato"]));
}

#[tokio::test]
async fn test_ingredient_search_keyword_fallback() {
    let server = create_test_server(
        Arc::new(InMemoryStore::with_recipes(corpus())),
        ScriptedTransport::default(),
    );

    let response = server
        .get("/api/v1/ingredients/search")
        .add_query_param("ingredients", "beef")
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["ai_powered"], false);
    assert_eq!(body["recipes"][0]["recipe_id"], 2);
    assert_eq!(body["recipes"][0]["match_score"], 0.5);
    assert_eq!(body["total_found"], 1);
    assert_eq!(body["search_ingredients"], json!(["beef"]));
    assert_eq!(
        body["ai_suggestions"],
        json!(["salt", "pepper", "olive oil", "garlic", "onion"])
    );
}

#[tokio::test]
async fn test_ingredient_search_empty_ai_answer() {
    let transport = ScriptedTransport::replying(vec![r#"{"recipes": []}"#, r#"["ginger"]"#]);
    let server = create_test_server(Arc::new(InMemoryStore::with_recipes(corpus())), transport);

    let response = server
        .get("/api/v1/ingredients/search")
        .add_query_param("ingredients", "beef, , onion")
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["ai_powered"], true);
    assert_eq!(body["recipes"], json!([]));
    assert_eq!(body["ai_suggestions"], json!(["ginger"]));
    assert_eq!(body["total_found"], 0);
    assert_eq!(body["search_ingredients"], json!(["beef", "onion"]));
}

#[tokio::test]
async fn test_ingredient_search_validation() {
    let server = create_test_server(
        Arc::new(InMemoryStore::with_recipes(corpus())),
        ScriptedTransport::default(),
    );

    let response = server
        .get("/api/v1/ingredients/search")
        .add_query_param("ingredients", " , ")
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);

    let response = server
        .get("/api/v1/ingredients/search")
        .add_query_param("ingredients", "rice")
        .add_query_param("max_results", 80)
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
}
