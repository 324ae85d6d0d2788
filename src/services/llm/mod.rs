/// Chat-completion access for the recommendation features
///
/// [`ChatTransport`] is the seam between prompt-building clients and the network.
/// [`OpenRouterTransport`] talks to an OpenAI-compatible chat-completions endpoint;
/// tests substitute a mock.
use std::sync::Arc;
use std::time::Duration;

use reqwest::Client as HttpClient;
use serde::{Deserialize, Serialize};

use crate::{
    config::Config,
    error::{AppError, AppResult},
};

pub mod ingredients;
pub mod parsing;
pub mod recommendation;

pub use ingredients::IngredientMatchClient;
pub use parsing::{Extraction, ExtractionStrategy, LlmOutcome};
pub use recommendation::RecommendationClient;

const TEMPERATURE: f32 = 0.3;
const TOP_P: f32 = 0.9;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
    pub max_tokens: u32,
}

/// Sends a chat request and returns the text of the first choice
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait ChatTransport: Send + Sync {
    async fn complete(&self, request: ChatRequest) -> AppResult<String>;

    /// Transport name for logging
    fn name(&self) -> &'static str;
}

/// Runs a chat call that is guaranteed to finish within `timeout`
///
/// An elapsed timeout is reported as [`AppError::UpstreamUnavailable`].
pub async fn complete_within(
    transport: &dyn ChatTransport,
    request: ChatRequest,
    timeout: Duration,
) -> AppResult<String> {
    match tokio::time::timeout(timeout, transport.complete(request)).await {
        Ok(result) => result,
        Err(_) => {
            tracing::warn!(
                transport = transport.name(),
                timeout_secs = timeout.as_secs_f64(),
                "LLM call timed out"
            );
            Err(AppError::UpstreamUnavailable(format!(
                "no response within {:?}",
                timeout
            )))
        }
    }
}

#[derive(Serialize)]
struct CompletionPayload<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    max_tokens: u32,
    temperature: f32,
    top_p: f32,
}

#[derive(Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<CompletionChoice>,
}

#[derive(Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Deserialize)]
struct CompletionMessage {
    #[serde(default)]
    content: Option<String>,
}

/// OpenAI-compatible chat-completions client (OpenRouter by default)
#[derive(Clone)]
pub struct OpenRouterTransport {
    http_client: HttpClient,
    api_key: String,
    api_url: String,
    model: String,
    referer: String,
    title: String,
}

impl OpenRouterTransport {
    pub fn new(config: &Config) -> AppResult<Self> {
        let http_client = HttpClient::builder().timeout(config.llm_timeout()).build()?;

        Ok(Self {
            http_client,
            api_key: config.llm_api_key.clone(),
            api_url: config.llm_api_url.clone(),
            model: config.llm_model.clone(),
            referer: config.llm_referer.clone(),
            title: config.llm_title.clone(),
        })
    }

    fn payload<'a>(&'a self, request: &'a ChatRequest) -> CompletionPayload<'a> {
        CompletionPayload {
            model: &self.model,
            messages: &request.messages,
            max_tokens: request.max_tokens,
            temperature: TEMPERATURE,
            top_p: TOP_P,
        }
    }
}

#[async_trait::async_trait]
impl ChatTransport for OpenRouterTransport {
    async fn complete(&self, request: ChatRequest) -> AppResult<String> {
        tracing::info!(
            model = %self.model,
            messages = request.messages.len(),
            max_tokens = request.max_tokens,
            "Sending chat completion request"
        );

        let response = self
            .http_client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .header("HTTP-Referer", &self.referer)
            .header("X-Title", &self.title)
            .json(&self.payload(&request))
            .send()
            .await
            .map_err(|e| AppError::UpstreamUnavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::UpstreamUnavailable(format!(
                "LLM endpoint returned status {}: {}",
                status, body
            )));
        }

        let response_text = response
            .text()
            .await
            .map_err(|e| AppError::UpstreamUnavailable(e.to_string()))?;
        tracing::debug!(response = %response_text, "Raw chat completion response");

        let completion: CompletionResponse = serde_json::from_str(&response_text)
            .map_err(|e| AppError::MalformedResponse(format!("invalid completion body: {}", e)))?;

        completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| AppError::MalformedResponse("completion has no content".to_string()))
    }

    fn name(&self) -> &'static str {
        "openrouter"
    }
}

/// Builds the shared transport from configuration
pub fn transport_from_config(config: &Config) -> AppResult<Arc<dyn ChatTransport>> {
    Ok(Arc::new(OpenRouterTransport::new(config)?))
}
