use serde::Deserialize;
use std::time::Duration;

/// Application configuration loaded from environment variables
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// PostgreSQL database connection URL; in-memory storage when unset
    #[serde(default)]
    pub database_url: Option<String>,

    /// Redis connection URL; suggestion caching is disabled when unset
    #[serde(default)]
    pub redis_url: Option<String>,

    /// Bearer token for the LLM endpoint
    #[serde(default)]
    pub llm_api_key: String,

    /// Chat-completions endpoint URL
    #[serde(default = "default_llm_api_url")]
    pub llm_api_url: String,

    /// Model identifier sent with every request
    #[serde(default = "default_llm_model")]
    pub llm_model: String,

    /// Upper bound for a single LLM call, in seconds
    #[serde(default = "default_llm_timeout_secs")]
    pub llm_timeout_secs: u64,

    /// Value of the `HTTP-Referer` header
    #[serde(default = "default_llm_referer")]
    pub llm_referer: String,

    /// Value of the `X-Title` header
    #[serde(default = "default_llm_title")]
    pub llm_title: String,

    /// Maximum number of recipes offered to the LLM per request
    #[serde(default = "default_candidate_limit")]
    pub candidate_limit: usize,

    /// Server host address
    #[serde(default = "default_host")]
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_llm_api_url() -> String {
    "https://openrouter.ai/api/v1/chat/completions".to_string()
}

fn default_llm_model() -> String {
    "deepseek/deepseek-r1-0528:free".to_string()
}

fn default_llm_timeout_secs() -> u64 {
    45
}

fn default_llm_referer() -> String {
    "http://localhost:5173/".to_string()
}

fn default_llm_title() -> String {
    "Recipe Recommendation Platform".to_string()
}

fn default_candidate_limit() -> usize {
    50
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        envy::from_env::<Config>().map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))
    }

    pub fn llm_timeout(&self) -> Duration {
        Duration::from_secs(self.llm_timeout_secs.max(1))
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_environment() {
        let config: Config = envy::from_iter(Vec::<(String, String)>::new()).unwrap();
        assert!(config.database_url.is_none());
        assert_eq!(config.llm_timeout_secs, 45);
        assert_eq!(config.candidate_limit, 50);
        assert_eq!(config.bind_address(), "127.0.0.1:3000");
    }

    #[test]
    fn test_overrides_are_read() {
        let vars = vec![
            ("LLM_TIMEOUT_SECS".to_string(), "30".to_string()),
            ("LLM_MODEL".to_string(), "test/model".to_string()),
            ("PORT".to_string(), "8080".to_string()),
        ];
        let config: Config = envy::from_iter(vars).unwrap();
        assert_eq!(config.llm_timeout(), Duration::from_secs(30));
        assert_eq!(config.llm_model, "test/model");
        assert_eq!(config.port, 8080);
    }
}
