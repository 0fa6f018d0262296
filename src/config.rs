//! Application configuration loaded from environment variables.
//!
//! Loaded once when the host shell starts a session. API keys are read from
//! the environment (or a `.env` file in development) and kept in memory.

use std::env;

use crate::services::llm::Provider;

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    // --- Backend ---
    /// GCP / Firebase project ID
    pub gcp_project_id: String,
    /// Firebase Web API key (Identity Toolkit)
    pub firebase_api_key: String,
    /// Cloud Storage bucket for meal photos
    pub storage_bucket: String,
    /// Object path prefix for meal photos
    pub food_images_prefix: String,

    // --- Language models ---
    /// Which completion provider the coach talks to
    pub llm_provider: Provider,
    pub openai_api_key: Option<String>,
    pub cerebras_api_key: Option<String>,
    /// Model used for coach replies
    pub chat_model: String,
    /// Model used for structured meal estimates
    pub analysis_model: String,
    /// Model used for message classification
    pub router_model: String,
    pub chat_temperature: f32,
    pub chat_max_tokens: u32,
    /// Classify messages and use the per-category prompt
    pub enable_message_routing: bool,

    // --- Empty chat cleanup ---
    pub cleanup_max_attempts: u32,
    pub cleanup_initial_delay_ms: u64,
    pub cleanup_max_delay_ms: u64,

    /// Emit JSON log lines instead of pretty output
    pub log_json: bool,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let gcp_project_id =
            env::var("GCP_PROJECT_ID").map_err(|_| ConfigError::Missing("GCP_PROJECT_ID"))?;

        let llm_provider = match env::var("LLM_PROVIDER")
            .unwrap_or_else(|_| "openai".to_string())
            .to_lowercase()
            .as_str()
        {
            "openai" => Provider::OpenAi,
            "cerebras" => Provider::Cerebras,
            other => return Err(ConfigError::Invalid("LLM_PROVIDER", other.to_string())),
        };

        let openai_api_key = optional("OPENAI_API_KEY");
        let cerebras_api_key = optional("CEREBRAS_API_KEY");
        match llm_provider {
            Provider::OpenAi if openai_api_key.is_none() => {
                return Err(ConfigError::Missing("OPENAI_API_KEY"))
            }
            Provider::Cerebras if cerebras_api_key.is_none() => {
                return Err(ConfigError::Missing("CEREBRAS_API_KEY"))
            }
            _ => {}
        }

        Ok(Self {
            firebase_api_key: env::var("FIREBASE_API_KEY")
                .map(|v| v.trim().to_string())
                .map_err(|_| ConfigError::Missing("FIREBASE_API_KEY"))?,
            storage_bucket: env::var("STORAGE_BUCKET")
                .unwrap_or_else(|_| format!("{}.appspot.com", gcp_project_id)),
            food_images_prefix: env::var("FOOD_IMAGES_PREFIX")
                .unwrap_or_else(|_| "food-images".to_string()),
            gcp_project_id,

            chat_model: env::var("CHAT_MODEL")
                .unwrap_or_else(|_| llm_provider.default_chat_model().to_string()),
            analysis_model: env::var("ANALYSIS_MODEL")
                .unwrap_or_else(|_| llm_provider.default_analysis_model().to_string()),
            router_model: env::var("ROUTER_MODEL")
                .unwrap_or_else(|_| llm_provider.default_analysis_model().to_string()),
            llm_provider,
            openai_api_key,
            cerebras_api_key,
            chat_temperature: parse_or("CHAT_TEMPERATURE", 0.7)?,
            chat_max_tokens: parse_or("CHAT_MAX_TOKENS", 500)?,
            enable_message_routing: parse_or("ENABLE_MESSAGE_ROUTING", false)?,

            cleanup_max_attempts: parse_or("CLEANUP_MAX_ATTEMPTS", 5)?,
            cleanup_initial_delay_ms: parse_or("CLEANUP_INITIAL_DELAY_MS", 200)?,
            cleanup_max_delay_ms: parse_or("CLEANUP_MAX_DELAY_MS", 2000)?,

            log_json: env::var("LOG_FORMAT")
                .map(|v| v.eq_ignore_ascii_case("json"))
                .unwrap_or(false),
        })
    }

    /// Config for tests: no real keys, fast cleanup retries.
    pub fn test_default() -> Self {
        Self {
            gcp_project_id: "test-project".to_string(),
            firebase_api_key: "test_api_key".to_string(),
            storage_bucket: "test-project.appspot.com".to_string(),
            food_images_prefix: "food-images".to_string(),
            llm_provider: Provider::OpenAi,
            openai_api_key: Some("test_openai_key".to_string()),
            cerebras_api_key: None,
            chat_model: Provider::OpenAi.default_chat_model().to_string(),
            analysis_model: Provider::OpenAi.default_analysis_model().to_string(),
            router_model: Provider::OpenAi.default_analysis_model().to_string(),
            chat_temperature: 0.7,
            chat_max_tokens: 500,
            enable_message_routing: false,
            cleanup_max_attempts: 3,
            cleanup_initial_delay_ms: 1,
            cleanup_max_delay_ms: 5,
            log_json: false,
        }
    }

    /// API key for the configured completion provider.
    pub fn llm_api_key(&self) -> Option<&str> {
        match self.llm_provider {
            Provider::OpenAi => self.openai_api_key.as_deref(),
            Provider::Cerebras => self.cerebras_api_key.as_deref(),
        }
    }
}

fn optional(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_or<T: std::str::FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid(key, raw)),
        Err(_) => Ok(default),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {0}: {1:?}")]
    Invalid(&'static str, String),
}
