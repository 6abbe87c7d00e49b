//! OpenAI-compatible chat-completions client.
//!
//! - **Endpoint**: `POST {base_url}/chat/completions`
//! - **Authentication**: bearer token
//! - **Reply**: JSON object `{name, description}` in the first choice
//!
//! No retries: a failed call falls back to the raw text upstream.

use async_trait::async_trait;
use reqwest::header;
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::request::{ChatRequest, ItemEnhancementRequest, RewriteMode};
use super::response::{ChatResponse, RewrittenText};
use super::{EnhanceError, TextRewriter};
use itemmeta_core::AppConfig;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "gpt-4o-mini";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(20);

/// Chat client configuration.
#[derive(Debug, Clone)]
pub struct ChatConfig {
    pub api_key: String,
    /// Base URL (default: https://api.openai.com/v1).
    pub base_url: String,
    pub model: String,
    pub timeout: Duration,
    pub user_agent: String,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            timeout: DEFAULT_TIMEOUT,
            user_agent: "itemmeta/0.1".to_string(),
        }
    }
}

impl ChatConfig {
    /// Build from application config. Fails when no key is configured.
    pub fn from_app(config: &AppConfig) -> Result<Self, EnhanceError> {
        let api_key = config.enhancer_api_key().ok_or(EnhanceError::MissingApiKey)?;
        Ok(Self {
            api_key: api_key.to_string(),
            base_url: config.enhancer_base_url.trim_end_matches('/').to_string(),
            model: config.enhancer_model.clone(),
            timeout: config.timeout(),
            user_agent: config.user_agent.clone(),
        })
    }
}

/// Chat-completions client.
#[derive(Debug, Clone)]
pub struct ChatClient {
    http: reqwest::Client,
    config: ChatConfig,
}

impl ChatClient {
    pub fn new(config: ChatConfig) -> Result<Self, EnhanceError> {
        if config.api_key.is_empty() {
            return Err(EnhanceError::MissingApiKey);
        }

        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .build()
            .map_err(|e| EnhanceError::Network(Arc::new(e)))?;

        Ok(Self { http, config })
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }
}

#[async_trait]
impl TextRewriter for ChatClient {
    async fn rewrite(&self, mode: RewriteMode, req: &ItemEnhancementRequest) -> Result<RewrittenText, EnhanceError> {
        let start = Instant::now();
        let url = format!("{}/chat/completions", self.config.base_url);
        let body = ChatRequest::build(&self.config.model, mode, req);

        let http_response = self
            .http
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .header(header::ACCEPT, "application/json")
            .json(&body)
            .send()
            .await?;

        let status = http_response.status();
        tracing::debug!("chat completion response status: {}", status);

        if status == 401 || status == 403 {
            return Err(EnhanceError::AuthError);
        }

        if status == 429 {
            return Err(EnhanceError::RateLimited);
        }

        if status.is_client_error() || status.is_server_error() {
            return Err(EnhanceError::HttpError { status: status.as_u16() });
        }

        let bytes = http_response.bytes().await?;
        let response: ChatResponse = serde_json::from_slice(&bytes).map_err(|e| EnhanceError::Parse(e.to_string()))?;

        tracing::debug!("rewrite ({:?}) completed in {:?}", mode, start.elapsed());

        response.rewritten()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_new_missing_key() {
        let result = ChatClient::new(ChatConfig::default());
        assert!(matches!(result, Err(EnhanceError::MissingApiKey)));
    }

    #[test]
    fn test_config_from_app() {
        let app = AppConfig { enhancer_api_key: Some("   ".to_string()), ..Default::default() };
        assert!(matches!(ChatConfig::from_app(&app), Err(EnhanceError::MissingApiKey)));

        let app = AppConfig {
            enhancer_api_key: Some("sk-test".to_string()),
            enhancer_base_url: "http://localhost:11434/v1/".to_string(),
            enhancer_model: "llama3".to_string(),
            ..Default::default()
        };
        let config = ChatConfig::from_app(&app).unwrap();
        assert_eq!(config.base_url, "http://localhost:11434/v1");
        assert_eq!(config.model, "llama3");

        let client = ChatClient::new(config).unwrap();
        assert_eq!(client.model(), "llama3");
    }
}
