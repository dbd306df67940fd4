use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, error};

use super::{ChatMessage, ChatModel};
use crate::config::{env_parse, env_string};
use crate::upstream::Resource;
use crate::{Result, TallyError};

/// Configuration for LlmClient loaded from environment variables
#[derive(Debug, Clone)]
pub struct LlmClientConfig {
    pub base_url: String, // e.g., https://api.openai.com/v1
    pub model: String,    // e.g., gpt-4-0125-preview
    pub api_key: Option<String>,
    pub request_timeout_ms: u64,
    pub temperature: f32,
}

impl Default for LlmClientConfig {
    fn default() -> Self {
        Self {
            base_url: env_string("OPENAI_BASE_URL")
                .unwrap_or_else(|| "https://api.openai.com/v1".to_string()),
            model: env_string("OPENAI_MODEL")
                .unwrap_or_else(|| "gpt-4-0125-preview".to_string()),
            api_key: env_string("OPENAI_API_KEY"),
            request_timeout_ms: env_parse("LLM_TIMEOUT_MS").unwrap_or(30_000),
            temperature: env_parse("CLASSIFIER_TEMPERATURE").unwrap_or(0.0),
        }
    }
}

/// HTTP client for OpenAI-compatible Chat Completions
#[derive(Clone)]
pub struct LlmClient {
    pub(crate) http: Client,
    pub(crate) cfg: LlmClientConfig,
}

impl LlmClient {
    pub fn new(cfg: LlmClientConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_millis(cfg.request_timeout_ms))
            .build()
            .map_err(|e| TallyError::Config(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self { http, cfg })
    }

    pub fn from_env() -> Result<Self> {
        Self::new(LlmClientConfig::default())
    }
}

#[async_trait]
impl ChatModel for LlmClient {
    /// Contract:
    /// - Input: ordered chat messages
    /// - Output: `choices[0].message.content`, trimmed
    /// - Error: network, non-success status or a reply without content
    async fn complete(&self, messages: Vec<ChatMessage>) -> Result<String> {
        let chat_url = format!(
            "{}/chat/completions",
            self.cfg.base_url.trim_end_matches('/')
        );
        debug!(target: "llm_client", model = %self.cfg.model, "POST {} via Chat Completions", chat_url);

        let mut req = self
            .http
            .post(&chat_url)
            .header("content-type", "application/json");
        if let Some(key) = &self.cfg.api_key {
            req = req.bearer_auth(key);
        }

        let body = json!({
            "model": self.cfg.model,
            "messages": messages,
            "temperature": self.cfg.temperature,
        });

        let resp = req.json(&body).send().await.map_err(|e| {
            error!(target: "llm_client", error = %e, "Chat Completions request failed");
            TallyError::upstream(Resource::Model, None, e.to_string())
        })?;
        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            error!(target: "llm_client", %status, body = %text, "Chat Completions error");
            return Err(TallyError::upstream(
                Resource::Model,
                Some(status.as_u16()),
                text,
            ));
        }

        let val: serde_json::Value = resp.json().await.map_err(|e| {
            TallyError::upstream(
                Resource::Model,
                None,
                format!("Failed to parse Chat Completions JSON: {e}"),
            )
        })?;
        extract_text_from_chat_completions(&val)
            .map(|text| text.trim().to_string())
            .ok_or_else(|| {
                TallyError::upstream(
                    Resource::Model,
                    None,
                    "Missing choices[0].message.content in chat completions",
                )
            })
    }
}

fn extract_text_from_chat_completions(v: &serde_json::Value) -> Option<String> {
    v.get("choices")?
        .get(0)?
        .get("message")?
        .get("content")?
        .as_str()
        .map(|s| s.to_string())
}
