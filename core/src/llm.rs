//! LLM module root
//!
//! This file delegates to submodules in `llm/` and re-exports public types.
//! The model is opaque: callers see only the `ChatModel` contract.

mod client;

pub use client::{LlmClient, LlmClientConfig};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::Result;

/// One chat turn in OpenAI wire shape
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
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

/// Chat-completion seam used by the intent classifier and freeform answers
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Assistant text for the given conversation
    async fn complete(&self, messages: Vec<ChatMessage>) -> Result<String>;
}
