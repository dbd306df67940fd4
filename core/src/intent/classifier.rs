use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, warn};

use super::{Intent, IntentClassifier};
use crate::llm::{ChatMessage, ChatModel};
use crate::Result;

const CLASSIFIER_PROMPT: &str = r#"You are a loyalty assistant that extracts user intent and identifiers from messages.

Return your response as strict JSON in this exact format:
{
  "intent": "get_point_balance" | "get_active_campaigns" | "get_active_offers" | "get_offer_expiry" | "show_offers" | "show_campaigns" | "identify_user",
  "value": "string or null"
}

Respond with only the JSON.

Message: "{message}"

Examples:
Message: "Here's my email jordan.lee@example.com"
Output: { "intent": "identify_user", "value": "jordan.lee@example.com" }

Message: "When does my offer expire?"
Output: { "intent": "get_offer_expiry", "value": null }

Message: "Show me the offers"
Output: { "intent": "show_offers", "value": null }

Message: "Show me my campaigns"
Output: { "intent": "show_campaigns", "value": null }
"#;

/// Intent classifier backed by a chat model with a fixed few-shot prompt
pub struct LlmIntentClassifier {
    chat: Arc<dyn ChatModel>,
}

impl LlmIntentClassifier {
    pub fn new(chat: Arc<dyn ChatModel>) -> Self {
        Self { chat }
    }

    fn prompt_for(message: &str) -> String {
        CLASSIFIER_PROMPT.replace("{message}", message)
    }
}

#[async_trait]
impl IntentClassifier for LlmIntentClassifier {
    async fn classify(&self, message: &str) -> Result<Option<Intent>> {
        let reply = self
            .chat
            .complete(vec![ChatMessage::user(Self::prompt_for(message))])
            .await?;
        debug!(target: "agent", reply = %reply, "Classifier reply");

        let intent = parse_classifier_output(&reply);
        if intent.is_none() {
            warn!(target: "agent", reply = %reply, "Failed to parse classifier output");
        }
        Ok(intent)
    }
}

#[derive(Deserialize)]
struct RawClassification {
    intent: Option<String>,
    #[serde(default)]
    value: Option<serde_json::Value>,
}

/// Parse `{"intent": ..., "value": ...}`, tolerating a surrounding code fence.
/// Anything unparseable or naming an unknown intent yields `None`.
pub fn parse_classifier_output(raw: &str) -> Option<Intent> {
    let body = strip_code_fence(raw.trim());
    let parsed: RawClassification = serde_json::from_str(body).ok()?;
    let value = parsed.value.and_then(|v| match v {
        serde_json::Value::String(s) => Some(s),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    });
    Intent::from_parts(parsed.intent?.trim(), value)
}

fn strip_code_fence(s: &str) -> &str {
    let Some(rest) = s.strip_prefix("```") else {
        return s;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}
