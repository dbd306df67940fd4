// Agent Orchestrator implementation
//
// Session lookup, identity resolution on demand, classification and dispatch to
// the router. The only state it touches is the session store.

use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::context::{greeting, ContextResolver, IdentifierKind, MemberContext};
use crate::intent::{Intent, IntentClassifier};
use crate::llm::{ChatMessage, ChatModel};
use crate::router::{self, answer_intent, FALLBACK_REPLY};
use crate::session::SessionStore;
use crate::{Result, TallyError};

const FREEFORM_SYSTEM_PROMPT: &str = "You are a helpful assistant specializing in loyalty program data.\n\
You have access to the following member profile.\n\
Only use this data to answer questions. If information is missing, say so.\n";

/// Reply assembled for any conversational surface
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgentReply {
    /// Classified intent name; absent for keyword and freeform replies
    pub intent: Option<String>,
    pub summary: String,
    pub steps: Vec<String>,
    pub payload: Option<Value>,
    pub context: Option<MemberContext>,
}

impl AgentReply {
    fn new(summary: impl Into<String>, step: &str) -> Self {
        Self {
            intent: None,
            summary: summary.into(),
            steps: vec![step.to_string()],
            payload: None,
            context: None,
        }
    }

    fn with_context(mut self, ctx: MemberContext) -> Self {
        self.context = Some(ctx);
        self
    }
}

/// Classify a raw prompt as a member identifier.
///
/// Anything containing `@` is an email; a trimmed prompt of six or more digits and
/// nothing else is a phone number.
pub fn identifier_kind(prompt: &str) -> Option<IdentifierKind> {
    let trimmed = prompt.trim();
    if trimmed.contains('@') {
        Some(IdentifierKind::Email)
    } else if trimmed.len() >= 6 && trimmed.chars().all(|c| c.is_ascii_digit()) {
        Some(IdentifierKind::Phone)
    } else {
        None
    }
}

/// Email when the value has an `@`, phone otherwise
fn contact_kind(value: &str) -> IdentifierKind {
    if value.contains('@') {
        IdentifierKind::Email
    } else {
        IdentifierKind::Phone
    }
}

pub struct AgentOrchestrator {
    resolver: Arc<ContextResolver>,
    sessions: Arc<dyn SessionStore>,
    classifier: Arc<dyn IntentClassifier>,
    chat: Arc<dyn ChatModel>,
}

impl AgentOrchestrator {
    pub fn new(
        resolver: Arc<ContextResolver>,
        sessions: Arc<dyn SessionStore>,
        classifier: Arc<dyn IntentClassifier>,
        chat: Arc<dyn ChatModel>,
    ) -> Self {
        Self {
            resolver,
            sessions,
            classifier,
            chat,
        }
    }

    /// Direct resolution; no session involved
    pub async fn lookup(&self, identifier: &str, kind: IdentifierKind) -> Result<MemberContext> {
        self.resolver.resolve(identifier, kind).await
    }

    async fn identify(
        &self,
        session_id: &str,
        identifier: &str,
        kind: IdentifierKind,
    ) -> Result<MemberContext> {
        let ctx = self.resolver.resolve(identifier, kind).await?;
        self.sessions
            .set_user(session_id, &ctx.member_id, ctx.clone())
            .await?;
        info!(target: "agent", %session_id, member_id = %ctx.member_id, %kind, "Session identified");
        Ok(ctx)
    }

    /// Cached context, or identify using the prompt itself
    async fn context_or_identify(
        &self,
        session_id: &str,
        prompt: &str,
    ) -> Result<(MemberContext, bool)> {
        if let Some(ctx) = self.sessions.get_context(session_id).await? {
            return Ok((ctx, false));
        }
        let kind = identifier_kind(prompt).ok_or(TallyError::UserNotIdentified)?;
        debug!(target: "agent", %session_id, %kind, "No cached context; treating prompt as identifier");
        let ctx = self.identify(session_id, prompt.trim(), kind).await?;
        Ok((ctx, true))
    }

    /// Keyword surface. Runs the router against the cached snapshot without refetching.
    pub async fn reason(&self, session_id: &str, prompt: &str) -> Result<AgentReply> {
        let (ctx, identified) = self.context_or_identify(session_id, prompt).await?;
        if identified {
            return Ok(AgentReply::new(greeting(&ctx), "identify_user").with_context(ctx));
        }

        let out = router::reason(prompt, &ctx);
        Ok(AgentReply {
            intent: None,
            summary: out.summary,
            steps: out.steps,
            payload: out.payload,
            context: Some(ctx),
        })
    }

    /// Intent surface. Every non-identify intent re-fetches the cached user first.
    pub async fn converse(&self, session_id: &str, prompt: &str) -> Result<AgentReply> {
        let Some(intent) = self.classifier.classify(prompt).await? else {
            warn!(target: "agent", %session_id, "Could not classify prompt");
            return Ok(AgentReply::new(FALLBACK_REPLY, "fallback"));
        };
        debug!(target: "agent", %session_id, intent = intent.name(), "Classified prompt");

        let ctx = match &intent {
            Intent::IdentifyUser { value } => {
                let value = value.as_deref().ok_or(TallyError::UserNotIdentified)?;
                self.identify(session_id, value, contact_kind(value)).await?
            }
            _ => {
                let user_id = self
                    .sessions
                    .get_user_id(session_id)
                    .await?
                    .ok_or(TallyError::UserNotIdentified)?;
                self.identify(session_id, &user_id, IdentifierKind::UserId)
                    .await?
            }
        };

        let out = answer_intent(&intent, &ctx);
        Ok(AgentReply {
            intent: Some(intent.name().to_string()),
            summary: out.summary,
            steps: out.steps,
            payload: out.payload,
            context: Some(ctx),
        })
    }

    /// Open question answered by the chat model from the serialized context only
    pub async fn freeform(&self, session_id: &str, prompt: &str) -> Result<AgentReply> {
        let (ctx, _) = self.context_or_identify(session_id, prompt).await?;

        let profile = serde_json::to_string_pretty(&ctx)?;
        let messages = vec![
            ChatMessage::system(FREEFORM_SYSTEM_PROMPT),
            ChatMessage::user(format!("Prompt: {prompt}\n\nMemberContext:\n{profile}")),
        ];
        let answer = self.chat.complete(messages).await?;

        Ok(AgentReply::new(answer.trim(), "freeform").with_context(ctx))
    }

    /// Sessionless identification from a free-text message
    pub async fn lookup_from_prompt(&self, prompt: &str) -> Result<AgentReply> {
        let value = match self.classifier.classify(prompt).await? {
            Some(Intent::IdentifyUser { value: Some(value) }) => value,
            _ => {
                return Err(TallyError::Classification(
                    "Could not extract identifier.".to_string(),
                ))
            }
        };
        let ctx = self.resolver.resolve(&value, contact_kind(&value)).await?;
        Ok(AgentReply {
            intent: Some("identify_user".to_string()),
            ..AgentReply::new(greeting(&ctx), "identify_user").with_context(ctx)
        })
    }
}
