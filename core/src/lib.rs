// Tally Core Library
// Loyalty member context resolution and intent routing

pub mod agent;
pub mod config;
pub mod context;
pub mod intent;
pub mod llm;
pub mod router;
pub mod session;
pub mod telemetry;
pub mod upstream;

// Export core types
pub use agent::{AgentOrchestrator, AgentReply};
pub use config::TallyConfig;
pub use context::{ContextResolver, IdentifierKind, MemberContext};
pub use intent::{Intent, IntentClassifier, LlmIntentClassifier};
pub use llm::{ChatMessage, ChatModel, LlmClient};
pub use router::{ToolKind, ToolOutput};
pub use session::{InMemorySessionStore, SessionEntry, SessionStore};
pub use upstream::{Resource, UpstreamApi, UpstreamClient};

use std::sync::Arc;

// Error types
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TallyError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Upstream {resource} request failed (status: {}): {body}", display_status(.status))]
    Upstream {
        resource: Resource,
        status: Option<u16>,
        body: String,
    },

    #[error("User not identified. Please provide an email or phone.")]
    UserNotIdentified,

    #[error("Classification failed: {0}")]
    Classification(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl TallyError {
    pub(crate) fn upstream(resource: Resource, status: Option<u16>, body: impl Into<String>) -> Self {
        TallyError::Upstream {
            resource,
            status,
            body: body.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, TallyError>;

fn display_status(status: &Option<u16>) -> String {
    status
        .map(|s| s.to_string())
        .unwrap_or_else(|| "none".to_string())
}

/// Core runtime: every component wired from one configuration
pub struct Tally {
    pub sessions: Arc<dyn SessionStore>,
    pub resolver: Arc<ContextResolver>,
    pub orchestrator: Arc<AgentOrchestrator>,
}

impl Tally {
    pub fn new(config: &TallyConfig) -> Result<Self> {
        let upstream: Arc<dyn UpstreamApi> =
            Arc::new(UpstreamClient::new(config.upstream.clone())?);
        let chat: Arc<dyn ChatModel> = Arc::new(LlmClient::new(config.llm.clone())?);
        Ok(Self::with_parts(
            upstream,
            chat,
            Arc::new(InMemorySessionStore::new()),
        ))
    }

    /// Assemble the runtime from explicit collaborators
    pub fn with_parts(
        upstream: Arc<dyn UpstreamApi>,
        chat: Arc<dyn ChatModel>,
        sessions: Arc<dyn SessionStore>,
    ) -> Self {
        let resolver = Arc::new(ContextResolver::new(upstream));
        let classifier: Arc<dyn IntentClassifier> =
            Arc::new(LlmIntentClassifier::new(Arc::clone(&chat)));
        let orchestrator = Arc::new(AgentOrchestrator::new(
            Arc::clone(&resolver),
            Arc::clone(&sessions),
            classifier,
            chat,
        ));

        tracing::info!("Tally core assembled");

        Self {
            sessions,
            resolver,
            orchestrator,
        }
    }
}
