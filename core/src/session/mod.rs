//! Session-scoped conversational state.
//!
//! One entry per session id holding the identified user and a snapshot of their
//! context. Entries are replaced wholesale on every re-resolution and never expire.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::context::MemberContext;
use crate::Result;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionEntry {
    pub user_id: String,
    pub context: MemberContext,
    /// Informational only; entries do not expire
    pub updated_at: DateTime<Utc>,
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn get(&self, session_id: &str) -> Result<Option<SessionEntry>>;

    /// Replace the entry for `session_id`; last write wins
    async fn set_user(&self, session_id: &str, user_id: &str, context: MemberContext)
        -> Result<()>;

    async fn get_user_id(&self, session_id: &str) -> Result<Option<String>> {
        Ok(self.get(session_id).await?.map(|entry| entry.user_id))
    }

    async fn get_context(&self, session_id: &str) -> Result<Option<MemberContext>> {
        Ok(self.get(session_id).await?.map(|entry| entry.context))
    }
}

/// Process-local store; state is lost on restart.
#[derive(Default)]
pub struct InMemorySessionStore {
    entries: DashMap<String, SessionEntry>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn remove(&self, session_id: &str) -> Option<SessionEntry> {
        self.entries.remove(session_id).map(|(_, entry)| entry)
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn get(&self, session_id: &str) -> Result<Option<SessionEntry>> {
        Ok(self.entries.get(session_id).map(|entry| entry.value().clone()))
    }

    async fn set_user(
        &self,
        session_id: &str,
        user_id: &str,
        context: MemberContext,
    ) -> Result<()> {
        debug!(target: "agent", %session_id, %user_id, "Caching member context for session");
        self.entries.insert(
            session_id.to_string(),
            SessionEntry {
                user_id: user_id.to_string(),
                context,
                updated_at: Utc::now(),
            },
        );
        Ok(())
    }
}
