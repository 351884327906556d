use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;
use pcksim_schema::{ConversationSession, SessionListing};
use tokio::sync::RwLock;

use crate::{sort_newest_first, SessionStore};

/// Process-local store; nothing survives the process.
#[derive(Default)]
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<String, ConversationSession>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn save_session(&self, session: &ConversationSession) -> Result<()> {
        self.sessions
            .write()
            .await
            .insert(session.session_id.clone(), session.clone());
        Ok(())
    }

    async fn load_session(&self, id: &str) -> Result<Option<ConversationSession>> {
        Ok(self.sessions.read().await.get(id).cloned())
    }

    async fn list_sessions(&self) -> Result<Vec<SessionListing>> {
        let mut listings: Vec<SessionListing> = self
            .sessions
            .read()
            .await
            .values()
            .map(SessionListing::from)
            .collect();
        sort_newest_first(&mut listings);
        Ok(listings)
    }

    async fn delete_session(&self, id: &str) -> Result<bool> {
        Ok(self.sessions.write().await.remove(id).is_some())
    }
}
