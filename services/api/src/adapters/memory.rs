//! services/api/src/adapters/memory.rs
//!
//! An in-process implementation of the chat core's ports. Every operation runs under
//! a single lock, so the find-or-create-then-append contract holds trivially.
//! Used by the test suites and for running the realtime core without PostgreSQL.

use async_trait::async_trait;
use chrono::Utc;
use mentor_chat_core::domain::{Conversation, Identity, Message, PairKey};
use mentor_chat_core::ports::{ConversationStore, IdentityService, PortError, PortResult};
use std::collections::HashMap;
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

#[derive(Default)]
pub struct MemoryAdapter {
    conversations: Mutex<HashMap<PairKey, Conversation>>,
    sessions: RwLock<HashMap<String, Identity>>,
}

impl MemoryAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a login session, standing in for the external auth service.
    pub async fn insert_session(&self, session_id: impl Into<String>, identity: Identity) {
        self.sessions.write().await.insert(session_id.into(), identity);
    }

    pub async fn conversation_count(&self) -> usize {
        self.conversations.lock().await.len()
    }
}

#[async_trait]
impl ConversationStore for MemoryAdapter {
    async fn append_message(&self, pair: &PairKey, message: Message) -> PortResult<Message> {
        let mut conversations = self.conversations.lock().await;
        let conversation = conversations
            .entry(pair.clone())
            .or_insert_with(|| Conversation {
                id: Uuid::new_v4(),
                first_party: pair.first().clone(),
                second_party: pair.second().clone(),
                messages: Vec::new(),
                created_at: message.created_at,
                updated_at: message.created_at,
            });
        conversation.messages.push(message.clone());
        conversation.updated_at = Utc::now();
        Ok(message)
    }

    async fn get_conversation(&self, pair: &PairKey) -> PortResult<Option<Conversation>> {
        Ok(self.conversations.lock().await.get(pair).cloned())
    }
}

#[async_trait]
impl IdentityService for MemoryAdapter {
    async fn validate_auth_session(&self, session_id: &str) -> PortResult<Identity> {
        self.sessions
            .read()
            .await
            .get(session_id)
            .cloned()
            .ok_or(PortError::Unauthorized)
    }
}
