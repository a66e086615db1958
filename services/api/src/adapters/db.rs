//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, the concrete implementation of the
//! `ConversationStore` and `IdentityService` ports from the `core` crate. It handles
//! all interactions with the PostgreSQL database using `sqlx`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mentor_chat_core::domain::{Conversation, Identity, Message, MessageBody, MessageKind, PairKey};
use mentor_chat_core::ports::{ConversationStore, IdentityService, PortError, PortResult};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the chat core's ports.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::Error> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

fn unexpected(e: sqlx::Error) -> PortError {
    PortError::Unexpected(e.to_string())
}

fn stored_identity(raw: String) -> PortResult<Identity> {
    Identity::new(raw).ok_or_else(|| PortError::Unexpected("Blank identity stored".to_string()))
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct ConversationRecord {
    id: Uuid,
    first_party: String,
    second_party: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}
impl ConversationRecord {
    fn to_domain(self, messages: Vec<Message>) -> PortResult<Conversation> {
        Ok(Conversation {
            id: self.id,
            first_party: stored_identity(self.first_party)?,
            second_party: stored_identity(self.second_party)?,
            messages,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(FromRow)]
struct MessageRecord {
    sender_id: String,
    kind: String,
    text: Option<String>,
    voice_ref: Option<String>,
    created_at: DateTime<Utc>,
}
impl MessageRecord {
    fn to_domain(self) -> PortResult<Message> {
        let kind: MessageKind = self
            .kind
            .parse()
            .map_err(|e| PortError::Unexpected(format!("Corrupt message row: {}", e)))?;
        let body = match (kind, self.text, self.voice_ref) {
            (MessageKind::Text, Some(text), _) => MessageBody::Text(text),
            (MessageKind::Voice, _, Some(voice_ref)) => MessageBody::Voice(voice_ref),
            (kind, _, _) => {
                return Err(PortError::Unexpected(format!(
                    "Corrupt message row: {} message without payload",
                    kind.as_str()
                )))
            }
        };
        Ok(Message {
            sender_id: stored_identity(self.sender_id)?,
            body,
            created_at: self.created_at,
        })
    }
}

//=========================================================================================
// `ConversationStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl ConversationStore for DbAdapter {
    async fn append_message(&self, pair: &PairKey, message: Message) -> PortResult<Message> {
        let mut tx = self.pool.begin().await.map_err(unexpected)?;

        // The unique (first_party, second_party) index serialises concurrent upserts,
        // so racing senders always land on the same conversation row.
        let (conversation_id,): (Uuid,) = sqlx::query_as(
            "INSERT INTO conversations (id, first_party, second_party, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $4) \
             ON CONFLICT (first_party, second_party) DO UPDATE SET updated_at = EXCLUDED.updated_at \
             RETURNING id",
        )
        .bind(Uuid::new_v4())
        .bind(pair.first().as_str())
        .bind(pair.second().as_str())
        .bind(message.created_at)
        .fetch_one(&mut *tx)
        .await
        .map_err(unexpected)?;

        let record: MessageRecord = sqlx::query_as(
            "INSERT INTO chat_messages (conversation_id, sender_id, kind, text, voice_ref, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             RETURNING sender_id, kind, text, voice_ref, created_at",
        )
        .bind(conversation_id)
        .bind(message.sender_id.as_str())
        .bind(message.body.kind().as_str())
        .bind(message.body.text())
        .bind(message.body.voice_ref())
        .bind(message.created_at)
        .fetch_one(&mut *tx)
        .await
        .map_err(unexpected)?;

        tx.commit().await.map_err(unexpected)?;
        record.to_domain()
    }

    async fn get_conversation(&self, pair: &PairKey) -> PortResult<Option<Conversation>> {
        let Some(conversation) = sqlx::query_as::<_, ConversationRecord>(
            "SELECT id, first_party, second_party, created_at, updated_at FROM conversations \
             WHERE first_party = $1 AND second_party = $2",
        )
        .bind(pair.first().as_str())
        .bind(pair.second().as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?
        else {
            return Ok(None);
        };

        let records = sqlx::query_as::<_, MessageRecord>(
            "SELECT sender_id, kind, text, voice_ref, created_at FROM chat_messages \
             WHERE conversation_id = $1 ORDER BY seq ASC",
        )
        .bind(conversation.id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;

        let messages = records
            .into_iter()
            .map(MessageRecord::to_domain)
            .collect::<PortResult<Vec<_>>>()?;
        conversation.to_domain(messages).map(Some)
    }
}

//=========================================================================================
// `IdentityService` Trait Implementation
//=========================================================================================

#[async_trait]
impl IdentityService for DbAdapter {
    async fn validate_auth_session(&self, session_id: &str) -> PortResult<Identity> {
        let row: Option<(String,)> = sqlx::query_as(
            "SELECT user_id FROM auth_sessions WHERE id = $1 AND expires_at > NOW()",
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;

        match row {
            Some((user_id,)) => stored_identity(user_id),
            None => Err(PortError::Unauthorized),
        }
    }
}
