//! crates/mentor_chat_core/src/ports.rs
//!
//! Defines the service contracts (traits) the chat core depends on.
//! These traits form the boundary of the hexagonal architecture, keeping the core
//! independent of the concrete database and of the identity service.

use async_trait::async_trait;

use crate::domain::{Conversation, Identity, Message, PairKey};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, network).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
    #[error("Unauthorized")]
    Unauthorized,
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

/// Durable storage for two-party conversations.
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Finds or creates the conversation for `pair` and appends `message` to its log
    /// as one atomic operation. Concurrent calls for the same pair must never create
    /// two conversations or lose a message.
    ///
    /// Returns the message as it was persisted.
    async fn append_message(&self, pair: &PairKey, message: Message) -> PortResult<Message>;

    /// Loads the conversation for `pair` with its messages in persistence order.
    async fn get_conversation(&self, pair: &PairKey) -> PortResult<Option<Conversation>>;
}

/// The identity collaborator. Login sessions are issued elsewhere; the chat core
/// only resolves them.
#[async_trait]
pub trait IdentityService: Send + Sync {
    /// Resolves a login session id into the identity that owns it.
    async fn validate_auth_session(&self, session_id: &str) -> PortResult<Identity>;
}
