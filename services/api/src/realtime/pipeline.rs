//! services/api/src/realtime/pipeline.rs
//!
//! The message relay and persistence pipeline: validate, persist, then broadcast the
//! persisted message to the whole room, sender included. A broadcast is therefore
//! only ever observed for a message that is already stored.

use chrono::Utc;
use mentor_chat_core::domain::{DraftError, Identity, Message, MessageDraft, PairKey};
use mentor_chat_core::ports::{PortError, PortResult};
use tracing::{error, info};

use super::Realtime;
use crate::web::protocol::{MessagePayload, ServerMessage};

#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("Malformed message: {0}")]
    Malformed(#[from] DraftError),

    /// The message names a sender other than the authenticated caller.
    #[error("Sender {0} does not match the authenticated user")]
    Forbidden(Identity),

    #[error("Message could not be stored: {0}")]
    Persistence(#[source] PortError),
}

impl Realtime {
    /// Runs a send-message request authored by `author` through the pipeline and
    /// returns the persisted message.
    ///
    /// On persistence failure nothing is broadcast. The write is never cancelled once
    /// started, even if the sender disconnects in the meantime.
    pub async fn send_message(&self, draft: MessageDraft, author: &Identity) -> Result<Message, RelayError> {
        let validated = draft.validate()?;
        if &validated.sender_id != author {
            return Err(RelayError::Forbidden(validated.sender_id));
        }

        let (pair, message) = validated.into_message(Utc::now());
        let stored = match self.store.append_message(&pair, message).await {
            Ok(stored) => stored,
            Err(e) => {
                error!("Failed to persist message in {}: {}", pair, e);
                return Err(RelayError::Persistence(e));
            }
        };

        let members = self.rooms.members(&pair).await;
        let delivered = self
            .hub
            .send_to_many(&members, &ServerMessage::ReceiveMessage(MessagePayload::from(&stored)))
            .await;
        info!(
            "Stored {} message from {} in {}; delivered to {} connection(s)",
            stored.body.kind().as_str(),
            stored.sender_id,
            pair,
            delivered
        );

        Ok(stored)
    }

    /// The pair's messages in persistence order, or an empty list when the two have
    /// never talked.
    pub async fn history(&self, pair: &PairKey) -> PortResult<Vec<Message>> {
        Ok(self
            .store
            .get_conversation(pair)
            .await?
            .map(|conversation| conversation.messages)
            .unwrap_or_default())
    }
}
