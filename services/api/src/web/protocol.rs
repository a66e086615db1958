//! services/api/src/web/protocol.rs
//!
//! Defines the WebSocket message protocol between the browser client and the chat
//! server. Every frame is a JSON text frame of the form `{"event": ..., "data": ...}`.

use chrono::{DateTime, Utc};
use mentor_chat_core::domain::{ConnectionId, Message, MessageDraft};
use mentor_chat_core::presence::PresenceSnapshot;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use utoipa::ToSchema;

//=========================================================================================
// Messages Sent FROM the Client (Browser) TO the Server
//=========================================================================================
// Call negotiation payloads (offer/answer/candidate) are opaque to the server and are
// carried as raw JSON values.
//=========================================================================================

/// Represents the structured text messages a client can send to the server.
#[derive(Deserialize, Debug)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ClientMessage {
    /// Announces the identity behind this connection.
    UserOnline(UserOnlinePayload),

    /// Joins the room of a two-party conversation.
    JoinRoom(PairPayload),

    /// Typing indicator; the client debounces and sends `isTyping: false` itself.
    Typing(TypingPayload),

    Offer(Value),
    Answer(Value),
    Candidate(Value),
    EndCall,

    /// Persists a message and broadcasts it to the room.
    SendMessage(SendMessagePayload),
}

/// `userOnline` accepts either a bare identity string or `{"identity": ...}`.
#[derive(Deserialize, Debug)]
#[serde(untagged)]
pub enum UserOnlinePayload {
    Bare(String),
    Object { identity: Option<String> },
}

impl UserOnlinePayload {
    pub fn into_identity(self) -> Option<String> {
        match self {
            UserOnlinePayload::Bare(identity) => Some(identity),
            UserOnlinePayload::Object { identity } => identity,
        }
    }
}

/// The two parties of a conversation. `mentorId`/`userId` are accepted as aliases.
#[derive(Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct PairPayload {
    #[serde(alias = "mentorId")]
    pub id_a: Option<String>,
    #[serde(alias = "userId")]
    pub id_b: Option<String>,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct TypingPayload {
    #[serde(alias = "mentorId")]
    pub id_a: Option<String>,
    #[serde(alias = "userId")]
    pub id_b: Option<String>,
    pub sender_id: Option<String>,
    #[serde(default)]
    pub is_typing: bool,
}

/// A send-message request, used by both the WebSocket and the REST endpoint.
#[derive(Deserialize, Debug, Clone, Default, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SendMessagePayload {
    #[serde(alias = "mentorId")]
    pub id_a: Option<String>,
    #[serde(alias = "userId")]
    pub id_b: Option<String>,
    pub sender_id: Option<String>,
    pub text: Option<String>,
    /// `text` (default) or `voice`.
    #[serde(alias = "type")]
    pub kind: Option<String>,
    /// Reference to the stored recording of a voice message.
    #[serde(alias = "voiceUrl")]
    pub voice_ref: Option<String>,
    /// Opaque client token echoed back in `messageAck` / `messageFailed`.
    pub client_ref: Option<String>,
}

impl SendMessagePayload {
    pub fn into_parts(self) -> (MessageDraft, Option<String>) {
        let draft = MessageDraft {
            id_a: self.id_a,
            id_b: self.id_b,
            sender_id: self.sender_id,
            kind: self.kind,
            text: self.text,
            voice_ref: self.voice_ref,
        };
        (draft, self.client_ref)
    }
}

//=========================================================================================
// Messages Sent FROM the Server TO the Client (Browser)
//=========================================================================================

/// A persisted message as it is shown to clients.
#[derive(Serialize, Debug, Clone, PartialEq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MessagePayload {
    pub sender_id: String,
    /// `text` or `voice`.
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voice_ref: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<&Message> for MessagePayload {
    fn from(message: &Message) -> Self {
        Self {
            sender_id: message.sender_id.to_string(),
            kind: message.body.kind().as_str().to_string(),
            text: message.body.text().map(str::to_string),
            voice_ref: message.body.voice_ref().map(str::to_string),
            created_at: message.created_at,
        }
    }
}

/// Represents the structured text messages the server can send to the client.
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ServerMessage {
    /// The full identity → connection presence map.
    UpdateOnlineStatus(BTreeMap<String, ConnectionId>),

    #[serde(rename_all = "camelCase")]
    DisplayTyping { sender_id: String, is_typing: bool },

    ReceiveMessage(MessagePayload),

    Offer(Value),
    Answer(Value),
    Candidate(Value),
    EndCall,

    /// Sent to the sender only, after the message was stored and broadcast.
    #[serde(rename_all = "camelCase")]
    MessageAck { client_ref: String },

    /// Sent to the sender only when the message could not be stored.
    #[serde(rename_all = "camelCase")]
    MessageFailed {
        client_ref: Option<String>,
        reason: String,
    },

    /// Reports a rejected request to the connection that sent it.
    Error { message: String },
}

impl ServerMessage {
    pub fn presence(snapshot: PresenceSnapshot) -> Self {
        ServerMessage::UpdateOnlineStatus(
            snapshot
                .into_iter()
                .map(|(identity, connection)| (identity.to_string(), connection))
                .collect(),
        )
    }

    pub fn error(message: impl Into<String>) -> Self {
        ServerMessage::Error {
            message: message.into(),
        }
    }
}
