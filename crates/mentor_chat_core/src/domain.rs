//! crates/mentor_chat_core/src/domain.rs
//!
//! Defines the pure, core data structures for the chat core.
//! These structs are independent of any database or serialization format.

use chrono::{DateTime, Utc};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Server-assigned handle for one accepted realtime connection.
pub type ConnectionId = Uuid;

/// Separator used when a `PairKey` is rendered as a room name.
pub const PAIR_SEPARATOR: char = '-';

//=========================================================================================
// Identities and Pairs
//=========================================================================================

/// An opaque user identifier (student or mentor). The identity service is the
/// source of truth; this core never interprets the value.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Identity(String);

impl Identity {
    /// Returns `None` for empty or whitespace-only input, which counts as a missing identity.
    pub fn new(raw: impl Into<String>) -> Option<Self> {
        let raw = raw.into();
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_owned()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PairError {
    #[error("A conversation needs two distinct participants, got {0} twice")]
    SameIdentity(Identity),
}

/// Canonical, order-independent key for a two-party relationship.
///
/// The two identities are kept sorted, so `PairKey::new(a, b) == PairKey::new(b, a)`.
/// Equality compares the sorted pair itself rather than the rendered room name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PairKey {
    low: Identity,
    high: Identity,
}

impl PairKey {
    pub fn new(a: Identity, b: Identity) -> Result<Self, PairError> {
        match a.cmp(&b) {
            Ordering::Less => Ok(Self { low: a, high: b }),
            Ordering::Greater => Ok(Self { low: b, high: a }),
            Ordering::Equal => Err(PairError::SameIdentity(a)),
        }
    }

    /// The lexicographically lower identity, stored as the conversation's first party.
    pub fn first(&self) -> &Identity {
        &self.low
    }

    /// The lexicographically higher identity, stored as the conversation's second party.
    pub fn second(&self) -> &Identity {
        &self.high
    }

    /// Builds a pair from raw request fields, treating blank values as missing.
    pub fn from_request(id_a: Option<String>, id_b: Option<String>) -> Result<Self, DraftError> {
        let id_a = required(id_a, "idA")?;
        let id_b = required(id_b, "idB")?;
        Ok(PairKey::new(id_a, id_b)?)
    }

    pub fn contains(&self, identity: &Identity) -> bool {
        &self.low == identity || &self.high == identity
    }
}

impl fmt::Display for PairKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.low, PAIR_SEPARATOR, self.high)
    }
}

//=========================================================================================
// Messages and Conversations
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Text,
    Voice,
}

impl MessageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageKind::Text => "text",
            MessageKind::Voice => "voice",
        }
    }
}

impl FromStr for MessageKind {
    type Err = DraftError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(MessageKind::Text),
            "voice" => Ok(MessageKind::Voice),
            other => Err(DraftError::UnknownKind(other.to_string())),
        }
    }
}

/// The content of a message. A text message carries its text, a voice message
/// carries a reference (usually a URL) to the stored recording.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageBody {
    Text(String),
    Voice(String),
}

impl MessageBody {
    pub fn kind(&self) -> MessageKind {
        match self {
            MessageBody::Text(_) => MessageKind::Text,
            MessageBody::Voice(_) => MessageKind::Voice,
        }
    }

    pub fn text(&self) -> Option<&str> {
        match self {
            MessageBody::Text(text) => Some(text),
            MessageBody::Voice(_) => None,
        }
    }

    pub fn voice_ref(&self) -> Option<&str> {
        match self {
            MessageBody::Voice(voice_ref) => Some(voice_ref),
            MessageBody::Text(_) => None,
        }
    }
}

/// One immutable entry in a conversation's log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub sender_id: Identity,
    pub body: MessageBody,
    pub created_at: DateTime<Utc>,
}

/// The durable message log for one pair of participants.
///
/// `first_party` and `second_party` are fixed when the conversation is created
/// and never swapped.
#[derive(Debug, Clone)]
pub struct Conversation {
    pub id: Uuid,
    pub first_party: Identity,
    pub second_party: Identity,
    pub messages: Vec<Message>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

//=========================================================================================
// Inbound Message Drafts
//=========================================================================================

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DraftError {
    #[error("Missing required field: {0}")]
    MissingField(&'static str),
    #[error(transparent)]
    Pair(#[from] PairError),
    #[error("Sender {0} is not a participant of this conversation")]
    SenderNotInPair(Identity),
    #[error("Unknown message kind: {0}")]
    UnknownKind(String),
    #[error("A {0} message requires a non-empty {1}")]
    MissingPayload(&'static str, &'static str),
}

/// A send-message request exactly as the client supplied it.
#[derive(Debug, Clone, Default)]
pub struct MessageDraft {
    pub id_a: Option<String>,
    pub id_b: Option<String>,
    pub sender_id: Option<String>,
    pub kind: Option<String>,
    pub text: Option<String>,
    pub voice_ref: Option<String>,
}

/// A draft that passed validation and is ready to be stamped and persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedMessage {
    pub pair: PairKey,
    pub sender_id: Identity,
    pub body: MessageBody,
}

impl ValidatedMessage {
    /// Stamps the message with the server clock. Client timestamps are never used.
    pub fn into_message(self, created_at: DateTime<Utc>) -> (PairKey, Message) {
        let message = Message {
            sender_id: self.sender_id,
            body: self.body,
            created_at,
        };
        (self.pair, message)
    }
}

impl MessageDraft {
    pub fn validate(self) -> Result<ValidatedMessage, DraftError> {
        let pair = PairKey::from_request(self.id_a, self.id_b)?;
        let sender_id = required(self.sender_id, "senderId")?;
        if !pair.contains(&sender_id) {
            return Err(DraftError::SenderNotInPair(sender_id));
        }

        let kind = match self.kind.as_deref().map(str::trim) {
            None | Some("") => MessageKind::Text,
            Some(kind) => kind.parse()?,
        };

        let body = match kind {
            MessageKind::Text => MessageBody::Text(
                non_empty(self.text).ok_or(DraftError::MissingPayload("text", "text"))?,
            ),
            MessageKind::Voice => MessageBody::Voice(
                non_empty(self.voice_ref).ok_or(DraftError::MissingPayload("voice", "voiceRef"))?,
            ),
        };

        Ok(ValidatedMessage {
            pair,
            sender_id,
            body,
        })
    }
}

/// Parses a required identity field, treating blank values as missing.
pub fn required(value: Option<String>, field: &'static str) -> Result<Identity, DraftError> {
    value
        .and_then(Identity::new)
        .ok_or(DraftError::MissingField(field))
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
