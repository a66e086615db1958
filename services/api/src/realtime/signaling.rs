//! services/api/src/realtime/signaling.rs
//!
//! Call negotiation relay. Payloads are forwarded verbatim between the members of
//! a room; the server keeps no call state of its own.

use mentor_chat_core::domain::{Identity, PairKey};
use serde_json::Value;
use tracing::debug;

use super::{Connection, Realtime};
use crate::web::protocol::ServerMessage;

#[derive(Debug, Clone, PartialEq)]
pub enum Signal {
    Offer(Value),
    Answer(Value),
    Candidate(Value),
    EndCall,
}

impl Signal {
    fn name(&self) -> &'static str {
        match self {
            Signal::Offer(_) => "offer",
            Signal::Answer(_) => "answer",
            Signal::Candidate(_) => "candidate",
            Signal::EndCall => "endCall",
        }
    }

    fn into_server_message(self) -> ServerMessage {
        match self {
            Signal::Offer(data) => ServerMessage::Offer(data),
            Signal::Answer(data) => ServerMessage::Answer(data),
            Signal::Candidate(data) => ServerMessage::Candidate(data),
            Signal::EndCall => ServerMessage::EndCall,
        }
    }
}

impl Realtime {
    /// Forwards `signal` to every other member of the sender's room and returns how
    /// many connections received it. A connection that never joined a room is ignored.
    pub async fn relay_signal(&self, from: &Connection, signal: Signal) -> usize {
        let Some((room, peers)) = self.rooms.peers_of(from.id).await else {
            debug!("Dropping {} from connection {} without a room", signal.name(), from.id);
            return 0;
        };

        let name = signal.name();
        let delivered = self
            .hub
            .send_to_many(&peers, &signal.into_server_message())
            .await;
        debug!("Relayed {} in room {} to {} peer(s)", name, room, delivered);
        delivered
    }

    /// Shows `sender`'s typing state to the other members of the pair's room.
    pub async fn relay_typing(
        &self,
        from: &Connection,
        room: &PairKey,
        sender: &Identity,
        is_typing: bool,
    ) -> usize {
        let peers = self.rooms.members_except(room, from.id).await;
        let message = ServerMessage::DisplayTyping {
            sender_id: sender.to_string(),
            is_typing,
        };
        self.hub.send_to_many(&peers, &message).await
    }
}
