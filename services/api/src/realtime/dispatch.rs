//! services/api/src/realtime/dispatch.rs
//!
//! Routes each client event to the presence registry, the room router, the
//! signalling relay or the message pipeline. Nothing here fails across the realtime
//! boundary: rejected requests are answered on the originating connection only.

use mentor_chat_core::domain::{required, Identity, PairKey};
use tracing::{info, warn};

use super::{Connection, Realtime, RelayError, Signal};
use crate::web::protocol::{ClientMessage, ServerMessage, TypingPayload};

impl Realtime {
    /// Handles one decoded client event for `connection`.
    pub async fn handle_client_message(&self, connection: &Connection, message: ClientMessage) {
        match message {
            ClientMessage::UserOnline(payload) => {
                match payload.into_identity().and_then(Identity::new) {
                    Some(identity) if identity == connection.identity => {
                        self.mark_online(connection).await;
                    }
                    Some(identity) => {
                        self.report_error(
                            connection,
                            format!("Cannot announce {} from this session", identity),
                        )
                        .await;
                    }
                    None => self.report_error(connection, "userOnline requires an identity").await,
                }
            }
            ClientMessage::JoinRoom(pair) => {
                let room = match self.participant_pair(connection, pair.id_a, pair.id_b) {
                    Ok(room) => room,
                    Err(reason) => return self.report_error(connection, reason).await,
                };
                match self.rooms.join(connection.id, room.first(), room.second()).await {
                    Ok(room) => info!("Connection {} joined room {}", connection.id, room),
                    Err(e) => self.report_error(connection, e.to_string()).await,
                }
            }
            ClientMessage::Typing(payload) => self.handle_typing(connection, payload).await,
            ClientMessage::Offer(data) => {
                self.relay_signal(connection, Signal::Offer(data)).await;
            }
            ClientMessage::Answer(data) => {
                self.relay_signal(connection, Signal::Answer(data)).await;
            }
            ClientMessage::Candidate(data) => {
                self.relay_signal(connection, Signal::Candidate(data)).await;
            }
            ClientMessage::EndCall => {
                self.relay_signal(connection, Signal::EndCall).await;
            }
            ClientMessage::SendMessage(payload) => {
                let (draft, client_ref) = payload.into_parts();
                match self.send_message(draft, &connection.identity).await {
                    Ok(_) => {
                        if let Some(client_ref) = client_ref {
                            self.hub
                                .send_to(connection.id, ServerMessage::MessageAck { client_ref })
                                .await;
                        }
                    }
                    Err(RelayError::Persistence(_)) => {
                        let failed = ServerMessage::MessageFailed {
                            client_ref,
                            reason: "The message could not be stored. Please resend it.".to_string(),
                        };
                        self.hub.send_to(connection.id, failed).await;
                    }
                    Err(e) => self.report_error(connection, e.to_string()).await,
                }
            }
        }
    }

    /// Answers a rejected request on the connection that sent it.
    pub async fn report_error(&self, connection: &Connection, reason: impl Into<String>) {
        let reason = reason.into();
        warn!("Rejected request from connection {}: {}", connection.id, reason);
        self.hub
            .send_to(connection.id, ServerMessage::error(reason))
            .await;
    }

    async fn handle_typing(&self, connection: &Connection, payload: TypingPayload) {
        let room = match self.participant_pair(connection, payload.id_a, payload.id_b) {
            Ok(room) => room,
            Err(reason) => return self.report_error(connection, reason).await,
        };
        let sender = match required(payload.sender_id, "senderId") {
            Ok(sender) => sender,
            Err(e) => return self.report_error(connection, e.to_string()).await,
        };
        if sender != connection.identity {
            return self
                .report_error(connection, format!("Cannot type as {} from this session", sender))
                .await;
        }
        self.relay_typing(connection, &room, &sender, payload.is_typing)
            .await;
    }

    /// Parses a pair from an event and checks the connection's identity is part of it.
    fn participant_pair(
        &self,
        connection: &Connection,
        id_a: Option<String>,
        id_b: Option<String>,
    ) -> Result<PairKey, String> {
        let pair = PairKey::from_request(id_a, id_b).map_err(|e| e.to_string())?;
        if !pair.contains(&connection.identity) {
            return Err(format!(
                "{} is not a participant of {}",
                connection.identity, pair
            ));
        }
        Ok(pair)
    }
}
