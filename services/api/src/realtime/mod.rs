//! services/api/src/realtime/mod.rs
//!
//! The realtime chat core. `Realtime` wires the connection hub to the presence
//! registry, the room router and the conversation store; the signalling relay, the
//! message pipeline and the event dispatcher are implemented on it in the
//! submodules.

pub mod dispatch;
pub mod hub;
pub mod pipeline;
pub mod signaling;

pub use hub::ConnectionHub;
pub use pipeline::RelayError;
pub use signaling::Signal;

use std::sync::Arc;

use mentor_chat_core::domain::{ConnectionId, Identity};
use mentor_chat_core::ports::ConversationStore;
use mentor_chat_core::presence::PresenceRegistry;
use mentor_chat_core::rooms::RoomRouter;
use tokio::sync::{mpsc::UnboundedReceiver, Mutex};
use tracing::debug;
use uuid::Uuid;

use crate::web::protocol::ServerMessage;

/// One accepted realtime connection and the identity it was authenticated as.
#[derive(Debug, Clone)]
pub struct Connection {
    pub id: ConnectionId,
    pub identity: Identity,
}

pub struct Realtime {
    hub: ConnectionHub,
    presence: PresenceRegistry,
    rooms: RoomRouter,
    store: Arc<dyn ConversationStore>,
    /// Held across a presence change and its broadcast, so snapshots are queued in
    /// the order the registry produced them.
    presence_order: Mutex<()>,
}

impl Realtime {
    pub fn new(store: Arc<dyn ConversationStore>) -> Self {
        Self {
            hub: ConnectionHub::new(),
            presence: PresenceRegistry::new(),
            rooms: RoomRouter::new(),
            store,
            presence_order: Mutex::new(()),
        }
    }

    pub fn hub(&self) -> &ConnectionHub {
        &self.hub
    }

    pub fn presence(&self) -> &PresenceRegistry {
        &self.presence
    }

    pub fn rooms(&self) -> &RoomRouter {
        &self.rooms
    }

    /// Accepts a connection and returns the queue of events destined for it.
    pub async fn connect(&self, identity: Identity) -> (Connection, UnboundedReceiver<ServerMessage>) {
        let connection = Connection {
            id: Uuid::new_v4(),
            identity,
        };
        let outbound = self.hub.register(connection.id).await;
        (connection, outbound)
    }

    /// Binds the connection's identity in the presence registry and broadcasts the
    /// new snapshot to every connection.
    pub async fn mark_online(&self, connection: &Connection) {
        let _order = self.presence_order.lock().await;
        let snapshot = self
            .presence
            .mark_online(connection.identity.clone(), connection.id)
            .await;
        self.hub.broadcast_all(&ServerMessage::presence(snapshot)).await;
    }

    /// Tears down everything the connection held. Safe to call more than once.
    pub async fn disconnect(&self, connection: &Connection) {
        self.hub.unregister(connection.id).await;
        if let Some(room) = self.rooms.disconnect(connection.id).await {
            debug!(
                "Connection {} left room {}; {} room(s) open",
                connection.id,
                room,
                self.rooms.room_count().await
            );
        }
        let _order = self.presence_order.lock().await;
        if let Some(snapshot) = self.presence.mark_offline(connection.id).await {
            self.hub.broadcast_all(&ServerMessage::presence(snapshot)).await;
        }
    }
}
