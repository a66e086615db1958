//! services/api/src/realtime/hub.rs
//!
//! The outbound side of every live connection. Each connection owns an unbounded
//! queue that its writer task drains into the WebSocket.

use std::collections::HashMap;

use mentor_chat_core::domain::ConnectionId;
use tokio::sync::{mpsc, RwLock};
use tracing::debug;

use crate::web::protocol::ServerMessage;

#[derive(Default)]
pub struct ConnectionHub {
    senders: RwLock<HashMap<ConnectionId, mpsc::UnboundedSender<ServerMessage>>>,
}

impl ConnectionHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a connection and hands back the receiving end of its queue.
    pub async fn register(&self, connection: ConnectionId) -> mpsc::UnboundedReceiver<ServerMessage> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.senders.write().await.insert(connection, tx);
        rx
    }

    pub async fn unregister(&self, connection: ConnectionId) -> bool {
        self.senders.write().await.remove(&connection).is_some()
    }

    /// Queues a message for one connection. Returns `false` when it is gone.
    pub async fn send_to(&self, connection: ConnectionId, message: ServerMessage) -> bool {
        match self.senders.read().await.get(&connection) {
            Some(tx) => tx.send(message).is_ok(),
            None => {
                debug!("Dropping message for unknown connection {}", connection);
                false
            }
        }
    }

    /// Queues a message for each listed connection and returns how many accepted it.
    pub async fn send_to_many(&self, connections: &[ConnectionId], message: &ServerMessage) -> usize {
        let senders = self.senders.read().await;
        connections
            .iter()
            .filter_map(|connection| senders.get(connection))
            .filter(|tx| tx.send(message.clone()).is_ok())
            .count()
    }

    /// Queues a message for every live connection.
    pub async fn broadcast_all(&self, message: &ServerMessage) -> usize {
        let senders = self.senders.read().await;
        senders
            .values()
            .filter(|tx| tx.send(message.clone()).is_ok())
            .count()
    }

    pub async fn connection_count(&self) -> usize {
        self.senders.read().await.len()
    }
}
