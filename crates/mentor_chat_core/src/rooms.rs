//! crates/mentor_chat_core/src/rooms.rs
//!
//! Room routing. A room is the ephemeral broadcast group of connections for one
//! pair of participants, and its id is the pair's `PairKey`.

use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};

use tokio::sync::RwLock;
use tracing::debug;

use crate::domain::{ConnectionId, Identity, PairError, PairKey};

/// Computes the canonical room id for two identities. Symmetric in its arguments.
pub fn compute_room_id(id_a: &Identity, id_b: &Identity) -> Result<PairKey, PairError> {
    PairKey::new(id_a.clone(), id_b.clone())
}

#[derive(Debug, Default)]
struct RoomTable {
    members: HashMap<PairKey, HashSet<ConnectionId>>,
    /// RoomMembership records: the single room each connection currently belongs to.
    memberships: HashMap<ConnectionId, PairKey>,
}

impl RoomTable {
    fn detach(&mut self, connection: ConnectionId) -> Option<PairKey> {
        let room = self.memberships.remove(&connection)?;
        if let Entry::Occupied(mut entry) = self.members.entry(room.clone()) {
            entry.get_mut().remove(&connection);
            if entry.get().is_empty() {
                entry.remove();
            }
        }
        Some(room)
    }
}

/// Owns room membership. Nothing else mutates the room table.
#[derive(Debug, Default)]
pub struct RoomRouter {
    table: RwLock<RoomTable>,
}

impl RoomRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Puts `connection` into the room for the pair, replacing any previous room.
    pub async fn join(
        &self,
        connection: ConnectionId,
        id_a: &Identity,
        id_b: &Identity,
    ) -> Result<PairKey, PairError> {
        let room = compute_room_id(id_a, id_b)?;

        let mut table = self.table.write().await;
        if let Some(previous) = table.detach(connection) {
            if previous != room {
                debug!("Connection {} moves from room {} to {}", connection, previous, room);
            }
        }
        table
            .members
            .entry(room.clone())
            .or_default()
            .insert(connection);
        table.memberships.insert(connection, room.clone());

        Ok(room)
    }

    pub async fn room_of(&self, connection: ConnectionId) -> Option<PairKey> {
        self.table.read().await.memberships.get(&connection).cloned()
    }

    pub async fn members(&self, room: &PairKey) -> Vec<ConnectionId> {
        self.table
            .read()
            .await
            .members
            .get(room)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    pub async fn members_except(&self, room: &PairKey, connection: ConnectionId) -> Vec<ConnectionId> {
        self.table
            .read()
            .await
            .members
            .get(room)
            .map(|set| set.iter().copied().filter(|c| *c != connection).collect())
            .unwrap_or_default()
    }

    /// The connection's room and every other member of it, read under one lock.
    /// `None` when the connection has not joined a room.
    pub async fn peers_of(&self, connection: ConnectionId) -> Option<(PairKey, Vec<ConnectionId>)> {
        let table = self.table.read().await;
        let room = table.memberships.get(&connection)?;
        let peers = table
            .members
            .get(room)
            .map(|set| set.iter().copied().filter(|c| *c != connection).collect())
            .unwrap_or_default();
        Some((room.clone(), peers))
    }

    /// Discards the connection's membership when it closes.
    pub async fn disconnect(&self, connection: ConnectionId) -> Option<PairKey> {
        self.table.write().await.detach(connection)
    }

    pub async fn room_count(&self) -> usize {
        self.table.read().await.members.len()
    }
}
