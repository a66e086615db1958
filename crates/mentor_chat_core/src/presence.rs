//! crates/mentor_chat_core/src/presence.rs
//!
//! In-process presence tracking. Onlineness means exactly "currently holds an open
//! connection"; nothing here is persisted and a restart clears it.

use std::collections::{BTreeMap, HashMap};

use tokio::sync::RwLock;
use tracing::debug;

use crate::domain::{ConnectionId, Identity};

/// The full identity → connection mapping, ordered by identity.
pub type PresenceSnapshot = BTreeMap<Identity, ConnectionId>;

/// Owns the identity → active connection map. At most one connection is tracked
/// per identity; a newer connection silently replaces an older one.
#[derive(Debug, Default)]
pub struct PresenceRegistry {
    online: RwLock<HashMap<Identity, ConnectionId>>,
}

impl PresenceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `identity` to `connection` and returns the snapshot to broadcast.
    pub async fn mark_online(&self, identity: Identity, connection: ConnectionId) -> PresenceSnapshot {
        let mut online = self.online.write().await;
        if let Some(previous) = online.insert(identity.clone(), connection) {
            if previous != connection {
                debug!("Connection {} replaces {} for {}", connection, previous, identity);
            }
        }
        snapshot_of(&online)
    }

    /// Removes every identity bound to `connection`.
    ///
    /// Returns the new snapshot when something was removed and `None` when the
    /// connection held no presence, so a repeated call changes nothing.
    pub async fn mark_offline(&self, connection: ConnectionId) -> Option<PresenceSnapshot> {
        let mut online = self.online.write().await;
        let before = online.len();
        online.retain(|_, bound| *bound != connection);
        if online.len() == before {
            None
        } else {
            Some(snapshot_of(&online))
        }
    }

    pub async fn snapshot(&self) -> PresenceSnapshot {
        snapshot_of(&*self.online.read().await)
    }

    pub async fn is_online(&self, identity: &Identity) -> bool {
        self.online.read().await.contains_key(identity)
    }
}

fn snapshot_of(online: &HashMap<Identity, ConnectionId>) -> PresenceSnapshot {
    online.iter().map(|(id, conn)| (id.clone(), *conn)).collect()
}
