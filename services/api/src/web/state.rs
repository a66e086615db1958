//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use crate::realtime::Realtime;
use mentor_chat_core::ports::IdentityService;
use std::sync::Arc;

//=========================================================================================
// AppState (Shared Across All Connections)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub realtime: Arc<Realtime>,
    pub identity: Arc<dyn IdentityService>,
    /// Browser origins allowed to open the WebSocket.
    pub allowed_origins: Vec<String>,
}
