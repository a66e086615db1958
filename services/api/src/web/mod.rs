pub mod middleware;
pub mod protocol;
pub mod rest;
pub mod state;
pub mod ws_handler;

// Re-export the handlers so the binary can build the router from one place.
pub use middleware::require_auth;
pub use rest::{history_handler, send_message_handler};
pub use ws_handler::ws_handler;
