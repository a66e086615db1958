//! services/api/src/error.rs
//!
//! The error type returned by the service's startup path.

use crate::config::ConfigError;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Connecting to PostgreSQL or applying the embedded migrations failed.
    #[error("Database Error: {0}")]
    Database(#[from] sqlx::Error),

    /// Binding the listener or serving connections failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid startup wiring, such as an unparseable CORS origin.
    #[error("An unexpected internal error occurred: {0}")]
    Internal(String),
}
