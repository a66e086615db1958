//! services/api/src/lib.rs
//!
//! The chat service: realtime presence, room routing, call signalling and message
//! persistence behind an axum WebSocket and a small REST surface.

pub mod adapters;
pub mod config;
pub mod error;
pub mod realtime;
pub mod web;
