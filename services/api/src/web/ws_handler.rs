//! services/api/src/web/ws_handler.rs
//!
//! This is the main entry point and control loop for a WebSocket connection.
//! Inbound frames are decoded and handed to the realtime core one at a time;
//! outbound events are written by a separate task that drains the connection's queue.

use crate::web::{middleware::origin_allowed, protocol::ClientMessage, state::AppState};
use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Extension,
};
use futures::{SinkExt, StreamExt};
use mentor_chat_core::domain::Identity;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// The handler for upgrading HTTP requests to WebSocket connections.
///
/// Handshakes from origins outside the allow-list are refused with 403.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    headers: HeaderMap,
    State(app_state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
) -> Response {
    if !origin_allowed(&headers, &app_state.allowed_origins) {
        warn!("Refusing WebSocket upgrade for {} from a foreign origin", identity);
        return StatusCode::FORBIDDEN.into_response();
    }
    ws.on_upgrade(move |socket| handle_socket(socket, app_state, identity))
}

async fn handle_socket(socket: WebSocket, app_state: Arc<AppState>, identity: Identity) {
    let realtime = app_state.realtime.clone();
    let (connection, mut outbound) = realtime.connect(identity).await;
    info!(
        "New WebSocket connection {} established for user: {} ({} open)",
        connection.id,
        connection.identity,
        realtime.hub().connection_count().await
    );

    let (mut sender, mut receiver) = socket.split();
    let cancellation_token = CancellationToken::new();

    // --- 1. Writer Task ---
    let writer_handle = {
        let token = cancellation_token.clone();
        let connection_id = connection.id;
        tokio::spawn(async move {
            loop {
                let message = tokio::select! {
                    _ = token.cancelled() => break,
                    next = outbound.recv() => match next {
                        Some(message) => message,
                        None => break,
                    },
                };
                let json = match serde_json::to_string(&message) {
                    Ok(json) => json,
                    Err(e) => {
                        error!("Failed to serialize server message: {}", e);
                        continue;
                    }
                };
                if sender.send(Message::Text(json.into())).await.is_err() {
                    warn!("Failed to write to connection {}. Ending writer task.", connection_id);
                    break;
                }
            }
            let _ = sender.close().await;
        })
    };

    // --- 2. Main Message Loop ---
    while let Some(frame) = receiver.next().await {
        match frame {
            Ok(Message::Text(text)) => match serde_json::from_str::<ClientMessage>(text.as_str()) {
                Ok(client_msg) => realtime.handle_client_message(&connection, client_msg).await,
                Err(e) => {
                    warn!("Failed to deserialize client message: {}", e);
                    realtime
                        .report_error(&connection, format!("Unrecognized event: {}", e))
                        .await;
                }
            },
            Ok(Message::Close(_)) => {
                info!("Client sent close message.");
                break;
            }
            Ok(_) => {}
            Err(e) => {
                warn!("WebSocket error on connection {}: {}", connection.id, e);
                break;
            }
        }
    }

    // --- 3. Cleanup ---
    cancellation_token.cancel();
    realtime.disconnect(&connection).await;
    if let Err(e) = writer_handle.await {
        error!("Writer task for connection {} panicked: {}", connection.id, e);
    }
    info!(
        "WebSocket connection {} closed. {} connection(s) remain open.",
        connection.id,
        realtime.hub().connection_count().await
    );
}
