//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the chat REST endpoints and the master
//! definition for the OpenAPI specification.

use crate::realtime::RelayError;
use crate::web::protocol::{MessagePayload, SendMessagePayload};
use crate::web::state::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    Extension,
};
use mentor_chat_core::domain::{Identity, PairKey};
use std::sync::Arc;
use tracing::error;
use utoipa::OpenApi;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        history_handler,
        send_message_handler,
    ),
    components(
        schemas(MessagePayload, SendMessagePayload)
    ),
    tags(
        (name = "Mentor Chat API", description = "Chat history and message endpoints for mentor conversations.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// REST API Handlers
//=========================================================================================

/// Fetch the message history between two users.
///
/// Returns an empty array when the two have never exchanged a message.
#[utoipa::path(
    get,
    path = "/api/chat/{id_a}/{id_b}",
    responses(
        (status = 200, description = "Messages in persistence order", body = [MessagePayload]),
        (status = 400, description = "Invalid pair of identities"),
        (status = 401, description = "Missing or expired session"),
        (status = 403, description = "Caller is not part of this conversation"),
        (status = 500, description = "Internal server error")
    ),
    params(
        ("id_a" = String, Path, description = "One participant of the conversation."),
        ("id_b" = String, Path, description = "The other participant.")
    )
)]
pub async fn history_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(caller): Extension<Identity>,
    Path((id_a, id_b)): Path<(String, String)>,
) -> Result<Json<Vec<MessagePayload>>, (StatusCode, String)> {
    let pair = PairKey::from_request(Some(id_a), Some(id_b))
        .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;

    if !pair.contains(&caller) {
        return Err((
            StatusCode::FORBIDDEN,
            "You are not a participant of this conversation".to_string(),
        ));
    }

    let messages = app_state.realtime.history(&pair).await.map_err(|e| {
        error!("Failed to load history for {}: {:?}", pair, e);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to load chat history".to_string(),
        )
    })?;

    Ok(Json(messages.iter().map(MessagePayload::from).collect()))
}

/// Send a message without a WebSocket.
///
/// The message goes through the same pipeline as the `sendMessage` event: it is
/// stored first and then broadcast to everyone connected to the conversation's room.
#[utoipa::path(
    post,
    path = "/api/chat/send",
    request_body = SendMessagePayload,
    responses(
        (status = 201, description = "Message stored and broadcast", body = MessagePayload),
        (status = 400, description = "Malformed message"),
        (status = 401, description = "Missing or expired session"),
        (status = 403, description = "senderId is not the caller"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn send_message_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(caller): Extension<Identity>,
    Json(payload): Json<SendMessagePayload>,
) -> Result<(StatusCode, Json<MessagePayload>), (StatusCode, String)> {
    let (draft, _) = payload.into_parts();

    match app_state.realtime.send_message(draft, &caller).await {
        Ok(message) => Ok((StatusCode::CREATED, Json(MessagePayload::from(&message)))),
        Err(e @ RelayError::Malformed(_)) => Err((StatusCode::BAD_REQUEST, e.to_string())),
        Err(e @ RelayError::Forbidden(_)) => Err((StatusCode::FORBIDDEN, e.to_string())),
        Err(RelayError::Persistence(_)) => Err((
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to send message".to_string(),
        )),
    }
}
