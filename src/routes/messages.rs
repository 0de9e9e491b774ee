//! Messaging routes.

use super::StatusResponse;
use crate::error::Result;
use crate::models::{Message, MessageDraft};
use crate::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use std::sync::Arc;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/messages/send", post(send))
        .route("/messages/conversation/{user_a}/{user_b}", get(conversation))
        .route("/messages/read/{message_id}", put(mark_read))
}

async fn send(
    State(state): State<Arc<AppState>>,
    Json(draft): Json<MessageDraft>,
) -> Result<(StatusCode, Json<Message>)> {
    let message = state.messages.send_message(draft).await?;
    Ok((StatusCode::CREATED, Json(message)))
}

async fn conversation(
    State(state): State<Arc<AppState>>,
    Path((user_a, user_b)): Path<(String, String)>,
) -> Result<Json<Vec<Message>>> {
    Ok(Json(state.messages.conversation(&user_a, &user_b).await?))
}

async fn mark_read(
    State(state): State<Arc<AppState>>,
    Path(message_id): Path<String>,
) -> Result<Json<StatusResponse>> {
    state.messages.mark_read(&message_id).await?;
    Ok(StatusResponse::ok("Message marked read"))
}
