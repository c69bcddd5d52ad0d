use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use std::sync::Arc;

use crate::{models::mentor::SendMessageRequest, services::AppState};

const MAX_MESSAGE_CHARS: usize = 2000;

pub async fn create_chat(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    (StatusCode::CREATED, Json(state.mentor.create_chat().await))
}

pub async fn get_chat(
    State(state): State<Arc<AppState>>,
    Path(chat_id): Path<String>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    state
        .mentor
        .transcript(&chat_id)
        .await
        .map(Json)
        .ok_or((StatusCode::NOT_FOUND, "Chat not found".to_string()))
}

pub async fn send_message(
    State(state): State<Arc<AppState>>,
    Path(chat_id): Path<String>,
    Json(req): Json<SendMessageRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    if req.text.trim().is_empty() {
        return Err((StatusCode::BAD_REQUEST, "Message must not be empty".to_string()));
    }
    if req.text.chars().count() > MAX_MESSAGE_CHARS {
        return Err((
            StatusCode::BAD_REQUEST,
            format!("Message exceeds {} characters", MAX_MESSAGE_CHARS),
        ));
    }

    state
        .mentor
        .send(&chat_id, &req.text)
        .await
        .map(Json)
        .ok_or((StatusCode::NOT_FOUND, "Chat not found".to_string()))
}
