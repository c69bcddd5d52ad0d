use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde_json::json;
use std::sync::Arc;

use crate::{
    models::quiz::{StartQuizRequest, SubmitQuizAnswerRequest},
    services::{quiz_engine::QuizError, quiz_service::QuizServiceError, AppState},
};

pub(crate) fn quiz_error(e: QuizServiceError) -> (StatusCode, String) {
    let status = match &e {
        QuizServiceError::NotFound(_) | QuizServiceError::ProfileNotFound(_) => {
            StatusCode::NOT_FOUND
        }
        QuizServiceError::Conflict(_) => StatusCode::CONFLICT,
        QuizServiceError::Quiz(QuizError::InvalidOption { .. }) => StatusCode::BAD_REQUEST,
        QuizServiceError::Quiz(QuizError::EmptyPool) => StatusCode::INTERNAL_SERVER_ERROR,
        QuizServiceError::Quiz(_) => StatusCode::CONFLICT,
    };
    (status, e.to_string())
}

pub async fn start_quiz(
    State(state): State<Arc<AppState>>,
    Json(req): Json<StartQuizRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    tracing::info!("Starting quiz for profile {}", req.profile_id);

    let snapshot = state
        .quizzes
        .start(&req.profile_id)
        .await
        .map_err(quiz_error)?;
    Ok((StatusCode::CREATED, Json(snapshot)))
}

pub async fn get_quiz(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let snapshot = state
        .quizzes
        .snapshot(&session_id)
        .await
        .map_err(quiz_error)?;
    Ok(Json(snapshot))
}

pub async fn submit_answer(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
    Json(req): Json<SubmitQuizAnswerRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let (outcome, snapshot) = state
        .quizzes
        .answer(&session_id, req.option_index)
        .await
        .map_err(quiz_error)?;

    tracing::debug!(
        "Quiz {} answer {} on question {}: correct={} points={}",
        session_id,
        req.option_index,
        outcome.question_index,
        outcome.correct,
        outcome.points
    );

    Ok(Json(json!({
        "outcome": outcome,
        "quiz": snapshot,
    })))
}

pub async fn discard_quiz(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    state
        .quizzes
        .discard(&session_id)
        .await
        .map_err(quiz_error)?;
    Ok(StatusCode::NO_CONTENT)
}
