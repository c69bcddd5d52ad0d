use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use std::sync::Arc;
use validator::Validate;

use crate::{
    models::profile::{
        ApplyEffectRequest, CreateProfileRequest, MiniGameWinRequest, ScenarioChoiceRequest,
    },
    services::{content_service::ContentError, profile_service::ProfileError, AppState},
};

fn profile_error(e: ProfileError) -> (StatusCode, String) {
    let status = match &e {
        ProfileError::NotFound(_) => StatusCode::NOT_FOUND,
        ProfileError::Invalid(_) => StatusCode::BAD_REQUEST,
        ProfileError::Content(ContentError::UnknownScenario(_))
        | ProfileError::Content(ContentError::UnknownOption { .. }) => StatusCode::NOT_FOUND,
        ProfileError::Content(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, e.to_string())
}

pub async fn create_profile(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateProfileRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    if let Err(e) = req.validate() {
        return Err((StatusCode::BAD_REQUEST, format!("Validation error: {}", e)));
    }

    tracing::info!("Onboarding profile: {}", req.name.trim());

    let profile = state.profiles.create(&req).await.map_err(profile_error)?;
    Ok((StatusCode::CREATED, Json(state.profiles.view(profile))))
}

pub async fn get_profile(
    State(state): State<Arc<AppState>>,
    Path(profile_id): Path<String>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    match state.profiles.get(&profile_id).await {
        Some(profile) => Ok(Json(state.profiles.view(profile))),
        None => Err((StatusCode::NOT_FOUND, "Profile not found".to_string())),
    }
}

pub async fn reset_profile(
    State(state): State<Arc<AppState>>,
    Path(profile_id): Path<String>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    match state.profiles.reset(&profile_id).await {
        Ok(true) => {
            state.quizzes.forget_profile(&profile_id).await;
            Ok(StatusCode::NO_CONTENT)
        }
        Ok(false) => Err((StatusCode::NOT_FOUND, "Profile not found".to_string())),
        Err(e) => {
            tracing::error!("Failed to reset profile {}: {:#}", profile_id, e);
            Err((StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
        }
    }
}

pub async fn apply_effect(
    State(state): State<Arc<AppState>>,
    Path(profile_id): Path<String>,
    Json(req): Json<ApplyEffectRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let outcome = state
        .profiles
        .apply_effect(&profile_id, &req.effect, req.activity.as_ref())
        .await
        .map_err(profile_error)?;

    Ok(Json(state.profiles.effect_response(outcome, None)))
}

pub async fn choose_scenario_option(
    State(state): State<Arc<AppState>>,
    Path((profile_id, scenario_id)): Path<(String, String)>,
    Json(req): Json<ScenarioChoiceRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    tracing::info!(
        "Profile {} chose option {} in scenario {}",
        profile_id,
        req.option_id,
        scenario_id
    );

    let (outcome, feedback) = state
        .profiles
        .choose_scenario_option(&profile_id, &scenario_id, &req.option_id)
        .await
        .map_err(profile_error)?;

    Ok(Json(state.profiles.effect_response(outcome, Some(feedback))))
}

pub async fn record_mini_game_win(
    State(state): State<Arc<AppState>>,
    Path(profile_id): Path<String>,
    Json(req): Json<MiniGameWinRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let outcome = state
        .profiles
        .record_mini_game_win(&profile_id, req.moves)
        .await
        .map_err(profile_error)?;

    Ok(Json(state.profiles.effect_response(outcome, None)))
}
