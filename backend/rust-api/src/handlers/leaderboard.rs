use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use std::sync::Arc;

use crate::{
    models::leaderboard::{LeaderboardQuery, LeaderboardResponse, ScoreTrack},
    services::AppState,
};

fn parse_track(raw: Option<&str>) -> Result<ScoreTrack, (StatusCode, String)> {
    match raw {
        None => Ok(ScoreTrack::Journey),
        Some(value) => ScoreTrack::parse(value).ok_or_else(|| {
            (
                StatusCode::BAD_REQUEST,
                format!("Unknown leaderboard track: {}", value),
            )
        }),
    }
}

/// GET /api/v1/leaderboard?track=journey|quiz&refresh=bool
pub async fn get_leaderboard(
    State(state): State<Arc<AppState>>,
    Query(query): Query<LeaderboardQuery>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let track = parse_track(query.track.as_deref())?;
    let entries = state.leaderboard.top(track, query.refresh).await;
    Ok(Json(LeaderboardResponse { track, entries }))
}

/// DELETE /api/v1/leaderboard/{track}/{key}
pub async fn delete_entry(
    State(state): State<Arc<AppState>>,
    Path((track, key)): Path<(String, String)>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let track = parse_track(Some(&track))?;
    if state.leaderboard.delete(track, &key).await {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err((StatusCode::NOT_FOUND, "Leaderboard entry not found".to_string()))
    }
}
