use axum::{extract::State, Json};
use std::sync::Arc;

use crate::models::badge::BadgeDefinition;
use crate::models::content::{ScenarioSummary, TimelineEvent};
use crate::services::AppState;

/// GET /api/v1/content/scenarios
pub async fn list_scenarios(State(state): State<Arc<AppState>>) -> Json<Vec<ScenarioSummary>> {
    Json(state.catalog.scenarios.iter().map(ScenarioSummary::from).collect())
}

/// GET /api/v1/content/timeline
pub async fn list_timeline(State(state): State<Arc<AppState>>) -> Json<Vec<TimelineEvent>> {
    Json(state.catalog.timeline.clone())
}

/// GET /api/v1/content/badges
pub async fn list_badges(State(state): State<Arc<AppState>>) -> Json<Vec<BadgeDefinition>> {
    Json(state.catalog.badges.clone())
}
