use std::sync::Arc;

use axum::{
    http::{header, Method},
    middleware,
    routing::{delete, get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub mod config;
pub mod handlers;
pub mod metrics;
pub mod middlewares;
pub mod models;
pub mod services;
pub mod utils;

pub use config::Config;
pub use services::AppState;

pub fn create_router(app_state: Arc<services::AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_origin(tower_http::cors::Any);

    Router::new()
        .route("/health", get(handlers::health_check))
        // Metrics endpoint with Basic Auth protection
        .route(
            "/metrics",
            get(handlers::metrics_handler)
                .layer(middleware::from_fn(handlers::metrics_auth_middleware)),
        )
        .merge(content_routes())
        .merge(profile_routes())
        .merge(quiz_routes())
        .merge(leaderboard_routes())
        .merge(mentor_routes())
        .with_state(app_state)
        .layer(cors)
        .layer(middleware::from_fn(
            middlewares::metrics::metrics_middleware,
        ))
        .layer(middleware::from_fn(
            middlewares::trace::trace_context_middleware,
        ))
        .layer(TraceLayer::new_for_http())
}

fn content_routes() -> Router<Arc<services::AppState>> {
    Router::new()
        .route("/api/v1/content/scenarios", get(handlers::content::list_scenarios))
        .route("/api/v1/content/timeline", get(handlers::content::list_timeline))
        .route("/api/v1/content/badges", get(handlers::content::list_badges))
}

fn profile_routes() -> Router<Arc<services::AppState>> {
    Router::new()
        .route("/api/v1/profiles", post(handlers::profiles::create_profile))
        .route(
            "/api/v1/profiles/{id}",
            get(handlers::profiles::get_profile).delete(handlers::profiles::reset_profile),
        )
        .route("/api/v1/profiles/{id}/effects", post(handlers::profiles::apply_effect))
        .route(
            "/api/v1/profiles/{id}/scenarios/{scenario_id}/choices",
            post(handlers::profiles::choose_scenario_option),
        )
        .route("/api/v1/profiles/{id}/minigame", post(handlers::profiles::record_mini_game_win))
}

fn quiz_routes() -> Router<Arc<services::AppState>> {
    Router::new()
        .route("/api/v1/quiz", post(handlers::quiz::start_quiz))
        .route(
            "/api/v1/quiz/{id}",
            get(handlers::quiz::get_quiz).delete(handlers::quiz::discard_quiz),
        )
        .route("/api/v1/quiz/{id}/answers", post(handlers::quiz::submit_answer))
        .route("/api/v1/quiz/{id}/stream", get(handlers::sse::quiz_stream))
}

fn leaderboard_routes() -> Router<Arc<services::AppState>> {
    let admin = Router::new()
        .route("/api/v1/leaderboard/{track}/{key}", delete(handlers::leaderboard::delete_entry))
        .route_layer(middleware::from_fn(handlers::admin_auth_middleware));

    Router::new()
        .route("/api/v1/leaderboard", get(handlers::leaderboard::get_leaderboard))
        .merge(admin)
}

fn mentor_routes() -> Router<Arc<services::AppState>> {
    Router::new()
        .route("/api/v1/mentor/chats", post(handlers::mentor::create_chat))
        .route("/api/v1/mentor/chats/{id}", get(handlers::mentor::get_chat))
        .route("/api/v1/mentor/chats/{id}/messages", post(handlers::mentor::send_message))
}
