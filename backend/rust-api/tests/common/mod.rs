#![allow(dead_code)]

use anyhow::Result;
use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use journey_api::{
    config::{Config, LeaderboardSettings, MentorSettings, ProgressionSettings, QuizSettings},
    create_router,
    models::{content::Catalog, mentor::ChatMessage},
    services::{
        leaderboard_service::InMemoryLeaderboardStore,
        mentor_service::CompletionClient,
        profile_store::InMemoryProfileStore,
        AppState,
    },
};
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;

/// Completion backend that echoes the last user message.
pub struct EchoClient;

#[async_trait]
impl CompletionClient for EchoClient {
    async fn complete(&self, _system_prompt: &str, history: &[ChatMessage]) -> Result<String> {
        let last = history.last().map(|m| m.text.clone()).unwrap_or_default();
        Ok(format!("Guide heard: {}", last))
    }
}

pub fn test_config() -> Config {
    Config {
        mongo_uri: "mongodb://unused".to_string(),
        redis_uri: "redis://unused".to_string(),
        mongo_database: "journey_test".to_string(),
        bind_address: "127.0.0.1:0".to_string(),
        quiz: QuizSettings {
            questions_per_session: 3,
            ..QuizSettings::default()
        },
        progression: ProgressionSettings::default(),
        leaderboard: LeaderboardSettings::default(),
        mentor: MentorSettings::default(),
    }
}

pub fn create_test_app() -> Router {
    create_test_app_with(test_config())
}

pub fn create_test_app_with(config: Config) -> Router {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();

    let state = AppState::from_parts(
        config,
        Catalog::embedded().expect("embedded catalog"),
        Arc::new(InMemoryProfileStore::new()),
        Arc::new(InMemoryLeaderboardStore::new()),
        Arc::new(EchoClient),
    );
    create_router(Arc::new(state))
}

pub async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    send_with_headers(app, method, uri, body, &[]).await
}

pub async fn send_with_headers(
    app: &Router,
    method: &str,
    uri: &str,
    body: Option<Value>,
    headers: &[(&str, &str)],
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    let request = match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = serde_json::from_slice(&bytes)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).to_string()));
    (status, json)
}

pub async fn create_profile(app: &Router, name: &str) -> String {
    let (status, json) = send(
        app,
        "POST",
        "/api/v1/profiles",
        Some(serde_json::json!({ "name": name, "avatar_id": "2" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "body: {}", json);
    json["id"].as_str().unwrap().to_string()
}
