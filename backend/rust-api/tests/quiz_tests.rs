use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use http_body_util::BodyExt;
use serde_json::json;
use std::time::Duration;
use tower::ServiceExt;

mod common;
use common::{create_profile, create_test_app, send};

async fn start_quiz(app: &axum::Router, profile_id: &str) -> serde_json::Value {
    let (status, json) = send(
        app,
        "POST",
        "/api/v1/quiz",
        Some(json!({ "profile_id": profile_id })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "body: {}", json);
    json
}

#[tokio::test(start_paused = true)]
async fn test_start_quiz_hides_answer() {
    let app = create_test_app();
    let profile_id = create_profile(&app, "Minh").await;

    let quiz = start_quiz(&app, &profile_id).await;

    assert_eq!(quiz["phase"], "answering");
    assert_eq!(quiz["question_index"], 0);
    assert_eq!(quiz["total_questions"], 3);
    assert_eq!(quiz["time_remaining"], 30);
    assert_eq!(quiz["score"], 0);
    assert_eq!(quiz["question"]["options"].as_array().unwrap().len(), 4);
    assert!(quiz["question"].get("correct_answer").is_none());
    assert!(quiz["question"].get("explanation").is_none());
}

#[tokio::test]
async fn test_start_quiz_for_unknown_profile() {
    let app = create_test_app();

    let (status, _) = send(
        &app,
        "POST",
        "/api/v1/quiz",
        Some(json!({ "profile_id": "nobody" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test(start_paused = true)]
async fn test_second_quiz_while_active_conflicts() {
    let app = create_test_app();
    let profile_id = create_profile(&app, "Minh").await;
    let quiz = start_quiz(&app, &profile_id).await;

    let (status, _) = send(
        &app,
        "POST",
        "/api/v1/quiz",
        Some(json!({ "profile_id": profile_id })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = send(
        &app,
        "DELETE",
        &format!("/api/v1/quiz/{}", quiz["session_id"].as_str().unwrap()),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test(start_paused = true)]
async fn test_answer_locks_question_until_feedback_ends() {
    let app = create_test_app();
    let profile_id = create_profile(&app, "Minh").await;
    let quiz = start_quiz(&app, &profile_id).await;
    let session_id = quiz["session_id"].as_str().unwrap().to_string();
    let answers_uri = format!("/api/v1/quiz/{}/answers", session_id);

    tokio::time::sleep(Duration::from_millis(2500)).await;

    let (status, json) = send(&app, "POST", &answers_uri, Some(json!({ "option_index": 0 }))).await;
    assert_eq!(status, StatusCode::OK, "body: {}", json);
    assert_eq!(json["outcome"]["question_index"], 0);
    assert_eq!(json["outcome"]["time_remaining"], 28);
    assert_eq!(json["quiz"]["phase"], "feedback");
    assert!(json["quiz"]["question"]["correct_answer"].is_number());
    assert!(!json["quiz"]["question"]["explanation"]
        .as_str()
        .unwrap()
        .is_empty());

    let points = json["outcome"]["points"].as_u64().unwrap();
    if json["outcome"]["correct"] == true {
        assert_eq!(points, 1000 + 500 * 28 / 30);
    } else {
        assert_eq!(points, 0);
    }

    // A second answer during feedback is rejected
    let (status, _) = send(&app, "POST", &answers_uri, Some(json!({ "option_index": 1 }))).await;
    assert_eq!(status, StatusCode::CONFLICT);

    tokio::time::sleep(Duration::from_millis(3500)).await;

    let (_, snapshot) = send(&app, "GET", &format!("/api/v1/quiz/{}", session_id), None).await;
    assert_eq!(snapshot["phase"], "answering");
    assert_eq!(snapshot["question_index"], 1);
    assert_eq!(snapshot["time_remaining"], 30);
    assert!(snapshot["question"].get("explanation").is_none());
}

#[tokio::test(start_paused = true)]
async fn test_invalid_option_is_rejected() {
    let app = create_test_app();
    let profile_id = create_profile(&app, "Minh").await;
    let quiz = start_quiz(&app, &profile_id).await;

    let (status, _) = send(
        &app,
        "POST",
        &format!("/api/v1/quiz/{}/answers", quiz["session_id"].as_str().unwrap()),
        Some(json!({ "option_index": 7 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test(start_paused = true)]
async fn test_unanswered_question_times_out() {
    let app = create_test_app();
    let profile_id = create_profile(&app, "Minh").await;
    let quiz = start_quiz(&app, &profile_id).await;
    let uri = format!("/api/v1/quiz/{}", quiz["session_id"].as_str().unwrap());

    tokio::time::sleep(Duration::from_millis(30_500)).await;

    let (_, snapshot) = send(&app, "GET", &uri, None).await;
    assert_eq!(snapshot["phase"], "feedback");
    assert_eq!(snapshot["time_remaining"], 0);
    assert!(snapshot["last_answer"]["selected"].is_null());
    assert_eq!(snapshot["last_answer"]["points"], 0);
    assert_eq!(snapshot["score"], 0);
}

#[tokio::test(start_paused = true)]
async fn test_finished_quiz_credits_profile_and_quiz_board() {
    let app = create_test_app();
    let profile_id = create_profile(&app, "Minh").await;
    let quiz = start_quiz(&app, &profile_id).await;
    let session_id = quiz["session_id"].as_str().unwrap().to_string();

    for _ in 0..3 {
        let (status, _) = send(
            &app,
            "POST",
            &format!("/api/v1/quiz/{}/answers", session_id),
            Some(json!({ "option_index": 1 })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        tokio::time::sleep(Duration::from_millis(3500)).await;
    }

    let (_, snapshot) = send(&app, "GET", &format!("/api/v1/quiz/{}", session_id), None).await;
    assert_eq!(snapshot["phase"], "finished");
    let score = snapshot["score"].as_u64().unwrap();

    let (_, profile) = send(&app, "GET", &format!("/api/v1/profiles/{}", profile_id), None).await;
    assert_eq!(profile["total_xp"].as_u64().unwrap(), score);

    let (_, board) = send(&app, "GET", "/api/v1/leaderboard?track=quiz", None).await;
    let entries = board["entries"].as_array().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["name"], "Minh");
    assert_eq!(entries[0]["total_xp"].as_u64().unwrap(), score);

    // Finished quizzes can be discarded and a new one started
    let (status, _) = send(&app, "DELETE", &format!("/api/v1/quiz/{}", session_id), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    start_quiz(&app, &profile_id).await;
}

#[tokio::test(start_paused = true)]
async fn test_stream_is_event_stream() {
    let app = create_test_app();
    let profile_id = create_profile(&app, "Minh").await;
    let quiz = start_quiz(&app, &profile_id).await;

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri(format!(
                    "/api/v1/quiz/{}/stream",
                    quiz["session_id"].as_str().unwrap()
                ))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers()["content-type"]
        .to_str()
        .unwrap()
        .starts_with("text/event-stream"));

    let mut body = response.into_body();
    let frame = body.frame().await.unwrap().unwrap();
    let text = String::from_utf8(frame.into_data().unwrap().to_vec()).unwrap();
    assert!(text.contains("event: timer-tick"), "frame: {}", text);
    assert!(text.contains("\"remaining_seconds\":29"), "frame: {}", text);

    let (status, _) = send(&app, "GET", "/api/v1/quiz/missing/stream", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test(start_paused = true)]
async fn test_reset_profile_drops_its_quiz() {
    let app = create_test_app();
    let profile_id = create_profile(&app, "Minh").await;
    let quiz = start_quiz(&app, &profile_id).await;
    let session_id = quiz["session_id"].as_str().unwrap();

    let (status, _) = send(&app, "DELETE", &format!("/api/v1/profiles/{}", profile_id), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send(&app, "GET", &format!("/api/v1/quiz/{}", session_id), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
