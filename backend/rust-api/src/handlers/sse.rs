use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse,
    },
};
use futures::stream::{self, Stream};
use std::convert::Infallible;
use std::sync::Arc;
use tokio::sync::broadcast::{self, error::RecvError};

use crate::{
    handlers::quiz::quiz_error,
    metrics::SSE_CONNECTIONS_ACTIVE,
    models::{quiz::QuizPhase, timer::QuizEvent},
    services::AppState,
};

/// SSE endpoint for quiz events
/// GET /api/v1/quiz/{id}/stream
pub async fn quiz_stream(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let (events, snapshot) = state
        .quizzes
        .subscribe(&session_id)
        .await
        .map_err(quiz_error)?;

    tracing::info!(
        "Client connected to quiz stream: session={}, phase={:?}",
        session_id,
        snapshot.phase
    );

    let finished = snapshot.phase == QuizPhase::Finished;
    let stream = create_event_stream(session_id, events, finished);

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

/// Decrements the active-connection gauge when the stream is dropped.
struct ConnectionGuard;

impl ConnectionGuard {
    fn new() -> Self {
        SSE_CONNECTIONS_ACTIVE.inc();
        Self
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        SSE_CONNECTIONS_ACTIVE.dec();
    }
}

/// Forwards broadcast quiz events until the quiz finishes. A finished quiz
/// yields an empty stream.
fn create_event_stream(
    session_id: String,
    events: broadcast::Receiver<QuizEvent>,
    finished: bool,
) -> impl Stream<Item = Result<Event, Infallible>> {
    stream::unfold(
        (events, finished, ConnectionGuard::new()),
        move |(mut events, done, guard)| {
            let sid = session_id.clone();
            async move {
                if done {
                    return None;
                }

                loop {
                    match events.recv().await {
                        Ok(quiz_event) => {
                            let terminal = quiz_event.is_terminal();
                            let event = Event::default()
                                .event(quiz_event.event_name())
                                .data(quiz_event.to_sse_data());
                            if terminal {
                                tracing::info!("Quiz stream complete: session={}", sid);
                            }
                            return Some((Ok(event), (events, terminal, guard)));
                        }
                        Err(RecvError::Lagged(skipped)) => {
                            tracing::warn!(
                                "Quiz stream lagged: session={}, skipped={}",
                                sid,
                                skipped
                            );
                        }
                        Err(RecvError::Closed) => return None,
                    }
                }
            }
        },
    )
}
