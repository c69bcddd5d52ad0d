use lazy_static::lazy_static;
use prometheus::{
    register_counter_vec, register_histogram_vec, register_int_counter_vec, register_int_gauge,
    CounterVec, Encoder, HistogramVec, IntCounterVec, IntGauge, TextEncoder,
};

lazy_static! {
    // HTTP Metrics
    pub static ref HTTP_REQUESTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "http_requests_total",
        "Total number of HTTP requests",
        &["method", "path", "status"]
    )
    .unwrap();

    pub static ref HTTP_REQUEST_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "http_request_duration_seconds",
        "HTTP request duration in seconds",
        &["method", "path"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]
    )
    .unwrap();

    // Database Metrics (MongoDB)
    pub static ref DB_OPERATIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "db_operations_total",
        "Total number of database operations",
        &["operation", "collection", "status"]
    )
    .unwrap();

    pub static ref DB_OPERATION_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "db_operation_duration_seconds",
        "Database operation duration in seconds",
        &["operation", "collection"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0]
    )
    .unwrap();

    // Cache Metrics (Redis profile store, leaderboard cache)
    pub static ref CACHE_OPERATIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "cache_operations_total",
        "Total number of cache operations",
        &["operation", "status"]
    )
    .unwrap();

    pub static ref CACHE_HIT_RATIO: CounterVec = register_counter_vec!(
        "cache_hit_ratio",
        "Cache hit/miss ratio",
        &["result"]
    )
    .unwrap();

    pub static ref CACHE_OPERATION_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "cache_operation_duration_seconds",
        "Cache operation duration in seconds",
        &["operation"],
        vec![0.0001, 0.0005, 0.001, 0.005, 0.01, 0.025, 0.05, 0.1]
    )
    .unwrap();

    // Progression Metrics
    pub static ref EFFECTS_APPLIED_TOTAL: IntCounterVec = register_int_counter_vec!(
        "effects_applied_total",
        "Total number of stat effects processed",
        &["activity", "outcome"]
    )
    .unwrap();

    pub static ref BADGES_UNLOCKED_TOTAL: IntCounterVec = register_int_counter_vec!(
        "badges_unlocked_total",
        "Total number of badges unlocked",
        &["badge_id"]
    )
    .unwrap();

    pub static ref PROFILES_TOTAL: IntCounterVec = register_int_counter_vec!(
        "profiles_total",
        "Profile lifecycle events",
        &["event"]
    )
    .unwrap();

    // Quiz Metrics
    pub static ref QUIZ_SESSIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "quiz_sessions_total",
        "Total number of quiz sessions",
        &["status"]
    )
    .unwrap();

    pub static ref QUIZ_SESSIONS_ACTIVE: IntGauge = register_int_gauge!(
        "quiz_sessions_active",
        "Number of quiz sessions not yet finished"
    )
    .unwrap();

    pub static ref QUIZ_ANSWERS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "quiz_answers_total",
        "Total number of quiz questions resolved",
        &["outcome"]
    )
    .unwrap();

    pub static ref SSE_CONNECTIONS_ACTIVE: IntGauge = register_int_gauge!(
        "sse_connections_active",
        "Number of active SSE connections"
    )
    .unwrap();

    // Leaderboard & Mentor Metrics
    pub static ref LEADERBOARD_WRITES_TOTAL: IntCounterVec = register_int_counter_vec!(
        "leaderboard_writes_total",
        "Total number of leaderboard writes",
        &["track", "status"]
    )
    .unwrap();

    pub static ref MENTOR_REPLIES_TOTAL: IntCounterVec = register_int_counter_vec!(
        "mentor_replies_total",
        "Total number of mentor replies",
        &["status"]
    )
    .unwrap();
}

/// Renders all metrics in Prometheus text format
pub fn render_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer)
        .map_err(|e| prometheus::Error::Msg(format!("Failed to convert metrics to UTF-8: {}", e)))
}

/// Awaits `future`, returning its result with the elapsed seconds and a
/// success/error status label.
async fn timed<F, T>(future: F) -> (Result<T, anyhow::Error>, f64, &'static str)
where
    F: std::future::Future<Output = Result<T, anyhow::Error>>,
{
    let start = std::time::Instant::now();
    let result = future.await;
    let status = if result.is_ok() { "success" } else { "error" };
    (result, start.elapsed().as_secs_f64(), status)
}

/// Counts and times a MongoDB call against `collection`.
pub async fn track_db_operation<F, T>(
    operation: &str,
    collection: &str,
    future: F,
) -> Result<T, anyhow::Error>
where
    F: std::future::Future<Output = Result<T, anyhow::Error>>,
{
    let (result, duration, status) = timed(future).await;
    DB_OPERATIONS_TOTAL
        .with_label_values(&[operation, collection, status])
        .inc();
    DB_OPERATION_DURATION_SECONDS
        .with_label_values(&[operation, collection])
        .observe(duration);
    result
}

/// Counts and times a Redis profile-store call.
pub async fn track_cache_operation<F, T>(operation: &str, future: F) -> Result<T, anyhow::Error>
where
    F: std::future::Future<Output = Result<T, anyhow::Error>>,
{
    let (result, duration, status) = timed(future).await;
    CACHE_OPERATIONS_TOTAL
        .with_label_values(&[operation, status])
        .inc();
    CACHE_OPERATION_DURATION_SECONDS
        .with_label_values(&[operation])
        .observe(duration);
    result
}

pub fn record_cache_hit() {
    CACHE_HIT_RATIO.with_label_values(&["hit"]).inc();
}

pub fn record_cache_miss() {
    CACHE_HIT_RATIO.with_label_values(&["miss"]).inc();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_registration() {
        let _ = HTTP_REQUESTS_TOTAL
            .with_label_values(&["GET", "/health", "200"])
            .get();
        let _ = QUIZ_SESSIONS_ACTIVE.get();
    }

    #[tokio::test]
    async fn test_db_operations_are_labelled_by_outcome() {
        let ok: anyhow::Result<u32> =
            track_db_operation("find", "metrics_test", async { Ok(1) }).await;
        assert_eq!(ok.unwrap(), 1);
        let failed: anyhow::Result<u32> = track_db_operation("find", "metrics_test", async {
            Err(anyhow::anyhow!("boom"))
        })
        .await;
        assert!(failed.is_err());

        assert_eq!(
            DB_OPERATIONS_TOTAL
                .with_label_values(&["find", "metrics_test", "error"])
                .get(),
            1
        );
    }

    #[test]
    fn test_render_metrics() {
        EFFECTS_APPLIED_TOTAL
            .with_label_values(&["scenario", "applied"])
            .inc();

        let output = render_metrics().unwrap();
        assert!(output.contains("effects_applied_total"));
    }
}
