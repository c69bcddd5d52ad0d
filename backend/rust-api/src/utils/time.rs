use chrono::{DateTime, TimeZone, Utc};

/// Milliseconds since the Unix epoch, as stored on leaderboard documents.
pub fn epoch_millis(dt: DateTime<Utc>) -> i64 {
    dt.timestamp_millis()
}

pub fn from_epoch_millis(millis: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_millis_opt(millis).single()
}
