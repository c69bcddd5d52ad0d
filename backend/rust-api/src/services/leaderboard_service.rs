use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use futures::TryStreamExt;
use mongodb::bson::doc;
use mongodb::options::ReplaceOptions;
use mongodb::{Collection, Database};
use tokio::sync::{Mutex, RwLock};
use tokio::time::Instant;

use crate::config::LeaderboardSettings;
use crate::metrics::{record_cache_hit, record_cache_miss, track_db_operation, LEADERBOARD_WRITES_TOTAL};
use crate::models::leaderboard::{normalize_player_key, LeaderboardEntry, ScoreTrack};
use crate::models::profile::UserProfile;
use crate::services::progression::{level_for, level_title, quiz_title};
use crate::utils::time::epoch_millis;

/// Document storage for leaderboard tracks.
#[async_trait]
pub trait LeaderboardStore: Send + Sync {
    /// Highest scores first
    async fn top(&self, track: ScoreTrack, limit: i64) -> Result<Vec<LeaderboardEntry>>;
    async fn find(&self, track: ScoreTrack, key: &str) -> Result<Option<LeaderboardEntry>>;
    /// Insert or overwrite the document with `entry.id`
    async fn upsert(&self, track: ScoreTrack, entry: &LeaderboardEntry) -> Result<()>;
    /// Returns whether a document was removed
    async fn delete(&self, track: ScoreTrack, key: &str) -> Result<bool>;
    async fn ping(&self) -> Result<()>;
}

pub struct MongoLeaderboardStore {
    mongo: Database,
}

impl MongoLeaderboardStore {
    pub fn new(mongo: Database) -> Self {
        Self { mongo }
    }

    fn collection(&self, track: ScoreTrack) -> Collection<LeaderboardEntry> {
        self.mongo.collection(track.collection())
    }
}

#[async_trait]
impl LeaderboardStore for MongoLeaderboardStore {
    async fn top(&self, track: ScoreTrack, limit: i64) -> Result<Vec<LeaderboardEntry>> {
        let collection = self.collection(track);
        track_db_operation("find", track.collection(), async {
            let cursor = collection
                .find(doc! {})
                .sort(doc! { "total_xp": -1 })
                .limit(limit)
                .await
                .context("Failed to query leaderboard")?;
            cursor
                .try_collect::<Vec<_>>()
                .await
                .context("Failed to read leaderboard cursor")
        })
        .await
    }

    async fn find(&self, track: ScoreTrack, key: &str) -> Result<Option<LeaderboardEntry>> {
        let collection = self.collection(track);
        track_db_operation("find_one", track.collection(), async {
            collection
                .find_one(doc! { "_id": key })
                .await
                .context("Failed to load leaderboard entry")
        })
        .await
    }

    async fn upsert(&self, track: ScoreTrack, entry: &LeaderboardEntry) -> Result<()> {
        let collection = self.collection(track);
        track_db_operation("replace_one", track.collection(), async {
            collection
                .replace_one(doc! { "_id": &entry.id }, entry)
                .with_options(ReplaceOptions::builder().upsert(true).build())
                .await
                .context("Failed to save leaderboard entry")?;
            Ok(())
        })
        .await
    }

    async fn delete(&self, track: ScoreTrack, key: &str) -> Result<bool> {
        let collection = self.collection(track);
        track_db_operation("delete_one", track.collection(), async {
            let result = collection
                .delete_one(doc! { "_id": key })
                .await
                .context("Failed to delete leaderboard entry")?;
            Ok(result.deleted_count > 0)
        })
        .await
    }

    async fn ping(&self) -> Result<()> {
        self.mongo
            .run_command(doc! { "ping": 1 })
            .await
            .context("MongoDB ping failed")?;
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryLeaderboardStore {
    tracks: RwLock<HashMap<ScoreTrack, HashMap<String, LeaderboardEntry>>>,
}

impl InMemoryLeaderboardStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LeaderboardStore for InMemoryLeaderboardStore {
    async fn top(&self, track: ScoreTrack, limit: i64) -> Result<Vec<LeaderboardEntry>> {
        let tracks = self.tracks.read().await;
        let mut entries: Vec<LeaderboardEntry> = tracks
            .get(&track)
            .map(|entries| entries.values().cloned().collect())
            .unwrap_or_default();
        entries.sort_by(|a, b| b.total_xp.cmp(&a.total_xp).then_with(|| a.id.cmp(&b.id)));
        entries.truncate(limit.max(0) as usize);
        Ok(entries)
    }

    async fn find(&self, track: ScoreTrack, key: &str) -> Result<Option<LeaderboardEntry>> {
        let tracks = self.tracks.read().await;
        Ok(tracks.get(&track).and_then(|entries| entries.get(key)).cloned())
    }

    async fn upsert(&self, track: ScoreTrack, entry: &LeaderboardEntry) -> Result<()> {
        self.tracks
            .write()
            .await
            .entry(track)
            .or_default()
            .insert(entry.id.clone(), entry.clone());
        Ok(())
    }

    async fn delete(&self, track: ScoreTrack, key: &str) -> Result<bool> {
        let mut tracks = self.tracks.write().await;
        Ok(tracks
            .get_mut(&track)
            .and_then(|entries| entries.remove(key))
            .is_some())
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}

struct CachedBoard {
    entries: Vec<LeaderboardEntry>,
    fetched_at: Instant,
}

/// Cached access to the ranking tracks.
///
/// Each track has its own cache slot. The slot's lock is held while fetching,
/// so concurrent readers share one round-trip instead of issuing their own.
/// Any write to a track drops its cached board.
pub struct LeaderboardService {
    store: Arc<dyn LeaderboardStore>,
    settings: LeaderboardSettings,
    level_size: u64,
    journey_cache: Mutex<Option<CachedBoard>>,
    quiz_cache: Mutex<Option<CachedBoard>>,
    writes: Mutex<()>,
}

impl LeaderboardService {
    pub fn new(store: Arc<dyn LeaderboardStore>, settings: LeaderboardSettings, level_size: u64) -> Self {
        Self {
            store,
            settings,
            level_size,
            journey_cache: Mutex::new(None),
            quiz_cache: Mutex::new(None),
            writes: Mutex::new(()),
        }
    }

    fn cache(&self, track: ScoreTrack) -> &Mutex<Option<CachedBoard>> {
        match track {
            ScoreTrack::Journey => &self.journey_cache,
            ScoreTrack::Quiz => &self.quiz_cache,
        }
    }

    async fn invalidate(&self, track: ScoreTrack) {
        *self.cache(track).lock().await = None;
    }

    /// Top entries of a track. Store failures fall back to the last cached
    /// board, or an empty list when nothing was cached.
    pub async fn top(&self, track: ScoreTrack, force_refresh: bool) -> Vec<LeaderboardEntry> {
        let ttl = Duration::from_secs(self.settings.cache_ttl_seconds);
        let mut slot = self.cache(track).lock().await;

        if !force_refresh {
            if let Some(cached) = slot.as_ref() {
                if cached.fetched_at.elapsed() < ttl {
                    record_cache_hit();
                    tracing::debug!("Leaderboard cache hit for {}", track.as_str());
                    return cached.entries.clone();
                }
            }
        }
        record_cache_miss();

        match self.store.top(track, self.settings.top_n).await {
            Ok(entries) => {
                *slot = Some(CachedBoard {
                    entries: entries.clone(),
                    fetched_at: Instant::now(),
                });
                entries
            }
            Err(e) => {
                tracing::warn!("Failed to fetch {} leaderboard: {:#}", track.as_str(), e);
                slot.as_ref()
                    .map(|cached| cached.entries.clone())
                    .unwrap_or_default()
            }
        }
    }

    /// Overwrites the player's journey entry with their cumulative XP.
    pub async fn save_journey_score(&self, profile: &UserProfile) -> bool {
        let level = level_for(profile.total_xp, self.level_size);
        let Some(entry) = entry_for(&profile.name, &profile.avatar_id, profile.total_xp, level_title(level)) else {
            return false;
        };

        let _guard = self.writes.lock().await;
        self.write(ScoreTrack::Journey, &entry).await
    }

    /// Stores a quiz score unless the player already holds a higher one.
    pub async fn save_quiz_score(&self, name: &str, avatar_id: &str, score: u64) -> bool {
        let Some(entry) = entry_for(name, avatar_id, score, quiz_title(score)) else {
            return false;
        };

        let _guard = self.writes.lock().await;
        match self.store.find(ScoreTrack::Quiz, &entry.id).await {
            Ok(Some(existing)) if existing.total_xp >= score => {
                tracing::debug!(
                    "Keeping best quiz score {} for {} (new score {})",
                    existing.total_xp,
                    entry.id,
                    score
                );
                true
            }
            Ok(_) => self.write(ScoreTrack::Quiz, &entry).await,
            Err(e) => {
                tracing::warn!("Failed to read quiz score for {}: {:#}", entry.id, e);
                LEADERBOARD_WRITES_TOTAL
                    .with_label_values(&[ScoreTrack::Quiz.as_str(), "error"])
                    .inc();
                false
            }
        }
    }

    async fn write(&self, track: ScoreTrack, entry: &LeaderboardEntry) -> bool {
        let result = self.store.upsert(track, entry).await;
        self.invalidate(track).await;
        match result {
            Ok(()) => {
                LEADERBOARD_WRITES_TOTAL
                    .with_label_values(&[track.as_str(), "success"])
                    .inc();
                tracing::info!(
                    "Saved {} score {} for {}",
                    track.as_str(),
                    entry.total_xp,
                    entry.id
                );
                true
            }
            Err(e) => {
                LEADERBOARD_WRITES_TOTAL
                    .with_label_values(&[track.as_str(), "error"])
                    .inc();
                tracing::error!("Failed to save {} score for {}: {:#}", track.as_str(), entry.id, e);
                false
            }
        }
    }

    pub async fn delete(&self, track: ScoreTrack, key: &str) -> bool {
        let _guard = self.writes.lock().await;
        let result = self.store.delete(track, key).await;
        self.invalidate(track).await;
        match result {
            Ok(removed) => {
                if removed {
                    tracing::info!("Deleted {} leaderboard entry {}", track.as_str(), key);
                }
                removed
            }
            Err(e) => {
                tracing::error!("Failed to delete {} entry {}: {:#}", track.as_str(), key, e);
                false
            }
        }
    }

    pub async fn ping(&self) -> Result<()> {
        self.store.ping().await
    }
}

fn entry_for(name: &str, avatar_id: &str, score: u64, title: &str) -> Option<LeaderboardEntry> {
    let key = normalize_player_key(name);
    if key.is_empty() {
        return None;
    }
    Some(LeaderboardEntry {
        id: key,
        name: name.trim().to_string(),
        avatar_id: avatar_id.to_string(),
        total_xp: score,
        title: title.to_string(),
        timestamp: epoch_millis(Utc::now()),
    })
}
