use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use tokio::sync::RwLock;

use crate::metrics::{record_cache_hit, record_cache_miss, track_cache_operation};
use crate::models::badge::BadgeDefinition;
use crate::models::profile::UserProfile;
use crate::services::profile_migration::{migrate, CURRENT_VERSION};

const KEY_PREFIX: &str = "journey:profile";

pub fn profile_key(version: u32, profile_id: &str) -> String {
    format!("{}:v{}:{}", KEY_PREFIX, version, profile_id)
}

/// Raw string key-value storage for serialized profiles.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;
    async fn set(&self, key: &str, value: String) -> Result<()>;
    async fn delete(&self, key: &str) -> Result<()>;
    async fn ping(&self) -> Result<()>;
}

pub struct RedisProfileStore {
    redis: ConnectionManager,
}

impl RedisProfileStore {
    pub fn new(redis: ConnectionManager) -> Self {
        Self { redis }
    }
}

#[async_trait]
impl ProfileStore for RedisProfileStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.redis.clone();
        track_cache_operation("get", async {
            redis::cmd("GET")
                .arg(key)
                .query_async::<Option<String>>(&mut conn)
                .await
                .context("Failed to read profile from Redis")
        })
        .await
    }

    async fn set(&self, key: &str, value: String) -> Result<()> {
        let mut conn = self.redis.clone();
        track_cache_operation("set", async {
            redis::cmd("SET")
                .arg(key)
                .arg(value)
                .query_async::<()>(&mut conn)
                .await
                .context("Failed to save profile to Redis")
        })
        .await
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut conn = self.redis.clone();
        track_cache_operation("del", async {
            redis::cmd("DEL")
                .arg(key)
                .query_async::<()>(&mut conn)
                .await
                .context("Failed to delete profile from Redis")
        })
        .await
    }

    async fn ping(&self) -> Result<()> {
        let mut conn = self.redis.clone();
        redis::cmd("PING")
            .query_async::<String>(&mut conn)
            .await
            .context("Redis PING failed")?;
        Ok(())
    }
}

/// Process-local store used by tests and local development.
#[derive(Default)]
pub struct InMemoryProfileStore {
    entries: RwLock<HashMap<String, String>>,
}

impl InMemoryProfileStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.entries.read().await.keys().cloned().collect();
        keys.sort();
        keys
    }
}

#[async_trait]
impl ProfileStore for InMemoryProfileStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: String) -> Result<()> {
        self.entries.write().await.insert(key.to_string(), value);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.entries.write().await.remove(key);
        Ok(())
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}

/// Versioned profile persistence on top of a [`ProfileStore`].
///
/// Reads try the current key first and then every older schema key, newest
/// first. A legacy hit is migrated and written back under the current key;
/// the legacy key itself is left as it was.
pub struct ProfileRepository {
    badges: Vec<BadgeDefinition>,
    store: Arc<dyn ProfileStore>,
}

impl ProfileRepository {
    pub fn new(store: Arc<dyn ProfileStore>, badges: Vec<BadgeDefinition>) -> Self {
        Self { badges, store }
    }

    /// Loads a profile. Missing, unreadable or invalid data yields `None`.
    pub async fn load(&self, profile_id: &str) -> Option<UserProfile> {
        for version in (1..=CURRENT_VERSION).rev() {
            let key = profile_key(version, profile_id);
            let raw = match self.store.get(&key).await {
                Ok(Some(raw)) => raw,
                Ok(None) => continue,
                Err(e) => {
                    tracing::error!("Failed to read profile {}: {:#}", key, e);
                    return None;
                }
            };

            let profile = serde_json::from_str::<serde_json::Value>(&raw)
                .map_err(anyhow::Error::from)
                .and_then(|value| {
                    migrate(profile_id, value, version, &self.badges).map_err(anyhow::Error::from)
                });

            return match profile {
                Ok(profile) => {
                    record_cache_hit();
                    if version != CURRENT_VERSION {
                        tracing::info!(
                            "Migrated profile {} from schema v{} to v{}",
                            profile_id,
                            version,
                            CURRENT_VERSION
                        );
                        self.save(&profile).await;
                    }
                    Some(profile)
                }
                Err(e) => {
                    tracing::warn!("Discarding unreadable profile {}: {:#}", key, e);
                    None
                }
            };
        }

        record_cache_miss();
        None
    }

    /// Persists under the current key. Failures are logged, never retried.
    pub async fn save(&self, profile: &UserProfile) -> bool {
        let key = profile_key(CURRENT_VERSION, &profile.id);
        let result = match serde_json::to_string(profile) {
            Ok(json) => self.store.set(&key, json).await,
            Err(e) => Err(e.into()),
        };
        match result {
            Ok(()) => true,
            Err(e) => {
                tracing::error!("Failed to persist profile {}: {:#}", profile.id, e);
                false
            }
        }
    }

    /// Removes the profile under every schema key so a reset cannot be
    /// undone by a legacy document being migrated back in.
    pub async fn delete(&self, profile_id: &str) -> Result<()> {
        for version in 1..=CURRENT_VERSION {
            self.store.delete(&profile_key(version, profile_id)).await?;
        }
        Ok(())
    }

    pub async fn ping(&self) -> Result<()> {
        self.store.ping().await
    }
}
