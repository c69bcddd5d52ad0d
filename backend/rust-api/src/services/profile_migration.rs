//! Upgrades persisted profile documents to the current schema.
//!
//! Historical layouts:
//! - v1: `{ stats, badges }` only, written before onboarding existed.
//! - v2: camelCase `{ name, avatarId, stats, badges, totalXp }` with optional
//!   `completedScenarios` and `hasCompletedMiniGame`.
//! - v3: the current [`UserProfile`] layout.
//!
//! Every field is optional on input; anything missing is defaulted.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use crate::models::badge::{Badge, BadgeDefinition};
use crate::models::profile::{Activity, UserProfile};
use crate::models::stats::{clamp_stat, UserStats};
use crate::services::progression::{backfill_badges, MEMORY_MATCH_ID};

pub const CURRENT_VERSION: u32 = 3;

/// Name given to profiles that predate onboarding
pub const LEGACY_NAME: &str = "Guest";
pub const LEGACY_AVATAR: &str = "1";

#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("profile document is not a JSON object")]
    NotAnObject,
    #[error("unsupported profile schema version {0}")]
    UnsupportedVersion(u32),
    #[error("malformed profile document: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Stats as they may appear on disk: any field can be missing or out of range.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct LooseStats {
    resilience: Option<i64>,
    creativity: Option<i64>,
    trust: Option<i64>,
    knowledge: Option<i64>,
}

impl LooseStats {
    fn resolve(self) -> UserStats {
        let base = UserStats::INITIAL;
        UserStats {
            resilience: self
                .resilience
                .map(clamp_stat)
                .unwrap_or(base.resilience),
            creativity: self
                .creativity
                .map(clamp_stat)
                .unwrap_or(base.creativity),
            trust: self.trust.map(clamp_stat).unwrap_or(base.trust),
            knowledge: self.knowledge.map(clamp_stat).unwrap_or(base.knowledge),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ProfileV1 {
    stats: LooseStats,
    badges: Vec<Badge>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct ProfileV2 {
    name: Option<String>,
    avatar_id: Option<String>,
    stats: LooseStats,
    badges: Vec<Badge>,
    total_xp: u64,
    completed_scenarios: Vec<String>,
    has_completed_mini_game: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ProfileV3 {
    name: Option<String>,
    avatar_id: Option<String>,
    stats: LooseStats,
    badges: Vec<Badge>,
    total_xp: u64,
    completed_activity_ids: BTreeSet<String>,
    created_at: Option<DateTime<Utc>>,
    updated_at: Option<DateTime<Utc>>,
}

/// Converts a stored document of `from_version` into the current profile.
///
/// `badges` is the badge catalogue; catalogue entries missing from the
/// stored document are added locked.
pub fn migrate(
    profile_id: &str,
    raw: Value,
    from_version: u32,
    badges: &[BadgeDefinition],
) -> Result<UserProfile, MigrationError> {
    if !raw.is_object() {
        return Err(MigrationError::NotAnObject);
    }

    let now = Utc::now();
    let mut profile = match from_version {
        1 => {
            let v1: ProfileV1 = serde_json::from_value(raw)?;
            UserProfile {
                id: profile_id.to_string(),
                name: LEGACY_NAME.to_string(),
                avatar_id: LEGACY_AVATAR.to_string(),
                stats: v1.stats.resolve(),
                badges: v1.badges,
                total_xp: 0,
                completed_activity_ids: BTreeSet::new(),
                created_at: now,
                updated_at: now,
            }
        }
        2 => {
            let v2: ProfileV2 = serde_json::from_value(raw)?;
            let mut completed: BTreeSet<String> = v2
                .completed_scenarios
                .into_iter()
                .map(|id| Activity::scenario(id).completion_key())
                .collect();
            if v2.has_completed_mini_game {
                completed.insert(Activity::minigame(MEMORY_MATCH_ID).completion_key());
            }
            UserProfile {
                id: profile_id.to_string(),
                name: non_empty_or(v2.name, LEGACY_NAME),
                avatar_id: non_empty_or(v2.avatar_id, LEGACY_AVATAR),
                stats: v2.stats.resolve(),
                badges: v2.badges,
                total_xp: v2.total_xp,
                completed_activity_ids: completed,
                created_at: now,
                updated_at: now,
            }
        }
        3 => {
            let v3: ProfileV3 = serde_json::from_value(raw)?;
            let created_at = v3.created_at.unwrap_or(now);
            UserProfile {
                id: profile_id.to_string(),
                name: non_empty_or(v3.name, LEGACY_NAME),
                avatar_id: non_empty_or(v3.avatar_id, LEGACY_AVATAR),
                stats: v3.stats.resolve(),
                badges: v3.badges,
                total_xp: v3.total_xp,
                completed_activity_ids: v3.completed_activity_ids,
                created_at,
                updated_at: v3.updated_at.unwrap_or(created_at),
            }
        }
        other => return Err(MigrationError::UnsupportedVersion(other)),
    };

    backfill_badges(&mut profile.badges, badges);
    Ok(profile)
}

fn non_empty_or(value: Option<String>, fallback: &str) -> String {
    value
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| fallback.to_string())
}
