use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use validator::{Validate, ValidationError};

use super::badge::Badge;
use super::stats::{StatsEffect, UserStats};

/// Avatar identifiers offered at onboarding
pub const AVATAR_IDS: [&str; 4] = ["1", "2", "3", "4"];

/// Player profile persisted under a versioned key after every mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: String,
    pub name: String,
    pub avatar_id: String,
    pub stats: UserStats,
    pub badges: Vec<Badge>,
    pub total_xp: u64,
    /// Once-only activities already credited (scenario ids, mini-game keys)
    pub completed_activity_ids: BTreeSet<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserProfile {
    pub fn has_completed(&self, activity: &Activity) -> bool {
        self.completed_activity_ids
            .contains(&activity.completion_key())
    }

    pub fn unlocked_badges(&self) -> impl Iterator<Item = &Badge> {
        self.badges.iter().filter(|badge| badge.unlocked)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    Scenario,
    Minigame,
}

impl ActivityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityKind::Scenario => "scenario",
            ActivityKind::Minigame => "minigame",
        }
    }
}

/// Identifies the activity an effect came from; both kinds credit only once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Activity {
    #[serde(rename = "type")]
    pub kind: ActivityKind,
    pub id: String,
}

impl Activity {
    pub fn scenario(id: impl Into<String>) -> Self {
        Self {
            kind: ActivityKind::Scenario,
            id: id.into(),
        }
    }

    pub fn minigame(id: impl Into<String>) -> Self {
        Self {
            kind: ActivityKind::Minigame,
            id: id.into(),
        }
    }

    /// Entry recorded in `completed_activity_ids`. Scenario ids are stored
    /// bare; mini-game keys carry a prefix so they never collide with them.
    pub fn completion_key(&self) -> String {
        match self.kind {
            ActivityKind::Scenario => self.id.clone(),
            ActivityKind::Minigame => format!("minigame:{}", self.id),
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateProfileRequest {
    #[validate(custom(function = "validate_display_name"))]
    pub name: String,

    #[validate(length(equal = 1, message = "Unknown avatar"))]
    pub avatar_id: String,
}

/// Names are stored trimmed, so the length limit applies to the trimmed text.
fn validate_display_name(name: &str) -> Result<(), ValidationError> {
    let length = name.trim().chars().count();
    if (1..=40).contains(&length) {
        Ok(())
    } else {
        Err(ValidationError::new("length")
            .with_message("Name must be between 1 and 40 characters".into()))
    }
}

#[derive(Debug, Deserialize)]
pub struct ApplyEffectRequest {
    #[serde(default)]
    pub effect: StatsEffect,
    #[serde(default)]
    pub activity: Option<Activity>,
}

#[derive(Debug, Deserialize)]
pub struct ScenarioChoiceRequest {
    pub option_id: String,
}

#[derive(Debug, Deserialize)]
pub struct MiniGameWinRequest {
    pub moves: u32,
}

/// Profile plus derived level information
#[derive(Debug, Clone, Serialize)]
pub struct ProfileView {
    #[serde(flatten)]
    pub profile: UserProfile,
    pub level: u32,
    pub level_title: &'static str,
    pub next_level_xp: u64,
    pub xp_to_next_level: u64,
    pub level_progress_percent: u32,
}

#[derive(Debug, Serialize)]
pub struct EffectResponse {
    pub applied: bool,
    pub xp_gained: u64,
    pub newly_unlocked: Vec<Badge>,
    /// Badge to surface in the UI; the last one when several unlock at once
    pub spotlight_badge: Option<Badge>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feedback: Option<String>,
    pub profile: ProfileView,
}
