use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::metrics::{BADGES_UNLOCKED_TOTAL, EFFECTS_APPLIED_TOTAL, PROFILES_TOTAL};
use crate::models::content::Catalog;
use crate::models::profile::{
    Activity, CreateProfileRequest, EffectResponse, ProfileView, UserProfile, AVATAR_IDS,
};
use crate::models::stats::{StatsEffect, UserStats};
use crate::services::content_service::ContentError;
use crate::services::leaderboard_service::LeaderboardService;
use crate::services::profile_store::ProfileRepository;
use crate::services::progression::{
    self, apply_effect, mini_game_reward, EffectOutcome, ProgressionRules, MEMORY_MATCH_ID,
};

#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("Profile not found: {0}")]
    NotFound(String),
    #[error("{0}")]
    Invalid(String),
    #[error(transparent)]
    Content(#[from] ContentError),
}

/// Owns every profile mutation: load, apply, persist, rank.
///
/// Mutations are serialised by one lock so two requests for the same profile
/// never interleave their read-modify-write.
pub struct ProfileService {
    repository: ProfileRepository,
    leaderboard: Arc<LeaderboardService>,
    catalog: Arc<Catalog>,
    rules: ProgressionRules,
    writes: Mutex<()>,
}

impl ProfileService {
    pub fn new(
        repository: ProfileRepository,
        leaderboard: Arc<LeaderboardService>,
        catalog: Arc<Catalog>,
        level_size: u64,
    ) -> Self {
        let rules = ProgressionRules {
            level_size,
            badges: catalog.badges.clone(),
        };
        Self {
            repository,
            leaderboard,
            catalog,
            rules,
            writes: Mutex::new(()),
        }
    }

    pub fn level_size(&self) -> u64 {
        self.rules.level_size
    }

    pub fn view(&self, profile: UserProfile) -> ProfileView {
        progression::profile_view(profile, self.rules.level_size)
    }

    pub async fn create(&self, req: &CreateProfileRequest) -> Result<UserProfile, ProfileError> {
        let name = req.name.trim();
        if name.is_empty() {
            return Err(ProfileError::Invalid("Name must not be blank".to_string()));
        }
        if !AVATAR_IDS.contains(&req.avatar_id.as_str()) {
            return Err(ProfileError::Invalid(format!(
                "Unknown avatar: {}",
                req.avatar_id
            )));
        }

        let now = Utc::now();
        let profile = UserProfile {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            avatar_id: req.avatar_id.clone(),
            stats: UserStats::INITIAL,
            badges: self
                .rules
                .badges
                .iter()
                .map(|definition| definition.locked_badge())
                .collect(),
            total_xp: 0,
            completed_activity_ids: Default::default(),
            created_at: now,
            updated_at: now,
        };

        self.repository.save(&profile).await;
        PROFILES_TOTAL.with_label_values(&["created"]).inc();
        tracing::info!("Profile created: {} ({})", profile.id, profile.name);

        Ok(profile)
    }

    pub async fn get(&self, profile_id: &str) -> Option<UserProfile> {
        self.repository.load(profile_id).await
    }

    /// Deletes the stored profile. Returns false when there was nothing to delete.
    pub async fn reset(&self, profile_id: &str) -> anyhow::Result<bool> {
        let _guard = self.writes.lock().await;
        if self.repository.load(profile_id).await.is_none() {
            return Ok(false);
        }
        self.repository.delete(profile_id).await?;
        PROFILES_TOTAL.with_label_values(&["reset"]).inc();
        tracing::info!("Profile reset: {}", profile_id);
        Ok(true)
    }

    pub async fn apply_effect(
        &self,
        profile_id: &str,
        effect: &StatsEffect,
        activity: Option<&Activity>,
    ) -> Result<EffectOutcome, ProfileError> {
        let _guard = self.writes.lock().await;
        let profile = self
            .repository
            .load(profile_id)
            .await
            .ok_or_else(|| ProfileError::NotFound(profile_id.to_string()))?;

        let outcome = apply_effect(&profile, effect, activity, &self.rules);
        let activity_label = activity.map(|a| a.kind.as_str()).unwrap_or("direct");

        if !outcome.applied {
            EFFECTS_APPLIED_TOTAL
                .with_label_values(&[activity_label, "duplicate"])
                .inc();
            tracing::debug!(
                "Activity {:?} already credited for profile {}",
                activity.map(|a| a.completion_key()),
                profile_id
            );
            return Ok(outcome);
        }

        EFFECTS_APPLIED_TOTAL
            .with_label_values(&[activity_label, "applied"])
            .inc();
        for badge in &outcome.newly_unlocked {
            BADGES_UNLOCKED_TOTAL.with_label_values(&[badge.id.as_str()]).inc();
            tracing::info!("Profile {} unlocked badge {}", profile_id, badge.name);
        }

        self.repository.save(&outcome.profile).await;
        if outcome.xp_gained > 0 {
            self.leaderboard.save_journey_score(&outcome.profile).await;
        }

        Ok(outcome)
    }

    /// Applies the chosen option of a scenario. Returns the option's feedback
    /// text with the outcome.
    pub async fn choose_scenario_option(
        &self,
        profile_id: &str,
        scenario_id: &str,
        option_id: &str,
    ) -> Result<(EffectOutcome, String), ProfileError> {
        let (scenario, option) = self.catalog.scenario_option(scenario_id, option_id)?;
        let activity = Activity::scenario(scenario.id.clone());
        let outcome = self
            .apply_effect(profile_id, &option.stats_effect, Some(&activity))
            .await?;
        Ok((outcome, option.feedback.clone()))
    }

    pub async fn record_mini_game_win(
        &self,
        profile_id: &str,
        moves: u32,
    ) -> Result<EffectOutcome, ProfileError> {
        let activity = Activity::minigame(MEMORY_MATCH_ID);
        self.apply_effect(profile_id, &mini_game_reward(moves), Some(&activity))
            .await
    }

    /// Adds a finished quiz score to the profile's XP.
    pub async fn credit_quiz_score(&self, profile_id: &str, score: u64) -> Option<UserProfile> {
        let _guard = self.writes.lock().await;
        let profile = self.repository.load(profile_id).await?;
        let updated = progression::credit_xp(&profile, score);
        self.repository.save(&updated).await;
        tracing::info!(
            "Credited quiz score {} to profile {} (total XP {})",
            score,
            profile_id,
            updated.total_xp
        );
        Some(updated)
    }

    pub fn effect_response(&self, outcome: EffectOutcome, feedback: Option<String>) -> EffectResponse {
        let spotlight_badge = outcome.spotlight().cloned();
        EffectResponse {
            applied: outcome.applied,
            xp_gained: outcome.xp_gained,
            newly_unlocked: outcome.newly_unlocked,
            spotlight_badge,
            feedback,
            profile: self.view(outcome.profile),
        }
    }

    pub async fn ping(&self) -> anyhow::Result<()> {
        self.repository.ping().await
    }
}
