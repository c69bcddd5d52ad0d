//! Stat, XP and badge progression.
//!
//! Every function here is pure: it takes the current profile and returns the
//! next one. Persistence and notifications are handled by `ProfileService`.

use chrono::Utc;

use crate::models::badge::{Badge, BadgeDefinition};
use crate::models::profile::{Activity, ProfileView, UserProfile};
use crate::models::stats::{StatsEffect, UserStats};

/// Activity id of the memory-match mini-game
pub const MEMORY_MATCH_ID: &str = "memory-match";

/// Rules that drive progression. Badge thresholds are data, not code.
#[derive(Debug, Clone)]
pub struct ProgressionRules {
    pub level_size: u64,
    pub badges: Vec<BadgeDefinition>,
}

#[derive(Debug, Clone)]
pub struct EffectOutcome {
    pub profile: UserProfile,
    /// False when a once-only activity had already been credited
    pub applied: bool,
    pub xp_gained: u64,
    /// Badges unlocked by this application, in catalogue order
    pub newly_unlocked: Vec<Badge>,
}

impl EffectOutcome {
    /// Badge to announce when several unlock at once: the last one wins.
    pub fn spotlight(&self) -> Option<&Badge> {
        self.newly_unlocked.last()
    }
}

/// Applies a stat effect to a profile.
///
/// A once-only activity that is already recorded leaves the profile
/// untouched. Otherwise every present delta is applied and clamped, XP grows
/// by the sum of absolute deltas, the activity is recorded and badge
/// thresholds are re-evaluated against the new stats.
pub fn apply_effect(
    profile: &UserProfile,
    effect: &StatsEffect,
    activity: Option<&Activity>,
    rules: &ProgressionRules,
) -> EffectOutcome {
    if let Some(activity) = activity {
        if profile.has_completed(activity) {
            return EffectOutcome {
                profile: profile.clone(),
                applied: false,
                xp_gained: 0,
                newly_unlocked: Vec::new(),
            };
        }
    }

    let mut next = profile.clone();
    next.stats = profile.stats.with_effect(effect);

    let xp_gained = effect.magnitude();
    next.total_xp = next.total_xp.saturating_add(xp_gained);

    if let Some(activity) = activity {
        next.completed_activity_ids
            .insert(activity.completion_key());
    }

    let newly_unlocked = evaluate_badges(&mut next.badges, &next.stats, &rules.badges);
    next.updated_at = Utc::now();

    EffectOutcome {
        profile: next,
        applied: true,
        xp_gained,
        newly_unlocked,
    }
}

/// Adds a finished quiz score to the profile's XP. Stats are unchanged, so
/// badges are not re-evaluated.
pub fn credit_xp(profile: &UserProfile, amount: u64) -> UserProfile {
    let mut next = profile.clone();
    next.total_xp = next.total_xp.saturating_add(amount);
    next.updated_at = Utc::now();
    next
}

/// Unlocks every locked badge whose thresholds hold for `stats`, returning
/// the badges that changed. Unlocked badges are never touched again.
pub fn evaluate_badges(
    badges: &mut Vec<Badge>,
    stats: &UserStats,
    definitions: &[BadgeDefinition],
) -> Vec<Badge> {
    backfill_badges(badges, definitions);

    let mut unlocked = Vec::new();
    for definition in definitions {
        let Some(badge) = badges.iter_mut().find(|badge| badge.id == definition.id) else {
            continue;
        };
        if badge.unlocked {
            continue;
        }
        if definition.is_satisfied_by(stats) {
            badge.unlocked = true;
            unlocked.push(badge.clone());
        }
    }
    unlocked
}

/// Adds locked copies of catalogue badges missing from the profile.
pub fn backfill_badges(badges: &mut Vec<Badge>, definitions: &[BadgeDefinition]) {
    for definition in definitions {
        if !badges.iter().any(|badge| badge.id == definition.id) {
            badges.push(definition.locked_badge());
        }
    }
}

pub fn level_for(total_xp: u64, level_size: u64) -> u32 {
    let size = level_size.max(1);
    (total_xp / size + 1).min(u32::MAX as u64) as u32
}

pub fn level_title(level: u32) -> &'static str {
    match level {
        0 | 1 => "Recruit",
        2 => "Trainee",
        3 => "Revolutionary Soldier",
        _ => "Future Leader",
    }
}

/// Leaderboard title for a best quiz score
pub fn quiz_title(score: u64) -> &'static str {
    match score {
        s if s >= 8000 => "Future Leader",
        s if s >= 6000 => "Revolutionary Soldier",
        s if s >= 4000 => "Trainee",
        _ => "Recruit",
    }
}

pub fn profile_view(profile: UserProfile, level_size: u64) -> ProfileView {
    let size = level_size.max(1);
    let level = level_for(profile.total_xp, size);
    let next_level_xp = level as u64 * size;
    let xp_to_next_level = next_level_xp.saturating_sub(profile.total_xp);
    let level_progress_percent = ((profile.total_xp % size) * 100 / size) as u32;

    ProfileView {
        profile,
        level,
        level_title: level_title(level),
        next_level_xp,
        xp_to_next_level,
        level_progress_percent,
    }
}

/// Stat reward for winning the memory-match game: fewer moves pay more.
pub fn mini_game_reward(moves: u32) -> StatsEffect {
    let (creativity, knowledge) = match moves {
        0..=8 => (15, 10),
        9..=12 => (10, 5),
        _ => (5, 5),
    };
    StatsEffect {
        creativity: Some(creativity),
        knowledge: Some(knowledge),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::badge::StatThreshold;
    use crate::models::stats::StatKey;
    use std::collections::BTreeSet;

    fn threshold(id: &str, requires: &[(StatKey, u32)]) -> BadgeDefinition {
        BadgeDefinition {
            id: id.to_string(),
            name: format!("badge {}", id),
            icon: "star".to_string(),
            description: String::new(),
            requires: requires
                .iter()
                .map(|(stat, min)| StatThreshold {
                    stat: *stat,
                    min: *min,
                })
                .collect(),
        }
    }

    fn rules() -> ProgressionRules {
        ProgressionRules {
            level_size: 50,
            badges: vec![
                threshold("1", &[(StatKey::Knowledge, 20)]),
                threshold("2", &[(StatKey::Creativity, 40)]),
                threshold("3", &[(StatKey::Trust, 50)]),
                threshold(
                    "4",
                    &[(StatKey::Knowledge, 50), (StatKey::Resilience, 50)],
                ),
                threshold("5", &[(StatKey::Resilience, 70)]),
            ],
        }
    }

    fn new_profile(rules: &ProgressionRules) -> UserProfile {
        let now = Utc::now();
        UserProfile {
            id: "p1".to_string(),
            name: "Minh".to_string(),
            avatar_id: "1".to_string(),
            stats: UserStats::INITIAL,
            badges: rules.badges.iter().map(|d| d.locked_badge()).collect(),
            total_xp: 0,
            completed_activity_ids: BTreeSet::new(),
            created_at: now,
            updated_at: now,
        }
    }

    fn s1_effect() -> StatsEffect {
        StatsEffect {
            resilience: Some(20),
            knowledge: Some(15),
            creativity: Some(10),
            trust: None,
        }
    }

    #[test]
    fn scenario_effect_updates_stats_xp_and_badges() {
        let rules = rules();
        let profile = new_profile(&rules);

        let outcome = apply_effect(
            &profile,
            &s1_effect(),
            Some(&Activity::scenario("s1")),
            &rules,
        );

        assert!(outcome.applied);
        assert_eq!(
            outcome.profile.stats,
            UserStats {
                resilience: 40,
                creativity: 30,
                trust: 10,
                knowledge: 25,
            }
        );
        assert_eq!(outcome.xp_gained, 45);
        assert_eq!(outcome.profile.total_xp, 45);
        assert!(outcome.profile.completed_activity_ids.contains("s1"));
        assert_eq!(outcome.newly_unlocked.len(), 1);
        assert_eq!(outcome.newly_unlocked[0].id, "1");
    }

    #[test]
    fn repeated_scenario_is_a_no_op() {
        let rules = rules();
        let profile = new_profile(&rules);
        let activity = Activity::scenario("s1");

        let first = apply_effect(&profile, &s1_effect(), Some(&activity), &rules);
        let second = apply_effect(&first.profile, &s1_effect(), Some(&activity), &rules);

        assert!(!second.applied);
        assert_eq!(second.xp_gained, 0);
        assert_eq!(second.profile.stats, first.profile.stats);
        assert_eq!(second.profile.total_xp, first.profile.total_xp);
        assert!(second.newly_unlocked.is_empty());
    }

    #[test]
    fn effects_without_activity_always_apply() {
        let rules = rules();
        let profile = new_profile(&rules);

        let first = apply_effect(&profile, &s1_effect(), None, &rules);
        let second = apply_effect(&first.profile, &s1_effect(), None, &rules);

        assert!(second.applied);
        assert_eq!(second.profile.total_xp, 90);
    }

    #[test]
    fn negative_deltas_grant_xp_and_clamp_at_zero() {
        let rules = rules();
        let profile = new_profile(&rules);
        let effect = StatsEffect {
            trust: Some(-30),
            knowledge: Some(-10),
            resilience: Some(-5),
            creativity: None,
        };

        let outcome = apply_effect(&profile, &effect, None, &rules);

        assert_eq!(outcome.profile.stats.trust, 0);
        assert_eq!(outcome.profile.stats.knowledge, 0);
        assert_eq!(outcome.profile.stats.resilience, 15);
        assert_eq!(outcome.xp_gained, 45);
    }

    #[test]
    fn unlocked_badges_stay_unlocked_when_stats_drop() {
        let rules = rules();
        let profile = new_profile(&rules);

        let up = apply_effect(
            &profile,
            &StatsEffect {
                knowledge: Some(30),
                ..Default::default()
            },
            None,
            &rules,
        );
        let down = apply_effect(
            &up.profile,
            &StatsEffect {
                knowledge: Some(-100),
                ..Default::default()
            },
            None,
            &rules,
        );

        assert_eq!(down.profile.stats.knowledge, 0);
        let pathfinder = down
            .profile
            .badges
            .iter()
            .find(|badge| badge.id == "1")
            .unwrap();
        assert!(pathfinder.unlocked);
        assert!(down.newly_unlocked.is_empty());
    }

    #[test]
    fn simultaneous_unlocks_spotlight_the_last() {
        let rules = rules();
        let profile = new_profile(&rules);
        let effect = StatsEffect {
            resilience: Some(60),
            knowledge: Some(50),
            creativity: Some(30),
            trust: Some(50),
        };

        let outcome = apply_effect(&profile, &effect, None, &rules);

        let ids: Vec<&str> = outcome
            .newly_unlocked
            .iter()
            .map(|badge| badge.id.as_str())
            .collect();
        assert_eq!(ids, vec!["1", "2", "3", "4", "5"]);
        assert_eq!(outcome.spotlight().unwrap().id, "5");
    }

    #[test]
    fn missing_badges_are_backfilled_before_evaluation() {
        let rules = rules();
        let mut profile = new_profile(&rules);
        profile.badges.clear();

        let outcome = apply_effect(&profile, &s1_effect(), None, &rules);

        assert_eq!(outcome.profile.badges.len(), 5);
        assert_eq!(outcome.newly_unlocked.len(), 1);
    }

    #[test]
    fn level_is_derived_from_xp() {
        assert_eq!(level_for(0, 50), 1);
        assert_eq!(level_for(49, 50), 1);
        assert_eq!(level_for(50, 50), 2);
        assert_eq!(level_for(175, 50), 4);
        assert_eq!(level_title(1), "Recruit");
        assert_eq!(level_title(3), "Revolutionary Soldier");
        assert_eq!(level_title(9), "Future Leader");
    }

    #[test]
    fn quiz_titles_follow_score_buckets() {
        assert_eq!(quiz_title(0), "Recruit");
        assert_eq!(quiz_title(4000), "Trainee");
        assert_eq!(quiz_title(6500), "Revolutionary Soldier");
        assert_eq!(quiz_title(8000), "Future Leader");
    }

    #[test]
    fn profile_view_reports_progress_to_next_level() {
        let rules = rules();
        let mut profile = new_profile(&rules);
        profile.total_xp = 65;

        let view = profile_view(profile, 50);

        assert_eq!(view.level, 2);
        assert_eq!(view.level_title, "Trainee");
        assert_eq!(view.next_level_xp, 100);
        assert_eq!(view.xp_to_next_level, 35);
        assert_eq!(view.level_progress_percent, 30);
    }

    #[test]
    fn mini_game_reward_scales_with_moves() {
        assert_eq!(mini_game_reward(8).magnitude(), 25);
        assert_eq!(mini_game_reward(12).magnitude(), 15);
        assert_eq!(mini_game_reward(30).magnitude(), 10);
    }

    #[test]
    fn credit_xp_leaves_stats_alone() {
        let rules = rules();
        let profile = new_profile(&rules);
        let next = credit_xp(&profile, 1416);
        assert_eq!(next.total_xp, 1416);
        assert_eq!(next.stats, profile.stats);
    }
}
