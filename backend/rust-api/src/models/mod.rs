pub mod badge;
pub mod content;
pub mod leaderboard;
pub mod mentor;
pub mod profile;
pub mod quiz;
pub mod stats;
pub mod timer;

pub use badge::{Badge, BadgeDefinition, StatThreshold};
pub use content::{Catalog, QuizQuestion, Scenario, ScenarioOption, TimelineEvent};
pub use leaderboard::{normalize_player_key, LeaderboardEntry, ScoreTrack};
pub use profile::{Activity, ActivityKind, ProfileView, UserProfile};
pub use quiz::{AnswerOutcome, QuizPhase, QuizSnapshot, QuizSummary};
pub use stats::{StatKey, StatsEffect, UserStats};
