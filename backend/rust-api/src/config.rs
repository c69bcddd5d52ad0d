use serde::Deserialize;
use std::env;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub mongo_uri: String,
    pub redis_uri: String,
    pub mongo_database: String,
    pub bind_address: String,
    pub quiz: QuizSettings,
    pub progression: ProgressionSettings,
    pub leaderboard: LeaderboardSettings,
    pub mentor: MentorSettings,
}

/// Timing and scoring of a quiz session
#[derive(Debug, Clone, Deserialize)]
pub struct QuizSettings {
    pub questions_per_session: usize,
    pub time_limit_seconds: u32,
    pub base_score: u32,
    pub max_bonus: u32,
    pub feedback_seconds: u64,
    pub tick_interval_ms: u64,
    /// How long a finished session stays readable before it is dropped
    pub finished_retention_seconds: u64,
}

impl Default for QuizSettings {
    fn default() -> Self {
        Self {
            questions_per_session: 15,
            time_limit_seconds: 30,
            base_score: 1000,
            max_bonus: 500,
            feedback_seconds: 3,
            tick_interval_ms: 1000,
            finished_retention_seconds: 300,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProgressionSettings {
    /// XP per level
    pub level_size: u64,
}

impl Default for ProgressionSettings {
    fn default() -> Self {
        Self { level_size: 50 }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LeaderboardSettings {
    pub cache_ttl_seconds: u64,
    pub top_n: i64,
}

impl Default for LeaderboardSettings {
    fn default() -> Self {
        Self {
            cache_ttl_seconds: 300,
            top_n: 50,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MentorSettings {
    pub api_url: String,
    pub api_key: Option<String>,
    pub model: String,
    pub temperature: f32,
    pub max_output_tokens: u32,
    pub timeout_seconds: u64,
    /// Chats idle for longer than this are forgotten
    pub chat_ttl_seconds: u64,
    pub max_chats: usize,
}

impl Default for MentorSettings {
    fn default() -> Self {
        Self {
            api_url: "https://generativelanguage.googleapis.com".to_string(),
            api_key: None,
            model: "gemini-3-flash-preview".to_string(),
            temperature: 0.7,
            max_output_tokens: 2048,
            timeout_seconds: 30,
            chat_ttl_seconds: 3600,
            max_chats: 1000,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        // Root .env first, then fall back to a local one
        let skip_root_env = env::var("SKIP_ROOT_ENV").is_ok();
        if skip_root_env {
            dotenvy::dotenv().ok();
        } else if dotenvy::from_path("../../.env").is_err() {
            dotenvy::dotenv().ok();
        }

        let app_env = env::var("APP_ENV").unwrap_or_else(|_| "dev".to_string());

        // config/*.toml + ENV overrides (prefix: APP_)
        let settings = config::Config::builder()
            .add_source(config::File::with_name(&format!("config/{}", app_env)).required(false))
            .add_source(config::Environment::with_prefix("APP").separator("__"))
            .build()?;

        let mongo_uri = settings
            .get_string("database.mongo_uri")
            .or_else(|_| env::var("MONGO_URI"))
            .unwrap_or_else(|_| "mongodb://localhost:27017".to_string());

        let redis_uri = settings
            .get_string("redis.uri")
            .or_else(|_| env::var("REDIS_URI"))
            .unwrap_or_else(|_| {
                let host = env::var("REDIS_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
                let port = env::var("REDIS_PORT").unwrap_or_else(|_| "6379".to_string());
                match env::var("REDIS_PASSWORD") {
                    Ok(password) => format!("redis://:{}@{}:{}/0", password, host, port),
                    Err(_) => format!("redis://{}:{}/0", host, port),
                }
            });

        let mongo_database = settings
            .get_string("database.mongo_database")
            .or_else(|_| env::var("MONGO_DATABASE"))
            .unwrap_or_else(|_| "journey".to_string());

        let bind_address = settings
            .get_string("server.bind_address")
            .or_else(|_| env::var("BIND_ADDRESS"))
            .unwrap_or_else(|_| "0.0.0.0:8081".to_string());

        let quiz_defaults = QuizSettings::default();
        let quiz = QuizSettings {
            questions_per_session: positive(&settings, "quiz.questions_per_session")
                .unwrap_or(quiz_defaults.questions_per_session),
            time_limit_seconds: positive(&settings, "quiz.time_limit_seconds")
                .unwrap_or(quiz_defaults.time_limit_seconds),
            base_score: positive(&settings, "quiz.base_score").unwrap_or(quiz_defaults.base_score),
            max_bonus: non_negative(&settings, "quiz.max_bonus").unwrap_or(quiz_defaults.max_bonus),
            feedback_seconds: non_negative(&settings, "quiz.feedback_seconds")
                .unwrap_or(quiz_defaults.feedback_seconds),
            tick_interval_ms: positive(&settings, "quiz.tick_interval_ms")
                .unwrap_or(quiz_defaults.tick_interval_ms),
            finished_retention_seconds: positive(&settings, "quiz.finished_retention_seconds")
                .unwrap_or(quiz_defaults.finished_retention_seconds),
        };

        let progression = ProgressionSettings {
            level_size: positive(&settings, "progression.level_size")
                .unwrap_or(ProgressionSettings::default().level_size),
        };

        let leaderboard_defaults = LeaderboardSettings::default();
        let leaderboard = LeaderboardSettings {
            cache_ttl_seconds: non_negative(&settings, "leaderboard.cache_ttl_seconds")
                .unwrap_or(leaderboard_defaults.cache_ttl_seconds),
            top_n: positive(&settings, "leaderboard.top_n").unwrap_or(leaderboard_defaults.top_n),
        };

        let mentor_defaults = MentorSettings::default();
        let mentor_api_key = settings
            .get_string("mentor.api_key")
            .or_else(|_| env::var("MENTOR_API_KEY"))
            .ok()
            .filter(|key| !key.trim().is_empty());
        if mentor_api_key.is_none() {
            eprintln!("WARNING: MENTOR_API_KEY is not set, mentor replies will fall back");
        }
        let mentor = MentorSettings {
            api_url: settings
                .get_string("mentor.api_url")
                .or_else(|_| env::var("MENTOR_API_URL"))
                .unwrap_or(mentor_defaults.api_url),
            api_key: mentor_api_key,
            model: settings
                .get_string("mentor.model")
                .unwrap_or(mentor_defaults.model),
            temperature: settings
                .get_float("mentor.temperature")
                .map(|v| v as f32)
                .unwrap_or(mentor_defaults.temperature),
            max_output_tokens: positive(&settings, "mentor.max_output_tokens")
                .unwrap_or(mentor_defaults.max_output_tokens),
            timeout_seconds: positive(&settings, "mentor.timeout_seconds")
                .unwrap_or(mentor_defaults.timeout_seconds),
            chat_ttl_seconds: positive(&settings, "mentor.chat_ttl_seconds")
                .unwrap_or(mentor_defaults.chat_ttl_seconds),
            max_chats: positive(&settings, "mentor.max_chats")
                .unwrap_or(mentor_defaults.max_chats),
        };

        Ok(Config {
            mongo_uri,
            redis_uri,
            mongo_database,
            bind_address,
            quiz,
            progression,
            leaderboard,
            mentor,
        })
    }
}

/// Integer setting that must be above zero. Out-of-range values fall back
/// to the default instead of wrapping.
fn positive<T: TryFrom<i64>>(settings: &config::Config, key: &str) -> Option<T> {
    settings
        .get_int(key)
        .ok()
        .filter(|v| *v > 0)
        .and_then(|v| T::try_from(v).ok())
}

fn non_negative<T: TryFrom<i64>>(settings: &config::Config, key: &str) -> Option<T> {
    settings
        .get_int(key)
        .ok()
        .filter(|v| *v >= 0)
        .and_then(|v| T::try_from(v).ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn env_overrides_quiz_settings() {
        std::env::set_var("SKIP_ROOT_ENV", "1");
        std::env::set_var("APP__QUIZ__TIME_LIMIT_SECONDS", "45");
        let config = Config::load().unwrap();
        assert_eq!(config.quiz.time_limit_seconds, 45);
        assert_eq!(config.quiz.base_score, 1000);
        std::env::remove_var("APP__QUIZ__TIME_LIMIT_SECONDS");
    }

    #[test]
    #[serial]
    fn defaults_match_game_rules() {
        std::env::set_var("SKIP_ROOT_ENV", "1");
        let config = Config::load().unwrap();
        assert_eq!(config.quiz.questions_per_session, 15);
        assert_eq!(config.quiz.max_bonus, 500);
        assert_eq!(config.progression.level_size, 50);
        assert_eq!(config.leaderboard.cache_ttl_seconds, 300);
        assert_eq!(config.quiz.finished_retention_seconds, 300);
        assert_eq!(config.mentor.max_chats, 1000);
    }

    #[test]
    #[serial]
    fn negative_values_fall_back_to_defaults() {
        std::env::set_var("SKIP_ROOT_ENV", "1");
        std::env::set_var("APP__QUIZ__TIME_LIMIT_SECONDS", "-1");
        std::env::set_var("APP__QUIZ__QUESTIONS_PER_SESSION", "-5");
        std::env::set_var("APP__LEADERBOARD__TOP_N", "0");
        std::env::set_var("APP__QUIZ__MAX_BONUS", "0");
        let config = Config::load().unwrap();
        assert_eq!(config.quiz.time_limit_seconds, 30);
        assert_eq!(config.quiz.questions_per_session, 15);
        assert_eq!(config.leaderboard.top_n, 50);
        assert_eq!(config.quiz.max_bonus, 0);
        for key in [
            "APP__QUIZ__TIME_LIMIT_SECONDS",
            "APP__QUIZ__QUESTIONS_PER_SESSION",
            "APP__LEADERBOARD__TOP_N",
            "APP__QUIZ__MAX_BONUS",
        ] {
            std::env::remove_var(key);
        }
    }

    #[test]
    fn out_of_range_integers_are_rejected() {
        let settings = config::Config::builder()
            .set_override("quiz.time_limit_seconds", 5_000_000_000i64)
            .unwrap()
            .set_override("quiz.base_score", -1i64)
            .unwrap()
            .build()
            .unwrap();
        assert_eq!(positive::<u32>(&settings, "quiz.time_limit_seconds"), None);
        assert_eq!(non_negative::<u32>(&settings, "quiz.base_score"), None);
        assert_eq!(positive::<u32>(&settings, "missing"), None);
    }
}
