use std::sync::Arc;

use crate::config::Config;
use crate::models::content::Catalog;
use mongodb::Client as MongoClient;
use redis::aio::ConnectionManager;

use self::leaderboard_service::{LeaderboardService, LeaderboardStore, MongoLeaderboardStore};
use self::mentor_service::{CompletionClient, GeminiClient, MentorService};
use self::profile_service::ProfileService;
use self::profile_store::{ProfileRepository, ProfileStore, RedisProfileStore};
use self::quiz_service::QuizService;

pub struct AppState {
    pub config: Config,
    pub catalog: Arc<Catalog>,
    pub profiles: Arc<ProfileService>,
    pub quizzes: Arc<QuizService>,
    pub leaderboard: Arc<LeaderboardService>,
    pub mentor: Arc<MentorService>,
}

impl AppState {
    pub async fn new(
        config: Config,
        mongo_client: MongoClient,
        redis_client: redis::Client,
    ) -> anyhow::Result<Self> {
        let mongo = mongo_client.database(&config.mongo_database);

        tracing::info!("Attempting to connect to Redis...");

        let redis = tokio::time::timeout(
            std::time::Duration::from_secs(30),
            ConnectionManager::new(redis_client),
        )
        .await
        .map_err(|_| anyhow::anyhow!("Redis connection timeout after 30s"))??;

        tracing::info!("Redis ConnectionManager created, testing with PING...");

        let mut conn = redis.clone();
        tokio::time::timeout(
            std::time::Duration::from_secs(5),
            redis::cmd("PING").query_async::<String>(&mut conn),
        )
        .await
        .map_err(|_| anyhow::anyhow!("Redis PING timeout after 5s"))??;

        tracing::info!("Redis connection established successfully");

        let completion = GeminiClient::new(config.mentor.clone());
        Ok(Self::from_parts(
            config,
            Catalog::embedded()?,
            Arc::new(RedisProfileStore::new(redis)),
            Arc::new(MongoLeaderboardStore::new(mongo)),
            Arc::new(completion),
        ))
    }

    /// Wires the services over the given backends.
    pub fn from_parts(
        config: Config,
        catalog: Catalog,
        profile_store: Arc<dyn ProfileStore>,
        leaderboard_store: Arc<dyn LeaderboardStore>,
        completion: Arc<dyn CompletionClient>,
    ) -> Self {
        let catalog = Arc::new(catalog);
        let level_size = config.progression.level_size;

        let leaderboard = Arc::new(LeaderboardService::new(
            leaderboard_store,
            config.leaderboard.clone(),
            level_size,
        ));
        let profiles = Arc::new(ProfileService::new(
            ProfileRepository::new(profile_store, catalog.badges.clone()),
            leaderboard.clone(),
            catalog.clone(),
            level_size,
        ));
        let quizzes = Arc::new(QuizService::new(
            catalog.clone(),
            config.quiz.clone(),
            profiles.clone(),
            leaderboard.clone(),
        ));
        let mentor = Arc::new(MentorService::with_limits(
            completion,
            std::time::Duration::from_secs(config.mentor.chat_ttl_seconds),
            config.mentor.max_chats,
        ));

        tracing::info!(
            "Catalog loaded: {} scenarios, {} badges, {} quiz questions",
            catalog.scenarios.len(),
            catalog.badges.len(),
            catalog.quiz_questions.len()
        );

        Self {
            config,
            catalog,
            profiles,
            quizzes,
            leaderboard,
            mentor,
        }
    }
}

pub mod content_service;
pub mod leaderboard_service;
pub mod mentor_service;
pub mod profile_migration;
pub mod profile_service;
pub mod profile_store;
pub mod progression;
pub mod quiz_engine;
pub mod quiz_service;
