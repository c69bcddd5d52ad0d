use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use thiserror::Error;
use tokio::sync::{broadcast, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, sleep, Instant};
use uuid::Uuid;

use crate::config::QuizSettings;
use crate::metrics::{QUIZ_ANSWERS_TOTAL, QUIZ_SESSIONS_ACTIVE, QUIZ_SESSIONS_TOTAL};
use crate::models::content::Catalog;
use crate::models::quiz::{AnswerOutcome, QuizPhase, QuizSnapshot, QuizSummary};
use crate::models::timer::{
    AnswerLocked, QuestionAdvanced, QuizEvent, QuizFinished, TimeExpired, TimerTick,
};
use crate::services::leaderboard_service::LeaderboardService;
use crate::services::profile_service::ProfileService;
use crate::services::quiz_engine::{Advance, QuizError, QuizRules, QuizSession, Tick};

const EVENT_BUFFER: usize = 64;

#[derive(Debug, Error)]
pub enum QuizServiceError {
    #[error("Quiz not found: {0}")]
    NotFound(String),
    #[error("Profile not found: {0}")]
    ProfileNotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error(transparent)]
    Quiz(#[from] QuizError),
}

/// Work waiting on the clock for one session
#[derive(Debug, Clone, Copy)]
enum TimerJob {
    Countdown,
    FeedbackHold,
    /// Drops a finished session once its retention window has passed
    Expire,
}

struct QuizSlot {
    session: QuizSession,
    timer: Option<JoinHandle<()>>,
}

impl QuizSlot {
    /// Installs the next pending callback, aborting the previous one.
    fn replace_timer(&mut self, next: Option<JoinHandle<()>>) {
        if let Some(previous) = std::mem::replace(&mut self.timer, next) {
            previous.abort();
        }
    }
}

struct QuizEntry {
    slot: Mutex<QuizSlot>,
    events: broadcast::Sender<QuizEvent>,
}

impl QuizEntry {
    fn emit(&self, event: QuizEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }
}

#[derive(Default)]
struct Registry {
    sessions: HashMap<String, Arc<QuizEntry>>,
    by_profile: HashMap<String, String>,
}

/// Runs quiz sessions against the wall clock.
///
/// Each session owns at most one pending timer task. Every phase change
/// replaces that task, and every task re-checks the session epoch it was
/// scheduled for before acting, so a late callback can never move a session
/// twice.
pub struct QuizService {
    registry: RwLock<Registry>,
    catalog: Arc<Catalog>,
    settings: QuizSettings,
    profiles: Arc<ProfileService>,
    leaderboard: Arc<LeaderboardService>,
}

impl QuizService {
    pub fn new(
        catalog: Arc<Catalog>,
        settings: QuizSettings,
        profiles: Arc<ProfileService>,
        leaderboard: Arc<LeaderboardService>,
    ) -> Self {
        Self {
            registry: RwLock::new(Registry::default()),
            catalog,
            settings,
            profiles,
            leaderboard,
        }
    }

    /// Starts a quiz for a profile. A profile can only run one quiz at a
    /// time; a finished quiz is replaced.
    pub async fn start(self: &Arc<Self>, profile_id: &str) -> Result<QuizSnapshot, QuizServiceError> {
        if self.profiles.get(profile_id).await.is_none() {
            return Err(QuizServiceError::ProfileNotFound(profile_id.to_string()));
        }

        let mut registry = self.registry.write().await;
        if let Some(existing_id) = registry.by_profile.get(profile_id).cloned() {
            if let Some(existing) = registry.sessions.get(&existing_id).cloned() {
                let mut slot = existing.slot.lock().await;
                if slot.session.phase() != QuizPhase::Finished {
                    return Err(QuizServiceError::Conflict(format!(
                        "Profile {} already has an active quiz {}",
                        profile_id, existing_id
                    )));
                }
                slot.replace_timer(None);
            }
            registry.sessions.remove(&existing_id);
        }

        let session = {
            let mut rng = rand::rng();
            QuizSession::new(
                Uuid::new_v4().to_string(),
                profile_id,
                &self.catalog.quiz_questions,
                QuizRules::from(&self.settings),
                &mut rng,
            )?
        };
        let session_id = session.id().to_string();
        let (events, _) = broadcast::channel(EVENT_BUFFER);
        let entry = Arc::new(QuizEntry {
            slot: Mutex::new(QuizSlot {
                session,
                timer: None,
            }),
            events,
        });

        let snapshot = {
            let mut slot = entry.slot.lock().await;
            slot.session.start()?;
            self.schedule(&entry, &mut slot, TimerJob::Countdown);
            slot.session.snapshot()
        };

        registry
            .sessions
            .insert(session_id.clone(), entry);
        registry
            .by_profile
            .insert(profile_id.to_string(), session_id.clone());

        QUIZ_SESSIONS_TOTAL.with_label_values(&["started"]).inc();
        QUIZ_SESSIONS_ACTIVE.inc();
        tracing::info!(
            "Quiz started: {} for profile {} ({} questions)",
            session_id,
            profile_id,
            snapshot.total_questions
        );

        Ok(snapshot)
    }

    async fn entry(&self, session_id: &str) -> Result<Arc<QuizEntry>, QuizServiceError> {
        self.registry
            .read()
            .await
            .sessions
            .get(session_id)
            .cloned()
            .ok_or_else(|| QuizServiceError::NotFound(session_id.to_string()))
    }

    pub async fn snapshot(&self, session_id: &str) -> Result<QuizSnapshot, QuizServiceError> {
        let entry = self.entry(session_id).await?;
        let slot = entry.slot.lock().await;
        Ok(slot.session.snapshot())
    }

    /// Locks the current question with the chosen option.
    pub async fn answer(
        self: &Arc<Self>,
        session_id: &str,
        option_index: usize,
    ) -> Result<(AnswerOutcome, QuizSnapshot), QuizServiceError> {
        let entry = self.entry(session_id).await?;
        let mut slot = entry.slot.lock().await;

        let outcome = slot.session.answer(option_index)?;
        QUIZ_ANSWERS_TOTAL
            .with_label_values(&[if outcome.correct { "correct" } else { "wrong" }])
            .inc();
        entry.emit(QuizEvent::AnswerLocked(AnswerLocked {
            session_id: session_id.to_string(),
            question_index: outcome.question_index,
            selected: option_index,
            correct: outcome.correct,
            correct_answer: outcome.correct_answer,
            explanation: slot.session.current_explanation(),
            points: outcome.points,
            score: slot.session.score(),
            timestamp: Utc::now(),
        }));

        self.schedule(&entry, &mut slot, TimerJob::FeedbackHold);
        Ok((outcome, slot.session.snapshot()))
    }

    /// Event feed for a session, plus its current state.
    pub async fn subscribe(
        &self,
        session_id: &str,
    ) -> Result<(broadcast::Receiver<QuizEvent>, QuizSnapshot), QuizServiceError> {
        let entry = self.entry(session_id).await?;
        let slot = entry.slot.lock().await;
        Ok((entry.events.subscribe(), slot.session.snapshot()))
    }

    /// Removes a session. Sessions in progress cannot be abandoned.
    pub async fn discard(&self, session_id: &str) -> Result<(), QuizServiceError> {
        let mut registry = self.registry.write().await;
        let entry = registry
            .sessions
            .get(session_id)
            .cloned()
            .ok_or_else(|| QuizServiceError::NotFound(session_id.to_string()))?;

        let profile_id = {
            let mut slot = entry.slot.lock().await;
            match slot.session.phase() {
                QuizPhase::Answering | QuizPhase::Feedback => {
                    return Err(QuizServiceError::Conflict(format!(
                        "Quiz {} is still in progress",
                        session_id
                    )));
                }
                QuizPhase::NotStarted | QuizPhase::Finished => {}
            }
            slot.replace_timer(None);
            slot.session.profile_id().to_string()
        };

        registry.sessions.remove(session_id);
        if registry.by_profile.get(&profile_id).map(String::as_str) == Some(session_id) {
            registry.by_profile.remove(&profile_id);
        }
        QUIZ_SESSIONS_TOTAL.with_label_values(&["discarded"]).inc();
        tracing::info!("Quiz discarded: {}", session_id);
        Ok(())
    }

    fn schedule(self: &Arc<Self>, entry: &Arc<QuizEntry>, slot: &mut QuizSlot, job: TimerJob) {
        let epoch = slot.session.epoch();
        let handle = tokio::spawn(self.clone().run_timer(entry.clone(), job, epoch));
        slot.replace_timer(Some(handle));
    }

    async fn run_timer(self: Arc<Self>, entry: Arc<QuizEntry>, job: TimerJob, epoch: u64) {
        match job {
            TimerJob::Countdown => self.run_countdown(entry, epoch).await,
            TimerJob::FeedbackHold => self.run_feedback_hold(entry, epoch).await,
            TimerJob::Expire => self.run_expiry(entry, epoch).await,
        }
    }

    /// One countdown step per tick interval until the question is locked.
    async fn run_countdown(self: Arc<Self>, entry: Arc<QuizEntry>, epoch: u64) {
        let period = Duration::from_millis(self.settings.tick_interval_ms.max(1));
        let mut ticker = interval_at(Instant::now() + period, period);

        loop {
            ticker.tick().await;
            let mut slot = entry.slot.lock().await;
            if slot.session.epoch() != epoch {
                return;
            }

            let session_id = slot.session.id().to_string();
            match slot.session.tick() {
                Ok(Tick::Remaining(remaining)) => {
                    entry.emit(QuizEvent::TimerTick(TimerTick {
                        session_id,
                        question_index: slot.session.current_index(),
                        remaining_seconds: remaining,
                        total_seconds: slot.session.time_limit(),
                        timestamp: Utc::now(),
                    }));
                }
                Ok(Tick::TimedOut(outcome)) => {
                    QUIZ_ANSWERS_TOTAL.with_label_values(&["timeout"]).inc();
                    tracing::debug!(
                        "Quiz {} question {} timed out",
                        session_id,
                        outcome.question_index
                    );
                    entry.emit(QuizEvent::TimeExpired(TimeExpired {
                        session_id,
                        question_index: outcome.question_index,
                        correct_answer: outcome.correct_answer,
                        explanation: slot.session.current_explanation(),
                        timestamp: Utc::now(),
                        message: "Time is up".to_string(),
                    }));
                    self.schedule(&entry, &mut slot, TimerJob::FeedbackHold);
                    return;
                }
                Err(e) => {
                    tracing::warn!("Countdown stopped for quiz {}: {}", session_id, e);
                    return;
                }
            }
        }
    }

    async fn run_feedback_hold(self: Arc<Self>, entry: Arc<QuizEntry>, epoch: u64) {
        sleep(Duration::from_secs(self.settings.feedback_seconds)).await;

        let summary = {
            let mut slot = entry.slot.lock().await;
            if slot.session.epoch() != epoch {
                return;
            }

            let session_id = slot.session.id().to_string();
            match slot.session.advance() {
                Ok(Advance::NextQuestion(index)) => {
                    entry.emit(QuizEvent::QuestionAdvanced(QuestionAdvanced {
                        session_id,
                        question_index: index,
                        total_questions: slot.session.total_questions(),
                        timestamp: Utc::now(),
                    }));
                    self.schedule(&entry, &mut slot, TimerJob::Countdown);
                    return;
                }
                Ok(Advance::Finished(summary)) => {
                    // This task is the pending timer; detach it rather than abort.
                    slot.timer = None;
                    self.schedule(&entry, &mut slot, TimerJob::Expire);
                    entry.emit(QuizEvent::QuizFinished(QuizFinished {
                        session_id,
                        final_score: summary.final_score,
                        correct_count: summary.correct_count,
                        total_questions: summary.total_questions,
                        timestamp: Utc::now(),
                    }));
                    summary
                }
                Err(e) => {
                    tracing::warn!("Feedback hold ignored for quiz {}: {}", session_id, e);
                    return;
                }
            }
        };

        self.complete(summary).await;
    }

    async fn run_expiry(self: Arc<Self>, entry: Arc<QuizEntry>, epoch: u64) {
        sleep(Duration::from_secs(self.settings.finished_retention_seconds)).await;

        let mut registry = self.registry.write().await;
        let (session_id, profile_id) = {
            let mut slot = entry.slot.lock().await;
            if slot.session.epoch() != epoch {
                return;
            }
            slot.timer = None;
            (
                slot.session.id().to_string(),
                slot.session.profile_id().to_string(),
            )
        };

        let current = registry
            .sessions
            .get(&session_id)
            .is_some_and(|existing| Arc::ptr_eq(existing, &entry));
        if !current {
            return;
        }
        registry.sessions.remove(&session_id);
        if registry.by_profile.get(&profile_id) == Some(&session_id) {
            registry.by_profile.remove(&profile_id);
        }
        QUIZ_SESSIONS_TOTAL.with_label_values(&["expired"]).inc();
        tracing::debug!("Finished quiz {} expired", session_id);
    }

    /// Drops whatever quiz the profile has, in any phase. Used when the
    /// profile itself is deleted; an unfinished quiz is abandoned uncredited.
    pub async fn forget_profile(&self, profile_id: &str) {
        let mut registry = self.registry.write().await;
        let Some(session_id) = registry.by_profile.remove(profile_id) else {
            return;
        };
        let Some(entry) = registry.sessions.remove(&session_id) else {
            return;
        };

        let mut slot = entry.slot.lock().await;
        slot.replace_timer(None);
        if slot.session.phase() != QuizPhase::Finished {
            QUIZ_SESSIONS_ACTIVE.dec();
            QUIZ_SESSIONS_TOTAL.with_label_values(&["abandoned"]).inc();
        }
        tracing::info!("Quiz {} dropped with profile {}", session_id, profile_id);
    }

    /// Credits the final score to the profile and records it on the quiz track.
    async fn complete(&self, summary: QuizSummary) {
        QUIZ_SESSIONS_TOTAL.with_label_values(&["finished"]).inc();
        QUIZ_SESSIONS_ACTIVE.dec();
        tracing::info!(
            "Quiz finished: {} score={} correct={}/{}",
            summary.session_id,
            summary.final_score,
            summary.correct_count,
            summary.total_questions
        );

        let score = summary.final_score as u64;
        match self.profiles.credit_quiz_score(&summary.profile_id, score).await {
            Some(profile) => {
                self.leaderboard
                    .save_quiz_score(&profile.name, &profile.avatar_id, score)
                    .await;
            }
            None => tracing::warn!(
                "Profile {} disappeared before quiz {} finished; score not recorded",
                summary.profile_id,
                summary.session_id
            ),
        }
    }
}
