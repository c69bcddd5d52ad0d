//! Timed quiz state machine.
//!
//! `NotStarted -> Answering <-> Feedback -> Finished`. The machine itself has
//! no clock: `tick` is called once per elapsed second by whoever owns the
//! session, and `advance` once the feedback hold has passed. Every phase
//! change bumps `epoch` so stale scheduled callbacks can be recognised.

use rand::seq::{IndexedRandom, SliceRandom};
use rand::Rng;
use thiserror::Error;

use crate::config::QuizSettings;
use crate::models::content::QuizQuestion;
use crate::models::quiz::{AnswerOutcome, QuestionView, QuizPhase, QuizSnapshot, QuizSummary};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum QuizError {
    #[error("question pool is empty")]
    EmptyPool,
    #[error("quiz has already started")]
    AlreadyStarted,
    #[error("quiz is not accepting answers (phase: {0:?})")]
    NotAnswering(QuizPhase),
    #[error("quiz is not showing feedback (phase: {0:?})")]
    NotInFeedback(QuizPhase),
    #[error("option {index} does not exist, question has {options} options")]
    InvalidOption { index: usize, options: usize },
}

/// Scoring and timing parameters of one session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuizRules {
    pub questions_per_session: usize,
    pub time_limit: u32,
    pub base_score: u32,
    pub max_bonus: u32,
}

impl From<&QuizSettings> for QuizRules {
    fn from(settings: &QuizSettings) -> Self {
        Self {
            questions_per_session: settings.questions_per_session,
            time_limit: settings.time_limit_seconds,
            base_score: settings.base_score,
            max_bonus: settings.max_bonus,
        }
    }
}

/// `base + floor(remaining / limit * max_bonus)` for a correct answer, 0 otherwise.
pub fn points_for(correct: bool, time_remaining: u32, rules: &QuizRules) -> u32 {
    if !correct {
        return 0;
    }
    let bonus = if rules.time_limit == 0 {
        0
    } else {
        let remaining = time_remaining.min(rules.time_limit) as u64;
        (remaining * rules.max_bonus as u64 / rules.time_limit as u64) as u32
    };
    rules.base_score.saturating_add(bonus)
}

/// Result of a single countdown step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    Remaining(u32),
    TimedOut(AnswerOutcome),
}

/// Result of leaving the Feedback phase
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Advance {
    NextQuestion(usize),
    Finished(QuizSummary),
}

#[derive(Debug, Clone)]
pub struct QuizSession {
    id: String,
    profile_id: String,
    rules: QuizRules,
    questions: Vec<QuizQuestion>,
    phase: QuizPhase,
    current_index: usize,
    time_remaining: u32,
    score: u32,
    correct_count: usize,
    last_answer: Option<AnswerOutcome>,
    epoch: u64,
}

impl QuizSession {
    /// Draws up to `questions_per_session` questions without replacement, in
    /// random order.
    pub fn new<R: Rng + ?Sized>(
        id: impl Into<String>,
        profile_id: impl Into<String>,
        pool: &[QuizQuestion],
        rules: QuizRules,
        rng: &mut R,
    ) -> Result<Self, QuizError> {
        if pool.is_empty() || rules.questions_per_session == 0 {
            return Err(QuizError::EmptyPool);
        }

        let amount = rules.questions_per_session.min(pool.len());
        let mut questions: Vec<QuizQuestion> = pool.choose_multiple(rng, amount).cloned().collect();
        questions.shuffle(rng);

        Ok(Self::with_questions(id, profile_id, questions, rules))
    }

    /// Builds a session over a fixed question order.
    pub fn with_questions(
        id: impl Into<String>,
        profile_id: impl Into<String>,
        questions: Vec<QuizQuestion>,
        rules: QuizRules,
    ) -> Self {
        Self {
            id: id.into(),
            profile_id: profile_id.into(),
            rules,
            questions,
            phase: QuizPhase::NotStarted,
            current_index: 0,
            time_remaining: rules.time_limit,
            score: 0,
            correct_count: 0,
            last_answer: None,
            epoch: 0,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn profile_id(&self) -> &str {
        &self.profile_id
    }

    pub fn phase(&self) -> QuizPhase {
        self.phase
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn score(&self) -> u32 {
        self.score
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn time_remaining(&self) -> u32 {
        self.time_remaining
    }

    pub fn total_questions(&self) -> usize {
        self.questions.len()
    }

    pub fn time_limit(&self) -> u32 {
        self.rules.time_limit
    }

    pub fn current_question(&self) -> Option<&QuizQuestion> {
        match self.phase {
            QuizPhase::Answering | QuizPhase::Feedback => self.questions.get(self.current_index),
            _ => None,
        }
    }

    /// Explanation of the question being shown, empty outside a question.
    pub fn current_explanation(&self) -> String {
        self.current_question()
            .map(|question| question.explanation.clone())
            .unwrap_or_default()
    }

    fn transition(&mut self, phase: QuizPhase) {
        self.phase = phase;
        self.epoch += 1;
    }

    pub fn start(&mut self) -> Result<(), QuizError> {
        if self.phase != QuizPhase::NotStarted {
            return Err(QuizError::AlreadyStarted);
        }
        self.current_index = 0;
        self.time_remaining = self.rules.time_limit;
        self.transition(QuizPhase::Answering);
        Ok(())
    }

    /// One second of countdown. Reaching zero locks the question as unanswered.
    pub fn tick(&mut self) -> Result<Tick, QuizError> {
        if self.phase != QuizPhase::Answering {
            return Err(QuizError::NotAnswering(self.phase));
        }
        self.time_remaining = self.time_remaining.saturating_sub(1);
        if self.time_remaining > 0 {
            return Ok(Tick::Remaining(self.time_remaining));
        }
        Ok(Tick::TimedOut(self.lock(None)))
    }

    pub fn answer(&mut self, option_index: usize) -> Result<AnswerOutcome, QuizError> {
        if self.phase != QuizPhase::Answering {
            return Err(QuizError::NotAnswering(self.phase));
        }
        let options = self
            .questions
            .get(self.current_index)
            .map(|question| question.options.len())
            .unwrap_or(0);
        if option_index >= options {
            return Err(QuizError::InvalidOption {
                index: option_index,
                options,
            });
        }
        Ok(self.lock(Some(option_index)))
    }

    fn lock(&mut self, selected: Option<usize>) -> AnswerOutcome {
        let correct_answer = self
            .questions
            .get(self.current_index)
            .map(|question| question.correct_answer)
            .unwrap_or(0);
        let correct = selected == Some(correct_answer);
        let points = points_for(correct, self.time_remaining, &self.rules);

        self.score = self.score.saturating_add(points);
        if correct {
            self.correct_count += 1;
        }

        let outcome = AnswerOutcome {
            question_index: self.current_index,
            selected,
            correct,
            correct_answer,
            time_remaining: self.time_remaining,
            points,
        };
        self.last_answer = Some(outcome);
        self.transition(QuizPhase::Feedback);
        outcome
    }

    /// Leaves Feedback: next question with a fresh timer, or Finished.
    pub fn advance(&mut self) -> Result<Advance, QuizError> {
        if self.phase != QuizPhase::Feedback {
            return Err(QuizError::NotInFeedback(self.phase));
        }
        if self.current_index + 1 < self.questions.len() {
            self.current_index += 1;
            self.time_remaining = self.rules.time_limit;
            self.last_answer = None;
            self.transition(QuizPhase::Answering);
            Ok(Advance::NextQuestion(self.current_index))
        } else {
            self.transition(QuizPhase::Finished);
            Ok(Advance::Finished(self.summary()))
        }
    }

    pub fn summary(&self) -> QuizSummary {
        QuizSummary {
            session_id: self.id.clone(),
            profile_id: self.profile_id.clone(),
            final_score: self.score,
            correct_count: self.correct_count,
            total_questions: self.questions.len(),
        }
    }

    pub fn snapshot(&self) -> QuizSnapshot {
        let reveal = self.phase == QuizPhase::Feedback;
        QuizSnapshot {
            session_id: self.id.clone(),
            profile_id: self.profile_id.clone(),
            phase: self.phase,
            question_index: self.current_index,
            total_questions: self.questions.len(),
            time_remaining: self.time_remaining,
            time_limit: self.rules.time_limit,
            score: self.score,
            question: self.current_question().map(|question| QuestionView {
                id: question.id.clone(),
                question: question.question.clone(),
                options: question.options.clone(),
                correct_answer: reveal.then_some(question.correct_answer),
                explanation: reveal.then(|| question.explanation.clone()),
            }),
            last_answer: self.last_answer,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::HashSet;

    fn rules() -> QuizRules {
        QuizRules {
            questions_per_session: 3,
            time_limit: 30,
            base_score: 1000,
            max_bonus: 500,
        }
    }

    fn question(id: usize) -> QuizQuestion {
        QuizQuestion {
            id: format!("q{}", id),
            question: format!("Question {}", id),
            options: vec!["A".into(), "B".into(), "C".into(), "D".into()],
            correct_answer: id % 4,
            explanation: format!("Because {}", id % 4),
        }
    }

    fn started(count: usize) -> QuizSession {
        let questions = (0..count).map(question).collect();
        let mut session = QuizSession::with_questions("quiz-1", "p1", questions, rules());
        session.start().unwrap();
        session
    }

    #[test]
    fn correct_answer_with_25_seconds_left_scores_1416() {
        let mut session = started(2);
        for _ in 0..5 {
            session.tick().unwrap();
        }
        assert_eq!(session.time_remaining(), 25);

        let outcome = session.answer(0).unwrap();

        assert!(outcome.correct);
        assert_eq!(outcome.points, 1416);
        assert_eq!(session.score(), 1416);
        assert_eq!(session.phase(), QuizPhase::Feedback);
    }

    #[test]
    fn instant_answer_earns_full_bonus() {
        assert_eq!(points_for(true, 30, &rules()), 1500);
        assert_eq!(points_for(true, 0, &rules()), 1000);
        assert_eq!(points_for(false, 30, &rules()), 0);
    }

    #[test]
    fn timeout_locks_question_with_zero_points() {
        let mut session = started(2);
        for _ in 0..29 {
            assert!(matches!(session.tick().unwrap(), Tick::Remaining(_)));
        }

        let Tick::TimedOut(outcome) = session.tick().unwrap() else {
            panic!("expected timeout");
        };

        assert!(outcome.timed_out());
        assert!(!outcome.correct);
        assert_eq!(outcome.points, 0);
        assert_eq!(session.score(), 0);
        assert_eq!(session.phase(), QuizPhase::Feedback);
    }

    #[test]
    fn wrong_answer_scores_nothing() {
        let mut session = started(2);
        let outcome = session.answer(3).unwrap();
        assert!(!outcome.correct);
        assert_eq!(outcome.points, 0);
    }

    #[test]
    fn answers_are_rejected_outside_answering() {
        let mut session = started(2);
        session.answer(0).unwrap();

        assert_eq!(
            session.answer(1),
            Err(QuizError::NotAnswering(QuizPhase::Feedback))
        );
        assert_eq!(
            session.tick(),
            Err(QuizError::NotAnswering(QuizPhase::Feedback))
        );
    }

    #[test]
    fn out_of_range_option_is_rejected() {
        let mut session = started(1);
        assert_eq!(
            session.answer(4),
            Err(QuizError::InvalidOption {
                index: 4,
                options: 4
            })
        );
        assert_eq!(session.phase(), QuizPhase::Answering);
    }

    #[test]
    fn advance_resets_timer_then_finishes() {
        let mut session = started(2);
        session.tick().unwrap();
        session.answer(0).unwrap();

        assert_eq!(session.advance().unwrap(), Advance::NextQuestion(1));
        assert_eq!(session.time_remaining(), 30);
        assert_eq!(session.phase(), QuizPhase::Answering);

        session.answer(1).unwrap();
        let Advance::Finished(summary) = session.advance().unwrap() else {
            panic!("expected finish");
        };
        assert_eq!(summary.correct_count, 2);
        assert_eq!(summary.total_questions, 2);
        assert_eq!(summary.final_score, session.score());
        assert_eq!(session.phase(), QuizPhase::Finished);
        assert!(session.advance().is_err());
    }

    #[test]
    fn every_transition_bumps_the_epoch() {
        let mut session = started(2);
        let answering = session.epoch();
        session.answer(0).unwrap();
        let feedback = session.epoch();
        session.advance().unwrap();

        assert!(feedback > answering);
        assert!(session.epoch() > feedback);
    }

    #[test]
    fn sampling_draws_distinct_questions() {
        let pool: Vec<QuizQuestion> = (0..10).map(question).collect();
        let mut rng = StdRng::seed_from_u64(7);

        let session = QuizSession::new("quiz-2", "p1", &pool, rules(), &mut rng).unwrap();
        let ids: HashSet<&str> = session.questions.iter().map(|q| q.id.as_str()).collect();

        assert_eq!(session.total_questions(), 3);
        assert_eq!(ids.len(), 3);
    }

    #[test]
    fn small_pool_is_used_whole() {
        let pool: Vec<QuizQuestion> = (0..2).map(question).collect();
        let mut rng = StdRng::seed_from_u64(1);
        let session = QuizSession::new("quiz-3", "p1", &pool, rules(), &mut rng).unwrap();
        assert_eq!(session.total_questions(), 2);

        assert_eq!(
            QuizSession::new("quiz-4", "p1", &[], rules(), &mut rng).unwrap_err(),
            QuizError::EmptyPool
        );
    }

    #[test]
    fn snapshot_hides_answer_until_feedback() {
        let mut session = started(1);
        let question = session.snapshot().question.unwrap();
        assert_eq!(question.correct_answer, None);
        assert_eq!(question.explanation, None);

        session.answer(2).unwrap();
        let question = session.snapshot().question.unwrap();
        assert_eq!(question.correct_answer, Some(0));
        assert_eq!(question.explanation.as_deref(), Some("Because 0"));

        session.advance().unwrap();
        let snapshot = session.snapshot();
        assert_eq!(snapshot.phase, QuizPhase::Finished);
        assert!(snapshot.question.is_none());
    }
}
