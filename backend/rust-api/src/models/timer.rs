use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Events pushed to quiz stream subscribers.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum QuizEvent {
    TimerTick(TimerTick),
    TimeExpired(TimeExpired),
    AnswerLocked(AnswerLocked),
    QuestionAdvanced(QuestionAdvanced),
    QuizFinished(QuizFinished),
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TimerTick {
    pub session_id: String,
    pub question_index: usize,
    pub remaining_seconds: u32,
    pub total_seconds: u32,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TimeExpired {
    pub session_id: String,
    pub question_index: usize,
    pub correct_answer: usize,
    pub explanation: String,
    pub timestamp: DateTime<Utc>,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AnswerLocked {
    pub session_id: String,
    pub question_index: usize,
    pub selected: usize,
    pub correct: bool,
    pub correct_answer: usize,
    pub explanation: String,
    pub points: u32,
    pub score: u32,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct QuestionAdvanced {
    pub session_id: String,
    pub question_index: usize,
    pub total_questions: usize,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct QuizFinished {
    pub session_id: String,
    pub final_score: u32,
    pub correct_count: usize,
    pub total_questions: usize,
    pub timestamp: DateTime<Utc>,
}

impl QuizEvent {
    pub fn to_sse_data(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }

    pub fn event_name(&self) -> &'static str {
        match self {
            QuizEvent::TimerTick(_) => "timer-tick",
            QuizEvent::TimeExpired(_) => "time-expired",
            QuizEvent::AnswerLocked(_) => "answer-locked",
            QuizEvent::QuestionAdvanced(_) => "question-advanced",
            QuizEvent::QuizFinished(_) => "quiz-finished",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, QuizEvent::QuizFinished(_))
    }
}
