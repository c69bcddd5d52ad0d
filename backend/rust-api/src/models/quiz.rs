use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuizPhase {
    NotStarted,
    Answering,
    Feedback,
    Finished,
}

/// How an Answering phase ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerOutcome {
    pub question_index: usize,
    /// `None` when the countdown ran out
    pub selected: Option<usize>,
    pub correct: bool,
    pub correct_answer: usize,
    pub time_remaining: u32,
    pub points: u32,
}

impl AnswerOutcome {
    pub fn timed_out(&self) -> bool {
        self.selected.is_none()
    }
}

#[derive(Debug, Deserialize)]
pub struct StartQuizRequest {
    pub profile_id: String,
}

#[derive(Debug, Deserialize)]
pub struct SubmitQuizAnswerRequest {
    pub option_index: usize,
}

/// Question as shown to the player. The correct index and the explanation
/// are only revealed once the question has been answered or timed out.
#[derive(Debug, Clone, Serialize)]
pub struct QuestionView {
    pub id: String,
    pub question: String,
    pub options: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correct_answer: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct QuizSnapshot {
    pub session_id: String,
    pub profile_id: String,
    pub phase: QuizPhase,
    pub question_index: usize,
    pub total_questions: usize,
    pub time_remaining: u32,
    pub time_limit: u32,
    pub score: u32,
    pub question: Option<QuestionView>,
    pub last_answer: Option<AnswerOutcome>,
}

/// Result reported when a session reaches Finished
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuizSummary {
    pub session_id: String,
    pub profile_id: String,
    pub final_score: u32,
    pub correct_count: usize,
    pub total_questions: usize,
}
