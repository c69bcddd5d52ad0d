use serde::{Deserialize, Serialize};

use super::badge::BadgeDefinition;
use super::stats::StatsEffect;

/// A narrative decision point with two options.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    pub id: String,
    pub title: String,
    /// Present-day situation the player faces
    pub context: String,
    pub historical_parallel: String,
    pub question: String,
    pub options: Vec<ScenarioOption>,
}

impl Scenario {
    pub fn option(&self, option_id: &str) -> Option<&ScenarioOption> {
        self.options.iter().find(|option| option.id == option_id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioOption {
    pub id: String,
    pub text: String,
    pub stats_effect: StatsEffect,
    pub feedback: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimelineKind {
    Historical,
    Personal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimelineEvent {
    pub year: String,
    pub title: String,
    pub description: String,
    #[serde(rename = "type")]
    pub kind: TimelineKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuizQuestion {
    pub id: String,
    pub question: String,
    pub options: Vec<String>,
    /// Index into `options`
    pub correct_answer: usize,
    /// Shown once the question is resolved
    pub explanation: String,
}

/// Static learning content shipped with the service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Catalog {
    pub scenarios: Vec<Scenario>,
    pub timeline: Vec<TimelineEvent>,
    pub badges: Vec<BadgeDefinition>,
    pub quiz_questions: Vec<QuizQuestion>,
}

impl Catalog {
    pub fn scenario(&self, scenario_id: &str) -> Option<&Scenario> {
        self.scenarios
            .iter()
            .find(|scenario| scenario.id == scenario_id)
    }
}

/// Scenario as listed to players; option effects stay hidden until chosen.
#[derive(Debug, Serialize)]
pub struct ScenarioSummary {
    pub id: String,
    pub title: String,
    pub context: String,
    pub historical_parallel: String,
    pub question: String,
    pub options: Vec<ScenarioOptionSummary>,
}

#[derive(Debug, Serialize)]
pub struct ScenarioOptionSummary {
    pub id: String,
    pub text: String,
}

impl From<&Scenario> for ScenarioSummary {
    fn from(scenario: &Scenario) -> Self {
        Self {
            id: scenario.id.clone(),
            title: scenario.title.clone(),
            context: scenario.context.clone(),
            historical_parallel: scenario.historical_parallel.clone(),
            question: scenario.question.clone(),
            options: scenario
                .options
                .iter()
                .map(|option| ScenarioOptionSummary {
                    id: option.id.clone(),
                    text: option.text.clone(),
                })
                .collect(),
        }
    }
}
