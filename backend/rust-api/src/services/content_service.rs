use std::collections::HashSet;

use thiserror::Error;

use crate::models::content::{Catalog, Scenario, ScenarioOption};

const EMBEDDED_CATALOG: &str = include_str!("../../content/catalog.json");

#[derive(Debug, Error)]
pub enum ContentError {
    #[error("failed to parse catalog: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid catalog: {0}")]
    Invalid(String),
    #[error("Scenario not found: {0}")]
    UnknownScenario(String),
    #[error("Scenario {scenario_id} has no option {option_id}")]
    UnknownOption {
        scenario_id: String,
        option_id: String,
    },
}

impl Catalog {
    /// Catalogue bundled into the binary
    pub fn embedded() -> Result<Self, ContentError> {
        Self::from_json(EMBEDDED_CATALOG)
    }

    pub fn from_json(raw: &str) -> Result<Self, ContentError> {
        let catalog: Catalog = serde_json::from_str(raw)?;
        catalog.validate()?;
        Ok(catalog)
    }

    fn validate(&self) -> Result<(), ContentError> {
        let mut scenario_ids = HashSet::new();
        for scenario in &self.scenarios {
            if !scenario_ids.insert(scenario.id.as_str()) {
                return Err(ContentError::Invalid(format!(
                    "duplicate scenario id {}",
                    scenario.id
                )));
            }
            if scenario.options.len() != 2 {
                return Err(ContentError::Invalid(format!(
                    "scenario {} must have exactly two options",
                    scenario.id
                )));
            }
        }

        let mut badge_ids = HashSet::new();
        for badge in &self.badges {
            if !badge_ids.insert(badge.id.as_str()) {
                return Err(ContentError::Invalid(format!(
                    "duplicate badge id {}",
                    badge.id
                )));
            }
        }

        for question in &self.quiz_questions {
            if question.options.len() < 2 {
                return Err(ContentError::Invalid(format!(
                    "question {} needs at least two options",
                    question.id
                )));
            }
            if question.correct_answer >= question.options.len() {
                return Err(ContentError::Invalid(format!(
                    "question {} points at missing option {}",
                    question.id, question.correct_answer
                )));
            }
            if question.explanation.trim().is_empty() {
                return Err(ContentError::Invalid(format!(
                    "question {} has no explanation",
                    question.id
                )));
            }
        }

        Ok(())
    }

    pub fn scenario_option(
        &self,
        scenario_id: &str,
        option_id: &str,
    ) -> Result<(&Scenario, &ScenarioOption), ContentError> {
        let scenario = self
            .scenario(scenario_id)
            .ok_or_else(|| ContentError::UnknownScenario(scenario_id.to_string()))?;
        let option = scenario
            .option(option_id)
            .ok_or_else(|| ContentError::UnknownOption {
                scenario_id: scenario_id.to_string(),
                option_id: option_id.to_string(),
            })?;
        Ok((scenario, option))
    }
}
