use serde::{Deserialize, Serialize};

use super::stats::{StatKey, UserStats};

/// Badge as carried on a profile. `unlocked` only ever moves false -> true.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Badge {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub icon: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub unlocked: bool,
}

/// Catalogue entry: badge metadata plus the thresholds that unlock it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BadgeDefinition {
    pub id: String,
    pub name: String,
    pub icon: String,
    pub description: String,
    pub requires: Vec<StatThreshold>,
}

/// `stat >= min`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatThreshold {
    pub stat: StatKey,
    pub min: u32,
}

impl BadgeDefinition {
    /// All thresholds must hold. A definition without thresholds never unlocks.
    pub fn is_satisfied_by(&self, stats: &UserStats) -> bool {
        !self.requires.is_empty()
            && self
                .requires
                .iter()
                .all(|threshold| stats.get(threshold.stat) >= threshold.min)
    }

    pub fn locked_badge(&self) -> Badge {
        Badge {
            id: self.id.clone(),
            name: self.name.clone(),
            icon: self.icon.clone(),
            description: self.description.clone(),
            unlocked: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn definition(requires: Vec<StatThreshold>) -> BadgeDefinition {
        BadgeDefinition {
            id: "4".to_string(),
            name: "Global Citizen".to_string(),
            icon: "globe".to_string(),
            description: String::new(),
            requires,
        }
    }

    #[test]
    fn compound_threshold_needs_every_stat() {
        let def = definition(vec![
            StatThreshold {
                stat: StatKey::Knowledge,
                min: 50,
            },
            StatThreshold {
                stat: StatKey::Resilience,
                min: 50,
            },
        ]);

        let half = UserStats {
            knowledge: 60,
            resilience: 40,
            ..UserStats::INITIAL
        };
        assert!(!def.is_satisfied_by(&half));

        let both = UserStats {
            knowledge: 50,
            resilience: 50,
            ..UserStats::INITIAL
        };
        assert!(def.is_satisfied_by(&both));
    }

    #[test]
    fn empty_requirements_never_unlock() {
        let def = definition(Vec::new());
        let maxed = UserStats {
            resilience: 100,
            creativity: 100,
            trust: 100,
            knowledge: 100,
        };
        assert!(!def.is_satisfied_by(&maxed));
    }
}
