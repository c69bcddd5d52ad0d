use serde::{Deserialize, Serialize};

pub const STAT_MIN: u32 = 0;
pub const STAT_MAX: u32 = 100;

/// Four bounded character stats, each kept within `[STAT_MIN, STAT_MAX]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserStats {
    pub resilience: u32,
    pub creativity: u32,
    pub trust: u32,
    pub knowledge: u32,
}

impl UserStats {
    /// Starting stats for a freshly onboarded profile
    pub const INITIAL: UserStats = UserStats {
        resilience: 20,
        creativity: 20,
        trust: 10,
        knowledge: 10,
    };

    pub fn get(&self, key: StatKey) -> u32 {
        match key {
            StatKey::Resilience => self.resilience,
            StatKey::Creativity => self.creativity,
            StatKey::Trust => self.trust,
            StatKey::Knowledge => self.knowledge,
        }
    }

    fn slot_mut(&mut self, key: StatKey) -> &mut u32 {
        match key {
            StatKey::Resilience => &mut self.resilience,
            StatKey::Creativity => &mut self.creativity,
            StatKey::Trust => &mut self.trust,
            StatKey::Knowledge => &mut self.knowledge,
        }
    }

    /// Returns a copy with every delta of `effect` applied and re-clamped.
    pub fn with_effect(&self, effect: &StatsEffect) -> UserStats {
        let mut next = *self;
        for (key, delta) in effect.deltas() {
            let slot = next.slot_mut(key);
            *slot = clamp_stat(*slot as i64 + delta as i64);
        }
        next
    }

    /// Clamps every field into range; used when reading persisted data.
    pub fn clamped(&self) -> UserStats {
        UserStats {
            resilience: self.resilience.min(STAT_MAX),
            creativity: self.creativity.min(STAT_MAX),
            trust: self.trust.min(STAT_MAX),
            knowledge: self.knowledge.min(STAT_MAX),
        }
    }
}

impl Default for UserStats {
    fn default() -> Self {
        Self::INITIAL
    }
}

pub fn clamp_stat(value: i64) -> u32 {
    value.clamp(STAT_MIN as i64, STAT_MAX as i64) as u32
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatKey {
    Resilience,
    Creativity,
    Trust,
    Knowledge,
}

impl StatKey {
    pub const ALL: [StatKey; 4] = [
        StatKey::Resilience,
        StatKey::Creativity,
        StatKey::Trust,
        StatKey::Knowledge,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StatKey::Resilience => "resilience",
            StatKey::Creativity => "creativity",
            StatKey::Trust => "trust",
            StatKey::Knowledge => "knowledge",
        }
    }
}

/// Partial signed delta over the stat vector. Keys that are absent leave the
/// stat untouched; unknown keys in incoming JSON are dropped by serde.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsEffect {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resilience: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creativity: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trust: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub knowledge: Option<i32>,
}

impl StatsEffect {
    pub fn get(&self, key: StatKey) -> Option<i32> {
        match key {
            StatKey::Resilience => self.resilience,
            StatKey::Creativity => self.creativity,
            StatKey::Trust => self.trust,
            StatKey::Knowledge => self.knowledge,
        }
    }

    /// Present deltas in fixed stat order
    pub fn deltas(&self) -> impl Iterator<Item = (StatKey, i32)> + '_ {
        StatKey::ALL
            .into_iter()
            .filter_map(move |key| self.get(key).map(|delta| (key, delta)))
    }

    /// Experience earned from an effect: both gains and losses count.
    pub fn magnitude(&self) -> u64 {
        self.deltas()
            .map(|(_, delta)| delta.unsigned_abs() as u64)
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.deltas().next().is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamp_never_leaves_bounds() {
        for start in [0u32, 1, 50, 99, 100] {
            for delta in [i32::MIN, -1000, -101, -1, 0, 1, 101, 1000, i32::MAX] {
                let effect = StatsEffect {
                    trust: Some(delta),
                    ..Default::default()
                };
                let stats = UserStats {
                    trust: start,
                    ..UserStats::INITIAL
                };
                let next = stats.with_effect(&effect);
                assert!(next.trust <= STAT_MAX, "start={} delta={}", start, delta);
            }
        }
    }

    #[test]
    fn absent_keys_leave_stats_untouched() {
        let effect = StatsEffect {
            knowledge: Some(15),
            ..Default::default()
        };
        let next = UserStats::INITIAL.with_effect(&effect);
        assert_eq!(next.knowledge, 25);
        assert_eq!(next.resilience, UserStats::INITIAL.resilience);
        assert_eq!(next.creativity, UserStats::INITIAL.creativity);
        assert_eq!(next.trust, UserStats::INITIAL.trust);
    }

    #[test]
    fn magnitude_counts_losses_too() {
        let effect = StatsEffect {
            resilience: Some(-10),
            knowledge: Some(-20),
            trust: Some(5),
            creativity: None,
        };
        assert_eq!(effect.magnitude(), 35);
    }

    #[test]
    fn unknown_keys_are_ignored_on_deserialize() {
        let effect: StatsEffect =
            serde_json::from_str(r#"{"trust": 5, "charisma": 40}"#).unwrap();
        assert_eq!(effect.trust, Some(5));
        assert_eq!(effect.magnitude(), 5);
    }
}
