use serde::{Deserialize, Serialize};

/// Independent ranking tracks. Each track lives in its own collection, so a
/// quiz score never overwrites the journey XP stored for the same player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreTrack {
    Journey,
    Quiz,
}

impl ScoreTrack {
    pub fn collection(&self) -> &'static str {
        match self {
            ScoreTrack::Journey => "leaderboard",
            ScoreTrack::Quiz => "quiz_leaderboard",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ScoreTrack::Journey => "journey",
            ScoreTrack::Quiz => "quiz",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "journey" => Some(ScoreTrack::Journey),
            "quiz" => Some(ScoreTrack::Quiz),
            _ => None,
        }
    }
}

/// One document per player identity, overwritten on resubmission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    pub avatar_id: String,
    pub total_xp: u64,
    pub title: String,
    /// Unix epoch milliseconds of the last write
    pub timestamp: i64,
}

#[derive(Debug, Deserialize)]
pub struct LeaderboardQuery {
    pub track: Option<String>,
    #[serde(default)]
    pub refresh: bool,
}

#[derive(Debug, Serialize)]
pub struct LeaderboardResponse {
    pub track: ScoreTrack,
    pub entries: Vec<LeaderboardEntry>,
}

/// Document key for a player: trimmed, lowercased, every character outside
/// `[a-z0-9]` replaced by `_`.
pub fn normalize_player_key(name: &str) -> String {
    name.trim()
        .to_lowercase()
        .chars()
        .map(|c| {
            if c.is_ascii_lowercase() || c.is_ascii_digit() {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_case_spaces_and_punctuation() {
        assert_eq!(normalize_player_key("  Nguyen Van A "), "nguyen_van_a");
        assert_eq!(normalize_player_key("Lan.Anh-99"), "lan_anh_99");
    }

    #[test]
    fn non_ascii_letters_become_underscores() {
        assert_eq!(normalize_player_key("Trần"), "tr_n");
    }

    #[test]
    fn same_player_maps_to_same_key() {
        assert_eq!(
            normalize_player_key("MINH"),
            normalize_player_key(" minh ")
        );
    }

    #[test]
    fn entry_id_maps_to_document_key() {
        let entry = LeaderboardEntry {
            id: "minh".to_string(),
            name: "Minh".to_string(),
            avatar_id: "2".to_string(),
            total_xp: 120,
            title: "Recruit".to_string(),
            timestamp: 0,
        };
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["_id"], "minh");
    }
}
