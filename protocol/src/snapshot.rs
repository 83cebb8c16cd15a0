use serde::{Deserialize, Serialize};

/// Which seat of a battle a participant occupies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Player1,
    Player2,
}

impl Side {
    pub fn opponent(self) -> Side {
        match self {
            Side::Player1 => Side::Player2,
            Side::Player2 => Side::Player1,
        }
    }

    /// The outcome marker for a win by this side.
    pub fn outcome(self) -> BattleOutcome {
        match self {
            Side::Player1 => BattleOutcome::Player1,
            Side::Player2 => BattleOutcome::Player2,
        }
    }
}

/// Lifecycle of a battle session. Transitions only `Active` → `Finished`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BattleStatus {
    Active,
    Finished,
}

/// Result of a concluded battle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BattleOutcome {
    Player1,
    Player2,
    Draw,
}

/// One participant as seen in a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FighterView {
    pub username: String,
    pub hp: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub character_id: Option<String>,
}

/// Full battle state as pushed to one participant.
///
/// Only `you_are` is recipient-relative; everything else is symmetric and
/// identical for both recipients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BattleSnapshot {
    pub id: String,
    pub you_are: Side,
    pub player1: FighterView,
    pub player2: FighterView,
    pub threat: u8,
    pub threat_peak: u8,
    pub turns: u32,
    pub status: BattleStatus,
    pub log: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub winner: Option<BattleOutcome>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_side_opponent() {
        assert_eq!(Side::Player1.opponent(), Side::Player2);
        assert_eq!(Side::Player2.opponent(), Side::Player1);
    }

    #[test]
    fn test_side_outcome() {
        assert_eq!(Side::Player1.outcome(), BattleOutcome::Player1);
        assert_eq!(Side::Player2.outcome(), BattleOutcome::Player2);
    }

    #[test]
    fn test_side_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Side::Player1).unwrap(), "\"player1\"");
        assert_eq!(
            serde_json::to_string(&BattleOutcome::Draw).unwrap(),
            "\"draw\""
        );
        assert_eq!(
            serde_json::to_string(&BattleStatus::Active).unwrap(),
            "\"active\""
        );
    }

    #[test]
    fn test_fighter_view_omits_missing_character() {
        let view = FighterView {
            username: "Megumi".into(),
            hp: 84,
            character_id: None,
        };
        let json = serde_json::to_string(&view).unwrap();

        assert!(!json.contains("characterId"));
    }
}
