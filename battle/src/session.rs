//! BattleSession - authoritative state of one match.

use std::collections::VecDeque;
use std::time::SystemTime;

use rand::Rng;
use thiserror::Error;

use cursebound_protocol::{BattleOutcome, BattleSnapshot, BattleStatus, FighterView, Side};

use crate::catalog;

/// Health both fighters start with.
pub const MAX_HEALTH: u32 = 100;

/// Threat intensity a fresh session starts at.
pub const STARTING_THREAT: u8 = 12;

/// Threat value that forces a draw.
pub const THREAT_CEILING: u8 = 100;

/// Maximum number of retained event-log entries; oldest evicted first.
pub const LOG_CAPACITY: usize = 12;

/// Fixed threat gain per action, before the random component.
const THREAT_BASE_GAIN: u8 = 6;

/// Upper bound (inclusive) of the random threat gain per action.
const THREAT_BONUS_MAX: u32 = 9;

/// Upper bound (inclusive) of the random damage bonus per action.
const DAMAGE_BONUS_MAX: u32 = 25;

/// One participant as owned by a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fighter {
    pub username: String,
    /// Durable id in the user store.
    pub user_id: i64,
    pub character_id: Option<String>,
}

impl Fighter {
    pub fn new(username: impl Into<String>, user_id: i64) -> Self {
        Self {
            username: username.into(),
            user_id,
            character_id: None,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("battle is not active")]
    NotActive,

    #[error("unknown technique: {0}")]
    UnknownTechnique(String),
}

/// What a single accepted action did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActionReport {
    pub damage: u32,
    /// Whether this action moved the session to `Finished`.
    pub finished: bool,
}

/// Authoritative mutable state of one match between exactly two fighters.
///
/// Health stays in `[0, MAX_HEALTH]`, threat in `[0, THREAT_CEILING]`, and
/// `threat_peak >= threat` at all times. The status only ever moves
/// `Active` → `Finished`; every mutating operation on a finished session is
/// rejected without touching state.
#[derive(Debug, Clone)]
pub struct BattleSession {
    id: String,
    fighters: [Fighter; 2],
    hp: [u32; 2],
    threat: u8,
    threat_peak: u8,
    turns: u32,
    status: BattleStatus,
    winner: Option<BattleOutcome>,
    log: VecDeque<String>,
    created_at: SystemTime,
}

impl BattleSession {
    /// Open a session between two fighters, both at full health.
    pub fn new(id: impl Into<String>, player1: Fighter, player2: Fighter) -> Self {
        let mut session = Self {
            id: id.into(),
            log: VecDeque::with_capacity(LOG_CAPACITY),
            fighters: [player1, player2],
            hp: [MAX_HEALTH, MAX_HEALTH],
            threat: STARTING_THREAT,
            threat_peak: STARTING_THREAT,
            turns: 0,
            status: BattleStatus::Active,
            winner: None,
            created_at: SystemTime::now(),
        };
        session.push_log(format!(
            "{} versus {}",
            session.fighters[0].username, session.fighters[1].username
        ));
        session
    }

    /// Resolve one turn action by `attacker`.
    ///
    /// Damage is the technique's power plus a uniform bonus in
    /// `[0, DAMAGE_BONUS_MAX]`; threat rises by a fixed base plus a uniform
    /// bonus in `[0, THREAT_BONUS_MAX]`, clamped at the ceiling. Termination
    /// is then checked with health depletion taking precedence over the
    /// threat ceiling.
    pub fn apply_action(
        &mut self,
        attacker: Side,
        technique_id: &str,
        rng: &mut impl Rng,
    ) -> Result<ActionReport, SessionError> {
        if self.status != BattleStatus::Active {
            return Err(SessionError::NotActive);
        }
        let technique = catalog::technique(technique_id)
            .ok_or_else(|| SessionError::UnknownTechnique(technique_id.to_string()))?;

        let bonus: u32 = rng.gen_range(0..=DAMAGE_BONUS_MAX);
        let damage = technique.power + bonus;

        let defender = attacker.opponent();
        let target = side_index(defender);
        self.hp[target] = self.hp[target].saturating_sub(damage);

        self.turns += 1;
        let gain = THREAT_BASE_GAIN + rng.gen_range(0..=THREAT_BONUS_MAX) as u8;
        self.threat = self.threat.saturating_add(gain).min(THREAT_CEILING);
        self.threat_peak = self.threat_peak.max(self.threat);

        self.push_log(format!(
            "{} used {} on {} (-{} HP)",
            self.fighters[side_index(attacker)].username,
            technique.name,
            self.fighters[target].username,
            damage
        ));

        // Health depletion takes precedence when both fire on the same turn.
        if self.hp[target] == 0 {
            self.finish(attacker.outcome());
        } else if self.threat >= THREAT_CEILING {
            self.push_log("Threat level maxed out! Draw enforced.".to_string());
            self.finish(BattleOutcome::Draw);
        }

        Ok(ActionReport {
            damage,
            finished: self.status == BattleStatus::Finished,
        })
    }

    /// Record a character choice for one side.
    pub fn select_character(
        &mut self,
        side: Side,
        character_id: &str,
    ) -> Result<(), SessionError> {
        if self.status != BattleStatus::Active {
            return Err(SessionError::NotActive);
        }

        self.fighters[side_index(side)].character_id = Some(character_id.to_string());
        self.push_log(format!(
            "{} attuned to {}.",
            self.fighters[side_index(side)].username,
            format_character_id(character_id)
        ));
        Ok(())
    }

    /// Forced termination: `leaver` disconnected, the opponent wins.
    pub fn forfeit(&mut self, leaver: Side) -> Result<(), SessionError> {
        if self.status != BattleStatus::Active {
            return Err(SessionError::NotActive);
        }

        self.push_log(format!(
            "{} disconnected. Automatic victory awarded.",
            self.fighters[side_index(leaver)].username
        ));
        self.finish(leaver.opponent().outcome());
        Ok(())
    }

    /// Build the state payload for one recipient.
    pub fn snapshot(&self, for_side: Side) -> BattleSnapshot {
        BattleSnapshot {
            id: self.id.clone(),
            you_are: for_side,
            player1: self.fighter_view(Side::Player1),
            player2: self.fighter_view(Side::Player2),
            threat: self.threat,
            threat_peak: self.threat_peak,
            turns: self.turns,
            status: self.status,
            log: self.log.iter().cloned().collect(),
            winner: self.winner,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn fighter(&self, side: Side) -> &Fighter {
        &self.fighters[side_index(side)]
    }

    pub fn hp(&self, side: Side) -> u32 {
        self.hp[side_index(side)]
    }

    pub fn threat(&self) -> u8 {
        self.threat
    }

    pub fn threat_peak(&self) -> u8 {
        self.threat_peak
    }

    pub fn turns(&self) -> u32 {
        self.turns
    }

    pub fn status(&self) -> BattleStatus {
        self.status
    }

    pub fn winner(&self) -> Option<BattleOutcome> {
        self.winner
    }

    pub fn log(&self) -> impl Iterator<Item = &str> {
        self.log.iter().map(String::as_str)
    }

    pub fn created_at(&self) -> SystemTime {
        self.created_at
    }

    fn fighter_view(&self, side: Side) -> FighterView {
        let fighter = &self.fighters[side_index(side)];
        FighterView {
            username: fighter.username.clone(),
            hp: self.hp[side_index(side)],
            character_id: fighter.character_id.clone(),
        }
    }

    fn finish(&mut self, outcome: BattleOutcome) {
        self.status = BattleStatus::Finished;
        self.winner = Some(outcome);
    }

    fn push_log(&mut self, entry: String) {
        if self.log.len() == LOG_CAPACITY {
            self.log.pop_front();
        }
        self.log.push_back(entry);
    }
}

/// Convert a side to its array index.
pub fn side_index(side: Side) -> usize {
    match side {
        Side::Player1 => 0,
        Side::Player2 => 1,
    }
}

/// Turn a kebab-case character id into a display name.
fn format_character_id(character_id: &str) -> String {
    character_id
        .split('-')
        .filter(|token| !token.is_empty())
        .map(|token| {
            let mut chars = token.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
