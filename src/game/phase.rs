//! Turn phases and steps

use serde::{Deserialize, Serialize};

/// Major phases of a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    Beginning,
    PreCombatMain,
    Combat,
    PostCombatMain,
    Ending,
}

/// Specific steps within phases
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Step {
    // Beginning Phase
    Untap,
    Upkeep,
    Draw,

    // Pre-Combat Main Phase
    Main1,

    // Combat Phase
    BeginCombat,
    DeclareAttackers,
    DeclareBlockers,
    CombatDamage,
    EndCombat,

    // Post-Combat Main Phase
    Main2,

    // Ending Phase
    End,
    Cleanup,
}

impl Step {
    /// Get the phase this step belongs to
    pub fn phase(&self) -> Phase {
        match self {
            Step::Untap | Step::Upkeep | Step::Draw => Phase::Beginning,
            Step::Main1 => Phase::PreCombatMain,
            Step::BeginCombat
            | Step::DeclareAttackers
            | Step::DeclareBlockers
            | Step::CombatDamage
            | Step::EndCombat => Phase::Combat,
            Step::Main2 => Phase::PostCombatMain,
            Step::End | Step::Cleanup => Phase::Ending,
        }
    }

    /// Get the next step in turn order
    pub fn next(&self) -> Option<Step> {
        match self {
            Step::Untap => Some(Step::Upkeep),
            Step::Upkeep => Some(Step::Draw),
            Step::Draw => Some(Step::Main1),
            Step::Main1 => Some(Step::BeginCombat),
            Step::BeginCombat => Some(Step::DeclareAttackers),
            Step::DeclareAttackers => Some(Step::DeclareBlockers),
            Step::DeclareBlockers => Some(Step::CombatDamage),
            Step::CombatDamage => Some(Step::EndCombat),
            Step::EndCombat => Some(Step::Main2),
            Step::Main2 => Some(Step::End),
            Step::End => Some(Step::Cleanup),
            Step::Cleanup => None, // End of turn
        }
    }

    /// Can a player play a sorcery-speed spell in this step?
    pub fn is_sorcery_speed(&self) -> bool {
        matches!(self, Step::Main1 | Step::Main2)
    }

    /// Can a player play lands in this step?
    pub fn can_play_lands(&self) -> bool {
        matches!(self, Step::Main1 | Step::Main2)
    }

    /// Does this step open a priority window at all?
    ///
    /// Untap never gives priority; Cleanup only gives priority when a
    /// trigger fires during it (the engine handles that case specially).
    pub fn grants_priority(&self) -> bool {
        !matches!(self, Step::Untap | Step::Cleanup | Step::CombatDamage)
    }

    /// Position of this step within the turn, for expiry comparisons
    pub fn order(&self) -> u8 {
        match self {
            Step::Untap => 0,
            Step::Upkeep => 1,
            Step::Draw => 2,
            Step::Main1 => 3,
            Step::BeginCombat => 4,
            Step::DeclareAttackers => 5,
            Step::DeclareBlockers => 6,
            Step::CombatDamage => 7,
            Step::EndCombat => 8,
            Step::Main2 => 9,
            Step::End => 10,
            Step::Cleanup => 11,
        }
    }
}

/// Represents the current turn structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnState {
    /// Current turn number (starts at 1)
    pub turn_number: u32,

    /// Current step
    pub step: Step,

    /// Active player (whose turn it is)
    pub active_player: crate::core::PlayerId,
}

impl TurnState {
    pub fn new(starting_player: crate::core::PlayerId) -> Self {
        TurnState {
            turn_number: 1,
            step: Step::Untap,
            active_player: starting_player,
        }
    }

    pub fn phase(&self) -> Phase {
        self.step.phase()
    }

    /// Advance to the next step; false at end of turn
    pub fn advance_step(&mut self) -> bool {
        if let Some(next_step) = self.step.next() {
            self.step = next_step;
            true
        } else {
            false
        }
    }

    /// Start a new turn
    pub fn next_turn(&mut self, next_player: crate::core::PlayerId) {
        self.turn_number += 1;
        self.step = Step::Untap;
        self.active_player = next_player;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::PlayerId;

    #[test]
    fn test_step_phases() {
        assert_eq!(Step::Untap.phase(), Phase::Beginning);
        assert_eq!(Step::Upkeep.phase(), Phase::Beginning);
        assert_eq!(Step::Main1.phase(), Phase::PreCombatMain);
        assert_eq!(Step::DeclareAttackers.phase(), Phase::Combat);
        assert_eq!(Step::Main2.phase(), Phase::PostCombatMain);
        assert_eq!(Step::Cleanup.phase(), Phase::Ending);
    }

    #[test]
    fn test_step_progression() {
        let mut step = Step::Untap;
        step = step.next().unwrap();
        assert_eq!(step, Step::Upkeep);
        step = step.next().unwrap();
        assert_eq!(step, Step::Draw);
        assert_eq!(Step::Cleanup.next(), None);
    }

    #[test]
    fn test_priority_windows() {
        assert!(!Step::Untap.grants_priority());
        assert!(!Step::Cleanup.grants_priority());
        assert!(!Step::CombatDamage.grants_priority());
        assert!(Step::Upkeep.grants_priority());
        assert!(Step::Main1.grants_priority());
        assert!(Step::End.grants_priority());
    }

    #[test]
    fn test_turn_state() {
        let player = PlayerId::new(0);
        let mut turn = TurnState::new(player);

        assert_eq!(turn.turn_number, 1);
        assert_eq!(turn.step, Step::Untap);
        assert_eq!(turn.active_player, player);

        while turn.advance_step() {}
        assert_eq!(turn.step, Step::Cleanup);

        let player2 = PlayerId::new(1);
        turn.next_turn(player2);
        assert_eq!(turn.turn_number, 2);
        assert_eq!(turn.step, Step::Untap);
        assert_eq!(turn.active_player, player2);
    }

    #[test]
    fn test_sorcery_speed() {
        assert!(Step::Main1.is_sorcery_speed());
        assert!(Step::Main2.is_sorcery_speed());
        assert!(!Step::Upkeep.is_sorcery_speed());
        assert!(!Step::DeclareAttackers.is_sorcery_speed());
    }

    #[test]
    fn test_step_order() {
        assert!(Step::Untap.order() < Step::End.order());
        assert!(Step::End.order() < Step::Cleanup.order());
    }
}
