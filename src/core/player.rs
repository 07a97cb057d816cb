//! Player representation

use crate::core::{ManaPool, PlayerId, PlayerName};
use serde::{Deserialize, Serialize};

/// Why a player lost the game
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LossReason {
    /// Life total reached zero or below
    Life,
    /// Tried to draw from an empty library
    Decked,
    /// Conceded
    Scooped,
}

/// Represents a player in the game
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Player {
    pub id: PlayerId,
    pub name: PlayerName,

    /// Life total; may go negative until state-based actions run
    pub life: i32,

    pub mana_pool: ManaPool,

    pub lands_played_this_turn: u8,

    pub has_lost: bool,
    pub loss_reason: Option<LossReason>,
}

impl Player {
    pub fn new(id: PlayerId, name: impl Into<PlayerName>, starting_life: i32) -> Self {
        Player {
            id,
            name: name.into(),
            life: starting_life,
            mana_pool: ManaPool::new(),
            lands_played_this_turn: 0,
            has_lost: false,
            loss_reason: None,
        }
    }

    pub fn gain_life(&mut self, amount: i32) {
        self.life += amount;
    }

    /// Lowers life without running loss checks; state-based actions decide
    /// losses.
    pub fn lose_life(&mut self, amount: i32) {
        self.life -= amount;
    }

    pub fn can_play_land(&self) -> bool {
        self.lands_played_this_turn < 1
    }

    pub fn note_land_played(&mut self) {
        self.lands_played_this_turn += 1;
    }

    pub fn reset_for_new_turn(&mut self) {
        self.lands_played_this_turn = 0;
    }

    pub fn mark_lost(&mut self, reason: LossReason) {
        if !self.has_lost {
            self.has_lost = true;
            self.loss_reason = Some(reason);
        }
    }
}
