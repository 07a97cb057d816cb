//! Game journal
//!
//! Append-only record of every submitted action: the actor's visible
//! state before the action, the action itself, and the result. Replaying
//! the journal through `submit_action` with the same seed and decks
//! reproduces every recorded result byte for byte.

use crate::game::actions::Action;
use crate::game::engine::ActionResult;
use crate::game::visible::VisibleState;
use crate::EngineError;
use serde::{Deserialize, Serialize};

/// One journal line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalEntry {
    pub snapshot: VisibleState,
    pub action: Action,
    pub result: Result<ActionResult, EngineError>,
}

/// Append-only sequence of journal entries for one game
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Journal {
    entries: Vec<JournalEntry>,
}

impl Journal {
    pub fn new() -> Self {
        Journal::default()
    }

    pub fn record(
        &mut self,
        snapshot: VisibleState,
        action: Action,
        result: Result<ActionResult, EngineError>,
    ) {
        self.entries.push(JournalEntry {
            snapshot,
            action,
            result,
        });
    }

    pub fn entries(&self) -> &[JournalEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The submitted actions alone, for replay
    pub fn actions(&self) -> Vec<Action> {
        self.entries.iter().map(|e| e.action.clone()).collect()
    }
}
