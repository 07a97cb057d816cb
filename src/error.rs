//! Error types for the rules engine
//!
//! Every non-fatal failure is returned as a value on the `ActionResult`;
//! the engine never mutates state when it returns an error. The closed set
//! below is the complete error taxonomy surfaces can observe.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EngineError {
    #[error("Illegal timing: {0}")]
    IllegalTiming(String),

    #[error("Not your priority: {0}")]
    NotYourPriority(String),

    #[error("Cannot pay cost: {0}")]
    CannotPayCost(String),

    #[error("Invalid target: {0}")]
    InvalidTarget(String),

    #[error("A pending decision preempts this action: {0}")]
    PendingDecisionPreempts(String),

    #[error("Unknown object: {0}")]
    UnknownObject(String),

    #[error("Game is already over")]
    GameOver,

    #[error("Invalid card definition: {0}")]
    InvalidCardDefinition(String),

    #[error("Invalid deck: {0}")]
    InvalidDeck(String),

    /// Corrupt internal state. The engine prefers loud failure to silent
    /// recovery; callers should treat this as fatal.
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),
}

pub type Result<T> = std::result::Result<T, EngineError>;

impl EngineError {
    /// True for errors that indicate engine corruption rather than a bad
    /// action submission.
    pub fn is_fatal(&self) -> bool {
        matches!(self, EngineError::InvariantViolation(_))
    }
}
