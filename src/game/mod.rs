//! Game state, turn structure, and the rules engine

pub mod actions;
pub mod combat;
pub mod decisions;
pub mod derived;
pub mod engine;
pub mod journal;
pub mod logger;
pub mod mana_payment;
pub mod permanent;
pub mod phase;
pub mod resolve;
pub mod sba;
pub mod schema;
pub mod state;
pub mod triggers;
pub mod validate;
pub mod visible;

pub use actions::{Action, ActionKind, BlockAssignment, CostPayment, TargetGroups, TargetRef};
pub use combat::CombatState;
pub use decisions::{DecisionChoice, DecisionKind, DecisionView, PendingDecision};
pub use engine::{ActionResult, Engine, MAX_HAND_SIZE};
pub use journal::{Journal, JournalEntry};
pub use logger::{GameLogger, LogEntry, OutputFormat, VerbosityLevel};
pub use permanent::Permanent;
pub use phase::{Phase, Step, TurnState};
pub use schema::ActionSchema;
pub use state::{GameOutcome, GameState, StackItem, TemporaryEffect};
pub use visible::VisibleState;
