//! Pending decisions and resolution continuations
//!
//! When resolution needs a choice the submitted action cannot carry (a
//! library search, a scry order, a discard), the engine suspends with a
//! `PendingDecision` and returns. While one is set, the only legal action
//! for its actor is RESOLVE_DECISION. The decision record carries both the
//! surface-visible part (prompt, options, bounds) and the engine-internal
//! continuation: each suspended effect is a small state machine whose
//! persistent data lives here, which keeps the engine trivially
//! serializable.

use crate::core::{InstanceId, ManaCost, PlayerId};
use crate::game::actions::TargetGroups;
use crate::game::state::StackItem;
use crate::game::triggers::PendingTrigger;
use serde::{Deserialize, Serialize};

/// Which fact-or-fiction pile was picked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Pile {
    A,
    B,
}

/// A choice submitted via RESOLVE_DECISION
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum DecisionChoice {
    /// Pick one card/permanent by instance id
    Card { instance_id: InstanceId },
    /// Pick full target groups (trigger targets, copy-spell targets)
    Targets { targets: TargetGroups },
    /// Scry order: both lists together must partition the looked-at cards
    Scry {
        top: Vec<InstanceId>,
        bottom: Vec<InstanceId>,
    },
    /// Split revealed cards into two piles
    Piles {
        pile_a: Vec<InstanceId>,
        pile_b: Vec<InstanceId>,
    },
    /// Pick a previously split pile
    Pile { pile: Pile },
    /// Pay (or decline to pay) a held-up cost
    Pay { pay: bool },
    /// Discard the named cards
    Discard { cards: Vec<InstanceId> },
    /// Decline an optional choice ("you may ...")
    Decline,
}

/// Continuation of an interrupted stack-item resolution
///
/// The stack item was already popped when resolution began; the remainder
/// of its effect list resumes at `next_effect` once the decision lands.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResumeCtx {
    pub item: StackItem,
    pub next_effect: usize,
}

/// A queued trigger-target request (several triggers may need targets at
/// the same priority window; they resolve FIFO)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueuedTriggerTargets {
    pub trigger: PendingTrigger,
    pub options: Vec<DecisionChoice>,
}

/// Engine-internal decision context (not part of the visible projection)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DecisionKind {
    /// Choose targets for a triggered ability before it goes on the stack
    TriggerTargets {
        trigger: PendingTrigger,
        queue: Vec<QueuedTriggerTargets>,
    },
    /// Cleanup-step discard down to maximum hand size
    CleanupDiscard { count: u8 },
    /// A required discard of `count` cards by `player` (forced discard
    /// effects, "draw then discard")
    ForcedDiscard { player: PlayerId, count: u8 },
    /// Search library for a basic land, put onto the battlefield tapped
    SearchBasicLand { player: PlayerId },
    /// Search library for a basic Plains, reveal, to hand
    SearchBasicPlains { player: PlayerId },
    /// Look at top N, put one in hand, rest on the bottom in chosen order
    LookTopPutOneInHand { top: Vec<InstanceId> },
    /// Look at top N, may put a land onto the battlefield tapped, rest on
    /// the bottom in random order
    LookTopPutLand { top: Vec<InstanceId> },
    /// Scry N (optionally drawing afterwards)
    Scry {
        top: Vec<InstanceId>,
        then_draw: u8,
    },
    /// Opponent splits the revealed cards into two piles
    FactOrFictionSplit { top: Vec<InstanceId> },
    /// Controller picks a pile: chosen to hand, other to graveyard
    FactOrFictionPick {
        top: Vec<InstanceId>,
        pile_a: Vec<InstanceId>,
        pile_b: Vec<InstanceId>,
    },
    /// "Counter target spell unless its controller pays {N}"
    CounterUnlessPay {
        spell: InstanceId,
        cost: ManaCost,
    },
    /// Each player sacrifices a creature; queue holds later players'
    /// (player, options) pairs
    EachPlayerSacrifice {
        queue: Vec<(PlayerId, Vec<DecisionChoice>)>,
    },
    /// "You may discard your hand and draw cards equal to the damage
    /// dealt to target opponent this turn"
    DiscardHandDrawDamage { player: PlayerId, damage: i32 },
}

/// The engine-held slot for a required player choice
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingDecision {
    pub actor: PlayerId,
    pub prompt: String,
    /// Enumerated options where the choice space is finite; empty for
    /// free-form kinds (scry orders, pile splits) which are validated
    /// structurally instead
    pub options: Vec<DecisionChoice>,
    pub min: u8,
    pub max: u8,
    pub kind: DecisionKind,
    /// Interrupted resolution to resume after the choice lands
    pub resume: Option<ResumeCtx>,
}

impl PendingDecision {
    pub fn new(actor: PlayerId, prompt: impl Into<String>, kind: DecisionKind) -> Self {
        PendingDecision {
            actor,
            prompt: prompt.into(),
            options: Vec::new(),
            min: 1,
            max: 1,
            kind,
            resume: None,
        }
    }

    pub fn with_options(mut self, options: Vec<DecisionChoice>) -> Self {
        self.options = options;
        self
    }

    pub fn with_resume(mut self, resume: Option<ResumeCtx>) -> Self {
        self.resume = resume;
        self
    }

    /// Membership check for enumerated-option kinds. Free-form kinds are
    /// validated by the engine against state.
    pub fn accepts_enumerated(&self, choice: &DecisionChoice) -> bool {
        self.options.is_empty() || self.options.contains(choice)
    }
}

/// Surface-visible projection of a pending decision
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionView {
    pub actor: PlayerId,
    pub prompt: String,
    pub options: Vec<DecisionChoice>,
    pub min: u8,
    pub max: u8,
}

impl From<&PendingDecision> for DecisionView {
    fn from(d: &PendingDecision) -> Self {
        DecisionView {
            actor: d.actor,
            prompt: d.prompt.clone(),
            options: d.options.clone(),
            min: d.min,
            max: d.max,
        }
    }
}
