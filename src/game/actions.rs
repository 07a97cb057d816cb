//! Player-submittable actions
//!
//! Actions are the closed input vocabulary of the engine. Surfaces build
//! them from the engine-enumerated schema; the validator rejects anything
//! the schema would not have produced. The serialized wire shape is a
//! tagged object: `{ type, actor, object_id?, targets?, payload? }`.

use crate::core::{InstanceId, PlayerId};
use crate::game::decisions::DecisionChoice;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// One chosen target on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum TargetRef {
    Player { player_id: PlayerId },
    Permanent { instance_id: InstanceId },
    Spell { instance_id: InstanceId },
    GraveyardCard { instance_id: InstanceId },
}

impl TargetRef {
    pub fn instance_id(&self) -> Option<InstanceId> {
        match self {
            TargetRef::Permanent { instance_id }
            | TargetRef::Spell { instance_id }
            | TargetRef::GraveyardCard { instance_id } => Some(*instance_id),
            TargetRef::Player { .. } => None,
        }
    }

    pub fn player_id(&self) -> Option<PlayerId> {
        match self {
            TargetRef::Player { player_id } => Some(*player_id),
            _ => None,
        }
    }
}

/// Chosen targets, one inner list per target group of the spell/ability
pub type TargetGroups = Vec<Vec<TargetRef>>;

/// Explicit choices needed to pay declared costs
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CostPayment {
    /// Cards discarded from hand
    pub discard: Vec<InstanceId>,
    /// Permanents sacrificed
    pub sacrifice: Vec<InstanceId>,
}

impl CostPayment {
    pub fn none() -> Self {
        CostPayment::default()
    }

    pub fn is_empty(&self) -> bool {
        self.discard.is_empty() && self.sacrifice.is_empty()
    }
}

/// One blocker assignment in a DECLARE_BLOCKERS action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockAssignment {
    pub attacker: InstanceId,
    pub blocker: InstanceId,
}

/// The closed set of action kinds, used in errors and schemas
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActionKind {
    PlayLand,
    TapForMana,
    CastSpell,
    ActivateAbility,
    DeclareAttackers,
    DeclareBlockers,
    PassPriority,
    ResolveDecision,
    SkipCombat,
    SkipMain2,
    Scoop,
}

/// A complete submitted action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Action {
    /// Play a land from hand (one per turn, main phase, empty stack)
    PlayLand { actor: PlayerId, card: InstanceId },

    /// Tap a land for mana (mana ability; does not use the stack)
    TapForMana {
        actor: PlayerId,
        permanent: InstanceId,
    },

    /// Cast a spell from hand (or graveyard, for flashback)
    CastSpell {
        actor: PlayerId,
        card: InstanceId,
        #[serde(default)]
        targets: TargetGroups,
        /// X value locked at cast; adds X generic to the cost
        #[serde(default)]
        x_value: u8,
        #[serde(default)]
        flashback: bool,
        /// `AlternateCost::id()` of the chosen alternative, if any
        #[serde(default)]
        alternate_cost: Option<String>,
        #[serde(default)]
        additional: CostPayment,
    },

    /// Activate an ability of a permanent (or graveyard card)
    ActivateAbility {
        actor: PlayerId,
        source: InstanceId,
        ability_index: usize,
        #[serde(default)]
        targets: TargetGroups,
        #[serde(default)]
        x_value: u8,
        #[serde(default)]
        costs: CostPayment,
    },

    /// Atomically declare the attacker set
    DeclareAttackers {
        actor: PlayerId,
        attackers: Vec<InstanceId>,
    },

    /// Atomically declare all blocks
    DeclareBlockers {
        actor: PlayerId,
        blocks: Vec<BlockAssignment>,
    },

    PassPriority { actor: PlayerId },

    /// Answer the engine-held pending decision
    ResolveDecision {
        actor: PlayerId,
        choice: DecisionChoice,
    },

    /// Jump from MAIN1 past combat to MAIN2
    SkipCombat { actor: PlayerId },

    /// Jump from MAIN2 to the end step
    SkipMain2 { actor: PlayerId },

    /// Concede
    Scoop { actor: PlayerId },
}

impl Action {
    pub fn actor(&self) -> PlayerId {
        match self {
            Action::PlayLand { actor, .. }
            | Action::TapForMana { actor, .. }
            | Action::CastSpell { actor, .. }
            | Action::ActivateAbility { actor, .. }
            | Action::DeclareAttackers { actor, .. }
            | Action::DeclareBlockers { actor, .. }
            | Action::PassPriority { actor }
            | Action::ResolveDecision { actor, .. }
            | Action::SkipCombat { actor }
            | Action::SkipMain2 { actor }
            | Action::Scoop { actor } => *actor,
        }
    }

    pub fn kind(&self) -> ActionKind {
        match self {
            Action::PlayLand { .. } => ActionKind::PlayLand,
            Action::TapForMana { .. } => ActionKind::TapForMana,
            Action::CastSpell { .. } => ActionKind::CastSpell,
            Action::ActivateAbility { .. } => ActionKind::ActivateAbility,
            Action::DeclareAttackers { .. } => ActionKind::DeclareAttackers,
            Action::DeclareBlockers { .. } => ActionKind::DeclareBlockers,
            Action::PassPriority { .. } => ActionKind::PassPriority,
            Action::ResolveDecision { .. } => ActionKind::ResolveDecision,
            Action::SkipCombat { .. } => ActionKind::SkipCombat,
            Action::SkipMain2 { .. } => ActionKind::SkipMain2,
            Action::Scoop { .. } => ActionKind::Scoop,
        }
    }

    /// Shorthand for a targetless cast
    pub fn cast_simple(actor: PlayerId, card: InstanceId) -> Self {
        Action::CastSpell {
            actor,
            card,
            targets: Vec::new(),
            x_value: 0,
            flashback: false,
            alternate_cost: None,
            additional: CostPayment::none(),
        }
    }

    /// Shorthand for a single-target cast
    pub fn cast_targeted(actor: PlayerId, card: InstanceId, target: TargetRef) -> Self {
        Action::CastSpell {
            actor,
            card,
            targets: vec![vec![target]],
            x_value: 0,
            flashback: false,
            alternate_cost: None,
            additional: CostPayment::none(),
        }
    }
}

/// Flatten target groups for existence/hexproof sweeps
pub fn flatten_targets(groups: &TargetGroups) -> SmallVec<[TargetRef; 4]> {
    groups.iter().flatten().copied().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::EntityId;

    #[test]
    fn test_actor_and_kind() {
        let p = PlayerId::new(0);
        let action = Action::PassPriority { actor: p };
        assert_eq!(action.actor(), p);
        assert_eq!(action.kind(), ActionKind::PassPriority);

        let cast = Action::cast_simple(p, EntityId::new(4));
        assert_eq!(cast.kind(), ActionKind::CastSpell);
    }

    #[test]
    fn test_wire_shape_round_trip() {
        let p = PlayerId::new(1);
        let action = Action::cast_targeted(
            p,
            EntityId::new(7),
            TargetRef::Player { player_id: PlayerId::new(0) },
        );
        let json = serde_json::to_string(&action).unwrap();
        assert!(json.contains("\"type\":\"CastSpell\""));
        let back: Action = serde_json::from_str(&json).unwrap();
        assert_eq!(back, action);
    }

    #[test]
    fn test_flatten_targets() {
        let groups: TargetGroups = vec![
            vec![TargetRef::Player { player_id: PlayerId::new(0) }],
            vec![],
            vec![TargetRef::Permanent { instance_id: EntityId::new(3) }],
        ];
        let flat = flatten_targets(&groups);
        assert_eq!(flat.len(), 2);
    }
}
