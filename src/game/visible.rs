//! Per-player visible-state projection
//!
//! Surfaces never see `GameState`; they get this immutable projection
//! containing only what the player may legally see: their own hand and
//! mana pool, both life totals and library sizes, the public zones, the
//! derived battlefield view, and the pending decision if they are the one
//! deciding.

use crate::core::{CardId, CardName, InstanceId, KeywordSet, ManaPool, PlayerId, Subtype};
use crate::game::actions::TargetGroups;
use crate::game::decisions::DecisionView;
use crate::game::derived;
use crate::game::phase::{Phase, Step};
use crate::game::state::{GameOutcome, GameState, StackItem};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Minimal public card reference (graveyards, exile)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardRef {
    pub instance_id: InstanceId,
    pub card_id: CardId,
    pub name: CardName,
}

/// A card in the viewing player's hand
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HandCardView {
    pub instance_id: InstanceId,
    pub card_id: CardId,
    pub name: CardName,
    pub mana_cost: crate::core::ManaCost,
    pub power: Option<i32>,
    pub toughness: Option<i32>,
}

/// Effective view of a battlefield permanent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PermanentView {
    pub instance_id: InstanceId,
    pub card_id: CardId,
    pub name: CardName,
    pub owner: PlayerId,
    pub controller: PlayerId,
    pub tapped: bool,
    pub summoning_sick: bool,
    pub damage_marked: i32,
    pub counters: BTreeMap<crate::core::CounterKind, u32>,
    pub attached_to: Option<InstanceId>,
    pub attachments: Vec<InstanceId>,
    pub is_token: bool,
    /// Derived values after all continuous modifiers
    pub power: Option<i32>,
    pub toughness: Option<i32>,
    pub keywords: KeywordSet,
    pub subtypes: BTreeSet<Subtype>,
    pub must_attack: bool,
    pub goaded_by: Option<PlayerId>,
}

/// Public view of an unresolved stack item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StackItemView {
    pub controller: PlayerId,
    /// Spell instance, or the ability's source permanent
    pub object: InstanceId,
    pub card_id: Option<CardId>,
    pub name: Option<CardName>,
    pub is_spell: bool,
    pub targets: TargetGroups,
}

/// Current combat declarations (while in combat steps)
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CombatView {
    pub attackers: Vec<InstanceId>,
    pub blockers: BTreeMap<InstanceId, Vec<InstanceId>>,
    pub attackers_declared: bool,
    pub blockers_declared: bool,
}

/// The engine-produced, per-player projection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisibleState {
    pub viewer: PlayerId,
    pub turn_number: u32,
    pub phase: Phase,
    pub step: Step,
    pub active_player: PlayerId,
    pub priority_holder: Option<PlayerId>,

    pub life_totals: BTreeMap<PlayerId, i32>,
    pub library_sizes: BTreeMap<PlayerId, usize>,

    pub hand: Vec<HandCardView>,
    pub opponent_hand_size: usize,

    pub graveyards: BTreeMap<PlayerId, Vec<CardRef>>,
    pub exile: Vec<CardRef>,

    pub battlefield: Vec<PermanentView>,
    pub stack: Vec<StackItemView>,

    pub mana_pool: ManaPool,
    pub lands_played_this_turn: u8,

    pub combat: CombatView,

    /// Set when the viewer must decide
    pub pending_decision: Option<DecisionView>,
    /// True when the opponent is deciding
    pub opponent_deciding: bool,

    pub game_over: Option<GameOutcome>,
}

fn card_ref(state: &GameState, id: InstanceId) -> Option<CardRef> {
    let inst = state.instance(id).ok()?;
    let def = state.def(&inst.card_id).ok()?.clone();
    Some(CardRef {
        instance_id: id,
        card_id: inst.card_id.clone(),
        name: def.name,
    })
}

/// Build the projection for one player
pub fn project(state: &GameState, viewer: PlayerId) -> VisibleState {
    let derived_view = derived::compute(state);
    let attachments = state.attachments_by_host();
    let opponent = state.other_player(viewer);

    let mut life_totals = BTreeMap::new();
    let mut library_sizes = BTreeMap::new();
    let mut graveyards = BTreeMap::new();
    for player in state.player_ids() {
        if let Ok(p) = state.player(player) {
            life_totals.insert(player, p.life);
        }
        if let Ok(z) = state.zones(player) {
            library_sizes.insert(player, z.library.len());
            graveyards.insert(
                player,
                z.graveyard
                    .cards
                    .iter()
                    .filter_map(|id| card_ref(state, *id))
                    .collect(),
            );
        }
    }

    let hand = state
        .zones(viewer)
        .map(|z| {
            z.hand
                .cards
                .iter()
                .filter_map(|id| {
                    let inst = state.instance(*id).ok()?;
                    let def = state.def(&inst.card_id).ok()?;
                    Some(HandCardView {
                        instance_id: *id,
                        card_id: inst.card_id.clone(),
                        name: def.name.clone(),
                        mana_cost: def.mana_cost,
                        power: def.creature_stats.map(|s| s.base_power),
                        toughness: def.creature_stats.map(|s| s.base_toughness),
                    })
                })
                .collect()
        })
        .unwrap_or_default();

    let battlefield = state
        .battlefield
        .values()
        .filter_map(|perm| {
            let id = perm.id();
            let d = derived_view.get(id)?;
            let def = state.def(&perm.instance.card_id).ok()?;
            Some(PermanentView {
                instance_id: id,
                card_id: perm.instance.card_id.clone(),
                name: def.name.clone(),
                owner: perm.instance.owner,
                controller: perm.controller,
                tapped: perm.tapped,
                summoning_sick: perm.summoning_sick,
                damage_marked: perm.damage_marked,
                counters: perm.counters.clone(),
                attached_to: perm.attached_to,
                attachments: attachments.get(&id).cloned().unwrap_or_default(),
                is_token: perm.instance.is_token,
                power: d.power,
                toughness: d.toughness,
                keywords: d.keywords.clone(),
                subtypes: d.subtypes.clone(),
                must_attack: d.must_attack,
                goaded_by: d.goaded_by,
            })
        })
        .collect();

    let stack = state
        .stack
        .iter()
        .map(|item| match item {
            StackItem::Spell {
                instance,
                controller,
                targets,
                ..
            } => {
                let card = state.instance(*instance).ok().map(|i| i.card_id.clone());
                let name = card
                    .as_ref()
                    .and_then(|c| state.def(c).ok())
                    .map(|d| d.name.clone());
                StackItemView {
                    controller: *controller,
                    object: *instance,
                    card_id: card,
                    name,
                    is_spell: true,
                    targets: targets.clone(),
                }
            }
            StackItem::Ability {
                source,
                controller,
                targets,
                ..
            } => {
                let card = state.instance(*source).ok().map(|i| i.card_id.clone());
                let name = card
                    .as_ref()
                    .and_then(|c| state.def(c).ok())
                    .map(|d| d.name.clone());
                StackItemView {
                    controller: *controller,
                    object: *source,
                    card_id: card,
                    name,
                    is_spell: false,
                    targets: targets.clone(),
                }
            }
        })
        .collect();

    let combat = CombatView {
        attackers: state.combat.attackers.clone(),
        blockers: state
            .combat
            .blockers
            .iter()
            .map(|(k, v)| (*k, v.to_vec()))
            .collect(),
        attackers_declared: state.combat.attackers_declared,
        blockers_declared: state.combat.blockers_declared,
    };

    let (pending_decision, opponent_deciding) = match &state.pending_decision {
        Some(d) if d.actor == viewer => (Some(DecisionView::from(d)), false),
        Some(_) => (None, true),
        None => (None, false),
    };

    VisibleState {
        viewer,
        turn_number: state.turn.turn_number,
        phase: state.turn.phase(),
        step: state.turn.step,
        active_player: state.turn.active_player,
        priority_holder: state.priority,
        life_totals,
        library_sizes,
        hand,
        opponent_hand_size: state.zones(opponent).map(|z| z.hand.len()).unwrap_or(0),
        graveyards,
        exile: state
            .exile
            .iter()
            .filter_map(|id| card_ref(state, *id))
            .collect(),
        battlefield,
        stack,
        mana_pool: state
            .player(viewer)
            .map(|p| p.mana_pool)
            .unwrap_or_default(),
        lands_played_this_turn: state
            .player(viewer)
            .map(|p| p.lands_played_this_turn)
            .unwrap_or(0),
        combat,
        pending_decision,
        opponent_deciding,
        game_over: state.outcome,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::{CardDb, DeckList, GameInitializer};

    fn setup() -> GameState {
        let db = CardDb::with_basics();
        let deck = DeckList::new("forests").add("Forest", 20);
        GameInitializer::new(&db)
            .init_game("Alice", &deck, "Bob", &deck, 11)
            .unwrap()
    }

    #[test]
    fn test_hand_hidden_from_opponent() {
        let state = setup();
        let p1 = PlayerId::new(0);
        let p2 = PlayerId::new(1);

        let view1 = project(&state, p1);
        assert_eq!(view1.hand.len(), 7);
        assert_eq!(view1.opponent_hand_size, 7);

        let view2 = project(&state, p2);
        assert_eq!(view2.viewer, p2);
        assert_eq!(view2.hand.len(), 7);
    }

    #[test]
    fn test_public_info_symmetric() {
        let state = setup();
        let view1 = project(&state, PlayerId::new(0));
        let view2 = project(&state, PlayerId::new(1));
        assert_eq!(view1.life_totals, view2.life_totals);
        assert_eq!(view1.library_sizes, view2.library_sizes);
        assert_eq!(view1.turn_number, view2.turn_number);
    }

    #[test]
    fn test_projection_serializes() {
        let state = setup();
        let view = project(&state, PlayerId::new(0));
        let json = serde_json::to_string(&view).unwrap();
        let back: VisibleState = serde_json::from_str(&json).unwrap();
        assert_eq!(back, view);
    }
}
