//! Derived battlefield pass
//!
//! Computes the effective view of every permanent after applying all
//! continuous modifiers. A single pass, not a layer system: base
//! attributes first, then static abilities (bucketed: subtype adds,
//! keyword add/remove, P/T, combat flags), then temporary effects in
//! creation order, then finalization. When two modifiers conflict within
//! the pass, the latest writer wins (creation-order tiebreak).
//!
//! The output is a pure function of (battlefield, temporary effects,
//! attachments): recomputing on identical inputs yields identical views.

use crate::core::{
    Amount, ContinuousTarget, ControllerScope, Effect, EffectCondition, InstanceId, Keyword,
    KeywordSet, PlayerId, Selector, Subtype, TargetSpec, TargetZone,
};
use crate::game::state::GameState;
use std::collections::{BTreeMap, BTreeSet};

/// Effective view of one permanent
#[derive(Debug, Clone)]
pub struct DerivedPermanent {
    pub controller: PlayerId,
    base_power: Option<i32>,
    base_toughness: Option<i32>,
    base_override: Option<(i32, i32)>,
    counter_mod: i32,
    pt_mod: (i32, i32),
    /// Final values, filled in by `finalize`
    pub power: Option<i32>,
    pub toughness: Option<i32>,
    pub keywords: KeywordSet,
    pub subtypes: BTreeSet<Subtype>,
    pub cant_attack: BTreeSet<PlayerId>,
    pub must_attack: bool,
    pub must_be_blocked_by_all: bool,
    pub prevent_combat_damage: bool,
    pub assign_damage_as_unblocked: bool,
    pub goaded_by: Option<PlayerId>,
}

impl DerivedPermanent {
    pub fn is_creature(&self) -> bool {
        self.base_power.is_some()
    }
}

/// Read-only derived view keyed by instance id
#[derive(Debug, Clone, Default)]
pub struct DerivedBattlefield {
    map: BTreeMap<InstanceId, DerivedPermanent>,
}

impl DerivedBattlefield {
    pub fn get(&self, id: InstanceId) -> Option<&DerivedPermanent> {
        self.map.get(&id)
    }

    pub fn has_keyword(&self, id: InstanceId, keyword: Keyword) -> bool {
        self.map
            .get(&id)
            .map(|d| d.keywords.contains(&keyword))
            .unwrap_or(false)
    }

    pub fn power(&self, id: InstanceId) -> Option<i32> {
        self.map.get(&id).and_then(|d| d.power)
    }

    pub fn toughness(&self, id: InstanceId) -> Option<i32> {
        self.map.get(&id).and_then(|d| d.toughness)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&InstanceId, &DerivedPermanent)> {
        self.map.iter()
    }
}

/// Recompute the derived battlefield from scratch
pub fn compute(state: &GameState) -> DerivedBattlefield {
    let mut derived = DerivedBattlefield::default();
    let attachments = state.attachments_by_host();

    // 1. Base snapshot (card definition + counters)
    for perm in state.battlefield.values() {
        let Ok(def) = state.def_of(perm.id()) else {
            continue;
        };
        let (base_power, base_toughness) = match def.creature_stats {
            Some(stats) => (Some(stats.base_power), Some(stats.base_toughness)),
            None => (None, None),
        };
        derived.map.insert(
            perm.id(),
            DerivedPermanent {
                controller: perm.controller,
                base_power,
                base_toughness,
                base_override: None,
                counter_mod: perm.counter_delta(),
                pt_mod: (0, 0),
                power: None,
                toughness: None,
                keywords: def.rules.keywords.clone(),
                subtypes: def.subtypes.clone(),
                cant_attack: BTreeSet::new(),
                must_attack: false,
                must_be_blocked_by_all: false,
                prevent_combat_damage: false,
                assign_damage_as_unblocked: false,
                goaded_by: None,
            },
        );
    }

    // 2. Static abilities, bucketed so subtype adds land before anything
    //    that filters on subtype, keywords before P/T
    let mut static_applications: Vec<(InstanceId, PlayerId, Effect)> = Vec::new();
    for perm in state.battlefield.values() {
        let Ok(def) = state.def_of(perm.id()) else {
            continue;
        };
        for sa in &def.rules.static_abilities {
            for eff in &sa.effects {
                static_applications.push((perm.id(), perm.controller, eff.clone()));
            }
        }
    }

    for bucket in [
        StaticBucket::SubtypeAdd,
        StaticBucket::Keywords,
        StaticBucket::PowerToughness,
        StaticBucket::Flags,
    ] {
        for (source, controller, eff) in &static_applications {
            if bucket_of(eff) == Some(bucket) {
                apply_continuous(state, &mut derived, &attachments, eff, Some(*source), Some(*controller));
            }
        }
    }

    // 3. Temporary effects in creation order
    let mut temps: Vec<_> = state
        .temporary_effects
        .iter()
        .filter(|t| t.is_active(&state.turn))
        .collect();
    temps.sort_by_key(|t| t.created_seq);
    for temp in temps {
        apply_continuous(
            state,
            &mut derived,
            &attachments,
            &temp.effect,
            temp.source,
            temp.controller,
        );
    }

    // 4. Goad recorded on permanent state
    for perm in state.battlefield.values() {
        if perm.is_goaded(state.turn.turn_number) {
            if let Some(d) = derived.map.get_mut(&perm.id()) {
                d.goaded_by = perm.goaded_by;
                d.must_attack = true;
            }
        }
    }

    // 5. Finalize P/T
    for d in derived.map.values_mut() {
        if d.base_power.is_none() || d.base_toughness.is_none() {
            continue;
        }
        let (bp, bt) = d
            .base_override
            .unwrap_or((d.base_power.unwrap(), d.base_toughness.unwrap()));
        d.power = Some(bp + d.counter_mod + d.pt_mod.0);
        d.toughness = Some(bt + d.counter_mod + d.pt_mod.1);
    }

    derived
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StaticBucket {
    SubtypeAdd,
    Keywords,
    PowerToughness,
    Flags,
}

fn bucket_of(eff: &Effect) -> Option<StaticBucket> {
    match eff {
        Effect::AddSubtype { .. } => Some(StaticBucket::SubtypeAdd),
        Effect::AddKeyword { .. } | Effect::RemoveKeyword { .. } => Some(StaticBucket::Keywords),
        Effect::ModifyPt { .. }
        | Effect::ModifyPtForEach { .. }
        | Effect::SetBasePt { .. }
        | Effect::Lord { .. }
        | Effect::BuffPerAttachment { .. }
        | Effect::WhileEquipped { .. } => Some(StaticBucket::PowerToughness),
        Effect::CantAttackController { .. }
        | Effect::RequireAttack { .. }
        | Effect::RequireBlockAll
        | Effect::PreventCombatDamage { .. }
        | Effect::AssignDamageAsUnblocked => Some(StaticBucket::Flags),
        // Cost reduction and attack tax are queried where costs are
        // computed, not in the derived view
        _ => None,
    }
}

fn condition_met(
    state: &GameState,
    derived: &DerivedBattlefield,
    condition: &Option<EffectCondition>,
    source: Option<InstanceId>,
    controller: Option<PlayerId>,
) -> bool {
    let Some(cond) = condition else {
        return true;
    };
    match cond {
        EffectCondition::DuringYourTurn => controller
            .map(|c| state.turn.active_player == c)
            .unwrap_or(false),
        EffectCondition::ControlSubtype(subtype) => controller
            .map(|c| {
                derived
                    .map
                    .values()
                    .any(|d| d.controller == c && d.subtypes.contains(subtype))
            })
            .unwrap_or(false),
        EffectCondition::ControlAnotherSubtype(subtype) => controller
            .map(|c| {
                derived
                    .map
                    .iter()
                    .any(|(id, d)| Some(*id) != source && d.controller == c && d.subtypes.contains(subtype))
            })
            .unwrap_or(false),
        EffectCondition::ControlEquipment => controller
            .map(|c| {
                state.battlefield.values().any(|p| {
                    p.controller == c
                        && state.def_of(p.id()).map(|d| d.is_equipment()).unwrap_or(false)
                })
            })
            .unwrap_or(false),
        // Color conditions only gate one-shot effects
        EffectCondition::TargetIsColor(_) => true,
    }
}

/// Resolve a continuous target against the derived set
fn resolve_targets(
    state: &GameState,
    derived: &DerivedBattlefield,
    target: &ContinuousTarget,
    source: Option<InstanceId>,
) -> Vec<InstanceId> {
    match target {
        ContinuousTarget::Source => source.into_iter().filter(|id| derived.map.contains_key(id)).collect(),
        ContinuousTarget::Attached => source
            .and_then(|id| state.battlefield.get(&id))
            .and_then(|perm| perm.attached_to)
            .into_iter()
            .filter(|id| derived.map.contains_key(id))
            .collect(),
        ContinuousTarget::Bound(raw) => {
            let id = InstanceId::new(*raw);
            if derived.map.contains_key(&id) {
                vec![id]
            } else {
                vec![]
            }
        }
        ContinuousTarget::Spec(spec) => {
            let source_controller = source
                .and_then(|id| state.battlefield.get(&id))
                .map(|p| p.controller);
            derived
                .map
                .iter()
                .filter(|(id, d)| matches_spec(d, spec, **id, source_controller))
                .map(|(id, _)| *id)
                .collect()
        }
    }
}

fn matches_spec(
    d: &DerivedPermanent,
    spec: &TargetSpec,
    _id: InstanceId,
    source_controller: Option<PlayerId>,
) -> bool {
    if spec.zone != TargetZone::Battlefield {
        return false;
    }
    match spec.selector {
        Selector::Creature | Selector::AnyTarget => d.is_creature(),
        Selector::FriendlyCreature => {
            d.is_creature() && source_controller == Some(d.controller)
        }
        Selector::OpponentCreature => {
            d.is_creature() && source_controller.is_some() && source_controller != Some(d.controller)
        }
        _ => false,
    }
}

fn eval_count_amount(state: &GameState, amount: &Amount, controller: Option<PlayerId>) -> i32 {
    match amount {
        Amount::Fixed(n) => *n,
        Amount::CountSubtype {
            subtype,
            yours_only,
        } => state.count_subtype(subtype, if *yours_only { controller } else { None }, None) as i32,
        _ => 0,
    }
}

fn apply_continuous(
    state: &GameState,
    derived: &mut DerivedBattlefield,
    attachments: &BTreeMap<InstanceId, Vec<InstanceId>>,
    eff: &Effect,
    source: Option<InstanceId>,
    controller: Option<PlayerId>,
) {
    if derived.map.is_empty() {
        return;
    }

    match eff {
        Effect::Lord {
            subtype,
            power,
            toughness,
            keywords,
            include_self,
        } => {
            let Some(controller) = controller else { return };
            let ids: Vec<InstanceId> = derived
                .map
                .iter()
                .filter(|(id, d)| {
                    if d.controller != controller || !d.is_creature() {
                        return false;
                    }
                    if let Some(st) = subtype {
                        if !d.subtypes.contains(st) {
                            return false;
                        }
                    }
                    if !include_self && Some(**id) == source {
                        return false;
                    }
                    true
                })
                .map(|(id, _)| *id)
                .collect();
            for id in ids {
                let d = derived.map.get_mut(&id).unwrap();
                d.pt_mod.0 += power;
                d.pt_mod.1 += toughness;
                for kw in keywords {
                    d.keywords.insert(*kw);
                }
            }
        }

        Effect::BuffPerAttachment { power, toughness } => {
            let Some(source) = source else { return };
            let Some(controller) = controller else { return };
            let ids: Vec<InstanceId> = derived
                .map
                .iter()
                .filter(|(id, d)| d.controller == controller && **id != source)
                .map(|(id, _)| *id)
                .collect();
            let count = attachments.get(&source).map(|a| a.len() as i32).unwrap_or(0);
            for id in ids {
                let d = derived.map.get_mut(&id).unwrap();
                d.pt_mod.0 += power * count;
                d.pt_mod.1 += toughness * count;
            }
        }

        Effect::TeamBuff {
            power,
            toughness,
            keywords,
            subtype,
            exclude_source,
            ..
        } => {
            let ids: Vec<InstanceId> = derived
                .map
                .iter()
                .filter(|(id, d)| {
                    if !d.is_creature() {
                        return false;
                    }
                    // A subtype-scoped buff ("all Zombies") hits every
                    // matching creature; otherwise only the controller's
                    if let Some(st) = subtype {
                        if !d.subtypes.contains(st) {
                            return false;
                        }
                    } else if Some(d.controller) != controller {
                        return false;
                    }
                    if *exclude_source && Some(**id) == source {
                        return false;
                    }
                    true
                })
                .map(|(id, _)| *id)
                .collect();
            for id in ids {
                let d = derived.map.get_mut(&id).unwrap();
                d.pt_mod.0 += power;
                d.pt_mod.1 += toughness;
                for kw in keywords {
                    d.keywords.insert(*kw);
                }
            }
        }

        Effect::WhileEquipped { effects } => {
            let Some(source) = source else { return };
            let equipped = attachments
                .get(&source)
                .map(|list| {
                    list.iter().any(|a| {
                        state.def_of(*a).map(|d| d.is_equipment()).unwrap_or(false)
                    })
                })
                .unwrap_or(false);
            if !equipped {
                return;
            }
            for inner in effects {
                apply_continuous(state, derived, attachments, inner, Some(source), controller);
            }
        }

        Effect::RequireAttack { scope } => {
            let Some(controller) = controller else { return };
            let applies_to_opponents = *scope == ControllerScope::Opponents;
            for d in derived.map.values_mut() {
                let is_opponent = d.controller != controller;
                if is_opponent == applies_to_opponents && d.is_creature() {
                    d.must_attack = true;
                }
            }
        }

        Effect::ModifyPt {
            power,
            toughness,
            target,
            ..
        } => {
            if !condition_met(state, derived, &None, source, controller) {
                return;
            }
            for id in resolve_targets(state, derived, target, source) {
                let d = derived.map.get_mut(&id).unwrap();
                d.pt_mod.0 += power;
                d.pt_mod.1 += toughness;
            }
        }

        Effect::ModifyPtForEach { amount, target, .. } => {
            let n = eval_count_amount(state, amount, controller);
            for id in resolve_targets(state, derived, target, source) {
                let d = derived.map.get_mut(&id).unwrap();
                d.pt_mod.0 += n;
                d.pt_mod.1 += n;
            }
        }

        Effect::SetBasePt {
            power,
            toughness,
            target,
        } => {
            for id in resolve_targets(state, derived, target, source) {
                derived.map.get_mut(&id).unwrap().base_override = Some((*power, *toughness));
            }
        }

        Effect::AddKeyword {
            keyword,
            target,
            condition,
            ..
        } => {
            if !condition_met(state, derived, condition, source, controller) {
                return;
            }
            for id in resolve_targets(state, derived, target, source) {
                derived.map.get_mut(&id).unwrap().keywords.insert(*keyword);
            }
        }

        Effect::RemoveKeyword { keyword, target } => {
            for id in resolve_targets(state, derived, target, source) {
                derived.map.get_mut(&id).unwrap().keywords.remove(keyword);
            }
        }

        Effect::AddSubtype { subtype, target } => {
            for id in resolve_targets(state, derived, target, source) {
                derived.map.get_mut(&id).unwrap().subtypes.insert(subtype.clone());
            }
        }

        Effect::CantAttackController { target } => {
            let Some(controller) = controller else { return };
            for id in resolve_targets(state, derived, target, source) {
                derived.map.get_mut(&id).unwrap().cant_attack.insert(controller);
            }
        }

        Effect::RequireBlockAll => {
            if let Some(source) = source {
                if let Some(d) = derived.map.get_mut(&source) {
                    d.must_be_blocked_by_all = true;
                }
            }
        }

        Effect::PreventCombatDamage { target } => {
            for id in resolve_targets(state, derived, target, source) {
                derived.map.get_mut(&id).unwrap().prevent_combat_damage = true;
            }
        }

        Effect::AssignDamageAsUnblocked => {
            if let Some(source) = source {
                if let Some(d) = derived.map.get_mut(&source) {
                    d.assign_damage_as_unblocked = true;
                }
            }
        }

        Effect::Goad { .. } | Effect::AttackTax { .. } | Effect::CostReduction { .. } => {
            // Goad is tracked on permanent state; attack tax and cost
            // reduction are read where costs are computed
        }

        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{CardDef, CardType, CreatureStats, Duration, StaticAbility};
    use crate::game::permanent::Permanent;
    use crate::loader::CardDb;
    use smallvec::smallvec;

    fn creature_def(id: &str, power: i32, toughness: i32) -> CardDef {
        let mut def = CardDef::new(id, id);
        def.types.insert(CardType::Creature);
        def.subtypes.insert(Subtype::new("Elf"));
        def.creature_stats = Some(CreatureStats {
            base_power: power,
            base_toughness: toughness,
        });
        def
    }

    fn state_with_creature() -> (GameState, InstanceId) {
        let mut db = CardDb::with_basics();
        db.insert(creature_def("elf_2_2", 2, 2)).unwrap();
        let mut state = GameState::new_two_player(db, "A", "B", 20, 1);
        let p1 = PlayerId::new(0);
        let id = state.alloc_instance("elf_2_2", p1, false);
        let inst = state.instance(id).unwrap().clone();
        state.battlefield.insert(id, Permanent::new(inst, p1));
        (state, id)
    }

    #[test]
    fn test_base_snapshot() {
        let (state, id) = state_with_creature();
        let derived = compute(&state);
        assert_eq!(derived.power(id), Some(2));
        assert_eq!(derived.toughness(id), Some(2));
        assert!(!derived.has_keyword(id, Keyword::Flying));
    }

    #[test]
    fn test_counters_shift_pt() {
        let (mut state, id) = state_with_creature();
        state
            .perm_mut(id)
            .unwrap()
            .add_counters(crate::core::CounterKind::PlusOnePlusOne, 2);
        let derived = compute(&state);
        assert_eq!(derived.power(id), Some(4));
        assert_eq!(derived.toughness(id), Some(4));
    }

    #[test]
    fn test_temp_pump_and_expiry() {
        let (mut state, id) = state_with_creature();
        state.add_temporary_effect(
            Effect::ModifyPt {
                power: 2,
                toughness: 2,
                target: ContinuousTarget::Bound(id.as_u32()),
                duration: Duration::EndOfTurn,
            },
            None,
            Some(PlayerId::new(0)),
            state.turn.turn_number,
            None,
        );
        let derived = compute(&state);
        assert_eq!(derived.power(id), Some(4));

        state.turn.next_turn(PlayerId::new(1));
        let derived = compute(&state);
        assert_eq!(derived.power(id), Some(2));
    }

    #[test]
    fn test_lord_excludes_self() {
        let mut db = CardDb::with_basics();
        db.insert(creature_def("elf_2_2", 2, 2)).unwrap();
        let mut lord = creature_def("elf_lord", 1, 1);
        lord.rules.static_abilities.push(StaticAbility {
            effects: vec![Effect::Lord {
                subtype: Some(Subtype::new("Elf")),
                power: 1,
                toughness: 1,
                keywords: smallvec![],
                include_self: false,
            }],
        });
        db.insert(lord).unwrap();

        let mut state = GameState::new_two_player(db, "A", "B", 20, 1);
        let p1 = PlayerId::new(0);
        let elf = state.alloc_instance("elf_2_2", p1, false);
        let inst = state.instance(elf).unwrap().clone();
        state.battlefield.insert(elf, Permanent::new(inst, p1));
        let lord = state.alloc_instance("elf_lord", p1, false);
        let inst = state.instance(lord).unwrap().clone();
        state.battlefield.insert(lord, Permanent::new(inst, p1));

        let derived = compute(&state);
        assert_eq!(derived.power(elf), Some(3));
        assert_eq!(derived.power(lord), Some(1));
    }

    #[test]
    fn test_latest_writer_wins_keywords() {
        let (mut state, id) = state_with_creature();
        state.add_temporary_effect(
            Effect::AddKeyword {
                keyword: Keyword::Flying,
                target: ContinuousTarget::Bound(id.as_u32()),
                duration: Duration::EndOfTurn,
                condition: None,
            },
            None,
            None,
            state.turn.turn_number,
            None,
        );
        state.add_temporary_effect(
            Effect::RemoveKeyword {
                keyword: Keyword::Flying,
                target: ContinuousTarget::Bound(id.as_u32()),
            },
            None,
            None,
            state.turn.turn_number,
            None,
        );
        let derived = compute(&state);
        assert!(!derived.has_keyword(id, Keyword::Flying));
    }

    #[test]
    fn test_pure_function_of_inputs() {
        let (state, id) = state_with_creature();
        let a = compute(&state);
        let b = compute(&state);
        assert_eq!(a.power(id), b.power(id));
        assert_eq!(
            a.get(id).unwrap().keywords,
            b.get(id).unwrap().keywords
        );
    }
}
