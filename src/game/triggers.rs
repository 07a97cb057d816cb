//! Trigger collection
//!
//! Event-driven: after each state-mutating substep the engine calls the
//! matching `on_*` collector, which evaluates every candidate triggered
//! ability's condition against the event and appends matches to the
//! pending-triggers list. Pending triggers are put on the stack when the
//! next priority window opens, ordered active-player-first and then by
//! creation order of the ability source. Ordering is engine-defined, never
//! player-chosen.

use crate::core::{
    Amount, CardId, ControllerScope, Effect, InstanceId, PlayerId, SpellTypeFilter,
    TriggerCondition, TriggerKind,
};
use crate::game::derived;
use crate::game::state::GameState;
use serde::{Deserialize, Serialize};

/// A matched trigger waiting for the next priority window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingTrigger {
    /// Ability source (a battlefield permanent, or a graveyard card for
    /// return-from-the-grave style triggers)
    pub source: InstanceId,
    pub controller: PlayerId,
    /// Effects with event-context amounts already materialized
    pub effects: Vec<Effect>,
    /// Collection order tiebreak
    pub seq: u32,
}

/// Context of the event a trigger condition is evaluated against
#[derive(Debug, Clone, Default)]
pub struct TriggerEvent {
    pub entered: Option<InstanceId>,
    pub caster: Option<PlayerId>,
    pub spell_card: Option<CardId>,
    pub source_controller: Option<PlayerId>,
    pub damage: i32,
    pub life_lost: i32,
}

fn condition_met(
    state: &GameState,
    cond: &TriggerCondition,
    trigger_controller: PlayerId,
    event: &TriggerEvent,
) -> bool {
    if cond.during_opponent_turn {
        match event.caster {
            Some(caster) if state.turn.active_player != caster => {}
            _ => return false,
        }
    }
    match cond.controller {
        Some(ControllerScope::You) => {
            let entered_controller = event
                .entered
                .and_then(|id| state.battlefield.get(&id))
                .map(|p| p.controller);
            if entered_controller != Some(trigger_controller) {
                return false;
            }
        }
        Some(ControllerScope::Opponents) => match event.source_controller {
            Some(source) if source != trigger_controller => {}
            _ => return false,
        },
        None => {}
    }
    if let Some(keyword) = cond.has_keyword {
        let has = event
            .entered
            .map(|id| derived::compute(state).has_keyword(id, keyword))
            .unwrap_or(false);
        if !has {
            return false;
        }
    }
    if let Some(subtype) = &cond.subtype {
        let has = event
            .entered
            .and_then(|id| state.def_of(id).ok())
            .map(|d| d.has_subtype(subtype))
            .unwrap_or(false);
        if !has {
            return false;
        }
    }
    if let Some(filter) = cond.spell_type {
        let matched = event
            .spell_card
            .as_ref()
            .and_then(|id| state.def(id).ok())
            .map(|def| match filter {
                SpellTypeFilter::Creature => def.is_creature(),
                SpellTypeFilter::InstantOrSorcery => def.is_instant() || def.is_sorcery(),
            })
            .unwrap_or(false);
        if !matched {
            return false;
        }
    }
    if let Some((subtype, min)) = &cond.control_subtype_count {
        if state.count_subtype(subtype, Some(trigger_controller), None) < *min as u32 {
            return false;
        }
    }
    true
}

/// Replace event-context amounts with literals so the queued effects are
/// self-contained by the time they reach the stack.
fn materialize_effects(state: &GameState, source: InstanceId, event: &TriggerEvent, effects: &[Effect]) -> Vec<Effect> {
    let counters_on_self = state
        .battlefield
        .get(&source)
        .map(|p| p.get_counters(crate::core::CounterKind::PlusOnePlusOne) as i32)
        .unwrap_or(0);

    let materialize_amount = |a: &Amount| -> Amount {
        match a {
            Amount::CountersOnSelf => Amount::Fixed(counters_on_self),
            Amount::TriggerDamage => Amount::Fixed(event.damage),
            Amount::TriggerLifeLost => Amount::Fixed(event.life_lost),
            other => other.clone(),
        }
    };

    effects
        .iter()
        .map(|eff| match eff {
            Effect::DrawCards { amount, target } => Effect::DrawCards {
                amount: materialize_amount(amount),
                target: *target,
            },
            Effect::GainLife { amount } => Effect::GainLife {
                amount: materialize_amount(amount),
            },
            Effect::LoseLife { amount, target } => Effect::LoseLife {
                amount: materialize_amount(amount),
                target: *target,
            },
            Effect::DealDamage { amount, target } => Effect::DealDamage {
                amount: materialize_amount(amount),
                target: *target,
            },
            Effect::PutCounters {
                counter,
                amount,
                target,
                condition,
            } => Effect::PutCounters {
                counter: *counter,
                amount: materialize_amount(amount),
                target: *target,
                condition: condition.clone(),
            },
            other => other.clone(),
        })
        .collect()
}

/// Queue every matching triggered ability of `kind` on `source` for the
/// given event.
fn collect_from_source(
    state: &mut GameState,
    source: InstanceId,
    kind: TriggerKind,
    event: &TriggerEvent,
) {
    let Some(perm) = state.battlefield.get(&source) else {
        return;
    };
    let controller = perm.controller;
    let Ok(def) = state.def_of(source) else {
        return;
    };

    let matched: Vec<Vec<Effect>> = def
        .rules
        .triggered_abilities
        .iter()
        .filter(|ability| ability.trigger == kind)
        .filter(|ability| condition_met(state, &ability.condition, controller, event))
        .map(|ability| ability.effects.clone())
        .collect();

    for effects in matched {
        let effects = materialize_effects(state, source, event, &effects);
        state
            .logger
            .debug(format!("Trigger {:?} queued from {}", kind, source));
        state.queue_trigger(source, controller, effects);
    }
}

/// ETB triggers on the entering permanent itself
pub fn on_etb(state: &mut GameState, entered: InstanceId) {
    let event = TriggerEvent {
        entered: Some(entered),
        ..TriggerEvent::default()
    };
    collect_from_source(state, entered, TriggerKind::Etb, &event);
}

/// CREATURE_ENTERS triggers on every other battlefield watcher
pub fn on_creature_enters(state: &mut GameState, entered: InstanceId) {
    if !state.is_creature(entered) {
        return;
    }
    let event = TriggerEvent {
        entered: Some(entered),
        ..TriggerEvent::default()
    };
    let watchers: Vec<InstanceId> = state.battlefield.keys().copied().collect();
    for watcher in watchers {
        collect_from_source(state, watcher, TriggerKind::CreatureEnters, &event);
    }
}

/// CAST_SPELL triggers; fires when the spell goes on the stack
pub fn on_cast_spell(state: &mut GameState, caster: PlayerId, spell_card: CardId) {
    let event = TriggerEvent {
        caster: Some(caster),
        spell_card: Some(spell_card),
        ..TriggerEvent::default()
    };
    let watchers: Vec<InstanceId> = state.battlefield.keys().copied().collect();
    for watcher in watchers {
        collect_from_source(state, watcher, TriggerKind::CastSpell, &event);
    }
}

/// ATTACKS / ATTACKS_OR_BLOCKS on each attacker, plus
/// EQUIPPED_CREATURE_ATTACKS on attached equipment, plus the
/// draw-on-attack goad rider.
pub fn on_attacks(state: &mut GameState, attackers: &[InstanceId]) {
    let event = TriggerEvent::default();
    let attachments = state.attachments_by_host();

    for &attacker in attackers {
        // Goad rider: "whenever that creature attacks, you draw a card"
        let rider = state.battlefield.get(&attacker).and_then(|perm| {
            match (perm.draw_on_attack_by, perm.draw_on_attack_until_turn) {
                (Some(player), Some(until)) if state.turn.turn_number <= until => Some(player),
                _ => None,
            }
        });
        if let Some(player) = rider {
            let _ = state.draw_cards(player, 1);
            state.log(format!("Player {} draws from a goad rider", player));
        }

        collect_from_source(state, attacker, TriggerKind::Attacks, &event);
        collect_from_source(state, attacker, TriggerKind::AttacksOrBlocks, &event);

        for equipment in attachments.get(&attacker).into_iter().flatten() {
            collect_from_source(state, *equipment, TriggerKind::EquippedCreatureAttacks, &event);
        }
    }
}

pub fn on_blocks(state: &mut GameState, blockers: &[InstanceId]) {
    let event = TriggerEvent::default();
    for &blocker in blockers {
        collect_from_source(state, blocker, TriggerKind::AttacksOrBlocks, &event);
    }
}

pub fn on_combat_damage_to_player(state: &mut GameState, source: InstanceId, _player: PlayerId) {
    let event = TriggerEvent::default();
    collect_from_source(state, source, TriggerKind::CombatDamageToPlayer, &event);
}

pub fn on_dealt_damage(state: &mut GameState, target: InstanceId, amount: i32) {
    let event = TriggerEvent {
        damage: amount,
        ..TriggerEvent::default()
    };
    collect_from_source(state, target, TriggerKind::DealtDamage, &event);
}

pub fn on_you_lose_life(state: &mut GameState, player: PlayerId, amount: i32) {
    let event = TriggerEvent {
        life_lost: amount,
        ..TriggerEvent::default()
    };
    let watchers: Vec<InstanceId> = state
        .battlefield
        .values()
        .filter(|p| p.controller == player)
        .map(|p| p.id())
        .collect();
    for watcher in watchers {
        collect_from_source(state, watcher, TriggerKind::YouLoseLife, &event);
    }
}

/// BECOMES_TARGET on each targeted opposing permanent
pub fn on_becomes_target(
    state: &mut GameState,
    targeted: &[InstanceId],
    source_controller: PlayerId,
) {
    let event = TriggerEvent {
        source_controller: Some(source_controller),
        ..TriggerEvent::default()
    };
    for &id in targeted {
        let opposing = state
            .battlefield
            .get(&id)
            .map(|p| p.controller != source_controller)
            .unwrap_or(false);
        if opposing {
            collect_from_source(state, id, TriggerKind::BecomesTarget, &event);
        }
    }
}

/// DIES triggers on the dying permanent plus the battlefield watchers.
/// Must be called while the permanent is still on the battlefield.
pub fn on_dies(state: &mut GameState, dying: InstanceId) {
    let event = TriggerEvent::default();
    collect_from_source(state, dying, TriggerKind::Dies, &event);

    let dying_controller = state.battlefield.get(&dying).map(|p| p.controller);
    let watchers: Vec<(InstanceId, PlayerId)> = state
        .battlefield
        .values()
        .filter(|p| p.id() != dying)
        .map(|p| (p.id(), p.controller))
        .collect();

    for (watcher, controller) in watchers {
        if Some(controller) == dying_controller {
            collect_from_source(state, watcher, TriggerKind::OtherFriendlyDies, &event);
        }
        if state.turn.active_player == controller {
            collect_from_source(state, watcher, TriggerKind::OtherDiesDuringYourTurn, &event);
        }
    }
}

/// Upkeep triggers for the active player's permanents
pub fn on_upkeep(state: &mut GameState, player: PlayerId) {
    let event = TriggerEvent::default();
    let watchers: Vec<InstanceId> = state
        .battlefield
        .values()
        .filter(|p| p.controller == player)
        .map(|p| p.id())
        .collect();
    for watcher in watchers {
        collect_from_source(state, watcher, TriggerKind::Upkeep, &event);
    }
}

/// End-step triggers for the active player's permanents
pub fn on_end_step(state: &mut GameState, player: PlayerId) {
    let event = TriggerEvent::default();
    let watchers: Vec<InstanceId> = state
        .battlefield
        .values()
        .filter(|p| p.controller == player)
        .map(|p| p.id())
        .collect();
    for watcher in watchers {
        collect_from_source(state, watcher, TriggerKind::EndStep, &event);
    }
}

/// Stable ordering for flushing to the stack: active player's triggers
/// first, then creation order of the ability source, then collection
/// order.
pub fn sort_for_stack(pending: &mut [PendingTrigger], active_player: PlayerId) {
    pending.sort_by_key(|t| (t.controller != active_player, t.source.as_u32(), t.seq));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Keyword as Kw, TriggeredAbility};

    #[test]
    fn test_sort_active_player_first() {
        let active = PlayerId::new(0);
        let other = PlayerId::new(1);
        let mut pending = vec![
            PendingTrigger {
                source: InstanceId::new(5),
                controller: other,
                effects: vec![],
                seq: 0,
            },
            PendingTrigger {
                source: InstanceId::new(9),
                controller: active,
                effects: vec![],
                seq: 1,
            },
            PendingTrigger {
                source: InstanceId::new(2),
                controller: active,
                effects: vec![],
                seq: 2,
            },
        ];
        sort_for_stack(&mut pending, active);
        assert_eq!(pending[0].source, InstanceId::new(2));
        assert_eq!(pending[1].source, InstanceId::new(9));
        assert_eq!(pending[2].source, InstanceId::new(5));
    }

    #[test]
    fn test_trigger_kinds_are_closed() {
        // Exhaustiveness guard: constructing an ability for each kind must
        // stay possible as the enum evolves.
        for kind in [
            TriggerKind::Etb,
            TriggerKind::Dies,
            TriggerKind::Attacks,
            TriggerKind::Upkeep,
            TriggerKind::EndStep,
        ] {
            let ability = TriggeredAbility::new(kind, vec![]);
            assert_eq!(ability.trigger, kind);
        }
        let _ = Kw::Flying;
    }
}
