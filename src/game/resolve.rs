//! Effect execution and stack resolution
//!
//! Resolves the top of the stack: sub-effects execute in declared order,
//! one at a time, with the trigger collector running after each mutation.
//! If a sub-effect needs a player choice, resolution suspends into a
//! `PendingDecision` carrying a continuation (the remaining effect list
//! index); the engine resumes it when RESOLVE_DECISION arrives.
//!
//! Targets are re-checked here: when every chosen target of an item has
//! become illegal, the item is countered by game rules - removed from the
//! stack with no effect, costs staying paid.

use crate::core::{
    Amount, ContinuousTarget, Duration, Effect, EffectCondition, InstanceId, Keyword, PlayerId,
    TokenKind,
};
use crate::game::actions::{TargetGroups, TargetRef};
use crate::game::decisions::{DecisionChoice, DecisionKind, PendingDecision, ResumeCtx};
use crate::game::derived;
use crate::game::phase::Step;
use crate::game::permanent::Permanent;
use crate::game::state::{GameState, StackItem};
use crate::game::triggers;
use crate::game::validate::{self, GroupSpec};
use crate::{EngineError, Result};

/// Outcome of driving a resolution forward
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Completed,
    /// A pending decision was produced; the engine waits for
    /// RESOLVE_DECISION before continuing
    Suspended,
}

/// Execution context for one stack item's effects
#[derive(Debug, Clone)]
struct EffectCtx {
    source: Option<InstanceId>,
    controller: PlayerId,
    x_value: u8,
    sacrificed_toughness: i32,
}

// ---- battlefield mutation primitives (trigger-aware) ----

/// Put a card instance onto the battlefield and collect ETB triggers
pub fn enter_battlefield(
    state: &mut GameState,
    instance: InstanceId,
    controller: PlayerId,
    tapped: bool,
) -> Result<()> {
    let inst = state.instance(instance)?.clone();
    let mut perm = Permanent::new(inst, controller);
    perm.tapped = tapped;
    state.battlefield.insert(instance, perm);
    triggers::on_etb(state, instance);
    triggers::on_creature_enters(state, instance);
    Ok(())
}

/// Shared leave-the-battlefield path for destroy and sacrifice: dies
/// triggers, exile-link returns, burial (tokens cease), undead-return.
fn leave_to_graveyard(state: &mut GameState, id: InstanceId) -> Result<()> {
    if !state.battlefield.contains_key(&id) {
        return Ok(());
    }
    triggers::on_dies(state, id);

    let undead_return = derived::compute(state).has_keyword(id, Keyword::UndeadReturn);
    let controller = state.perm(id)?.controller;

    // "Exile target creature until this creature leaves the battlefield"
    let returning: Vec<InstanceId> = state
        .exile_links
        .iter()
        .filter(|(_, source)| **source == id)
        .map(|(exiled, _)| *exiled)
        .collect();
    for exiled in returning {
        state.exile_links.remove(&exiled);
        if let Some(pos) = state.exile.iter().position(|e| *e == exiled) {
            state.exile.remove(pos);
            let owner = state.instance(exiled)?.owner;
            if state.instance(exiled)?.is_token {
                state.instances.remove(exiled);
            } else {
                enter_battlefield(state, exiled, owner, false)?;
            }
        }
    }

    state.battlefield.remove(&id);
    let fresh = state.put_in_graveyard(id)?;

    if undead_return {
        if let Some(fresh) = fresh {
            state.queue_trigger(
                fresh,
                controller,
                vec![Effect::ReturnFromGraveyardToBattlefieldTapped { target: None }],
            );
        }
    }
    Ok(())
}

/// Destroy a permanent (already past any indestructible check)
pub fn destroy_permanent(state: &mut GameState, id: InstanceId) -> Result<()> {
    state.log(format!("Permanent {} is destroyed", id));
    leave_to_graveyard(state, id)
}

/// Sacrifice ignores indestructible by rule
pub fn sacrifice_permanent(state: &mut GameState, id: InstanceId) -> Result<()> {
    state.log(format!("Permanent {} is sacrificed", id));
    leave_to_graveyard(state, id)
}

/// Move a permanent to exile, optionally linked to the exiling source
pub fn exile_permanent(
    state: &mut GameState,
    id: InstanceId,
    link_source: Option<InstanceId>,
) -> Result<()> {
    if !state.battlefield.contains_key(&id) {
        return Ok(());
    }
    state.battlefield.remove(&id);
    let inst = state.instance(id)?;
    if inst.is_token {
        state.instances.remove(id);
        return Ok(());
    }
    let fresh = state.reissue_instance(id)?;
    state.exile.push(fresh);
    if let Some(source) = link_source {
        state.exile_links.insert(fresh, source);
    }
    state.log(format!("Permanent {} is exiled", id));
    Ok(())
}

/// Damage to a player: life loss, per-turn ledger, lifelink, triggers
pub fn damage_player(
    state: &mut GameState,
    player: PlayerId,
    amount: i32,
    source: Option<InstanceId>,
) -> Result<()> {
    if amount <= 0 {
        return Ok(());
    }
    state.player_mut(player)?.lose_life(amount);
    *state.damage_dealt_to_players.entry(player).or_insert(0) += amount;

    if let Some(source) = source {
        if derived::compute(state).has_keyword(source, Keyword::Lifelink) {
            let healed = state.perm(source)?.controller;
            state.player_mut(healed)?.gain_life(amount);
        }
    }
    triggers::on_you_lose_life(state, player, amount);
    Ok(())
}

/// Damage to a creature: mark damage, lifelink, deathtouch, triggers.
/// Deathtouch destruction is applied by the next state-based-action pass
/// via the returned flag.
pub fn damage_permanent(
    state: &mut GameState,
    target: InstanceId,
    amount: i32,
    source: Option<InstanceId>,
) -> Result<bool> {
    if amount <= 0 || !state.battlefield.contains_key(&target) {
        return Ok(false);
    }
    state.perm_mut(target)?.damage_marked += amount;

    let mut deathtouched = false;
    if let Some(source) = source {
        let d = derived::compute(state);
        if d.has_keyword(source, Keyword::Lifelink) {
            let healed = state.perm(source)?.controller;
            state.player_mut(healed)?.gain_life(amount);
        }
        deathtouched = d.has_keyword(source, Keyword::Deathtouch);
    }
    triggers::on_dealt_damage(state, target, amount);
    Ok(deathtouched)
}

/// Counter a spell on the stack: remove it and move it to the graveyard
/// (or exile, for flashback casts). Costs stay paid.
pub fn counter_spell(state: &mut GameState, spell: InstanceId) -> Result<()> {
    let Some(pos) = state
        .stack
        .iter()
        .position(|item| item.spell_instance() == Some(spell))
    else {
        return Ok(());
    };
    let item = state.stack.remove(pos);
    state.log(format!("Spell {} is countered", spell));
    finalize_spell(state, &item)
}

// ---- stack resolution ----

/// Resolve the top item of the stack
pub fn resolve_top_of_stack(state: &mut GameState) -> Result<Resolution> {
    let item = state
        .stack
        .pop()
        .ok_or_else(|| EngineError::InvariantViolation("resolved an empty stack".into()))?;

    if !validate::targets_still_legal(state, &item) {
        state.log("Stack item countered: all targets illegal".to_string());
        if item.spell_instance().is_some() {
            finalize_spell(state, &item)?;
        }
        return Ok(Resolution::Completed);
    }

    match &item {
        StackItem::Ability { .. } => resolve_effects(state, item, 0),
        StackItem::Spell { instance, .. } => {
            let def = state.def_of(*instance)?.clone();
            if def.is_permanent_type() {
                resolve_permanent_spell(state, item, &def)
            } else {
                resolve_effects(state, item, 0)
            }
        }
    }
}

fn resolve_permanent_spell(
    state: &mut GameState,
    item: StackItem,
    def: &crate::core::CardDef,
) -> Result<Resolution> {
    let StackItem::Spell {
        instance,
        controller,
        targets,
        is_copy,
        ..
    } = &item
    else {
        return Err(EngineError::InvariantViolation("expected a spell".into()));
    };

    // Copies of permanent spells are out of the phase-1 pool; a copy that
    // somehow names a permanent type just ceases
    if *is_copy {
        state.instances.remove(*instance);
        return Ok(Resolution::Completed);
    }

    if def.is_aura() {
        // Attach to the declared target if still legal; auras whose target
        // is gone were already countered by the target re-check above
        let host = targets
            .first()
            .and_then(|g| g.first())
            .and_then(|r| r.instance_id());
        let Some(host) = host else {
            let _ = state.put_in_graveyard(*instance)?;
            return Ok(Resolution::Completed);
        };
        let controller = *controller;
        let instance = *instance;
        enter_battlefield(state, instance, controller, false)?;
        state.perm_mut(instance)?.attached_to = Some(host);
        state.log(format!("Aura {} enters attached to {}", instance, host));
        return Ok(Resolution::Completed);
    }

    let controller = *controller;
    let instance = *instance;
    enter_battlefield(state, instance, controller, false)?;
    state.log(format!("Permanent {} enters the battlefield", instance));
    Ok(Resolution::Completed)
}

/// Drive an item's effect list from `start` to completion or suspension
pub fn resolve_effects(state: &mut GameState, item: StackItem, start: usize) -> Result<Resolution> {
    let effects: Vec<Effect> = match &item {
        StackItem::Spell { instance, .. } => state.def_of(*instance)?.rules.effects.clone(),
        StackItem::Ability { effects, .. } => effects.clone(),
    };
    let specs = validate::target_group_specs(&effects);
    let ctx = EffectCtx {
        source: match &item {
            StackItem::Spell { instance, .. } => Some(*instance),
            StackItem::Ability { source, .. } => Some(*source),
        },
        controller: item.controller(),
        x_value: item.x_value(),
        sacrificed_toughness: item.sacrificed_toughness(),
    };

    for idx in start..effects.len() {
        let groups = groups_for_effect(state, &specs, item.targets(), idx, ctx.controller);
        let suspended = apply_effect(state, &ctx, &effects[idx], &groups)?;
        if let Some(mut decision) = suspended {
            decision.resume = Some(ResumeCtx {
                item,
                next_effect: idx + 1,
            });
            state.pending_decision = Some(decision);
            return Ok(Resolution::Suspended);
        }
    }

    if item.spell_instance().is_some() {
        finalize_spell(state, &item)?;
    }
    Ok(Resolution::Completed)
}

/// Where a resolved spell card ends up
pub fn finalize_spell(state: &mut GameState, item: &StackItem) -> Result<()> {
    let StackItem::Spell {
        instance,
        flashback,
        is_copy,
        ..
    } = item
    else {
        return Ok(());
    };
    if *is_copy {
        state.instances.remove(*instance);
        return Ok(());
    }
    if *flashback {
        let fresh = state.reissue_instance(*instance)?;
        state.exile.push(fresh);
    } else {
        let _ = state.put_in_graveyard(*instance)?;
    }
    Ok(())
}

/// The target groups feeding effect `idx`, filtered to refs that are
/// still individually legal at this point of the resolution. Targets that
/// stopped being legal mid-resolution (left the zone, gained hexproof)
/// are simply not affected.
fn groups_for_effect(
    state: &GameState,
    specs: &[GroupSpec],
    targets: &TargetGroups,
    effect_idx: usize,
    controller: PlayerId,
) -> Vec<Vec<TargetRef>> {
    let derived = derived::compute(state);
    specs
        .iter()
        .enumerate()
        .filter(|(_, gs)| gs.effect_index == effect_idx)
        .map(|(group_idx, gs)| {
            targets
                .get(group_idx)
                .cloned()
                .unwrap_or_default()
                .into_iter()
                .filter(|r| validate::check_ref(state, &derived, controller, &gs.spec, r).is_ok())
                .collect()
        })
        .collect()
}

fn first_target(groups: &[Vec<TargetRef>]) -> Option<TargetRef> {
    groups.first().and_then(|g| g.first()).copied()
}

fn amount_value(state: &GameState, ctx: &EffectCtx, amount: &Amount) -> i32 {
    match amount {
        Amount::Fixed(n) => *n,
        Amount::X => ctx.x_value as i32,
        Amount::CountSubtype {
            subtype,
            yours_only,
        } => state.count_subtype(
            subtype,
            if *yours_only { Some(ctx.controller) } else { None },
            None,
        ) as i32,
        Amount::CountersOnSelf => ctx
            .source
            .and_then(|id| state.battlefield.get(&id))
            .map(|p| p.get_counters(crate::core::CounterKind::PlusOnePlusOne) as i32)
            .unwrap_or(0),
        Amount::SacrificedToughness => ctx.sacrificed_toughness,
        Amount::DamageDealtToPlayer => 0, // resolved where the target is known
        Amount::TriggerDamage | Amount::TriggerLifeLost => 0, // materialized at collection
    }
}

fn one_shot_condition_met(
    state: &GameState,
    ctx: &EffectCtx,
    condition: &Option<EffectCondition>,
    target: Option<InstanceId>,
) -> bool {
    let Some(cond) = condition else { return true };
    match cond {
        EffectCondition::ControlEquipment => state.battlefield.values().any(|p| {
            p.controller == ctx.controller
                && state.def_of(p.id()).map(|d| d.is_equipment()).unwrap_or(false)
        }),
        EffectCondition::ControlSubtype(subtype) => state.controls_subtype(ctx.controller, subtype),
        EffectCondition::ControlAnotherSubtype(subtype) => {
            state.count_subtype(subtype, Some(ctx.controller), ctx.source) > 0
        }
        EffectCondition::TargetIsColor(color) => target
            .and_then(|id| state.def_of(id).ok())
            .map(|d| d.has_color(*color))
            .unwrap_or(false),
        EffectCondition::DuringYourTurn => state.turn.active_player == ctx.controller,
    }
}

fn expiry_for(state: &GameState, duration: Duration, controller: PlayerId) -> (u32, Option<Step>) {
    let turn = state.turn.turn_number;
    match duration {
        Duration::EndOfTurn => (turn, None),
        Duration::EndOfCombat => (turn, Some(Step::EndCombat)),
        // Two-player alternation: the controller's next turn
        Duration::UntilNextUntap => {
            if state.turn.active_player == controller {
                (turn + 2, Some(Step::Untap))
            } else {
                (turn + 1, Some(Step::Untap))
            }
        }
        Duration::Permanent => (u32::MAX, None),
    }
}

/// Install a continuous modifier as a temporary effect, bound to the
/// chosen targets where the effect declared a target spec
fn install_temp(
    state: &mut GameState,
    ctx: &EffectCtx,
    effect: Effect,
    duration: Duration,
    groups: &[Vec<TargetRef>],
) {
    let (expires_turn, expires_step) = expiry_for(state, duration, ctx.controller);

    let needs_binding = matches!(
        effect,
        Effect::ModifyPt {
            target: ContinuousTarget::Spec(_),
            ..
        } | Effect::ModifyPtForEach {
            target: ContinuousTarget::Spec(_),
            ..
        } | Effect::AddKeyword {
            target: ContinuousTarget::Spec(_),
            ..
        } | Effect::RemoveKeyword {
            target: ContinuousTarget::Spec(_),
            ..
        }
    );

    if !needs_binding {
        state.add_temporary_effect(effect, ctx.source, Some(ctx.controller), expires_turn, expires_step);
        return;
    }

    for r in groups.iter().flatten() {
        let Some(id) = r.instance_id() else { continue };
        let bound = rebind(&effect, id);
        state.add_temporary_effect(bound, ctx.source, Some(ctx.controller), expires_turn, expires_step);
    }
}

fn rebind(effect: &Effect, id: InstanceId) -> Effect {
    let target = ContinuousTarget::Bound(id.as_u32());
    match effect {
        Effect::ModifyPt {
            power,
            toughness,
            duration,
            ..
        } => Effect::ModifyPt {
            power: *power,
            toughness: *toughness,
            target,
            duration: *duration,
        },
        Effect::ModifyPtForEach {
            amount, duration, ..
        } => Effect::ModifyPtForEach {
            amount: amount.clone(),
            target,
            duration: *duration,
        },
        Effect::AddKeyword {
            keyword,
            duration,
            condition,
            ..
        } => Effect::AddKeyword {
            keyword: *keyword,
            target,
            duration: *duration,
            condition: condition.clone(),
        },
        Effect::RemoveKeyword { keyword, .. } => Effect::RemoveKeyword {
            keyword: *keyword,
            target,
        },
        other => other.clone(),
    }
}

/// Execute one effect. Returns a pending decision if the effect needs a
/// player choice before resolution can continue.
#[allow(clippy::too_many_lines)]
fn apply_effect(
    state: &mut GameState,
    ctx: &EffectCtx,
    effect: &Effect,
    groups: &[Vec<TargetRef>],
) -> Result<Option<PendingDecision>> {
    match effect {
        Effect::DealDamage { amount, target: _ } => {
            let n = amount_value(state, ctx, amount);
            for r in groups.iter().flatten() {
                match r {
                    TargetRef::Player { player_id } => {
                        damage_player(state, *player_id, n, battlefield_source(state, ctx))?;
                    }
                    TargetRef::Permanent { instance_id } => {
                        let deathtouched =
                            damage_permanent(state, *instance_id, n, battlefield_source(state, ctx))?;
                        if deathtouched {
                            crate::game::sba::apply_with_deathtouch(state, &[*instance_id])?;
                        }
                    }
                    _ => {}
                }
            }
            Ok(None)
        }

        Effect::DestroyPermanent { .. } => {
            let d = derived::compute(state);
            for r in groups.iter().flatten() {
                if let Some(id) = r.instance_id() {
                    if d.has_keyword(id, Keyword::Indestructible) {
                        continue;
                    }
                    destroy_permanent(state, id)?;
                }
            }
            Ok(None)
        }

        Effect::ExilePermanent {
            controller_gains_power_life,
            ..
        } => {
            for r in groups.iter().flatten() {
                let Some(id) = r.instance_id() else { continue };
                if *controller_gains_power_life {
                    let d = derived::compute(state);
                    if let (Some(perm), Some(power)) = (state.battlefield.get(&id), d.power(id)) {
                        let gainer = perm.controller;
                        state.player_mut(gainer)?.gain_life(power);
                    }
                }
                exile_permanent(state, id, None)?;
            }
            Ok(None)
        }

        Effect::ExileUntilSourceLeaves { .. } => {
            for r in groups.iter().flatten() {
                if let Some(id) = r.instance_id() {
                    exile_permanent(state, id, ctx.source)?;
                }
            }
            Ok(None)
        }

        Effect::ReturnToHand { .. } => {
            for r in groups.iter().flatten() {
                if let Some(id) = r.instance_id() {
                    if state.battlefield.remove(&id).is_some() {
                        state.put_in_hand(id)?;
                        state.log(format!("Permanent {} returned to hand", id));
                    }
                }
            }
            Ok(None)
        }

        Effect::ReturnFromGraveyardToHand { target } => {
            let chosen = if target.is_some() {
                first_target(groups).and_then(|r| r.instance_id())
            } else {
                ctx.source
            };
            if let Some(id) = chosen {
                let owner = state.instance(id)?.owner;
                if state.zones_mut(owner)?.graveyard.remove(id) {
                    state.zones_mut(owner)?.hand.add(id);
                    state.log(format!("Card {} returned from graveyard to hand", id));
                }
            }
            Ok(None)
        }

        Effect::ReturnFromGraveyardToBattlefieldTapped { target } => {
            let chosen = if target.is_some() {
                first_target(groups).and_then(|r| r.instance_id())
            } else {
                ctx.source
            };
            if let Some(id) = chosen {
                let owner = state.instance(id)?.owner;
                if state.zones_mut(owner)?.graveyard.remove(id) {
                    enter_battlefield(state, id, owner, true)?;
                    state.log(format!("Card {} returns to the battlefield tapped", id));
                }
            }
            Ok(None)
        }

        Effect::CounterSpell { unless_pay, .. } => {
            let Some(spell) = first_target(groups).and_then(|r| r.instance_id()) else {
                return Ok(None);
            };
            let still_there = state
                .stack
                .iter()
                .any(|item| item.spell_instance() == Some(spell));
            if !still_there {
                return Ok(None);
            }
            if let Some(cost) = unless_pay {
                let payer = state
                    .stack
                    .iter()
                    .find(|item| item.spell_instance() == Some(spell))
                    .map(|item| item.controller())
                    .ok_or_else(|| EngineError::UnknownObject(format!("spell {}", spell)))?;
                let decision = PendingDecision::new(
                    payer,
                    format!("Pay {} or the spell is countered", cost),
                    DecisionKind::CounterUnlessPay {
                        spell,
                        cost: *cost,
                    },
                )
                .with_options(vec![
                    DecisionChoice::Pay { pay: true },
                    DecisionChoice::Pay { pay: false },
                ]);
                return Ok(Some(decision));
            }
            counter_spell(state, spell)?;
            Ok(None)
        }

        Effect::CopySpell { .. } => {
            let Some(spell) = first_target(groups).and_then(|r| r.instance_id()) else {
                return Ok(None);
            };
            let Some(original) = state
                .stack
                .iter()
                .find(|item| item.spell_instance() == Some(spell))
                .cloned()
            else {
                return Ok(None);
            };
            if let StackItem::Spell {
                instance,
                targets,
                x_value,
                ..
            } = original
            {
                let card_id = state.instance(instance)?.card_id.clone();
                let copy = state.alloc_instance(card_id, ctx.controller, true);
                // The copy keeps the original's targets and locked X
                state.stack.push(StackItem::Spell {
                    instance: copy,
                    controller: ctx.controller,
                    targets,
                    x_value,
                    flashback: false,
                    is_copy: true,
                    sacrificed_toughness: 0,
                });
                state.log(format!("Spell {} copied as {}", spell, copy));
            }
            Ok(None)
        }

        Effect::DrawCards { amount, target } => {
            let n = amount_value(state, ctx, amount).max(0) as u32;
            let player = if target.is_some() {
                first_target(groups).and_then(|r| r.player_id())
            } else {
                Some(ctx.controller)
            };
            if let Some(player) = player {
                state.draw_cards(player, n)?;
            }
            Ok(None)
        }

        Effect::DrawThenDiscard { draw, discard } => {
            let n = amount_value(state, ctx, draw).max(0) as u32;
            state.draw_cards(ctx.controller, n)?;
            forced_discard_decision(state, ctx.controller, *discard)
        }

        Effect::DiscardCards { amount, target } => {
            let player = if target.is_some() {
                first_target(groups).and_then(|r| r.player_id())
            } else {
                Some(ctx.controller)
            };
            match player {
                Some(player) => forced_discard_decision(state, player, *amount),
                None => Ok(None),
            }
        }

        Effect::DiscardHandThenDraw { draw } => {
            let hand: Vec<InstanceId> = state.zones(ctx.controller)?.hand.cards.clone();
            for id in hand {
                discard_card(state, ctx.controller, id)?;
            }
            let n = amount_value(state, ctx, draw).max(0) as u32;
            state.draw_cards(ctx.controller, n)?;
            Ok(None)
        }

        Effect::GainLife { amount } => {
            let n = amount_value(state, ctx, amount);
            state.player_mut(ctx.controller)?.gain_life(n);
            Ok(None)
        }

        Effect::LoseLife { amount, target } => {
            let n = amount_value(state, ctx, amount);
            let player = if target.is_some() {
                first_target(groups).and_then(|r| r.player_id())
            } else {
                Some(ctx.controller)
            };
            if let Some(player) = player {
                state.player_mut(player)?.lose_life(n);
                triggers::on_you_lose_life(state, player, n);
            }
            Ok(None)
        }

        Effect::AddMana { color, amount } => {
            state.player_mut(ctx.controller)?.mana_pool.add(*color, *amount);
            Ok(None)
        }

        Effect::AddManaAnyColor { amount } => {
            state.player_mut(ctx.controller)?.mana_pool.add_any(*amount);
            Ok(None)
        }

        Effect::AddManaForEach { color, count } => {
            let n = match count {
                crate::core::ManaCountSpec::ControlledSubtype(subtype) => {
                    state.count_subtype(subtype, Some(ctx.controller), None)
                }
                crate::core::ManaCountSpec::OpponentTappedLands => {
                    let opponent = state.other_player(ctx.controller);
                    state
                        .battlefield
                        .values()
                        .filter(|p| {
                            p.controller == opponent
                                && p.tapped
                                && state.def_of(p.id()).map(|d| d.is_land()).unwrap_or(false)
                        })
                        .count() as u32
                }
            };
            state
                .player_mut(ctx.controller)?
                .mana_pool
                .add(*color, n.min(u8::MAX as u32) as u8);
            Ok(None)
        }

        Effect::CreateToken {
            token,
            count,
            attach_source,
            condition,
        } => {
            if !one_shot_condition_met(state, ctx, condition, None) {
                return Ok(None);
            }
            let n = amount_value(state, ctx, count).max(0);
            let mut last = None;
            for _ in 0..n {
                let id = create_token(state, *token, ctx.controller)?;
                last = Some(id);
            }
            if *attach_source {
                if let (Some(source), Some(token_id)) = (ctx.source, last) {
                    if state.battlefield.contains_key(&source) {
                        state.perm_mut(source)?.attached_to = Some(token_id);
                    }
                }
            }
            Ok(None)
        }

        Effect::SearchBasicLandToBattlefieldTapped { exile_target } => {
            let searcher = if exile_target.is_some() {
                // "Exile target creature. Its controller may search..."
                let target = first_target(groups).and_then(|r| r.instance_id());
                match target {
                    Some(id) => {
                        let controller = state.perm(id).map(|p| p.controller).ok();
                        exile_permanent(state, id, None)?;
                        controller
                    }
                    None => None,
                }
            } else {
                Some(ctx.controller)
            };
            let Some(player) = searcher else { return Ok(None) };

            let options = basic_land_options(state, player, None);
            if options.len() <= 1 {
                return Ok(None); // nothing to find
            }
            Ok(Some(
                PendingDecision::new(
                    player,
                    "Search your library for a basic land to put onto the battlefield tapped",
                    DecisionKind::SearchBasicLand { player },
                )
                .with_options(options),
            ))
        }

        Effect::SearchBasicPlainsToHand => {
            let player = ctx.controller;
            let options = basic_land_options(state, player, Some("basic_plains"));
            if options.len() <= 1 {
                return Ok(None);
            }
            Ok(Some(
                PendingDecision::new(
                    player,
                    "Search your library for a basic Plains card",
                    DecisionKind::SearchBasicPlains { player },
                )
                .with_options(options),
            ))
        }

        Effect::LookAtTopPutOneInHand { count } => {
            let top = state.zones(ctx.controller)?.library.peek_top_n(*count as usize);
            if top.is_empty() {
                return Ok(None);
            }
            let options = top
                .iter()
                .map(|id| DecisionChoice::Card { instance_id: *id })
                .collect();
            Ok(Some(
                PendingDecision::new(
                    ctx.controller,
                    format!("Look at the top {} cards; put one into your hand", count),
                    DecisionKind::LookTopPutOneInHand { top },
                )
                .with_options(options),
            ))
        }

        Effect::LookAtTopPutLandOnBattlefieldTapped { count } => {
            let top = state.zones(ctx.controller)?.library.peek_top_n(*count as usize);
            if top.is_empty() {
                return Ok(None);
            }
            let mut options: Vec<DecisionChoice> = top
                .iter()
                .filter(|id| state.def_of(**id).map(|d| d.is_land()).unwrap_or(false))
                .map(|id| DecisionChoice::Card { instance_id: *id })
                .collect();
            options.push(DecisionChoice::Decline);
            Ok(Some(
                PendingDecision::new(
                    ctx.controller,
                    format!(
                        "Look at the top {} cards; you may put a land onto the battlefield tapped",
                        count
                    ),
                    DecisionKind::LookTopPutLand { top },
                )
                .with_options(options),
            ))
        }

        Effect::RevealTopPutSubtypeToHand { count, subtype } => {
            let top = state.zones(ctx.controller)?.library.peek_top_n(*count as usize);
            if top.is_empty() {
                return Ok(None);
            }
            for id in &top {
                state.zones_mut(ctx.controller)?.library.remove(*id);
            }
            let names: Vec<String> = top.iter().map(|id| id.to_string()).collect();
            state.log(format!("Player {} reveals: {}", ctx.controller, names.join(", ")));
            for id in top {
                let matches = state
                    .def_of(id)
                    .map(|d| d.has_subtype(subtype))
                    .unwrap_or(false);
                if matches {
                    state.zones_mut(ctx.controller)?.hand.add(id);
                } else {
                    state.zones_mut(ctx.controller)?.library.add_to_bottom(id);
                }
            }
            Ok(None)
        }

        Effect::FactOrFiction { count } => {
            let top = state.zones(ctx.controller)?.library.peek_top_n(*count as usize);
            if top.is_empty() {
                return Ok(None);
            }
            let splitter = state.other_player(ctx.controller);
            Ok(Some(PendingDecision::new(
                splitter,
                "Separate the revealed cards into two piles",
                DecisionKind::FactOrFictionSplit { top },
            )))
        }

        Effect::Scry { count, then_draw } => {
            let top = state.zones(ctx.controller)?.library.peek_top_n(*count as usize);
            if top.is_empty() {
                if *then_draw > 0 {
                    state.draw_cards(ctx.controller, *then_draw as u32)?;
                }
                return Ok(None);
            }
            Ok(Some(PendingDecision::new(
                ctx.controller,
                format!("Scry {}", count),
                DecisionKind::Scry {
                    top,
                    then_draw: *then_draw,
                },
            )))
        }

        Effect::GrantExtraTurn => {
            state.extra_turns.push(ctx.controller);
            state.log(format!("Player {} will take an extra turn", ctx.controller));
            Ok(None)
        }

        Effect::Goad {
            draw_on_attack, ..
        } => {
            let until = if state.turn.active_player == ctx.controller {
                state.turn.turn_number + 1
            } else {
                state.turn.turn_number
            };
            for r in groups.iter().flatten() {
                let Some(id) = r.instance_id() else { continue };
                if let Ok(perm) = state.perm_mut(id) {
                    perm.goaded_by = Some(ctx.controller);
                    perm.goaded_until_turn = Some(until);
                    if *draw_on_attack {
                        perm.draw_on_attack_by = Some(ctx.controller);
                        perm.draw_on_attack_until_turn = Some(until);
                    }
                }
            }
            Ok(None)
        }

        Effect::PutCounters {
            counter,
            amount,
            target,
            condition,
        } => {
            let n = amount_value(state, ctx, amount).max(0) as u32;
            let chosen: Vec<InstanceId> = if target.is_some() {
                groups
                    .iter()
                    .flatten()
                    .filter_map(|r| r.instance_id())
                    .collect()
            } else {
                ctx.source.into_iter().collect()
            };
            for id in chosen {
                if !one_shot_condition_met(state, ctx, condition, Some(id)) {
                    continue;
                }
                if let Ok(perm) = state.perm_mut(id) {
                    perm.add_counters(*counter, n);
                }
            }
            Ok(None)
        }

        Effect::EachPlayerSacrificesCreature => {
            // Active player first, then the other (APNAP order)
            let active = state.turn.active_player;
            let order = [active, state.other_player(active)];
            let mut requests: Vec<(PlayerId, Vec<DecisionChoice>)> = Vec::new();
            for player in order {
                let creatures: Vec<DecisionChoice> = state
                    .battlefield
                    .values()
                    .filter(|p| p.controller == player && state.is_creature(p.id()))
                    .map(|p| DecisionChoice::Card { instance_id: p.id() })
                    .collect();
                if !creatures.is_empty() {
                    requests.push((player, creatures));
                }
            }
            let Some((first_player, first_options)) = requests.first().cloned() else {
                return Ok(None);
            };
            let queue = requests.split_off(1);
            Ok(Some(
                PendingDecision::new(
                    first_player,
                    "Sacrifice a creature",
                    DecisionKind::EachPlayerSacrifice { queue },
                )
                .with_options(first_options),
            ))
        }

        Effect::EachPlayerDraws { amount } => {
            let active = state.turn.active_player;
            let other = state.other_player(active);
            state.draw_cards(active, *amount as u32)?;
            state.draw_cards(other, *amount as u32)?;
            Ok(None)
        }

        Effect::CreatureDealsDamageToCreature { trample_excess, .. } => {
            // groups[0] = your creature, groups[1] = the victim
            let source = groups
                .first()
                .and_then(|g| g.first())
                .and_then(|r| r.instance_id());
            let victim = groups
                .get(1)
                .and_then(|g| g.first())
                .and_then(|r| r.instance_id());
            let (Some(source), Some(victim)) = (source, victim) else {
                return Ok(None);
            };
            let d = derived::compute(state);
            let Some(power) = d.power(source) else {
                return Ok(None);
            };
            let victim_toughness = d.toughness(victim).unwrap_or(0)
                - state.perm(victim).map(|p| p.damage_marked).unwrap_or(0);

            if *trample_excess && d.has_keyword(source, Keyword::Trample) {
                let assigned = power.min(victim_toughness.max(0));
                let excess = power - assigned;
                let deathtouched = damage_permanent(state, victim, assigned, Some(source))?;
                if excess > 0 {
                    let victim_controller = state.perm(victim)?.controller;
                    damage_player(state, victim_controller, excess, Some(source))?;
                }
                if deathtouched {
                    crate::game::sba::apply_with_deathtouch(state, &[victim])?;
                }
            } else {
                let deathtouched = damage_permanent(state, victim, power, Some(source))?;
                if deathtouched {
                    crate::game::sba::apply_with_deathtouch(state, &[victim])?;
                }
            }
            Ok(None)
        }

        Effect::DiscardHandDrawEqualDamage { .. } => {
            let Some(player) = first_target(groups).and_then(|r| r.player_id()) else {
                return Ok(None);
            };
            let damage = state
                .damage_dealt_to_players
                .get(&player)
                .copied()
                .unwrap_or(0);
            Ok(Some(
                PendingDecision::new(
                    ctx.controller,
                    format!(
                        "Discard your hand and draw {} card(s)?",
                        damage.max(0)
                    ),
                    DecisionKind::DiscardHandDrawDamage {
                        player: ctx.controller,
                        damage,
                    },
                )
                .with_options(vec![
                    DecisionChoice::Pay { pay: true },
                    DecisionChoice::Pay { pay: false },
                ]),
            ))
        }

        Effect::AttachEquipment { .. } => {
            let Some(host) = first_target(groups).and_then(|r| r.instance_id()) else {
                return Ok(None);
            };
            let Some(equipment) = ctx.source else {
                return Ok(None);
            };
            if state.battlefield.contains_key(&equipment) && state.battlefield.contains_key(&host) {
                state.perm_mut(equipment)?.attached_to = Some(host);
                state.log(format!("Equipment {} attached to {}", equipment, host));
            }
            Ok(None)
        }

        Effect::AttachAllYouControlToSource => {
            let Some(host) = ctx.source else { return Ok(None) };
            let movable: Vec<InstanceId> = state
                .battlefield
                .values()
                .filter(|p| {
                    p.controller == ctx.controller
                        && p.id() != host
                        && state
                            .def_of(p.id())
                            .map(|d| d.is_equipment() || d.is_aura())
                            .unwrap_or(false)
                })
                .map(|p| p.id())
                .collect();
            for id in movable {
                state.perm_mut(id)?.attached_to = Some(host);
            }
            Ok(None)
        }

        // Continuous modifiers cast as spell effects become temporary
        // effects with their declared duration
        Effect::ModifyPt { duration, .. }
        | Effect::ModifyPtForEach { duration, .. }
        | Effect::AddKeyword { duration, .. }
        | Effect::TeamBuff { duration, .. } => {
            install_temp(state, ctx, effect.clone(), *duration, groups);
            Ok(None)
        }

        Effect::RemoveKeyword { .. } => {
            install_temp(state, ctx, effect.clone(), Duration::EndOfTurn, groups);
            Ok(None)
        }

        Effect::AttackTax { .. } => {
            install_temp(state, ctx, effect.clone(), Duration::UntilNextUntap, groups);
            Ok(None)
        }

        // Pure statics only make sense on permanents; a spell carrying one
        // is a card-database bug, not an engine state
        Effect::SetBasePt { .. }
        | Effect::AddSubtype { .. }
        | Effect::CantAttackController { .. }
        | Effect::RequireAttack { .. }
        | Effect::RequireBlockAll
        | Effect::PreventCombatDamage { .. }
        | Effect::AssignDamageAsUnblocked
        | Effect::CostReduction { .. }
        | Effect::Lord { .. }
        | Effect::BuffPerAttachment { .. }
        | Effect::WhileEquipped { .. } => {
            state
                .logger
                .debug("Static-only effect ignored in one-shot resolution".to_string());
            Ok(None)
        }
    }
}

fn battlefield_source(state: &GameState, ctx: &EffectCtx) -> Option<InstanceId> {
    ctx.source.filter(|id| state.battlefield.contains_key(id))
}

/// Create one token on the battlefield
pub fn create_token(state: &mut GameState, kind: TokenKind, controller: PlayerId) -> Result<InstanceId> {
    let id = state.alloc_instance(kind.card_id(), controller, true);
    enter_battlefield(state, id, controller, false)?;
    state.log(format!("Token {} created for player {}", id, controller));
    Ok(id)
}

/// Discard one card from hand to the graveyard
pub fn discard_card(state: &mut GameState, player: PlayerId, card: InstanceId) -> Result<()> {
    if state.zones_mut(player)?.hand.remove(card) {
        if state.instance(card)?.is_token {
            state.instances.remove(card);
        } else {
            state.zones_mut(player)?.graveyard.add(card);
        }
    }
    Ok(())
}

fn forced_discard_decision(
    state: &GameState,
    player: PlayerId,
    count: u8,
) -> Result<Option<PendingDecision>> {
    let hand = &state.zones(player)?.hand;
    let count = (count as usize).min(hand.len()) as u8;
    if count == 0 {
        return Ok(None);
    }
    let mut decision = PendingDecision::new(
        player,
        format!("Discard {} card(s)", count),
        DecisionKind::ForcedDiscard { player, count },
    );
    decision.min = count;
    decision.max = count;
    Ok(Some(decision))
}

fn basic_land_options(
    state: &GameState,
    player: PlayerId,
    only_card: Option<&str>,
) -> Vec<DecisionChoice> {
    let Ok(zones) = state.zones(player) else {
        return vec![DecisionChoice::Decline];
    };
    let mut options: Vec<DecisionChoice> = zones
        .library
        .cards
        .iter()
        .filter(|id| {
            let Ok(inst) = state.instance(**id) else {
                return false;
            };
            match only_card {
                Some(card) => inst.card_id.as_str() == card,
                None => inst.card_id.as_str().starts_with("basic_"),
            }
        })
        .map(|id| DecisionChoice::Card { instance_id: *id })
        .collect();
    options.dedup();
    options.push(DecisionChoice::Decline);
    options
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{CardDef, CardType, CreatureStats};
    use crate::loader::CardDb;

    fn creature_db() -> CardDb {
        let mut db = CardDb::with_basics();
        let mut def = CardDef::new("bear", "Bear");
        def.types.insert(CardType::Creature);
        def.creature_stats = Some(CreatureStats {
            base_power: 2,
            base_toughness: 2,
        });
        db.insert(def).unwrap();
        db
    }

    fn setup() -> GameState {
        GameState::new_two_player(creature_db(), "A", "B", 20, 3)
    }

    #[test]
    fn test_enter_battlefield_sick() {
        let mut state = setup();
        let p1 = PlayerId::new(0);
        let id = state.alloc_instance("bear", p1, false);
        enter_battlefield(&mut state, id, p1, false).unwrap();
        assert!(state.perm(id).unwrap().summoning_sick);
    }

    #[test]
    fn test_destroy_reissues_to_graveyard() {
        let mut state = setup();
        let p1 = PlayerId::new(0);
        let id = state.alloc_instance("bear", p1, false);
        enter_battlefield(&mut state, id, p1, false).unwrap();

        destroy_permanent(&mut state, id).unwrap();
        assert!(!state.battlefield.contains_key(&id));
        assert!(state.instance(id).is_err());
        assert_eq!(state.zones(p1).unwrap().graveyard.len(), 1);
    }

    #[test]
    fn test_damage_player_ledger_and_life() {
        let mut state = setup();
        let p2 = PlayerId::new(1);
        damage_player(&mut state, p2, 3, None).unwrap();
        assert_eq!(state.player(p2).unwrap().life, 17);
        assert_eq!(state.damage_dealt_to_players[&p2], 3);
    }

    #[test]
    fn test_token_creation_and_cease() {
        let mut state = setup();
        let p1 = PlayerId::new(0);
        let id = create_token(&mut state, TokenKind::Zombie, p1).unwrap();
        assert!(state.battlefield.contains_key(&id));

        destroy_permanent(&mut state, id).unwrap();
        assert!(state.instance(id).is_err());
        assert!(state.zones(p1).unwrap().graveyard.is_empty());
    }

    #[test]
    fn test_copy_spell_marks_copy() {
        let mut state = setup();
        let p1 = PlayerId::new(0);
        let p2 = PlayerId::new(1);
        let mut bolt = CardDef::new("bolt", "Bolt");
        bolt.types.insert(CardType::Instant);
        bolt.rules.effects.push(Effect::DealDamage {
            amount: Amount::fixed(3),
            target: crate::core::TargetSpec::any_target(),
        });
        let mut db = creature_db();
        db.insert(bolt).unwrap();
        state.card_db = db;

        let spell = state.alloc_instance("bolt", p1, false);
        state.stack.push(StackItem::Spell {
            instance: spell,
            controller: p1,
            targets: vec![vec![TargetRef::Player { player_id: p2 }]],
            x_value: 0,
            flashback: false,
            is_copy: false,
            sacrificed_toughness: 0,
        });

        let ctx = EffectCtx {
            source: None,
            controller: p2,
            x_value: 0,
            sacrificed_toughness: 0,
        };
        let spec = crate::core::TargetSpec::spell();
        let effect = Effect::CopySpell { target: spec };
        let groups = vec![vec![TargetRef::Spell { instance_id: spell }]];
        apply_effect(&mut state, &ctx, &effect, &groups).unwrap();

        assert_eq!(state.stack.len(), 2);
        match &state.stack[1] {
            StackItem::Spell {
                is_copy, targets, ..
            } => {
                assert!(*is_copy);
                assert_eq!(targets.len(), 1);
            }
            _ => panic!("expected a spell copy"),
        }
    }
}
