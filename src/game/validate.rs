//! Action validation: timing, costs, and targets
//!
//! Every check here is read-only; `submit_action` only mutates state after
//! the whole action validates. The same target-group matching is used at
//! cast time and again at resolution (see `resolve`), so hexproof gained
//! in response is caught both places.

use crate::core::{
    AbilityZone, CardDef, Color, Cost, Effect, InstanceId, Keyword, PlayerId, Selector, TargetSpec,
    TargetZone, TimingRestriction,
};
use crate::game::actions::{Action, BlockAssignment, CostPayment, TargetGroups, TargetRef};
use crate::game::derived::{self, DerivedBattlefield};
use crate::game::mana_payment;
use crate::game::phase::Step;
use crate::game::state::{GameState, StackItem};
use crate::{EngineError, Result};

/// One target group requirement: which effect it belongs to and its spec
#[derive(Debug, Clone, Copy)]
pub struct GroupSpec {
    pub effect_index: usize,
    pub spec: TargetSpec,
}

/// Flatten the target groups a list of effects requires, in declaration
/// order. Fight-style effects contribute two groups (source, then target).
pub fn target_group_specs(effects: &[Effect]) -> Vec<GroupSpec> {
    let mut out = Vec::new();
    for (i, eff) in effects.iter().enumerate() {
        if let Some(spec) = eff.primary_of_pair() {
            out.push(GroupSpec {
                effect_index: i,
                spec: *spec,
            });
        }
        if let Some(spec) = eff.target_spec() {
            out.push(GroupSpec {
                effect_index: i,
                spec: *spec,
            });
        }
        if let Some(spec) = eff.secondary_target_spec() {
            out.push(GroupSpec {
                effect_index: i,
                spec: *spec,
            });
        }
    }
    out
}

/// Top-level validation dispatcher. The engine has already rejected
/// submissions after game over and handled the pending-decision override.
pub fn validate(state: &GameState, action: &Action) -> Result<()> {
    let actor = action.actor();

    // Conceding is the one action either player may take at any time
    if !matches!(action, Action::Scoop { .. }) && state.priority != Some(actor) {
        return Err(EngineError::NotYourPriority(format!(
            "player {} does not hold priority",
            actor
        )));
    }

    match action {
        Action::PlayLand { actor, card } => validate_play_land(state, *actor, *card),
        Action::TapForMana { actor, permanent } => validate_tap_for_mana(state, *actor, *permanent),
        Action::CastSpell {
            actor,
            card,
            targets,
            x_value,
            flashback,
            alternate_cost,
            additional,
        } => validate_cast_spell(
            state,
            *actor,
            *card,
            targets,
            *x_value,
            *flashback,
            alternate_cost.as_deref(),
            additional,
        ),
        Action::ActivateAbility {
            actor,
            source,
            ability_index,
            targets,
            x_value: _,
            costs,
        } => validate_activate_ability(state, *actor, *source, *ability_index, targets, costs),
        Action::DeclareAttackers { actor, attackers } => {
            validate_declare_attackers(state, *actor, attackers)
        }
        Action::DeclareBlockers { actor, blocks } => validate_declare_blockers(state, *actor, blocks),
        Action::PassPriority { actor } => validate_pass_priority(state, *actor),
        Action::SkipCombat { actor } => validate_skip(state, *actor, Step::Main1),
        Action::SkipMain2 { actor } => validate_skip(state, *actor, Step::Main2),
        Action::Scoop { .. } => Ok(()),
        // Choice semantics are checked by the decision handler before any
        // mutation; reaching here means no decision is pending.
        Action::ResolveDecision { .. } => Err(EngineError::PendingDecisionPreempts(
            "no decision is pending".into(),
        )),
    }
}

fn validate_play_land(state: &GameState, actor: PlayerId, card: InstanceId) -> Result<()> {
    if state.turn.active_player != actor {
        return Err(EngineError::IllegalTiming(
            "lands can only be played on your own turn".into(),
        ));
    }
    if !state.turn.step.can_play_lands() {
        return Err(EngineError::IllegalTiming(
            "lands can only be played in a main phase".into(),
        ));
    }
    if !state.stack.is_empty() {
        return Err(EngineError::IllegalTiming(
            "lands can only be played with an empty stack".into(),
        ));
    }
    if !state.player(actor)?.can_play_land() {
        return Err(EngineError::IllegalTiming(
            "already played a land this turn".into(),
        ));
    }
    if !state.zones(actor)?.hand.contains(card) {
        return Err(EngineError::UnknownObject(format!("card {} not in hand", card)));
    }
    if !state.def_of(card)?.is_land() {
        return Err(EngineError::IllegalTiming(format!("card {} is not a land", card)));
    }
    Ok(())
}

fn validate_tap_for_mana(state: &GameState, actor: PlayerId, id: InstanceId) -> Result<()> {
    let perm = state.perm(id)?;
    if perm.controller != actor {
        return Err(EngineError::InvalidTarget(format!(
            "permanent {} is not controlled by player {}",
            id, actor
        )));
    }
    if perm.tapped {
        return Err(EngineError::CannotPayCost(format!("{} is already tapped", id)));
    }
    let def = state.def_of(id)?;
    if def.land_stats.is_none() {
        return Err(EngineError::CannotPayCost(format!(
            "{} does not produce mana when tapped",
            id
        )));
    }
    Ok(())
}

fn timing_allows_cast(state: &GameState, def: &CardDef, actor: PlayerId) -> bool {
    if def.rules.keywords.contains(&Keyword::Flash) || def.is_instant() {
        return true;
    }
    state.turn.active_player == actor
        && state.turn.step.is_sorcery_speed()
        && state.stack.is_empty()
}

#[allow(clippy::too_many_arguments)]
fn validate_cast_spell(
    state: &GameState,
    actor: PlayerId,
    card: InstanceId,
    targets: &TargetGroups,
    x_value: u8,
    flashback: bool,
    alternate_cost: Option<&str>,
    additional: &CostPayment,
) -> Result<()> {
    let zones = state.zones(actor)?;
    let in_zone = if flashback {
        zones.graveyard.contains(card)
    } else {
        zones.hand.contains(card)
    };
    if !in_zone {
        return Err(EngineError::UnknownObject(format!(
            "card {} not in the expected zone",
            card
        )));
    }

    let def = state.def_of(card)?;
    if def.is_land() {
        return Err(EngineError::IllegalTiming("lands are played, not cast".into()));
    }
    if !timing_allows_cast(state, def, actor) {
        return Err(EngineError::IllegalTiming(format!(
            "{} cannot be cast at this time",
            def.name
        )));
    }

    if let Some(alt_id) = alternate_cost {
        if x_value > 0 {
            return Err(EngineError::CannotPayCost(
                "alternative costs cannot pay X".into(),
            ));
        }
        validate_alternate_cost(state, def, actor, alt_id)?;
    } else if flashback {
        let fb = def.rules.flashback_cost.as_ref().ok_or_else(|| {
            EngineError::CannotPayCost(format!("{} has no flashback cost", def.name))
        })?;
        if !mana_payment::can_pay_spell_cost(state, def, actor, 0, Some(fb))? {
            return Err(EngineError::CannotPayCost(format!(
                "cannot pay flashback cost of {}",
                def.name
            )));
        }
    } else {
        if x_value > 0 && !def.mana_cost.has_x() {
            return Err(EngineError::CannotPayCost(format!(
                "{} has no X in its cost",
                def.name
            )));
        }
        if !mana_payment::can_pay_spell_cost(state, def, actor, x_value, None)? {
            return Err(EngineError::CannotPayCost(format!(
                "cannot pay mana cost of {}",
                def.name
            )));
        }
    }

    validate_cost_payment(state, actor, &def.rules.additional_costs, additional, Some(card))?;

    let specs = target_group_specs(&def.rules.effects);
    validate_target_groups(state, actor, &specs, targets)
}

fn validate_alternate_cost(
    state: &GameState,
    def: &CardDef,
    actor: PlayerId,
    alt_id: &str,
) -> Result<()> {
    let alt = def
        .rules
        .alternate_costs
        .iter()
        .find(|a| a.id() == alt_id)
        .ok_or_else(|| {
            EngineError::CannotPayCost(format!("{} has no alternative cost {}", def.name, alt_id))
        })?;
    match alt {
        crate::core::AlternateCost::ControlSubtypePayLife { subtype, life } => {
            if !state.controls_subtype(actor, subtype) {
                return Err(EngineError::CannotPayCost(format!(
                    "requires controlling a {}",
                    subtype
                )));
            }
            if state.player(actor)?.life < *life as i32 {
                return Err(EngineError::CannotPayCost(format!(
                    "cannot pay {} life",
                    life
                )));
            }
        }
    }
    Ok(())
}

/// Validate the payload choices for a list of declared costs
/// (additional spell costs or activated-ability costs).
pub fn validate_cost_payment(
    state: &GameState,
    actor: PlayerId,
    costs: &[Cost],
    payment: &CostPayment,
    casting_card: Option<InstanceId>,
) -> Result<()> {
    let mut needed_discards = 0usize;
    let mut needed_sacrifices = 0usize;
    let mut sacrifice_other_than: Option<InstanceId> = None;

    for cost in costs {
        match cost {
            Cost::Discard { count } => needed_discards += *count as usize,
            Cost::SacrificeCreatures { count, other_only } => {
                needed_sacrifices += *count as usize;
                if *other_only {
                    sacrifice_other_than = casting_card;
                }
            }
            Cost::PayLife { amount } => {
                if state.player(actor)?.life < *amount as i32 {
                    return Err(EngineError::CannotPayCost(format!(
                        "cannot pay {} life",
                        amount
                    )));
                }
            }
            Cost::Mana(mana) => {
                if !mana_payment::can_pay_mana(state, actor, mana)? {
                    return Err(EngineError::CannotPayCost("cannot pay mana cost".into()));
                }
            }
            Cost::Tap | Cost::SacrificeSelf => {}
        }
    }

    if payment.discard.len() != needed_discards {
        return Err(EngineError::CannotPayCost(format!(
            "cost requires discarding {} card(s)",
            needed_discards
        )));
    }
    let hand = &state.zones(actor)?.hand;
    for id in &payment.discard {
        if !hand.contains(*id) {
            return Err(EngineError::CannotPayCost(format!("card {} not in hand", id)));
        }
        if Some(*id) == casting_card {
            return Err(EngineError::CannotPayCost(
                "cannot discard the card being cast".into(),
            ));
        }
    }

    if payment.sacrifice.len() != needed_sacrifices {
        return Err(EngineError::CannotPayCost(format!(
            "cost requires sacrificing {} creature(s)",
            needed_sacrifices
        )));
    }
    for id in &payment.sacrifice {
        let perm = state
            .battlefield
            .get(id)
            .ok_or_else(|| EngineError::CannotPayCost(format!("permanent {} not found", id)))?;
        if perm.controller != actor {
            return Err(EngineError::CannotPayCost(format!(
                "cannot sacrifice {}: not its controller",
                id
            )));
        }
        if !state.is_creature(*id) {
            return Err(EngineError::CannotPayCost(format!("{} is not a creature", id)));
        }
        if Some(*id) == sacrifice_other_than {
            return Err(EngineError::CannotPayCost(
                "cost requires sacrificing another creature".into(),
            ));
        }
    }

    Ok(())
}

fn validate_activate_ability(
    state: &GameState,
    actor: PlayerId,
    source: InstanceId,
    ability_index: usize,
    targets: &TargetGroups,
    costs: &CostPayment,
) -> Result<()> {
    // The source is either a battlefield permanent or a card in the
    // actor's graveyard (for graveyard-zone abilities)
    let on_battlefield = state.battlefield.contains_key(&source);
    let in_graveyard = state.zones(actor)?.graveyard.contains(source);
    if !on_battlefield && !in_graveyard {
        return Err(EngineError::UnknownObject(format!("ability source {}", source)));
    }

    if on_battlefield && state.perm(source)?.controller != actor {
        return Err(EngineError::InvalidTarget(format!(
            "permanent {} is not controlled by player {}",
            source, actor
        )));
    }

    let def = state.def_of(source)?;
    let ability = def
        .rules
        .activated_abilities
        .get(ability_index)
        .ok_or_else(|| {
            EngineError::UnknownObject(format!(
                "{} has no ability #{}",
                def.name, ability_index
            ))
        })?;

    match ability.zone {
        AbilityZone::Battlefield if !on_battlefield => {
            return Err(EngineError::IllegalTiming(
                "ability can only be activated on the battlefield".into(),
            ))
        }
        AbilityZone::Graveyard if !in_graveyard => {
            return Err(EngineError::IllegalTiming(
                "ability can only be activated from the graveyard".into(),
            ))
        }
        _ => {}
    }

    match ability.timing {
        TimingRestriction::SorcerySpeed => {
            if state.turn.active_player != actor
                || !state.turn.step.is_sorcery_speed()
                || !state.stack.is_empty()
            {
                return Err(EngineError::IllegalTiming(
                    "ability is sorcery-speed only".into(),
                ));
            }
        }
        TimingRestriction::OnlyWhenAttacking => {
            if !state.combat.is_attacking(source) {
                return Err(EngineError::IllegalTiming(
                    "ability requires the creature to be attacking".into(),
                ));
            }
        }
        TimingRestriction::Anytime => {}
    }

    for cost in &ability.costs {
        if cost.includes_tap() && on_battlefield {
            let perm = state.perm(source)?;
            if perm.tapped {
                return Err(EngineError::CannotPayCost(format!("{} is already tapped", source)));
            }
            if def.is_creature()
                && perm.summoning_sick
                && !derived::compute(state).has_keyword(source, Keyword::Haste)
            {
                return Err(EngineError::CannotPayCost(
                    "summoning sickness prevents tap abilities".into(),
                ));
            }
        }
    }
    validate_cost_payment(state, actor, &ability.costs, costs, Some(source))?;

    let specs = target_group_specs(&ability.effects);
    validate_target_groups(state, actor, &specs, targets)
}

fn validate_declare_attackers(
    state: &GameState,
    actor: PlayerId,
    attackers: &[InstanceId],
) -> Result<()> {
    if state.turn.step != Step::DeclareAttackers {
        return Err(EngineError::IllegalTiming(
            "attackers can only be declared in the declare-attackers step".into(),
        ));
    }
    if state.turn.active_player != actor {
        return Err(EngineError::IllegalTiming(
            "only the active player declares attackers".into(),
        ));
    }
    if !state.stack.is_empty() {
        return Err(EngineError::IllegalTiming(
            "attackers cannot be declared with spells on the stack".into(),
        ));
    }
    if state.combat.attackers_declared {
        return Err(EngineError::IllegalTiming("attackers already declared".into()));
    }

    let derived = derived::compute(state);
    let defender = state.other_player(actor);

    let mut seen = std::collections::BTreeSet::new();
    for &id in attackers {
        if !seen.insert(id) {
            return Err(EngineError::InvalidTarget(format!("duplicate attacker {}", id)));
        }
        let perm = state
            .battlefield
            .get(&id)
            .ok_or_else(|| EngineError::UnknownObject(format!("attacker {}", id)))?;
        if perm.controller != actor {
            return Err(EngineError::InvalidTarget(format!(
                "attacker {} is not controlled by player {}",
                id, actor
            )));
        }
        creature_can_attack(state, &derived, id, defender)?;
    }

    // Creatures that must attack (goad, require-attack statics) have to be
    // in the declaration if they are able to attack at all
    for (&id, d) in derived.iter() {
        if d.controller != actor || !d.must_attack {
            continue;
        }
        if creature_can_attack(state, &derived, id, defender).is_ok() && !attackers.contains(&id) {
            return Err(EngineError::InvalidTarget(format!(
                "creature {} must attack this combat",
                id
            )));
        }
    }

    let tax = mana_payment::attack_tax_amount(state, defender);
    if tax > 0 {
        let total = tax * attackers.len() as u32;
        if (state.player(actor)?.mana_pool.total()) < total {
            return Err(EngineError::CannotPayCost(format!(
                "attacking requires paying {} mana",
                total
            )));
        }
    }

    Ok(())
}

/// Shared attacker eligibility check
pub fn creature_can_attack(
    state: &GameState,
    derived: &DerivedBattlefield,
    id: InstanceId,
    defender: PlayerId,
) -> Result<()> {
    let perm = state
        .battlefield
        .get(&id)
        .ok_or_else(|| EngineError::UnknownObject(format!("creature {}", id)))?;
    let d = derived
        .get(id)
        .ok_or_else(|| EngineError::UnknownObject(format!("creature {}", id)))?;
    if !d.is_creature() {
        return Err(EngineError::InvalidTarget(format!("{} is not a creature", id)));
    }
    if perm.tapped {
        return Err(EngineError::InvalidTarget(format!("{} is tapped", id)));
    }
    if perm.summoning_sick && !d.keywords.contains(&Keyword::Haste) {
        return Err(EngineError::InvalidTarget(format!(
            "{} has summoning sickness",
            id
        )));
    }
    if d.keywords.contains(&Keyword::Defender) {
        return Err(EngineError::InvalidTarget(format!("{} has defender", id)));
    }
    if d.cant_attack.contains(&defender) {
        return Err(EngineError::InvalidTarget(format!(
            "{} cannot attack that player",
            id
        )));
    }
    Ok(())
}

/// Shared blocker eligibility check (flying/reach)
pub fn creature_can_block(
    derived: &DerivedBattlefield,
    blocker: InstanceId,
    attacker: InstanceId,
) -> bool {
    let Some(d_blocker) = derived.get(blocker) else {
        return false;
    };
    let Some(d_attacker) = derived.get(attacker) else {
        return false;
    };
    if !d_blocker.is_creature() {
        return false;
    }
    if d_attacker.keywords.contains(&Keyword::Flying)
        && !d_blocker.keywords.contains(&Keyword::Flying)
        && !d_blocker.keywords.contains(&Keyword::Reach)
    {
        return false;
    }
    true
}

fn validate_declare_blockers(
    state: &GameState,
    actor: PlayerId,
    blocks: &[BlockAssignment],
) -> Result<()> {
    if state.turn.step != Step::DeclareBlockers {
        return Err(EngineError::IllegalTiming(
            "blockers can only be declared in the declare-blockers step".into(),
        ));
    }
    if state.turn.active_player == actor {
        return Err(EngineError::IllegalTiming(
            "only the defending player declares blockers".into(),
        ));
    }
    if !state.stack.is_empty() {
        return Err(EngineError::IllegalTiming(
            "blockers cannot be declared with spells on the stack".into(),
        ));
    }
    if state.combat.blockers_declared {
        return Err(EngineError::IllegalTiming("blockers already declared".into()));
    }
    if state.combat.attackers.is_empty() && !blocks.is_empty() {
        return Err(EngineError::InvalidTarget("there are no attackers".into()));
    }

    let derived = derived::compute(state);
    let mut used = std::collections::BTreeSet::new();
    let mut per_attacker: std::collections::BTreeMap<InstanceId, u32> = Default::default();

    for block in blocks {
        if !state.combat.is_attacking(block.attacker) {
            return Err(EngineError::InvalidTarget(format!(
                "{} is not attacking",
                block.attacker
            )));
        }
        let perm = state
            .battlefield
            .get(&block.blocker)
            .ok_or_else(|| EngineError::UnknownObject(format!("blocker {}", block.blocker)))?;
        if perm.controller != actor {
            return Err(EngineError::InvalidTarget(format!(
                "blocker {} is not controlled by player {}",
                block.blocker, actor
            )));
        }
        if perm.tapped {
            return Err(EngineError::InvalidTarget(format!(
                "blocker {} is tapped",
                block.blocker
            )));
        }
        if !creature_can_block(&derived, block.blocker, block.attacker) {
            return Err(EngineError::InvalidTarget(format!(
                "{} cannot block {}",
                block.blocker, block.attacker
            )));
        }
        // Phase-1: each creature blocks at most one attacker
        if !used.insert(block.blocker) {
            return Err(EngineError::InvalidTarget(format!(
                "{} cannot block more than one attacker",
                block.blocker
            )));
        }
        *per_attacker.entry(block.attacker).or_insert(0) += 1;
    }

    // Menace: blocked by two or more, or not at all
    for &attacker in &state.combat.attackers {
        if derived.has_keyword(attacker, Keyword::Menace)
            && per_attacker.get(&attacker).copied().unwrap_or(0) == 1
        {
            return Err(EngineError::InvalidTarget(format!(
                "{} has menace and cannot be blocked by exactly one creature",
                attacker
            )));
        }
    }

    // "All creatures able to block this creature do so"
    for &attacker in &state.combat.attackers {
        let must_block = derived
            .get(attacker)
            .map(|d| d.must_be_blocked_by_all)
            .unwrap_or(false);
        if !must_block {
            continue;
        }
        for perm in state.battlefield.values() {
            if perm.controller != actor || perm.tapped {
                continue;
            }
            let id = perm.id();
            if !creature_can_block(&derived, id, attacker) {
                continue;
            }
            let blocks_it = blocks
                .iter()
                .any(|b| b.attacker == attacker && b.blocker == id);
            if !blocks_it {
                return Err(EngineError::InvalidTarget(format!(
                    "{} must block {}",
                    id, attacker
                )));
            }
        }
    }

    Ok(())
}

fn validate_pass_priority(state: &GameState, actor: PlayerId) -> Result<()> {
    // The active player cannot wave combat through without an explicit
    // (possibly empty) declaration; same for the defender and blocks
    if state.turn.step == Step::DeclareAttackers
        && state.turn.active_player == actor
        && !state.combat.attackers_declared
    {
        return Err(EngineError::IllegalTiming(
            "declare attackers (possibly none) before passing".into(),
        ));
    }
    if state.turn.step == Step::DeclareBlockers
        && state.turn.active_player != actor
        && !state.combat.blockers_declared
    {
        return Err(EngineError::IllegalTiming(
            "declare blockers (possibly none) before passing".into(),
        ));
    }
    Ok(())
}

fn validate_skip(state: &GameState, actor: PlayerId, expected_step: Step) -> Result<()> {
    if state.turn.active_player != actor {
        return Err(EngineError::IllegalTiming(
            "only the active player can skip ahead".into(),
        ));
    }
    if state.turn.step != expected_step {
        return Err(EngineError::IllegalTiming(format!(
            "can only skip from {:?}",
            expected_step
        )));
    }
    if !state.stack.is_empty() {
        return Err(EngineError::IllegalTiming(
            "cannot skip with spells on the stack".into(),
        ));
    }
    Ok(())
}

// ---- target validation ----

/// Validate chosen target groups against their specs at cast time
pub fn validate_target_groups(
    state: &GameState,
    actor: PlayerId,
    specs: &[GroupSpec],
    targets: &TargetGroups,
) -> Result<()> {
    if specs.is_empty() {
        if targets.iter().any(|g| !g.is_empty()) {
            return Err(EngineError::InvalidTarget(
                "this spell does not take targets".into(),
            ));
        }
        return Ok(());
    }
    if targets.len() != specs.len() {
        return Err(EngineError::InvalidTarget(format!(
            "expected {} target group(s), got {}",
            specs.len(),
            targets.len()
        )));
    }

    let derived = derived::compute(state);
    for (group, gs) in targets.iter().zip(specs.iter()) {
        validate_one_group(state, &derived, actor, &gs.spec, group)?;
    }
    Ok(())
}

fn validate_one_group(
    state: &GameState,
    derived: &DerivedBattlefield,
    actor: PlayerId,
    spec: &TargetSpec,
    group: &[TargetRef],
) -> Result<()> {
    if group.len() < spec.min as usize || group.len() > spec.max as usize {
        return Err(EngineError::InvalidTarget(format!(
            "target count {} outside [{}, {}]",
            group.len(),
            spec.min,
            spec.max
        )));
    }

    // Multi-target groups pick distinct objects
    let mut seen = std::collections::BTreeSet::new();
    let mut controllers = std::collections::BTreeSet::new();
    for r in group {
        if let Some(id) = r.instance_id() {
            if !seen.insert(id) {
                return Err(EngineError::InvalidTarget(format!("duplicate target {}", id)));
            }
            if let Some(perm) = state.battlefield.get(&id) {
                controllers.insert(perm.controller);
            }
        }
        check_ref(state, derived, actor, spec, r)?;
    }
    if spec.distinct_controllers && controllers.len() < group.len() {
        return Err(EngineError::InvalidTarget(
            "targets must be controlled by different players".into(),
        ));
    }
    Ok(())
}

/// Check a single target reference against a spec, including hexproof
pub fn check_ref(
    state: &GameState,
    derived: &DerivedBattlefield,
    actor: PlayerId,
    spec: &TargetSpec,
    r: &TargetRef,
) -> Result<()> {
    let fail = |msg: String| Err(EngineError::InvalidTarget(msg));

    match (spec.zone, r) {
        (TargetZone::Any, TargetRef::Player { .. }) => Ok(()),
        (TargetZone::Any, TargetRef::Permanent { instance_id }) => {
            check_battlefield_target(state, derived, actor, spec, *instance_id, Selector::Creature)
        }
        (TargetZone::Battlefield, TargetRef::Permanent { instance_id }) => {
            check_battlefield_target(state, derived, actor, spec, *instance_id, spec.selector)
        }
        (TargetZone::Player, TargetRef::Player { player_id }) => {
            if spec.selector == Selector::OpponentPlayer && *player_id == actor {
                return fail("must target an opponent".into());
            }
            Ok(())
        }
        (TargetZone::Stack, TargetRef::Spell { instance_id }) => {
            let on_stack = state
                .stack
                .iter()
                .any(|item| item.spell_instance() == Some(*instance_id));
            if !on_stack {
                return fail(format!("spell {} is not on the stack", instance_id));
            }
            Ok(())
        }
        (TargetZone::Graveyard, TargetRef::GraveyardCard { instance_id }) => {
            let in_graveyard = state
                .player_ids()
                .iter()
                .any(|p| state.zones(*p).map(|z| z.graveyard.contains(*instance_id)).unwrap_or(false));
            if !in_graveyard {
                return fail(format!("card {} is not in a graveyard", instance_id));
            }
            if spec.selector == Selector::GraveyardCreatureCard && !state.def_of(*instance_id)?.is_creature()
            {
                return fail(format!("card {} is not a creature card", instance_id));
            }
            Ok(())
        }
        _ => fail("target does not match the required zone".into()),
    }
}

fn check_battlefield_target(
    state: &GameState,
    derived: &DerivedBattlefield,
    actor: PlayerId,
    spec: &TargetSpec,
    id: InstanceId,
    selector: Selector,
) -> Result<()> {
    let fail = |msg: String| Err(EngineError::InvalidTarget(msg));

    let Some(perm) = state.battlefield.get(&id) else {
        return fail(format!("permanent {} is not on the battlefield", id));
    };
    let Some(d) = derived.get(id) else {
        return fail(format!("permanent {} is not on the battlefield", id));
    };
    let def = state.def_of(id)?;

    // Hexproof prevents opposing targeting
    if perm.controller != actor && d.keywords.contains(&Keyword::Hexproof) {
        return fail(format!("{} has hexproof", id));
    }

    let type_ok = match selector {
        Selector::AnyTarget | Selector::Creature => d.is_creature(),
        Selector::FriendlyCreature => d.is_creature() && perm.controller == actor,
        Selector::OpponentCreature => d.is_creature() && perm.controller != actor,
        Selector::NonBlackCreature => d.is_creature() && !def.has_color(Color::Black),
        Selector::FlyingCreature => d.is_creature() && d.keywords.contains(&Keyword::Flying),
        Selector::AttackingCreature => d.is_creature() && perm.is_attacking(),
        Selector::Artifact => def.is_type(crate::core::CardType::Artifact),
        Selector::Enchantment => def.is_type(crate::core::CardType::Enchantment),
        Selector::Permanent => true,
        _ => false,
    };
    if !type_ok {
        return fail(format!("{} does not match the target requirement", id));
    }

    if let Some(min_t) = spec.min_toughness {
        if d.toughness.unwrap_or(i32::MIN) < min_t {
            return fail(format!("{} has toughness below {}", id, min_t));
        }
    }

    Ok(())
}

/// Re-check a stack item's targets at resolution. Returns true if at
/// least one chosen target is still legal (or the item never targeted);
/// false means the item is countered by game rules.
pub fn targets_still_legal(state: &GameState, item: &StackItem) -> bool {
    let effects: Vec<Effect> = match item {
        StackItem::Spell { instance, .. } => match state.def_of(*instance) {
            Ok(def) => def.rules.effects.clone(),
            Err(_) => return false,
        },
        StackItem::Ability { effects, .. } => effects.clone(),
    };
    let specs = target_group_specs(&effects);
    if specs.is_empty() {
        return true;
    }

    let derived = derived::compute(state);
    let actor = item.controller();
    let mut any_required = false;
    let mut any_legal = false;
    for (group, gs) in item.targets().iter().zip(specs.iter()) {
        for r in group {
            any_required = true;
            if check_ref(state, &derived, actor, &gs.spec, r).is_ok() {
                any_legal = true;
            }
        }
    }
    !any_required || any_legal
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Amount, CardDef, CardType, CreatureStats, KeywordSet};
    use crate::game::permanent::Permanent;
    use crate::loader::CardDb;

    fn hexproof_creature() -> CardDef {
        let mut def = CardDef::new("slippery", "Slippery One");
        def.types.insert(CardType::Creature);
        def.creature_stats = Some(CreatureStats {
            base_power: 1,
            base_toughness: 1,
        });
        let mut kws = KeywordSet::new();
        kws.insert(Keyword::Hexproof);
        def.rules.keywords = kws;
        def
    }

    #[test]
    fn test_hexproof_blocks_opposing_targeting_only() {
        let mut db = CardDb::with_basics();
        db.insert(hexproof_creature()).unwrap();
        let mut state = GameState::new_two_player(db, "A", "B", 20, 1);
        let p1 = PlayerId::new(0);
        let p2 = PlayerId::new(1);

        let id = state.alloc_instance("slippery", p2, false);
        let inst = state.instance(id).unwrap().clone();
        state.battlefield.insert(id, Permanent::new(inst, p2));

        let d = derived::compute(&state);
        let spec = TargetSpec::creature();
        let target = TargetRef::Permanent { instance_id: id };

        assert!(check_ref(&state, &d, p1, &spec, &target).is_err());
        assert!(check_ref(&state, &d, p2, &spec, &target).is_ok());
    }

    #[test]
    fn test_group_specs_flattening() {
        let effects = vec![
            Effect::DealDamage {
                amount: Amount::fixed(3),
                target: TargetSpec::any_target(),
            },
            Effect::DrawCards {
                amount: Amount::fixed(1),
                target: None,
            },
        ];
        let specs = target_group_specs(&effects);
        assert_eq!(specs.len(), 1);
        assert_eq!(specs[0].effect_index, 0);

        let fight = vec![Effect::CreatureDealsDamageToCreature {
            source: TargetSpec::single(TargetZone::Battlefield, Selector::FriendlyCreature),
            target: TargetSpec::single(TargetZone::Battlefield, Selector::OpponentCreature),
            trample_excess: false,
        }];
        assert_eq!(target_group_specs(&fight).len(), 2);
    }

    #[test]
    fn test_target_count_bounds() {
        let db = CardDb::with_basics();
        let state = GameState::new_two_player(db, "A", "B", 20, 1);
        let d = derived::compute(&state);
        let spec = TargetSpec::player();
        // Empty group under min=1
        assert!(validate_one_group(&state, &d, PlayerId::new(0), &spec, &[]).is_err());
    }
}
