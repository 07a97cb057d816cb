//! The authoritative engine
//!
//! Single-threaded, synchronous state machine. One `submit_action` call
//! validates, executes, runs state-based actions, and places collected
//! triggers before the next priority window - then returns. Validation
//! failures leave state untouched; surfaces may retry with a corrected
//! action. Internal invariant violations are surfaced loudly.

use crate::core::{Cost, InstanceId, Keyword, LossReason, PlayerId};
use crate::game::actions::{Action, CostPayment, TargetGroups};
use crate::game::combat;
use crate::game::decisions::{
    DecisionChoice, DecisionKind, PendingDecision, Pile, QueuedTriggerTargets, ResumeCtx,
};
use crate::game::derived;
use crate::game::journal::Journal;
use crate::game::mana_payment;
use crate::game::phase::Step;
use crate::game::resolve;
use crate::game::sba;
use crate::game::schema::{self, ActionSchema};
use crate::game::state::{GameOutcome, GameState, StackItem};
use crate::game::triggers::{self, PendingTrigger};
use crate::game::validate;
use crate::game::visible::{self, VisibleState};
use crate::loader::{CardDb, DeckList, GameInitializer};
use crate::{EngineError, Result};
use serde::{Deserialize, Serialize};

/// Maximum hand size enforced at cleanup
pub const MAX_HAND_SIZE: usize = 7;

/// Result of a successful action submission
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionResult {
    /// Human-readable events emitted during this call
    pub events: Vec<String>,
    /// The decision now blocking the game, if any
    pub pending: Option<crate::game::decisions::DecisionView>,
}

/// The rules engine: sole authority over game state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Engine {
    state: GameState,
    journal: Journal,
}

impl Engine {
    /// Start a game from decks. Player 1 is on the play and skips their
    /// first draw step.
    pub fn new_game(
        card_db: &CardDb,
        player1_name: &str,
        deck_a: &DeckList,
        player2_name: &str,
        deck_b: &DeckList,
        seed: u64,
    ) -> Result<Engine> {
        let state = GameInitializer::new(card_db).init_game(
            player1_name,
            deck_a,
            player2_name,
            deck_b,
            seed,
        )?;
        let mut engine = Engine {
            state,
            journal: Journal::new(),
        };
        engine.begin_turn()?;
        engine.flush_triggers()?;
        Ok(engine)
    }

    /// Build an engine over a prepared state (scenario setups, snapshot
    /// resume). The state is taken as-is; no turn-start duties run.
    pub fn from_state(state: GameState) -> Engine {
        Engine {
            state,
            journal: Journal::new(),
        }
    }

    /// Rebuild a game by replaying a journal's action sequence
    pub fn replay(
        card_db: &CardDb,
        player1_name: &str,
        deck_a: &DeckList,
        player2_name: &str,
        deck_b: &DeckList,
        seed: u64,
        actions: &[Action],
    ) -> Result<Engine> {
        let mut engine = Engine::new_game(card_db, player1_name, deck_a, player2_name, deck_b, seed)?;
        for action in actions {
            // Errors are part of the record; replay keeps going
            let _ = engine.submit_action(action.clone());
        }
        Ok(engine)
    }

    // ---- public API ----

    pub fn submit_action(&mut self, action: Action) -> Result<ActionResult> {
        let snapshot = visible::project(&self.state, action.actor());
        let result = self.submit_inner(&action);
        self.journal.record(snapshot, action, result.clone());
        result
    }

    pub fn visible_state(&self, player: PlayerId) -> VisibleState {
        visible::project(&self.state, player)
    }

    pub fn get_actions(&self, player: PlayerId) -> Vec<Action> {
        schema::get_actions(&self.state, player)
    }

    pub fn get_action_schema(&self, player: PlayerId) -> ActionSchema {
        schema::get_action_schema(&self.state, player)
    }

    pub fn game_over(&self) -> Option<GameOutcome> {
        self.state.outcome
    }

    pub fn journal(&self) -> &Journal {
        &self.journal
    }

    /// Direct state access for tests and trusted tooling; surfaces should
    /// only consume `visible_state`
    pub fn state(&self) -> &GameState {
        &self.state
    }

    // ---- submission pipeline ----

    fn submit_inner(&mut self, action: &Action) -> Result<ActionResult> {
        if self.state.is_game_over() {
            return Err(EngineError::GameOver);
        }
        let mark = self.state.logger.len();

        if self.state.pending_decision.is_some() {
            match action {
                Action::ResolveDecision { actor, choice } => {
                    self.apply_decision(*actor, choice.clone())?;
                }
                _ => {
                    return Err(EngineError::PendingDecisionPreempts(
                        "a decision is pending; only RESOLVE_DECISION is legal".into(),
                    ))
                }
            }
        } else {
            validate::validate(&self.state, action)?;
            self.execute(action)?;
        }

        sba::apply(&mut self.state)?;
        if !self.state.is_game_over() && self.state.pending_decision.is_none() {
            self.flush_triggers()?;
        }

        Ok(ActionResult {
            events: self.state.logger.logs_since(mark),
            pending: self.state.pending_decision.as_ref().map(Into::into),
        })
    }

    fn execute(&mut self, action: &Action) -> Result<()> {
        match action {
            Action::PlayLand { actor, card } => {
                self.state.zones_mut(*actor)?.hand.remove(*card);
                resolve::enter_battlefield(&mut self.state, *card, *actor, false)?;
                self.state.player_mut(*actor)?.note_land_played();
                self.state.pass_streak = 0;
                self.state.log(format!("Player {} plays land {}", actor, card));
                Ok(())
            }

            Action::TapForMana { actor, permanent } => {
                let def = self.state.def_of(*permanent)?.clone();
                self.state.perm_mut(*permanent)?.tap();
                if let Some(land) = &def.land_stats {
                    let pool = &mut self.state.player_mut(*actor)?.mana_pool;
                    for (color, amount) in &land.produces {
                        pool.add(*color, *amount);
                    }
                }
                self.state.pass_streak = 0;
                self.state
                    .log(format!("Player {} taps {} for mana", actor, permanent));
                Ok(())
            }

            Action::CastSpell {
                actor,
                card,
                targets,
                x_value,
                flashback,
                alternate_cost,
                additional,
            } => self.execute_cast(
                *actor,
                *card,
                targets.clone(),
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
                x_value,
                costs,
            } => self.execute_activate(*actor, *source, *ability_index, targets.clone(), *x_value, costs),

            Action::DeclareAttackers { actor, attackers } => {
                self.execute_declare_attackers(*actor, attackers.clone())
            }

            Action::DeclareBlockers { actor, blocks } => {
                let mut mapping: std::collections::BTreeMap<
                    InstanceId,
                    smallvec::SmallVec<[InstanceId; 2]>,
                > = Default::default();
                for b in blocks {
                    mapping.entry(b.attacker).or_default().push(b.blocker);
                    self.state.perm_mut(b.blocker)?.blocking.push(b.attacker);
                }
                self.state.combat.declare_blockers(mapping);
                let all_blockers: Vec<InstanceId> = blocks.iter().map(|b| b.blocker).collect();
                self.state.pass_streak = 0;
                self.state.priority = Some(self.state.turn.active_player);
                triggers::on_blocks(&mut self.state, &all_blockers);
                self.state
                    .log(format!("Player {} declares {} block(s)", actor, blocks.len()));
                Ok(())
            }

            Action::PassPriority { actor } => self.execute_pass(*actor),

            Action::SkipCombat { actor } => {
                self.state.clear_mana_pools();
                self.state.combat.clear();
                self.state.turn.step = Step::Main2;
                self.state.expire_temporary_effects();
                self.open_priority();
                self.state.log(format!("Player {} skips combat", actor));
                Ok(())
            }

            Action::SkipMain2 { actor } => {
                self.state.clear_mana_pools();
                self.state.turn.step = Step::End;
                self.state.expire_temporary_effects();
                let active = self.state.turn.active_player;
                triggers::on_end_step(&mut self.state, active);
                self.open_priority();
                self.state.log(format!("Player {} skips to the end step", actor));
                Ok(())
            }

            Action::Scoop { actor } => {
                self.state.player_mut(*actor)?.mark_lost(LossReason::Scooped);
                self.state.log(format!("Player {} concedes", actor));
                Ok(())
            }

            Action::ResolveDecision { .. } => Err(EngineError::InvariantViolation(
                "decision path reached the executor".into(),
            )),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn execute_cast(
        &mut self,
        actor: PlayerId,
        card: InstanceId,
        targets: TargetGroups,
        x_value: u8,
        flashback: bool,
        alternate_cost: Option<&str>,
        additional: &CostPayment,
    ) -> Result<()> {
        let def = self.state.def_of(card)?.clone();

        if flashback {
            self.state.zones_mut(actor)?.graveyard.remove(card);
        } else {
            self.state.zones_mut(actor)?.hand.remove(card);
        }

        // Additional costs first, then the mana (or alternative) cost
        let mut sacrificed_toughness = 0;
        for cost in &def.rules.additional_costs {
            match cost {
                Cost::Discard { .. } => {
                    for id in &additional.discard {
                        resolve::discard_card(&mut self.state, actor, *id)?;
                    }
                }
                Cost::SacrificeCreatures { .. } => {
                    let d = derived::compute(&self.state);
                    for id in &additional.sacrifice {
                        sacrificed_toughness += d.toughness(*id).unwrap_or(0);
                        resolve::sacrifice_permanent(&mut self.state, *id)?;
                    }
                }
                Cost::PayLife { amount } => {
                    self.state.player_mut(actor)?.lose_life(*amount as i32);
                }
                Cost::Mana(mana) => {
                    mana_payment::pay_mana(&mut self.state, actor, mana)?;
                }
                Cost::Tap | Cost::SacrificeSelf => {}
            }
        }

        if let Some(alt_id) = alternate_cost {
            let alt = def
                .rules
                .alternate_costs
                .iter()
                .find(|a| a.id() == alt_id)
                .ok_or_else(|| EngineError::InvariantViolation("validated alternate cost vanished".into()))?;
            match alt {
                crate::core::AlternateCost::ControlSubtypePayLife { life, .. } => {
                    self.state.player_mut(actor)?.lose_life(*life as i32);
                }
            }
        } else if flashback {
            let fb = def
                .rules
                .flashback_cost
                .ok_or_else(|| EngineError::InvariantViolation("validated flashback cost vanished".into()))?;
            mana_payment::pay_spell_cost(&mut self.state, &def, actor, 0, Some(&fb))?;
        } else {
            mana_payment::pay_spell_cost(&mut self.state, &def, actor, x_value, None)?;
        }

        self.state.pass_streak = 0;
        self.state.stack.push(StackItem::Spell {
            instance: card,
            controller: actor,
            targets: targets.clone(),
            x_value,
            flashback,
            is_copy: false,
            sacrificed_toughness,
        });
        self.state.priority = Some(self.state.other_player(actor));

        triggers::on_cast_spell(&mut self.state, actor, def.id.clone());
        let targeted: Vec<InstanceId> = targets
            .iter()
            .flatten()
            .filter_map(|r| r.instance_id())
            .collect();
        triggers::on_becomes_target(&mut self.state, &targeted, actor);

        self.state
            .log(format!("Player {} casts {} ({})", actor, def.name, card));
        Ok(())
    }

    fn execute_activate(
        &mut self,
        actor: PlayerId,
        source: InstanceId,
        ability_index: usize,
        targets: TargetGroups,
        x_value: u8,
        costs: &CostPayment,
    ) -> Result<()> {
        let def = self.state.def_of(source)?.clone();
        let ability = def
            .rules
            .activated_abilities
            .get(ability_index)
            .ok_or_else(|| EngineError::InvariantViolation("validated ability vanished".into()))?
            .clone();

        let mut sacrificed_toughness = 0;
        for cost in &ability.costs {
            match cost {
                Cost::Tap => {
                    if let Ok(perm) = self.state.perm_mut(source) {
                        perm.tap();
                    }
                }
                Cost::Mana(mana) => {
                    mana_payment::pay_mana(&mut self.state, actor, mana)?;
                }
                Cost::PayLife { amount } => {
                    self.state.player_mut(actor)?.lose_life(*amount as i32);
                }
                Cost::Discard { .. } => {
                    for id in &costs.discard {
                        resolve::discard_card(&mut self.state, actor, *id)?;
                    }
                }
                Cost::SacrificeSelf => {
                    let d = derived::compute(&self.state);
                    sacrificed_toughness += d.toughness(source).unwrap_or(0);
                    resolve::sacrifice_permanent(&mut self.state, source)?;
                }
                Cost::SacrificeCreatures { .. } => {
                    let d = derived::compute(&self.state);
                    for id in &costs.sacrifice {
                        sacrificed_toughness += d.toughness(*id).unwrap_or(0);
                        resolve::sacrifice_permanent(&mut self.state, *id)?;
                    }
                }
            }
        }

        self.state.pass_streak = 0;

        if ability.is_mana_ability() {
            // Mana abilities resolve immediately without using the stack
            let item = StackItem::Ability {
                source,
                controller: actor,
                effects: ability.effects.clone(),
                targets: Vec::new(),
                x_value,
                sacrificed_toughness,
            };
            resolve::resolve_effects(&mut self.state, item, 0)?;
            self.state
                .log(format!("Player {} activates a mana ability of {}", actor, source));
            return Ok(());
        }

        self.state.stack.push(StackItem::Ability {
            source,
            controller: actor,
            effects: ability.effects.clone(),
            targets: targets.clone(),
            x_value,
            sacrificed_toughness,
        });
        self.state.priority = Some(self.state.other_player(actor));

        let targeted: Vec<InstanceId> = targets
            .iter()
            .flatten()
            .filter_map(|r| r.instance_id())
            .collect();
        triggers::on_becomes_target(&mut self.state, &targeted, actor);

        self.state
            .log(format!("Player {} activates ability #{} of {}", actor, ability_index, source));
        Ok(())
    }

    fn execute_declare_attackers(&mut self, actor: PlayerId, attackers: Vec<InstanceId>) -> Result<()> {
        let defender = self.state.other_player(actor);
        self.state
            .combat
            .declare_attackers(attackers.clone(), defender);

        let d = derived::compute(&self.state);
        for &id in &attackers {
            let vigilance = d.has_keyword(id, Keyword::Vigilance);
            let perm = self.state.perm_mut(id)?;
            if !vigilance {
                perm.tap();
            }
            perm.attacker_assignment = Some(defender);
        }

        let tax = mana_payment::attack_tax_amount(&self.state, defender);
        if tax > 0 {
            let total = tax * attackers.len() as u32;
            self.state.player_mut(actor)?.mana_pool.pay_generic(total);
        }

        self.state.pass_streak = 0;
        self.state.priority = Some(defender);
        triggers::on_attacks(&mut self.state, &attackers);
        self.state.log(format!(
            "Player {} declares {} attacker(s)",
            actor,
            attackers.len()
        ));
        Ok(())
    }

    fn execute_pass(&mut self, actor: PlayerId) -> Result<()> {
        self.state.logger.debug(format!("Player {} passes priority", actor));
        self.state.pass_streak += 1;

        if self.state.pass_streak >= 2 {
            self.state.pass_streak = 0;
            if !self.state.stack.is_empty() {
                resolve::resolve_top_of_stack(&mut self.state)?;
                self.state.priority = Some(self.state.turn.active_player);
            } else {
                self.advance_step()?;
            }
        } else {
            self.state.priority = Some(self.state.other_player(actor));
        }
        Ok(())
    }

    // ---- turn structure ----

    /// Open a priority window for the active player
    fn open_priority(&mut self) {
        self.state.priority = Some(self.state.turn.active_player);
        self.state.pass_streak = 0;
    }

    /// Untap-step duties, then advance into the upkeep
    fn begin_turn(&mut self) -> Result<()> {
        let active = self.state.turn.active_player;
        self.state.priority = None;
        self.state.pass_streak = 0;

        let controlled: Vec<InstanceId> = self
            .state
            .battlefield
            .values()
            .filter(|p| p.controller == active)
            .map(|p| p.id())
            .collect();
        for id in controlled {
            let perm = self.state.perm_mut(id)?;
            perm.untap();
            perm.summoning_sick = false;
            perm.entered_this_turn = false;
        }

        self.advance_step()
    }

    /// Move forward through the step machine, performing step duties,
    /// until a priority window opens, a decision blocks, or the turn ends.
    fn advance_step(&mut self) -> Result<()> {
        loop {
            self.state.clear_mana_pools();
            let step = self.state.turn.step;

            // Exit duties
            match step {
                Step::DeclareBlockers => {
                    combat::resolve_combat_damage(&mut self.state)?;
                    if self.state.is_game_over() {
                        return Ok(());
                    }
                }
                Step::EndCombat => self.end_of_combat()?,
                Step::Cleanup => {
                    // A cleanup priority round just finished quietly:
                    // run cleanup again, then the turn ends
                    if self.cleanup_step()? {
                        return Ok(());
                    }
                    return self.end_turn();
                }
                _ => {}
            }

            let Some(next) = step.next() else {
                return self.end_turn();
            };
            self.state.turn.step = next;
            self.state.expire_temporary_effects();

            let active = self.state.turn.active_player;
            match next {
                Step::Upkeep => {
                    triggers::on_upkeep(&mut self.state, active);
                    self.open_priority();
                    return Ok(());
                }
                Step::Draw => {
                    let skip = self.state.turn.turn_number == 1
                        && active == self.state.starting_player;
                    if !skip {
                        self.state.draw_cards(active, 1)?;
                    }
                    self.open_priority();
                    return Ok(());
                }
                Step::Main1
                | Step::BeginCombat
                | Step::DeclareAttackers
                | Step::DeclareBlockers
                | Step::EndCombat
                | Step::Main2 => {
                    self.open_priority();
                    return Ok(());
                }
                // Placeholder step: damage already resolved when the
                // declare-blockers window closed; no priority here
                Step::CombatDamage => continue,
                Step::End => {
                    triggers::on_end_step(&mut self.state, active);
                    self.open_priority();
                    return Ok(());
                }
                Step::Cleanup => {
                    if self.cleanup_step()? {
                        return Ok(());
                    }
                    return self.end_turn();
                }
                Step::Untap => {
                    return Err(EngineError::InvariantViolation(
                        "stepped into untap mid-turn".into(),
                    ))
                }
            }
        }
    }

    fn end_of_combat(&mut self) -> Result<()> {
        let ids: Vec<InstanceId> = self.state.battlefield.keys().copied().collect();
        for id in ids {
            self.state.perm_mut(id)?.clear_combat();
        }
        self.state.combat.clear();
        Ok(())
    }

    /// Cleanup duties. Returns true when the engine must stop and wait
    /// (hand-size decision or a trigger-driven priority round).
    fn cleanup_step(&mut self) -> Result<bool> {
        let active = self.state.turn.active_player;

        let hand_size = self.state.zones(active)?.hand.len();
        if hand_size > MAX_HAND_SIZE {
            let count = (hand_size - MAX_HAND_SIZE) as u8;
            let mut decision = PendingDecision::new(
                active,
                format!("Discard down to {} cards", MAX_HAND_SIZE),
                DecisionKind::CleanupDiscard { count },
            );
            decision.min = count;
            decision.max = count;
            self.state.pending_decision = Some(decision);
            self.state.priority = None;
            return Ok(true);
        }

        // "Until end of turn" effects end; damage clears
        let turn = self.state.turn.turn_number;
        self.state.temporary_effects.retain(|t| t.expires_turn > turn);
        let ids: Vec<InstanceId> = self.state.battlefield.keys().copied().collect();
        for id in ids {
            self.state.perm_mut(id)?.damage_marked = 0;
        }

        // A trigger during cleanup forces a priority round, then another
        // cleanup
        if !self.state.pending_triggers.is_empty() {
            self.open_priority();
            return Ok(true);
        }

        self.state.priority = None;
        Ok(false)
    }

    fn end_turn(&mut self) -> Result<()> {
        for player in self.state.player_ids() {
            let p = self.state.player_mut(player)?;
            p.mana_pool.clear();
            p.reset_for_new_turn();
        }
        let ids: Vec<InstanceId> = self.state.battlefield.keys().copied().collect();
        for id in ids {
            self.state.perm_mut(id)?.clear_combat();
        }
        self.state.combat.clear();
        for value in self.state.damage_dealt_to_players.values_mut() {
            *value = 0;
        }

        let next = if self.state.extra_turns.is_empty() {
            self.state.other_player(self.state.turn.active_player)
        } else {
            self.state.extra_turns.remove(0)
        };
        self.state.turn.next_turn(next);
        self.state.log(format!(
            "Turn {} begins; active player {}",
            self.state.turn.turn_number, next
        ));
        self.begin_turn()
    }

    // ---- trigger placement ----

    /// Place all collected triggers on the stack (active player's first,
    /// then source creation order), pausing on the first one that needs
    /// targets.
    fn flush_triggers(&mut self) -> Result<()> {
        if self.state.pending_triggers.is_empty() {
            return Ok(());
        }
        let mut pending = std::mem::take(&mut self.state.pending_triggers);
        triggers::sort_for_stack(&mut pending, self.state.turn.active_player);
        self.place_triggers(pending)
    }

    fn place_triggers(&mut self, mut queue: Vec<PendingTrigger>) -> Result<()> {
        while !queue.is_empty() {
            let trigger = queue.remove(0);
            let specs = validate::target_group_specs(&trigger.effects);
            if specs.is_empty() {
                self.push_trigger_on_stack(trigger, Vec::new());
                continue;
            }

            let options =
                schema::enumerate_target_choices(&self.state, &trigger.effects, trigger.controller);
            if options.is_empty() {
                // No legal targets: the ability goes on the stack
                // untargeted and does nothing at resolution
                let empty = vec![Vec::new(); specs.len()];
                self.push_trigger_on_stack(trigger, empty);
                continue;
            }

            let actor = trigger.controller;
            let queued: Vec<QueuedTriggerTargets> = queue
                .drain(..)
                .map(|t| QueuedTriggerTargets {
                    trigger: t,
                    options: Vec::new(),
                })
                .collect();
            let decision = PendingDecision::new(
                actor,
                "Choose targets for the triggered ability",
                DecisionKind::TriggerTargets {
                    trigger,
                    queue: queued,
                },
            )
            .with_options(options);
            self.state.pending_decision = Some(decision);
            self.state.pass_streak = 0;
            return Ok(());
        }
        self.state.pass_streak = 0;
        Ok(())
    }

    fn push_trigger_on_stack(&mut self, trigger: PendingTrigger, targets: TargetGroups) {
        let targeted: Vec<InstanceId> = targets
            .iter()
            .flatten()
            .filter_map(|r| r.instance_id())
            .collect();
        let controller = trigger.controller;
        self.state.stack.push(StackItem::Ability {
            source: trigger.source,
            controller,
            effects: trigger.effects,
            targets,
            x_value: 0,
            sacrificed_toughness: 0,
        });
        triggers::on_becomes_target(&mut self.state, &targeted, controller);
    }

    // ---- decision handling ----

    fn apply_decision(&mut self, actor: PlayerId, choice: DecisionChoice) -> Result<()> {
        let decision = self
            .state
            .pending_decision
            .clone()
            .ok_or_else(|| EngineError::InvariantViolation("missing pending decision".into()))?;
        if decision.actor != actor {
            return Err(EngineError::NotYourPriority(format!(
                "player {} is not the deciding player",
                actor
            )));
        }

        match decision.kind.clone() {
            DecisionKind::TriggerTargets { trigger, queue } => {
                let DecisionChoice::Targets { targets } = &choice else {
                    return Err(EngineError::InvalidTarget("expected target groups".into()));
                };
                let specs = validate::target_group_specs(&trigger.effects);
                validate::validate_target_groups(&self.state, trigger.controller, &specs, targets)?;

                self.state.pending_decision = None;
                self.push_trigger_on_stack(trigger, targets.clone());
                self.place_triggers(queue.into_iter().map(|q| q.trigger).collect())?;
                Ok(())
            }

            DecisionKind::CleanupDiscard { count } => {
                let cards = self.expect_discard(&choice, actor, count)?;
                self.state.pending_decision = None;
                for card in cards {
                    resolve::discard_card(&mut self.state, actor, card)?;
                }
                // Continue the interrupted cleanup
                if self.cleanup_step()? {
                    return Ok(());
                }
                self.end_turn()
            }

            DecisionKind::ForcedDiscard { player, count } => {
                let cards = self.expect_discard(&choice, player, count)?;
                self.state.pending_decision = None;
                for card in cards {
                    resolve::discard_card(&mut self.state, player, card)?;
                }
                self.finish_decision(decision.resume)
            }

            DecisionKind::SearchBasicLand { player } => {
                if !decision.accepts_enumerated(&choice) {
                    return Err(EngineError::InvalidTarget("choice not offered".into()));
                }
                self.state.pending_decision = None;
                if let DecisionChoice::Card { instance_id } = choice {
                    self.state.zones_mut(player)?.library.remove(instance_id);
                    resolve::enter_battlefield(&mut self.state, instance_id, player, true)?;
                    self.shuffle_library(player)?;
                    self.state
                        .log(format!("Player {} puts a basic land onto the battlefield", player));
                }
                self.finish_decision(decision.resume)
            }

            DecisionKind::SearchBasicPlains { player } => {
                if !decision.accepts_enumerated(&choice) {
                    return Err(EngineError::InvalidTarget("choice not offered".into()));
                }
                self.state.pending_decision = None;
                if let DecisionChoice::Card { instance_id } = choice {
                    self.state.zones_mut(player)?.library.remove(instance_id);
                    self.state.zones_mut(player)?.hand.add(instance_id);
                    self.shuffle_library(player)?;
                }
                self.finish_decision(decision.resume)
            }

            DecisionKind::LookTopPutOneInHand { top } => {
                let DecisionChoice::Card { instance_id } = choice else {
                    return Err(EngineError::InvalidTarget("expected a card choice".into()));
                };
                if !top.contains(&instance_id) {
                    return Err(EngineError::InvalidTarget("card was not among those looked at".into()));
                }
                self.state.pending_decision = None;
                for id in &top {
                    self.state.zones_mut(actor)?.library.remove(*id);
                }
                self.state.zones_mut(actor)?.hand.add(instance_id);
                for id in top.iter().filter(|id| **id != instance_id) {
                    self.state.zones_mut(actor)?.library.add_to_bottom(*id);
                }
                self.finish_decision(decision.resume)
            }

            DecisionKind::LookTopPutLand { top } => {
                let chosen = match &choice {
                    DecisionChoice::Decline => None,
                    DecisionChoice::Card { instance_id } => {
                        if !top.contains(instance_id) {
                            return Err(EngineError::InvalidTarget(
                                "card was not among those looked at".into(),
                            ));
                        }
                        if !self.state.def_of(*instance_id)?.is_land() {
                            return Err(EngineError::InvalidTarget("card is not a land".into()));
                        }
                        Some(*instance_id)
                    }
                    _ => return Err(EngineError::InvalidTarget("expected a card choice".into())),
                };
                self.state.pending_decision = None;
                for id in &top {
                    self.state.zones_mut(actor)?.library.remove(*id);
                }
                if let Some(id) = chosen {
                    resolve::enter_battlefield(&mut self.state, id, actor, true)?;
                }
                // The rest go to the bottom in a random order
                let mut rest: Vec<InstanceId> =
                    top.into_iter().filter(|id| Some(*id) != chosen).collect();
                {
                    use rand::seq::SliceRandom;
                    let mut rng = self.state.rng.clone();
                    rest.shuffle(&mut rng);
                    self.state.rng = rng;
                }
                for id in rest {
                    self.state.zones_mut(actor)?.library.add_to_bottom(id);
                }
                self.finish_decision(decision.resume)
            }

            DecisionKind::Scry { top, then_draw } => {
                let DecisionChoice::Scry {
                    top: keep,
                    bottom,
                } = &choice
                else {
                    return Err(EngineError::InvalidTarget("expected a scry order".into()));
                };
                check_partition(&top, keep, bottom)?;
                self.state.pending_decision = None;
                for id in &top {
                    self.state.zones_mut(actor)?.library.remove(*id);
                }
                for id in bottom {
                    self.state.zones_mut(actor)?.library.add_to_bottom(*id);
                }
                // keep[0] ends up topmost
                for id in keep.iter().rev() {
                    self.state.zones_mut(actor)?.library.add(*id);
                }
                if then_draw > 0 {
                    let controller = decision
                        .resume
                        .as_ref()
                        .map(|r| r.item.controller())
                        .unwrap_or(actor);
                    self.state.draw_cards(controller, then_draw as u32)?;
                }
                self.finish_decision(decision.resume)
            }

            DecisionKind::FactOrFictionSplit { top } => {
                let DecisionChoice::Piles { pile_a, pile_b } = &choice else {
                    return Err(EngineError::InvalidTarget("expected two piles".into()));
                };
                check_partition(&top, pile_a, pile_b)?;
                let controller = decision
                    .resume
                    .as_ref()
                    .map(|r| r.item.controller())
                    .ok_or_else(|| {
                        EngineError::InvariantViolation("pile split without a resolution".into())
                    })?;
                self.state.pending_decision = Some(
                    PendingDecision::new(
                        controller,
                        "Put one pile into your hand and the other into your graveyard",
                        DecisionKind::FactOrFictionPick {
                            top,
                            pile_a: pile_a.clone(),
                            pile_b: pile_b.clone(),
                        },
                    )
                    .with_options(vec![
                        DecisionChoice::Pile { pile: Pile::A },
                        DecisionChoice::Pile { pile: Pile::B },
                    ])
                    .with_resume(decision.resume),
                );
                Ok(())
            }

            DecisionKind::FactOrFictionPick {
                top,
                pile_a,
                pile_b,
            } => {
                let DecisionChoice::Pile { pile } = choice else {
                    return Err(EngineError::InvalidTarget("expected a pile choice".into()));
                };
                self.state.pending_decision = None;
                let (to_hand, to_graveyard) = match pile {
                    Pile::A => (pile_a, pile_b),
                    Pile::B => (pile_b, pile_a),
                };
                for id in &top {
                    self.state.zones_mut(actor)?.library.remove(*id);
                }
                for id in to_hand {
                    self.state.zones_mut(actor)?.hand.add(id);
                }
                for id in to_graveyard {
                    self.state.zones_mut(actor)?.graveyard.add(id);
                }
                self.finish_decision(decision.resume)
            }

            DecisionKind::CounterUnlessPay { spell, cost } => {
                let DecisionChoice::Pay { pay } = choice else {
                    return Err(EngineError::InvalidTarget("expected pay or decline".into()));
                };
                self.state.pending_decision = None;
                if pay && mana_payment::can_pay_mana(&self.state, actor, &cost)? {
                    mana_payment::pay_mana(&mut self.state, actor, &cost)?;
                    self.state
                        .log(format!("Player {} pays {} to keep the spell", actor, cost));
                } else {
                    resolve::counter_spell(&mut self.state, spell)?;
                }
                self.finish_decision(decision.resume)
            }

            DecisionKind::EachPlayerSacrifice { queue } => {
                if !decision.accepts_enumerated(&choice) {
                    return Err(EngineError::InvalidTarget("choice not offered".into()));
                }
                let DecisionChoice::Card { instance_id } = choice else {
                    return Err(EngineError::InvalidTarget("expected a creature choice".into()));
                };
                self.state.pending_decision = None;
                resolve::sacrifice_permanent(&mut self.state, instance_id)?;

                let mut queue = queue;
                if !queue.is_empty() {
                    let (next_player, next_options) = queue.remove(0);
                    self.state.pending_decision = Some(
                        PendingDecision::new(
                            next_player,
                            "Sacrifice a creature",
                            DecisionKind::EachPlayerSacrifice { queue },
                        )
                        .with_options(next_options)
                        .with_resume(decision.resume),
                    );
                    return Ok(());
                }
                self.finish_decision(decision.resume)
            }

            DecisionKind::DiscardHandDrawDamage { player, damage } => {
                let DecisionChoice::Pay { pay } = choice else {
                    return Err(EngineError::InvalidTarget("expected yes or no".into()));
                };
                self.state.pending_decision = None;
                if pay {
                    let hand: Vec<InstanceId> = self.state.zones(player)?.hand.cards.clone();
                    for id in hand {
                        resolve::discard_card(&mut self.state, player, id)?;
                    }
                    if damage > 0 {
                        self.state.draw_cards(player, damage as u32)?;
                    }
                }
                self.finish_decision(decision.resume)
            }
        }
    }

    /// Resume an interrupted resolution once no further decision blocks
    fn finish_decision(&mut self, resume: Option<ResumeCtx>) -> Result<()> {
        if self.state.pending_decision.is_some() {
            return Ok(());
        }
        if let Some(resume) = resume {
            resolve::resolve_effects(&mut self.state, resume.item, resume.next_effect)?;
        }
        Ok(())
    }

    fn expect_discard(
        &self,
        choice: &DecisionChoice,
        player: PlayerId,
        count: u8,
    ) -> Result<Vec<InstanceId>> {
        let DecisionChoice::Discard { cards } = choice else {
            return Err(EngineError::InvalidTarget("expected cards to discard".into()));
        };
        let required = (count as usize).min(self.state.zones(player)?.hand.len());
        if cards.len() != required {
            return Err(EngineError::InvalidTarget(format!(
                "must discard exactly {} card(s)",
                required
            )));
        }
        let mut seen = std::collections::BTreeSet::new();
        for card in cards {
            if !self.state.zones(player)?.hand.contains(*card) {
                return Err(EngineError::InvalidTarget(format!("card {} not in hand", card)));
            }
            if !seen.insert(*card) {
                return Err(EngineError::InvalidTarget(format!("duplicate card {}", card)));
            }
        }
        Ok(cards.clone())
    }

    fn shuffle_library(&mut self, player: PlayerId) -> Result<()> {
        let mut rng = self.state.rng.clone();
        self.state.zones_mut(player)?.library.shuffle(&mut rng);
        self.state.rng = rng;
        Ok(())
    }
}

/// `keep` and `bottom` must exactly partition `all`
fn check_partition(
    all: &[InstanceId],
    keep: &[InstanceId],
    bottom: &[InstanceId],
) -> Result<()> {
    let mut combined: Vec<InstanceId> = keep.iter().chain(bottom.iter()).copied().collect();
    combined.sort();
    let mut expected: Vec<InstanceId> = all.to_vec();
    expected.sort();
    combined.dedup();
    if combined != expected {
        return Err(EngineError::InvalidTarget(
            "choice must partition the revealed cards".into(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::DeckList;

    fn forest_deck() -> DeckList {
        DeckList::new("forests").add("Forest", 24)
    }

    fn new_engine() -> Engine {
        let db = CardDb::with_basics();
        Engine::new_game(&db, "Alice", &forest_deck(), "Bob", &forest_deck(), 42).unwrap()
    }

    fn pass_both(engine: &mut Engine) {
        let holder = engine.state().priority.unwrap();
        engine
            .submit_action(Action::PassPriority { actor: holder })
            .unwrap();
        if let Some(next) = engine.state().priority {
            if engine.state().pending_decision.is_none() {
                engine
                    .submit_action(Action::PassPriority { actor: next })
                    .unwrap();
            }
        }
    }

    #[test]
    fn test_game_starts_in_upkeep_with_priority() {
        let engine = new_engine();
        assert_eq!(engine.state().turn.step, Step::Upkeep);
        assert_eq!(engine.state().priority, Some(PlayerId::new(0)));
        assert_eq!(engine.state().turn.turn_number, 1);
    }

    #[test]
    fn test_first_turn_draw_skipped() {
        let mut engine = new_engine();
        pass_both(&mut engine); // upkeep -> draw
        assert_eq!(engine.state().turn.step, Step::Draw);
        // On the play: no card drawn
        let p1 = PlayerId::new(0);
        assert_eq!(engine.state().zones(p1).unwrap().hand.len(), 7);
    }

    #[test]
    fn test_priority_alternates() {
        let mut engine = new_engine();
        let p1 = PlayerId::new(0);
        let p2 = PlayerId::new(1);
        engine.submit_action(Action::PassPriority { actor: p1 }).unwrap();
        assert_eq!(engine.state().priority, Some(p2));
        // Wrong player is rejected without state change
        let err = engine
            .submit_action(Action::PassPriority { actor: p1 })
            .unwrap_err();
        assert!(matches!(err, EngineError::NotYourPriority(_)));
        assert_eq!(engine.state().priority, Some(p2));
    }

    #[test]
    fn test_scoop_ends_game() {
        let mut engine = new_engine();
        let p1 = PlayerId::new(0);
        engine.submit_action(Action::Scoop { actor: p1 }).unwrap();
        let outcome = engine.game_over().unwrap();
        assert_eq!(outcome.winner, PlayerId::new(1));
        assert_eq!(outcome.reason, LossReason::Scooped);

        let err = engine
            .submit_action(Action::PassPriority { actor: p1 })
            .unwrap_err();
        assert_eq!(err, EngineError::GameOver);
    }

    #[test]
    fn test_mana_pool_empties_between_steps() {
        let mut engine = new_engine();
        let p1 = PlayerId::new(0);
        // Reach main 1
        pass_both(&mut engine); // upkeep
        pass_both(&mut engine); // draw
        assert_eq!(engine.state().turn.step, Step::Main1);

        let land = engine.state().zones(p1).unwrap().hand.cards[0];
        engine
            .submit_action(Action::PlayLand { actor: p1, card: land })
            .unwrap();
        engine
            .submit_action(Action::TapForMana {
                actor: p1,
                permanent: land,
            })
            .unwrap();
        assert_eq!(engine.state().player(p1).unwrap().mana_pool.green, 1);

        pass_both(&mut engine); // main1 -> begin combat
        assert!(engine.state().player(p1).unwrap().mana_pool.is_empty());
    }

    #[test]
    fn test_second_land_rejected() {
        let mut engine = new_engine();
        let p1 = PlayerId::new(0);
        pass_both(&mut engine);
        pass_both(&mut engine);

        let hand = engine.state().zones(p1).unwrap().hand.cards.clone();
        engine
            .submit_action(Action::PlayLand {
                actor: p1,
                card: hand[0],
            })
            .unwrap();
        let err = engine
            .submit_action(Action::PlayLand {
                actor: p1,
                card: hand[1],
            })
            .unwrap_err();
        assert!(matches!(err, EngineError::IllegalTiming(_)));
    }

    #[test]
    fn test_skip_combat_and_main2() {
        let mut engine = new_engine();
        let p1 = PlayerId::new(0);
        pass_both(&mut engine); // upkeep
        pass_both(&mut engine); // draw
        engine.submit_action(Action::SkipCombat { actor: p1 }).unwrap();
        assert_eq!(engine.state().turn.step, Step::Main2);
        engine.submit_action(Action::SkipMain2 { actor: p1 }).unwrap();
        assert_eq!(engine.state().turn.step, Step::End);
    }

    #[test]
    fn test_turn_rotates_to_opponent() {
        let mut engine = new_engine();
        let p2 = PlayerId::new(1);
        // Walk through P1's whole turn
        for _ in 0..60 {
            if engine.state().turn.active_player == p2 {
                break;
            }
            let holder = engine.state().priority.unwrap();
            // Declarations are required before passing in combat steps
            match engine.state().turn.step {
                Step::DeclareAttackers if holder == engine.state().turn.active_player => {
                    engine
                        .submit_action(Action::DeclareAttackers {
                            actor: holder,
                            attackers: vec![],
                        })
                        .unwrap();
                }
                Step::DeclareBlockers if holder != engine.state().turn.active_player => {
                    engine
                        .submit_action(Action::DeclareBlockers {
                            actor: holder,
                            blocks: vec![],
                        })
                        .unwrap();
                }
                _ => {
                    engine.submit_action(Action::PassPriority { actor: holder }).unwrap();
                }
            }
        }
        assert_eq!(engine.state().turn.active_player, p2);
        assert_eq!(engine.state().turn.step, Step::Upkeep);
        // P2 draws on their first turn (not the starting player)
        assert_eq!(engine.state().zones(p2).unwrap().hand.len(), 7);
        pass_both(&mut engine);
        assert_eq!(engine.state().zones(p2).unwrap().hand.len(), 8);
    }
}
