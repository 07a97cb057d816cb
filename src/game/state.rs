//! Main game state structure
//!
//! The engine owns this structure exclusively; surfaces only ever see the
//! per-player `VisibleState` projection. Everything here is serde-
//! serializable so a game can be snapshotted and replayed byte-for-byte.

use crate::core::{
    CardDef, CardId, CardInstance, Effect, EntityStore, InstanceId, LossReason, Player, PlayerId,
    PlayerName,
};
use crate::game::actions::TargetGroups;
use crate::game::combat::CombatState;
use crate::game::decisions::PendingDecision;
use crate::game::logger::GameLogger;
use crate::game::phase::{Step, TurnState};
use crate::game::triggers::PendingTrigger;
use crate::loader::CardDb;
use crate::zones::PlayerZones;
use crate::{EngineError, Result};
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// An unresolved spell or ability on the stack (top = last)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StackItem {
    Spell {
        instance: InstanceId,
        controller: PlayerId,
        targets: TargetGroups,
        /// X locked at cast time, observable to all effects referencing X
        x_value: u8,
        /// Cast via flashback: exiles instead of going to the graveyard
        flashback: bool,
        /// Copies resolve their effects then cease to exist
        is_copy: bool,
        /// Total toughness of creatures sacrificed while paying the cost
        sacrificed_toughness: i32,
    },
    Ability {
        source: InstanceId,
        controller: PlayerId,
        effects: Vec<Effect>,
        targets: TargetGroups,
        x_value: u8,
        sacrificed_toughness: i32,
    },
}

impl StackItem {
    pub fn controller(&self) -> PlayerId {
        match self {
            StackItem::Spell { controller, .. } | StackItem::Ability { controller, .. } => {
                *controller
            }
        }
    }

    /// The spell's card instance, if this is a spell
    pub fn spell_instance(&self) -> Option<InstanceId> {
        match self {
            StackItem::Spell { instance, .. } => Some(*instance),
            StackItem::Ability { .. } => None,
        }
    }

    pub fn targets(&self) -> &TargetGroups {
        match self {
            StackItem::Spell { targets, .. } | StackItem::Ability { targets, .. } => targets,
        }
    }

    pub fn targets_mut(&mut self) -> &mut TargetGroups {
        match self {
            StackItem::Spell { targets, .. } | StackItem::Ability { targets, .. } => targets,
        }
    }

    pub fn x_value(&self) -> u8 {
        match self {
            StackItem::Spell { x_value, .. } | StackItem::Ability { x_value, .. } => *x_value,
        }
    }

    pub fn sacrificed_toughness(&self) -> i32 {
        match self {
            StackItem::Spell {
                sacrificed_toughness,
                ..
            }
            | StackItem::Ability {
                sacrificed_toughness,
                ..
            } => *sacrificed_toughness,
        }
    }
}

/// A continuous modifier with an expiry
///
/// `source` carries the creating permanent so removal on expiry is a
/// set-subtract; `created_seq` orders application within the derived pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemporaryEffect {
    pub effect: Effect,
    pub source: Option<InstanceId>,
    pub controller: Option<PlayerId>,
    /// Last turn number this effect is active
    pub expires_turn: u32,
    /// Within `expires_turn`, active through this step (whole turn if None)
    pub expires_step: Option<Step>,
    pub created_seq: u32,
}

impl TemporaryEffect {
    pub fn is_active(&self, turn: &TurnState) -> bool {
        if turn.turn_number > self.expires_turn {
            return false;
        }
        if turn.turn_number < self.expires_turn {
            return true;
        }
        match self.expires_step {
            None => true,
            Some(step) => turn.step.order() <= step.order(),
        }
    }
}

/// Terminal result of a game
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameOutcome {
    pub winner: PlayerId,
    pub reason: LossReason,
}

/// Complete game state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameState {
    /// Stable identifier for this game's journal. Derived from the seed
    /// so replays produce the same id.
    pub game_id: String,

    /// Read-only card database (part of the replayable state)
    pub card_db: CardDb,

    /// All card instances in the game, keyed by instance id
    pub instances: EntityStore<CardInstance>,

    /// Exactly two players (index = turn order)
    pub players: Vec<Player>,

    /// Hidden/ordered zones per player
    pub player_zones: Vec<(PlayerId, PlayerZones)>,

    /// Shared battlefield; BTreeMap for deterministic iteration
    pub battlefield: BTreeMap<InstanceId, crate::game::permanent::Permanent>,

    /// The stack (top = last)
    pub stack: Vec<StackItem>,

    /// Shared exile zone
    pub exile: Vec<InstanceId>,

    /// Exiled card -> the permanent that exiled it ("until ... leaves")
    pub exile_links: BTreeMap<InstanceId, InstanceId>,

    pub turn: TurnState,
    pub starting_player: PlayerId,

    /// Unique priority holder, or None during untap/cleanup duties
    pub priority: Option<PlayerId>,
    /// Consecutive priority passes (2 = window closes)
    pub pass_streak: u8,

    pub combat: CombatState,

    pub temporary_effects: Vec<TemporaryEffect>,
    next_temp_seq: u32,

    pub pending_decision: Option<PendingDecision>,

    /// Triggers collected since the last priority window opened
    pub pending_triggers: Vec<PendingTrigger>,
    next_trigger_seq: u32,

    /// Players owed extra turns after the current one
    pub extra_turns: Vec<PlayerId>,

    /// Damage dealt to each player this turn
    pub damage_dealt_to_players: BTreeMap<PlayerId, i32>,

    /// Single RNG stream for all shuffles and random choices
    pub rng: Xoshiro256PlusPlus,
    pub rng_seed: u64,

    next_instance_id: u32,

    pub outcome: Option<GameOutcome>,

    pub logger: GameLogger,
}

impl GameState {
    /// Create a new game with two players and empty zones
    pub fn new_two_player(
        card_db: CardDb,
        player1_name: impl Into<PlayerName>,
        player2_name: impl Into<PlayerName>,
        starting_life: i32,
        seed: u64,
    ) -> Self {
        let p1_id = PlayerId::new(0);
        let p2_id = PlayerId::new(1);

        let players = vec![
            Player::new(p1_id, player1_name, starting_life),
            Player::new(p2_id, player2_name, starting_life),
        ];

        let player_zones = vec![
            (p1_id, PlayerZones::new(p1_id)),
            (p2_id, PlayerZones::new(p2_id)),
        ];

        let mut damage = BTreeMap::new();
        damage.insert(p1_id, 0);
        damage.insert(p2_id, 0);

        GameState {
            game_id: format!("game-{:016x}", seed),
            card_db,
            instances: EntityStore::new(),
            players,
            player_zones,
            battlefield: BTreeMap::new(),
            stack: Vec::new(),
            exile: Vec::new(),
            exile_links: BTreeMap::new(),
            turn: TurnState::new(p1_id),
            starting_player: p1_id,
            priority: Some(p1_id),
            pass_streak: 0,
            combat: CombatState::new(),
            temporary_effects: Vec::new(),
            next_temp_seq: 0,
            pending_decision: None,
            pending_triggers: Vec::new(),
            next_trigger_seq: 0,
            extra_turns: Vec::new(),
            damage_dealt_to_players: damage,
            rng: Xoshiro256PlusPlus::seed_from_u64(seed),
            rng_seed: seed,
            next_instance_id: 0,
            outcome: None,
            logger: GameLogger::new(),
        }
    }

    // ---- players ----

    pub fn player(&self, id: PlayerId) -> Result<&Player> {
        self.players
            .iter()
            .find(|p| p.id == id)
            .ok_or_else(|| EngineError::UnknownObject(format!("player {}", id)))
    }

    pub fn player_mut(&mut self, id: PlayerId) -> Result<&mut Player> {
        self.players
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| EngineError::UnknownObject(format!("player {}", id)))
    }

    /// The other player in a two-player game
    pub fn other_player(&self, id: PlayerId) -> PlayerId {
        if id == PlayerId::new(0) {
            PlayerId::new(1)
        } else {
            PlayerId::new(0)
        }
    }

    pub fn player_ids(&self) -> [PlayerId; 2] {
        [self.players[0].id, self.players[1].id]
    }

    // ---- zones ----

    pub fn zones(&self, id: PlayerId) -> Result<&PlayerZones> {
        self.player_zones
            .iter()
            .find(|(pid, _)| *pid == id)
            .map(|(_, z)| z)
            .ok_or_else(|| EngineError::UnknownObject(format!("zones of player {}", id)))
    }

    pub fn zones_mut(&mut self, id: PlayerId) -> Result<&mut PlayerZones> {
        self.player_zones
            .iter_mut()
            .find(|(pid, _)| *pid == id)
            .map(|(_, z)| z)
            .ok_or_else(|| EngineError::UnknownObject(format!("zones of player {}", id)))
    }

    // ---- instances and definitions ----

    /// Create a fresh card instance
    pub fn alloc_instance(
        &mut self,
        card_id: impl Into<CardId>,
        owner: PlayerId,
        is_token: bool,
    ) -> InstanceId {
        let id = InstanceId::new(self.next_instance_id);
        self.next_instance_id += 1;
        let mut inst = CardInstance::new(id, card_id, owner);
        inst.is_token = is_token;
        self.instances.insert(id, inst);
        id
    }

    /// Re-issue a card instance under a fresh id.
    ///
    /// Applied whenever a permanent leaves the battlefield or a spell
    /// leaves the stack for a non-public zone: the object loses its old
    /// identity and anything referring to the old id no longer finds it.
    pub fn reissue_instance(&mut self, old: InstanceId) -> Result<InstanceId> {
        let inst = self
            .instances
            .remove(old)
            .ok_or_else(|| EngineError::UnknownObject(format!("instance {}", old)))?;
        let id = InstanceId::new(self.next_instance_id);
        self.next_instance_id += 1;
        let mut fresh = inst;
        fresh.id = id;
        self.instances.insert(id, fresh);
        Ok(id)
    }

    pub fn instance(&self, id: InstanceId) -> Result<&CardInstance> {
        self.instances.get(id)
    }

    pub fn def(&self, card_id: &CardId) -> Result<&CardDef> {
        self.card_db
            .get(card_id)
            .ok_or_else(|| EngineError::UnknownObject(format!("card {}", card_id)))
    }

    /// Card definition for an instance
    pub fn def_of(&self, id: InstanceId) -> Result<&CardDef> {
        let inst = self.instances.get(id)?;
        self.def(&inst.card_id)
    }

    // ---- battlefield ----

    pub fn perm(&self, id: InstanceId) -> Result<&crate::game::permanent::Permanent> {
        self.battlefield
            .get(&id)
            .ok_or_else(|| EngineError::UnknownObject(format!("permanent {}", id)))
    }

    pub fn perm_mut(&mut self, id: InstanceId) -> Result<&mut crate::game::permanent::Permanent> {
        self.battlefield
            .get_mut(&id)
            .ok_or_else(|| EngineError::UnknownObject(format!("permanent {}", id)))
    }

    pub fn is_creature(&self, id: InstanceId) -> bool {
        self.def_of(id).map(|d| d.is_creature()).unwrap_or(false)
    }

    /// Attachments grouped by host
    pub fn attachments_by_host(&self) -> BTreeMap<InstanceId, Vec<InstanceId>> {
        let mut out: BTreeMap<InstanceId, Vec<InstanceId>> = BTreeMap::new();
        for perm in self.battlefield.values() {
            if let Some(host) = perm.attached_to {
                out.entry(host).or_default().push(perm.id());
            }
        }
        out
    }

    /// Does `player` control a permanent with the given subtype?
    pub fn controls_subtype(&self, player: PlayerId, subtype: &crate::core::Subtype) -> bool {
        self.battlefield.values().any(|perm| {
            perm.controller == player
                && self
                    .def_of(perm.id())
                    .map(|d| d.has_subtype(subtype))
                    .unwrap_or(false)
        })
    }

    /// Count permanents with a subtype, optionally restricted to one
    /// controller, optionally excluding one permanent
    pub fn count_subtype(
        &self,
        subtype: &crate::core::Subtype,
        controller: Option<PlayerId>,
        exclude: Option<InstanceId>,
    ) -> u32 {
        self.battlefield
            .values()
            .filter(|perm| {
                if Some(perm.id()) == exclude {
                    return false;
                }
                if let Some(c) = controller {
                    if perm.controller != c {
                        return false;
                    }
                }
                self.def_of(perm.id())
                    .map(|d| d.has_subtype(subtype))
                    .unwrap_or(false)
            })
            .count() as u32
    }

    // ---- cards moving ----

    /// Draw `n` cards; drawing from an empty library marks the loss
    /// (applied at the next state-based-action pass)
    pub fn draw_cards(&mut self, player: PlayerId, n: u32) -> Result<()> {
        for _ in 0..n {
            let drawn = self.zones_mut(player)?.library.draw_top();
            match drawn {
                Some(card) => {
                    self.zones_mut(player)?.hand.add(card);
                }
                None => {
                    self.logger
                        .log(format!("Player {} tried to draw from an empty library", player));
                    self.player_mut(player)?.mark_lost(LossReason::Decked);
                    return Ok(());
                }
            }
        }
        Ok(())
    }

    /// Move a battlefield or stack card into its owner's graveyard,
    /// re-issuing its identity. Tokens cease to exist instead.
    /// Returns the fresh graveyard instance id for real cards.
    pub fn put_in_graveyard(&mut self, id: InstanceId) -> Result<Option<InstanceId>> {
        let inst = self.instances.get(id)?;
        if inst.is_token {
            self.instances.remove(id);
            return Ok(None);
        }
        let owner = inst.owner;
        let fresh = self.reissue_instance(id)?;
        self.zones_mut(owner)?.graveyard.add(fresh);
        Ok(Some(fresh))
    }

    /// Move a battlefield card into its owner's hand, re-issuing its
    /// identity. Tokens cease to exist.
    pub fn put_in_hand(&mut self, id: InstanceId) -> Result<Option<InstanceId>> {
        let inst = self.instances.get(id)?;
        if inst.is_token {
            self.instances.remove(id);
            return Ok(None);
        }
        let owner = inst.owner;
        let fresh = self.reissue_instance(id)?;
        self.zones_mut(owner)?.hand.add(fresh);
        Ok(Some(fresh))
    }

    // ---- per-step housekeeping ----

    /// Mana pools empty at the end of each step/phase
    pub fn clear_mana_pools(&mut self) {
        for p in &mut self.players {
            p.mana_pool.clear();
        }
    }

    /// Remove temporary effects that are no longer active
    pub fn expire_temporary_effects(&mut self) {
        let turn = self.turn.clone();
        self.temporary_effects.retain(|t| t.is_active(&turn));
    }

    pub fn add_temporary_effect(
        &mut self,
        effect: Effect,
        source: Option<InstanceId>,
        controller: Option<PlayerId>,
        expires_turn: u32,
        expires_step: Option<Step>,
    ) {
        let seq = self.next_temp_seq;
        self.next_temp_seq += 1;
        self.temporary_effects.push(TemporaryEffect {
            effect,
            source,
            controller,
            expires_turn,
            expires_step,
            created_seq: seq,
        });
    }

    pub fn queue_trigger(&mut self, source: InstanceId, controller: PlayerId, effects: Vec<Effect>) {
        let seq = self.next_trigger_seq;
        self.next_trigger_seq += 1;
        self.pending_triggers.push(PendingTrigger {
            source,
            controller,
            effects,
            seq,
        });
    }

    // ---- end conditions ----

    pub fn is_game_over(&self) -> bool {
        self.outcome.is_some()
    }

    pub fn end_game(&mut self, winner: PlayerId, reason: LossReason) {
        if self.outcome.is_some() {
            return;
        }
        self.outcome = Some(GameOutcome { winner, reason });
        self.logger
            .log(format!("Game over. Winner: {} ({:?})", winner, reason));
    }

    pub fn log(&self, msg: impl Into<String>) {
        self.logger.log(msg);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::CardDb;

    fn empty_state() -> GameState {
        GameState::new_two_player(CardDb::with_basics(), "Alice", "Bob", 20, 42)
    }

    #[test]
    fn test_game_creation() {
        let game = empty_state();
        assert_eq!(game.players.len(), 2);
        assert_eq!(game.turn.turn_number, 1);
        assert_eq!(game.turn.step, Step::Untap);
        assert_eq!(game.priority, Some(PlayerId::new(0)));
        assert!(!game.is_game_over());
    }

    #[test]
    fn test_other_player() {
        let game = empty_state();
        assert_eq!(game.other_player(PlayerId::new(0)), PlayerId::new(1));
        assert_eq!(game.other_player(PlayerId::new(1)), PlayerId::new(0));
    }

    #[test]
    fn test_draw_and_decking() {
        let mut game = empty_state();
        let p1 = PlayerId::new(0);

        let card = game.alloc_instance("basic_forest", p1, false);
        game.zones_mut(p1).unwrap().library.add(card);

        game.draw_cards(p1, 1).unwrap();
        assert!(game.zones(p1).unwrap().hand.contains(card));

        // Drawing again decks the player
        game.draw_cards(p1, 1).unwrap();
        assert!(game.player(p1).unwrap().has_lost);
        assert_eq!(
            game.player(p1).unwrap().loss_reason,
            Some(LossReason::Decked)
        );
    }

    #[test]
    fn test_reissue_changes_identity() {
        let mut game = empty_state();
        let p1 = PlayerId::new(0);
        let card = game.alloc_instance("basic_forest", p1, false);

        let fresh = game.reissue_instance(card).unwrap();
        assert_ne!(card, fresh);
        assert!(game.instance(card).is_err());
        assert_eq!(game.instance(fresh).unwrap().card_id.as_str(), "basic_forest");
    }

    #[test]
    fn test_token_ceases_in_graveyard() {
        let mut game = empty_state();
        let p1 = PlayerId::new(0);
        let token = game.alloc_instance("token_treasure", p1, true);

        let buried = game.put_in_graveyard(token).unwrap();
        assert!(buried.is_none());
        assert!(game.instance(token).is_err());
        assert!(game.zones(p1).unwrap().graveyard.is_empty());
    }

    #[test]
    fn test_temporary_effect_expiry() {
        let mut game = empty_state();
        game.add_temporary_effect(
            Effect::AttackTax { amount: 2 },
            None,
            Some(PlayerId::new(0)),
            1,
            None,
        );
        assert_eq!(game.temporary_effects.len(), 1);
        assert!(game.temporary_effects[0].is_active(&game.turn));

        game.turn.next_turn(PlayerId::new(1));
        game.expire_temporary_effects();
        assert!(game.temporary_effects.is_empty());
    }
}
