//! Shared fixtures for integration tests
//!
//! A small card pool exercising the phase-1 mechanics, plus helpers for
//! building mid-game states without replaying whole turns.

#![allow(dead_code)]

use mtg_rules_engine::core::{
    ActivatedAbility, Amount, CardDef, CardType, ContinuousTarget, Cost, CreatureStats, Duration,
    Effect, InstanceId, Keyword, ManaCost, PlayerId, Selector, Subtype, TargetSpec, TargetZone,
    TriggerKind, TriggeredAbility,
};
use mtg_rules_engine::game::phase::Step;
use mtg_rules_engine::game::resolve;
use mtg_rules_engine::game::state::GameState;
use mtg_rules_engine::loader::CardDb;

pub fn p1() -> PlayerId {
    PlayerId::new(0)
}

pub fn p2() -> PlayerId {
    PlayerId::new(1)
}

fn creature(id: &str, cost: &str, power: i32, toughness: i32, keywords: &[Keyword]) -> CardDef {
    let mut def = CardDef::new(id, id);
    def.types.insert(CardType::Creature);
    def.mana_cost = ManaCost::from_string(cost);
    def.creature_stats = Some(CreatureStats {
        base_power: power,
        base_toughness: toughness,
    });
    for k in keywords {
        def.rules.keywords.insert(*k);
    }
    def
}

/// Test pool: cheap costs so scenarios fit in one or two turns
pub fn test_db() -> CardDb {
    let mut db = CardDb::with_basics();

    db.insert(creature("bear", "1G", 2, 2, &[])).unwrap();
    db.insert(creature("slippery", "U", 1, 1, &[Keyword::Hexproof]))
        .unwrap();
    db.insert(creature("rhino", "G", 5, 5, &[Keyword::Trample]))
        .unwrap();
    db.insert(creature("duelist", "W", 3, 2, &[Keyword::FirstStrike]))
        .unwrap();
    db.insert(creature("brute", "B", 3, 3, &[Keyword::Menace]))
        .unwrap();
    db.insert(creature("wall", "W", 0, 4, &[Keyword::Defender]))
        .unwrap();

    // 2/2 with "when this creature enters, draw a card"
    let mut scout = creature("scout", "1G", 2, 2, &[]);
    scout.subtypes.insert(Subtype::new("Elf"));
    scout.rules.triggered_abilities.push(TriggeredAbility::new(
        TriggerKind::Etb,
        vec![Effect::DrawCards {
            amount: Amount::fixed(1),
            target: None,
        }],
    ));
    db.insert(scout).unwrap();

    // Creature with "{pay 1 life}: this creature gains hexproof until end
    // of turn"
    let mut guardian = creature("guardian", "G", 2, 3, &[]);
    guardian.rules.activated_abilities.push(ActivatedAbility::new(
        vec![Cost::PayLife { amount: 1 }],
        vec![Effect::AddKeyword {
            keyword: Keyword::Hexproof,
            target: ContinuousTarget::Source,
            duration: Duration::EndOfTurn,
            condition: None,
        }],
    ));
    db.insert(guardian).unwrap();

    // R instant: 3 damage to any target
    let mut bolt = CardDef::new("bolt", "Bolt");
    bolt.types.insert(CardType::Instant);
    bolt.mana_cost = ManaCost::from_string("R");
    bolt.rules.effects.push(Effect::DealDamage {
        amount: Amount::fixed(3),
        target: TargetSpec::any_target(),
    });
    db.insert(bolt).unwrap();

    // U instant: counter target spell
    let mut cancel = CardDef::new("cancel", "Cancel");
    cancel.types.insert(CardType::Instant);
    cancel.mana_cost = ManaCost::from_string("U");
    cancel.rules.effects.push(Effect::CounterSpell {
        target: TargetSpec::spell(),
        unless_pay: None,
    });
    db.insert(cancel).unwrap();

    // G sorcery: target creature gets +2/+2 until end of turn
    let mut growth = CardDef::new("growth", "Growth");
    growth.types.insert(CardType::Sorcery);
    growth.mana_cost = ManaCost::from_string("G");
    growth.rules.effects.push(Effect::ModifyPt {
        power: 2,
        toughness: 2,
        target: ContinuousTarget::Spec(TargetSpec::single(
            TargetZone::Battlefield,
            Selector::Creature,
        )),
        duration: Duration::EndOfTurn,
    });
    db.insert(growth).unwrap();

    db
}

/// Fresh state with stocked libraries, no opening hands, positioned at the
/// given step with priority where the scenario needs it.
pub fn base_state(step: Step, active: PlayerId, priority: PlayerId) -> GameState {
    let mut state = GameState::new_two_player(test_db(), "Alice", "Bob", 20, 7);
    for player in [p1(), p2()] {
        for _ in 0..10 {
            let id = state.alloc_instance("basic_forest", player, false);
            state.zones_mut(player).unwrap().library.add(id);
        }
    }
    state.turn.active_player = active;
    state.turn.step = step;
    state.priority = Some(priority);
    state
}

/// Put a creature onto the battlefield, optionally already able to attack
pub fn put_creature(state: &mut GameState, card: &str, owner: PlayerId, ready: bool) -> InstanceId {
    let id = state.alloc_instance(card, owner, false);
    resolve::enter_battlefield(state, id, owner, false).unwrap();
    if ready {
        let perm = state.perm_mut(id).unwrap();
        perm.summoning_sick = false;
        perm.entered_this_turn = false;
    }
    // Scenario setups place creatures directly; drop any setup triggers
    state.pending_triggers.clear();
    id
}

/// Put a card into a player's hand
pub fn give_card(state: &mut GameState, card: &str, owner: PlayerId) -> InstanceId {
    let id = state.alloc_instance(card, owner, false);
    state.zones_mut(owner).unwrap().hand.add(id);
    id
}

/// Fill the player's mana pool directly (scenario setup shortcut)
pub fn give_mana(state: &mut GameState, player: PlayerId, spec: &str) {
    let cost = ManaCost::from_string(spec);
    let pool = &mut state.player_mut(player).unwrap().mana_pool;
    pool.add(mtg_rules_engine::core::Color::White, cost.white);
    pool.add(mtg_rules_engine::core::Color::Blue, cost.blue);
    pool.add(mtg_rules_engine::core::Color::Black, cost.black);
    pool.add(mtg_rules_engine::core::Color::Red, cost.red);
    pool.add(mtg_rules_engine::core::Color::Green, cost.green);
    for _ in 0..cost.generic {
        pool.add_any(1);
    }
}
