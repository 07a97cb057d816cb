//! Targeting and timing rules end to end
//!
//! Covers the hexproof-rejection and counter-with-illegal-target seed
//! scenarios, plus the sorcery-speed and summoning-sickness boundaries.

mod common;

use common::{base_state, give_card, give_mana, p1, p2, put_creature};
use mtg_rules_engine::game::{Action, Engine, Step, TargetRef};
use mtg_rules_engine::EngineError;

#[test]
fn test_hexproof_rejected_at_cast() {
    let mut state = base_state(Step::Main1, p1(), p1());
    let slippery = put_creature(&mut state, "slippery", p2(), true);
    let bolt = give_card(&mut state, "bolt", p1());
    give_mana(&mut state, p1(), "R");
    let mut engine = Engine::from_state(state);

    let err = engine
        .submit_action(Action::cast_targeted(
            p1(),
            bolt,
            TargetRef::Permanent {
                instance_id: slippery,
            },
        ))
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidTarget(_)));

    // Nothing changed: creature alive, bolt in hand, mana unspent
    assert!(engine.state().battlefield.contains_key(&slippery));
    assert!(engine.state().zones(p1()).unwrap().hand.contains(bolt));
    assert_eq!(engine.state().player(p1()).unwrap().mana_pool.red, 1);
    assert!(engine.state().stack.is_empty());
}

#[test]
fn test_own_hexproof_creature_targetable() {
    let mut state = base_state(Step::Main1, p2(), p2());
    let slippery = put_creature(&mut state, "slippery", p2(), true);
    let growth = give_card(&mut state, "growth", p2());
    give_mana(&mut state, p2(), "G");
    let mut engine = Engine::from_state(state);

    engine
        .submit_action(Action::cast_targeted(
            p2(),
            growth,
            TargetRef::Permanent {
                instance_id: slippery,
            },
        ))
        .unwrap();
    assert_eq!(engine.state().stack.len(), 1);
}

#[test]
fn test_hexproof_gained_in_response_fizzles_spell() {
    let mut state = base_state(Step::Main1, p1(), p1());
    let guardian = put_creature(&mut state, "guardian", p2(), true);
    let bolt = give_card(&mut state, "bolt", p1());
    give_mana(&mut state, p1(), "R");
    let mut engine = Engine::from_state(state);

    engine
        .submit_action(Action::cast_targeted(
            p1(),
            bolt,
            TargetRef::Permanent {
                instance_id: guardian,
            },
        ))
        .unwrap();

    // In response, P2 grants the creature hexproof (pay 1 life)
    engine
        .submit_action(Action::ActivateAbility {
            actor: p2(),
            source: guardian,
            ability_index: 0,
            targets: vec![],
            x_value: 0,
            costs: Default::default(),
        })
        .unwrap();
    assert_eq!(engine.state().stack.len(), 2);

    // Let the hexproof ability resolve, then the bolt
    engine.submit_action(Action::PassPriority { actor: p1() }).unwrap();
    engine.submit_action(Action::PassPriority { actor: p2() }).unwrap();
    assert_eq!(engine.state().stack.len(), 1);
    engine.submit_action(Action::PassPriority { actor: p1() }).unwrap();
    engine.submit_action(Action::PassPriority { actor: p2() }).unwrap();

    // All targets illegal at resolution: countered by game rules. The
    // creature is untouched and the bolt still went to the graveyard
    // (its cost stays paid).
    assert!(engine.state().battlefield.contains_key(&guardian));
    assert_eq!(engine.state().perm(guardian).unwrap().damage_marked, 0);
    assert_eq!(engine.state().player(p2()).unwrap().life, 19); // paid 1 life
    assert_eq!(engine.state().zones(p1()).unwrap().graveyard.len(), 1);
    assert!(engine.state().player(p1()).unwrap().mana_pool.is_empty());
}

#[test]
fn test_counterspell_removes_spell_with_cost_paid() {
    let mut state = base_state(Step::Main1, p1(), p1());
    let scout = give_card(&mut state, "scout", p1());
    give_mana(&mut state, p1(), "1G");
    let cancel = give_card(&mut state, "cancel", p2());
    give_mana(&mut state, p2(), "U");
    let mut engine = Engine::from_state(state);

    engine.submit_action(Action::cast_simple(p1(), scout)).unwrap();
    engine
        .submit_action(Action::cast_targeted(
            p2(),
            cancel,
            TargetRef::Spell { instance_id: scout },
        ))
        .unwrap();

    // Cancel resolves first, countering the scout
    engine.submit_action(Action::PassPriority { actor: p1() }).unwrap();
    engine.submit_action(Action::PassPriority { actor: p2() }).unwrap();

    assert!(engine.state().stack.is_empty());
    assert!(engine.state().battlefield.is_empty());
    // Scout in P1's graveyard; mana stays spent
    assert_eq!(engine.state().zones(p1()).unwrap().graveyard.len(), 1);
    assert!(engine.state().player(p1()).unwrap().mana_pool.is_empty());
}

#[test]
fn test_sorcery_speed_enforced() {
    // Sorcery during the opponent's turn is rejected
    let mut state = base_state(Step::Main1, p1(), p2());
    put_creature(&mut state, "bear", p2(), true);
    let growth = give_card(&mut state, "growth", p2());
    give_mana(&mut state, p2(), "G");
    let mut engine = Engine::from_state(state);

    let target = *engine.state().battlefield.keys().next().unwrap();
    let err = engine
        .submit_action(Action::cast_targeted(
            p2(),
            growth,
            TargetRef::Permanent {
                instance_id: target,
            },
        ))
        .unwrap_err();
    assert!(matches!(err, EngineError::IllegalTiming(_)));
}

#[test]
fn test_sorcery_rejected_with_nonempty_stack() {
    let mut state = base_state(Step::Main1, p1(), p1());
    let bear = put_creature(&mut state, "bear", p1(), true);
    let bolt = give_card(&mut state, "bolt", p1());
    let growth = give_card(&mut state, "growth", p1());
    give_mana(&mut state, p1(), "RG");
    let mut engine = Engine::from_state(state);

    engine
        .submit_action(Action::cast_targeted(
            p1(),
            bolt,
            TargetRef::Player { player_id: p2() },
        ))
        .unwrap();
    // Priority came back around to P1 holding a non-empty stack
    engine.submit_action(Action::PassPriority { actor: p2() }).unwrap();

    let err = engine
        .submit_action(Action::cast_targeted(
            p1(),
            growth,
            TargetRef::Permanent { instance_id: bear },
        ))
        .unwrap_err();
    assert!(matches!(err, EngineError::IllegalTiming(_)));
}

#[test]
fn test_instant_allowed_on_opponent_turn() {
    let mut state = base_state(Step::Main1, p1(), p2());
    let bolt = give_card(&mut state, "bolt", p2());
    give_mana(&mut state, p2(), "R");
    let mut engine = Engine::from_state(state);

    engine
        .submit_action(Action::cast_targeted(
            p2(),
            bolt,
            TargetRef::Player { player_id: p1() },
        ))
        .unwrap();
    assert_eq!(engine.state().stack.len(), 1);
}

#[test]
fn test_summoning_sick_attacker_rejected_and_excluded() {
    let mut state = base_state(Step::DeclareAttackers, p1(), p1());
    let fresh = put_creature(&mut state, "bear", p1(), false); // just arrived
    let mut engine = Engine::from_state(state);

    // The schema never offers the sick creature as an attacker
    let schema = engine.get_action_schema(p1());
    let attack = schema.attack.expect("attack template");
    assert!(!attack.candidates.contains(&fresh));

    // An injected declaration is rejected all the same
    let err = engine
        .submit_action(Action::DeclareAttackers {
            actor: p1(),
            attackers: vec![fresh],
        })
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidTarget(_)));
}
