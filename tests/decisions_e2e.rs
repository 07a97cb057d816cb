//! Pending decisions end to end: scry, searches, cleanup discard,
//! treasure tokens, extra turns

mod common;

use common::{base_state, give_card, give_mana, p1, p2};
use mtg_rules_engine::core::{Amount, CardDef, CardType, Effect, ManaCost, TokenKind};
use mtg_rules_engine::game::{Action, DecisionChoice, Engine, Step};
use mtg_rules_engine::EngineError;

/// Extends the shared pool with decision-heavy spells
fn decision_db() -> mtg_rules_engine::loader::CardDb {
    let mut db = common::test_db();

    let mut omen = CardDef::new("omen", "Omen");
    omen.types.insert(CardType::Instant);
    omen.mana_cost = ManaCost::from_string("U");
    omen.rules.effects.push(Effect::Scry {
        count: 2,
        then_draw: 1,
    });
    db.insert(omen).unwrap();

    let mut hoard = CardDef::new("hoard", "Hoard");
    hoard.types.insert(CardType::Instant);
    hoard.mana_cost = ManaCost::from_string("R");
    hoard.rules.effects.push(Effect::CreateToken {
        token: TokenKind::Treasure,
        count: Amount::fixed(2),
        attach_source: false,
        condition: None,
    });
    db.insert(hoard).unwrap();

    let mut walk = CardDef::new("walk", "Walk");
    walk.types.insert(CardType::Sorcery);
    walk.mana_cost = ManaCost::from_string("U");
    walk.rules.effects.push(Effect::GrantExtraTurn);
    db.insert(walk).unwrap();

    let mut growth_spurt = CardDef::new("spurt", "Spurt");
    growth_spurt.types.insert(CardType::Sorcery);
    growth_spurt.mana_cost = ManaCost::from_string("G");
    growth_spurt
        .rules
        .effects
        .push(Effect::SearchBasicLandToBattlefieldTapped { exile_target: None });
    db.insert(growth_spurt).unwrap();

    db
}

fn resolve_stack(engine: &mut Engine) {
    let holder = engine.state().priority.unwrap();
    let other = engine.state().other_player(holder);
    engine.submit_action(Action::PassPriority { actor: holder }).unwrap();
    engine.submit_action(Action::PassPriority { actor: other }).unwrap();
}

#[test]
fn test_scry_suspends_and_reorders_library() {
    let mut state = base_state(Step::Main1, p1(), p1());
    state.card_db = decision_db();
    let omen = give_card(&mut state, "omen", p1());
    give_mana(&mut state, p1(), "U");
    let mut engine = Engine::from_state(state);

    engine.submit_action(Action::cast_simple(p1(), omen)).unwrap();
    resolve_stack(&mut engine);

    // Resolution paused on the scry decision; only RESOLVE_DECISION works
    assert!(engine.state().pending_decision.is_some());
    let err = engine
        .submit_action(Action::PassPriority { actor: p1() })
        .unwrap_err();
    assert!(matches!(err, EngineError::PendingDecisionPreempts(_)));

    let top2: Vec<_> = engine.state().zones(p1()).unwrap().library.peek_top_n(2);
    let hand_before = engine.state().zones(p1()).unwrap().hand.len();

    // Bottom the first, keep the second on top, then draw it
    engine
        .submit_action(Action::ResolveDecision {
            actor: p1(),
            choice: DecisionChoice::Scry {
                top: vec![top2[1]],
                bottom: vec![top2[0]],
            },
        })
        .unwrap();

    assert!(engine.state().pending_decision.is_none());
    assert_eq!(engine.state().zones(p1()).unwrap().hand.len(), hand_before + 1);
    assert!(engine.state().zones(p1()).unwrap().hand.contains(top2[1]));
    // The bottomed card is at position 0 (bottom of the library)
    assert_eq!(engine.state().zones(p1()).unwrap().library.cards[0], top2[0]);
    // Spell finished resolving after the decision
    assert_eq!(engine.state().zones(p1()).unwrap().graveyard.len(), 1);
}

#[test]
fn test_scry_rejects_non_partition() {
    let mut state = base_state(Step::Main1, p1(), p1());
    state.card_db = decision_db();
    let omen = give_card(&mut state, "omen", p1());
    give_mana(&mut state, p1(), "U");
    let mut engine = Engine::from_state(state);

    engine.submit_action(Action::cast_simple(p1(), omen)).unwrap();
    resolve_stack(&mut engine);

    let err = engine
        .submit_action(Action::ResolveDecision {
            actor: p1(),
            choice: DecisionChoice::Scry {
                top: vec![],
                bottom: vec![],
            },
        })
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidTarget(_)));
    // Still pending after the bad submission
    assert!(engine.state().pending_decision.is_some());
}

#[test]
fn test_treasure_tokens_pay_for_anything() {
    let mut state = base_state(Step::Main1, p1(), p1());
    state.card_db = decision_db();
    let hoard = give_card(&mut state, "hoard", p1());
    let bear = give_card(&mut state, "bear", p1());
    give_mana(&mut state, p1(), "R");
    let mut engine = Engine::from_state(state);

    engine.submit_action(Action::cast_simple(p1(), hoard)).unwrap();
    resolve_stack(&mut engine);

    let treasures: Vec<_> = engine
        .state()
        .battlefield
        .values()
        .filter(|p| p.instance.is_token)
        .map(|p| p.id())
        .collect();
    assert_eq!(treasures.len(), 2);

    // Sacrifice both for any-color mana and cast the 1G bear
    for treasure in &treasures {
        engine
            .submit_action(Action::ActivateAbility {
                actor: p1(),
                source: *treasure,
                ability_index: 0,
                targets: vec![],
                x_value: 0,
                costs: Default::default(),
            })
            .unwrap();
    }
    assert_eq!(engine.state().player(p1()).unwrap().mana_pool.any, 2);
    // Tokens ceased to exist, not buried
    assert!(engine.state().zones(p1()).unwrap().graveyard.is_empty());

    engine.submit_action(Action::cast_simple(p1(), bear)).unwrap();
    resolve_stack(&mut engine);
    assert!(engine.state().battlefield.contains_key(&bear));
}

#[test]
fn test_extra_turn_queued_and_taken() {
    let mut state = base_state(Step::Main1, p1(), p1());
    state.card_db = decision_db();
    let walk = give_card(&mut state, "walk", p1());
    give_mana(&mut state, p1(), "U");
    let mut engine = Engine::from_state(state);

    engine.submit_action(Action::cast_simple(p1(), walk)).unwrap();
    resolve_stack(&mut engine);
    assert_eq!(engine.state().extra_turns, vec![p1()]);

    engine.submit_action(Action::SkipCombat { actor: p1() }).unwrap();
    engine.submit_action(Action::SkipMain2 { actor: p1() }).unwrap();
    // End step, then cleanup, then... P1 again
    engine.submit_action(Action::PassPriority { actor: p1() }).unwrap();
    engine.submit_action(Action::PassPriority { actor: p2() }).unwrap();

    assert_eq!(engine.state().turn.turn_number, 2);
    assert_eq!(engine.state().turn.active_player, p1());
    assert!(engine.state().extra_turns.is_empty());
}

#[test]
fn test_search_basic_land_decision() {
    let mut state = base_state(Step::Main1, p1(), p1());
    state.card_db = decision_db();
    let spurt = give_card(&mut state, "spurt", p1());
    give_mana(&mut state, p1(), "G");
    let mut engine = Engine::from_state(state);

    engine.submit_action(Action::cast_simple(p1(), spurt)).unwrap();
    resolve_stack(&mut engine);

    let pending = engine.state().pending_decision.clone().expect("search decision");
    assert_eq!(pending.actor, p1());
    // Pick the first offered land
    let choice = pending
        .options
        .iter()
        .find(|c| matches!(c, DecisionChoice::Card { .. }))
        .cloned()
        .expect("at least one basic land");
    let DecisionChoice::Card { instance_id } = choice else {
        unreachable!()
    };

    let library_before = engine.state().zones(p1()).unwrap().library.len();
    engine
        .submit_action(Action::ResolveDecision {
            actor: p1(),
            choice,
        })
        .unwrap();

    let perm = engine.state().perm(instance_id).unwrap();
    assert!(perm.tapped);
    assert_eq!(
        engine.state().zones(p1()).unwrap().library.len(),
        library_before - 1
    );
}

#[test]
fn test_cleanup_discard_to_hand_size() {
    let mut state = base_state(Step::End, p1(), p1());
    state.card_db = decision_db();
    // Overfill the hand: 9 cards
    let mut cards = Vec::new();
    for _ in 0..9 {
        cards.push(give_card(&mut state, "bear", p1()));
    }
    let mut engine = Engine::from_state(state);

    // Close the end step: cleanup requires discarding 2
    engine.submit_action(Action::PassPriority { actor: p1() }).unwrap();
    engine.submit_action(Action::PassPriority { actor: p2() }).unwrap();

    let pending = engine.state().pending_decision.clone().expect("discard decision");
    assert_eq!(pending.actor, p1());
    assert_eq!(pending.min, 2);

    // Wrong count is rejected
    let err = engine
        .submit_action(Action::ResolveDecision {
            actor: p1(),
            choice: DecisionChoice::Discard {
                cards: vec![cards[0]],
            },
        })
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidTarget(_)));

    engine
        .submit_action(Action::ResolveDecision {
            actor: p1(),
            choice: DecisionChoice::Discard {
                cards: vec![cards[0], cards[1]],
            },
        })
        .unwrap();

    assert_eq!(engine.state().zones(p1()).unwrap().hand.len(), 7);
    assert_eq!(engine.state().zones(p1()).unwrap().graveyard.len(), 2);
    // The turn moved on to P2
    assert_eq!(engine.state().turn.active_player, p2());
    assert_eq!(engine.state().turn.turn_number, 2);
}
