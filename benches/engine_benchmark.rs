//! Engine throughput benchmarks
//!
//! Measures full-game throughput with scripted pass-heavy turns and the
//! hot derived-battlefield recomputation path.

use criterion::{criterion_group, criterion_main, Criterion};
use mtg_rules_engine::core::PlayerId;
use mtg_rules_engine::game::{Action, Engine, Step};
use mtg_rules_engine::loader::{CardDb, DeckList};

fn forest_deck() -> DeckList {
    DeckList::new("forests").add("Forest", 40)
}

fn play_turns(seed: u64, turns: u32) -> Engine {
    let db = CardDb::with_basics();
    let mut engine =
        Engine::new_game(&db, "Alice", &forest_deck(), "Bob", &forest_deck(), seed).unwrap();

    while engine.state().turn.turn_number <= turns && engine.game_over().is_none() {
        let Some(holder) = engine.state().priority else {
            break;
        };
        let active = engine.state().turn.active_player;
        let action = match engine.state().turn.step {
            Step::DeclareAttackers
                if holder == active && !engine.state().combat.attackers_declared =>
            {
                Action::DeclareAttackers {
                    actor: holder,
                    attackers: vec![],
                }
            }
            Step::DeclareBlockers
                if holder != active && !engine.state().combat.blockers_declared =>
            {
                Action::DeclareBlockers {
                    actor: holder,
                    blocks: vec![],
                }
            }
            Step::Main1 if holder == active => {
                let land = engine
                    .state()
                    .zones(holder)
                    .unwrap()
                    .hand
                    .cards
                    .first()
                    .copied();
                match land {
                    Some(card)
                        if engine.state().player(holder).unwrap().can_play_land() =>
                    {
                        Action::PlayLand {
                            actor: holder,
                            card,
                        }
                    }
                    _ => Action::PassPriority { actor: holder },
                }
            }
            _ => Action::PassPriority { actor: holder },
        };
        if engine.submit_action(action).is_err() {
            break;
        }
    }
    engine
}

fn bench_scripted_turns(c: &mut Criterion) {
    c.bench_function("ten_turns_of_land_drops", |b| {
        b.iter(|| play_turns(42, 10))
    });
}

fn bench_visible_state(c: &mut Criterion) {
    let engine = play_turns(42, 6);
    c.bench_function("visible_state_projection", |b| {
        b.iter(|| engine.visible_state(PlayerId::new(0)))
    });
}

fn bench_action_enumeration(c: &mut Criterion) {
    let engine = play_turns(42, 6);
    let player = engine.state().priority.unwrap_or(PlayerId::new(0));
    c.bench_function("get_actions", |b| b.iter(|| engine.get_actions(player)));
}

criterion_group!(
    benches,
    bench_scripted_turns,
    bench_visible_state,
    bench_action_enumeration
);
criterion_main!(benches);
