//! State-based actions
//!
//! Run after every resolution and between every substep that mutates
//! state. Each pass discovers all applicable actions against a single
//! derived snapshot, applies them, then repeats until a fixed point:
//! running the pass on the post-pass state produces no further change.

use crate::core::{InstanceId, Keyword, LossReason};
use crate::game::derived;
use crate::game::resolve;
use crate::game::state::GameState;
use crate::Result;

/// Run state-based actions to a fixed point
pub fn apply(state: &mut GameState) -> Result<()> {
    apply_with_deathtouch(state, &[])
}

/// Run state-based actions; `deathtouch_marked` names creatures dealt
/// damage by a deathtouch source since the last pass.
pub fn apply_with_deathtouch(state: &mut GameState, deathtouch_marked: &[InstanceId]) -> Result<()> {
    let mut marked: Vec<InstanceId> = deathtouch_marked.to_vec();
    loop {
        let changed = one_pass(state, &marked)?;
        // Deathtouch marks are consumed by the first pass
        marked.clear();
        if !changed {
            break;
        }
    }
    check_win(state);
    Ok(())
}

fn one_pass(state: &mut GameState, deathtouch_marked: &[InstanceId]) -> Result<bool> {
    let derived = derived::compute(state);
    let mut to_destroy: Vec<InstanceId> = Vec::new();

    for (&id, d) in derived.iter() {
        let Some(toughness) = d.toughness else {
            continue;
        };
        // Zero or less toughness is not "damage": indestructible does not
        // save the creature
        if toughness <= 0 {
            to_destroy.push(id);
            continue;
        }
        let indestructible = d.keywords.contains(&Keyword::Indestructible);
        let damage = state.perm(id)?.damage_marked;
        if damage >= toughness && !indestructible {
            to_destroy.push(id);
            continue;
        }
        if deathtouch_marked.contains(&id) && damage > 0 && !indestructible {
            to_destroy.push(id);
        }
    }

    let mut changed = false;
    for id in to_destroy {
        if state.battlefield.contains_key(&id) {
            resolve::destroy_permanent(state, id)?;
            changed = true;
        }
    }

    // Auras attached to an illegal or missing host go to the graveyard
    let aura_checks: Vec<(InstanceId, Option<InstanceId>)> = state
        .battlefield
        .values()
        .filter(|p| state.def_of(p.id()).map(|d| d.is_aura()).unwrap_or(false))
        .map(|p| (p.id(), p.attached_to))
        .collect();
    for (aura, host) in aura_checks {
        let legal = host
            .map(|h| state.battlefield.contains_key(&h) && state.is_creature(h))
            .unwrap_or(false);
        if !legal {
            resolve::destroy_permanent(state, aura)?;
            changed = true;
        }
    }

    // Equipment attached to an illegal host detaches but stays
    let equipment_checks: Vec<(InstanceId, Option<InstanceId>)> = state
        .battlefield
        .values()
        .filter(|p| {
            state
                .def_of(p.id())
                .map(|d| d.is_equipment())
                .unwrap_or(false)
        })
        .map(|p| (p.id(), p.attached_to))
        .collect();
    for (equipment, host) in equipment_checks {
        let Some(host) = host else { continue };
        let legal = state.battlefield.contains_key(&host) && state.is_creature(host);
        if !legal {
            state.perm_mut(equipment)?.attached_to = None;
            changed = true;
        }
    }

    // Player loss from life total (decking is marked where the draw failed)
    for player in state.player_ids() {
        let p = state.player(player)?;
        if p.life <= 0 && !p.has_lost {
            state.player_mut(player)?.mark_lost(LossReason::Life);
            changed = true;
        }
    }

    Ok(changed)
}

fn check_win(state: &mut GameState) {
    if state.is_game_over() {
        return;
    }
    let [p1, p2] = state.player_ids();
    let p1_lost = state.player(p1).map(|p| p.has_lost).unwrap_or(false);
    let p2_lost = state.player(p2).map(|p| p.has_lost).unwrap_or(false);
    if p1_lost {
        let reason = state
            .player(p1)
            .ok()
            .and_then(|p| p.loss_reason)
            .unwrap_or(LossReason::Life);
        state.end_game(p2, reason);
    } else if p2_lost {
        let reason = state
            .player(p2)
            .ok()
            .and_then(|p| p.loss_reason)
            .unwrap_or(LossReason::Life);
        state.end_game(p1, reason);
    }
}
