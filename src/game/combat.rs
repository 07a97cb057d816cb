//! Combat declarations state
//!
//! Tracks the attacker set and blocker mapping for the current combat
//! phase. Declaration order is preserved: attackers deal damage to their
//! blockers in the order those blockers were declared (engine-defined,
//! not player-chosen). Reset at end of combat.
//!
//! Damage resolution itself lives in the engine (it needs the derived
//! battlefield and trigger collection).

use crate::core::{InstanceId, PlayerId};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::collections::BTreeMap;

/// Combat state for the current combat phase
///
/// BTreeMap keys give deterministic iteration; the per-attacker blocker
/// lists preserve declaration order.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CombatState {
    /// Attacking creatures in declaration order
    pub attackers: Vec<InstanceId>,

    /// Attacker -> blockers (in blocker declaration order)
    pub blockers: BTreeMap<InstanceId, SmallVec<[InstanceId; 2]>>,

    /// The player being attacked
    pub defending_player: Option<PlayerId>,

    pub attackers_declared: bool,
    pub blockers_declared: bool,
}

impl CombatState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the atomic attacker declaration
    pub fn declare_attackers(&mut self, attackers: Vec<InstanceId>, defender: PlayerId) {
        self.attackers = attackers;
        self.blockers.clear();
        self.defending_player = Some(defender);
        self.attackers_declared = true;
        self.blockers_declared = false;
    }

    /// Record the atomic blocker declaration
    pub fn declare_blockers(&mut self, mapping: BTreeMap<InstanceId, SmallVec<[InstanceId; 2]>>) {
        self.blockers = mapping;
        self.blockers_declared = true;
    }

    pub fn is_attacking(&self, id: InstanceId) -> bool {
        self.attackers.contains(&id)
    }

    pub fn is_blocked(&self, attacker: InstanceId) -> bool {
        self.blockers
            .get(&attacker)
            .is_some_and(|blockers| !blockers.is_empty())
    }

    pub fn blockers_of(&self, attacker: InstanceId) -> &[InstanceId] {
        self.blockers
            .get(&attacker)
            .map(|b| b.as_slice())
            .unwrap_or(&[])
    }

    pub fn all_blockers(&self) -> Vec<InstanceId> {
        self.blockers.values().flatten().copied().collect()
    }

    /// Clear all combat state (called at end of combat / skip combat)
    pub fn clear(&mut self) {
        self.attackers.clear();
        self.blockers.clear();
        self.defending_player = None;
        self.attackers_declared = false;
        self.blockers_declared = false;
    }
}

/// One assigned packet of combat damage
#[derive(Debug, Clone)]
struct DamageEvent {
    source: InstanceId,
    target: DamageTarget,
    amount: i32,
}

#[derive(Debug, Clone, Copy)]
enum DamageTarget {
    Player(PlayerId),
    Creature(InstanceId),
}

/// Resolve combat damage for the current declarations.
///
/// Two-substep model: a first-strike pass (only first/double strikers deal
/// damage) followed by the normal pass (double strikers and everyone
/// without first strike). State-based actions run between the passes so
/// creatures killed by first strike never strike back; no priority window
/// opens in between.
pub fn resolve_combat_damage(state: &mut crate::game::state::GameState) -> crate::Result<()> {
    let Some(defender) = state.combat.defending_player else {
        return Ok(());
    };

    combat_damage_pass(state, defender, true)?;
    combat_damage_pass(state, defender, false)?;
    Ok(())
}

fn deals_in_first_strike_pass(d: &crate::game::derived::DerivedPermanent) -> bool {
    d.keywords.contains(&crate::core::Keyword::FirstStrike)
        || d.keywords.contains(&crate::core::Keyword::DoubleStrike)
}

fn deals_in_normal_pass(d: &crate::game::derived::DerivedPermanent) -> bool {
    d.keywords.contains(&crate::core::Keyword::DoubleStrike)
        || !d.keywords.contains(&crate::core::Keyword::FirstStrike)
}

fn combat_damage_pass(
    state: &mut crate::game::state::GameState,
    defender: PlayerId,
    first_strike: bool,
) -> crate::Result<()> {
    use crate::core::Keyword;
    use crate::game::derived;

    let derived = derived::compute(state);
    let mut events: Vec<DamageEvent> = Vec::new();
    let mut deathtouch_marked: Vec<InstanceId> = Vec::new();

    // Attackers assign damage
    for &attacker in &state.combat.attackers.clone() {
        if !state.battlefield.contains_key(&attacker) {
            continue;
        }
        let Some(d_att) = derived.get(attacker) else {
            continue;
        };
        let Some(power) = d_att.power else { continue };
        if first_strike && !deals_in_first_strike_pass(d_att) {
            continue;
        }
        if !first_strike && !deals_in_normal_pass(d_att) {
            continue;
        }

        let blockers: Vec<InstanceId> = state
            .combat
            .blockers_of(attacker)
            .iter()
            .filter(|b| state.battlefield.contains_key(b))
            .copied()
            .collect();
        let treat_unblocked = d_att.assign_damage_as_unblocked || blockers.is_empty();

        if treat_unblocked {
            if !d_att.prevent_combat_damage && power > 0 {
                events.push(DamageEvent {
                    source: attacker,
                    target: DamageTarget::Player(defender),
                    amount: power,
                });
            }
            continue;
        }

        // Blockers absorb in declaration order; deathtouch makes any
        // nonzero assignment lethal; trample carries the remainder over
        let mut remaining = power;
        for blocker in &blockers {
            if remaining <= 0 {
                break;
            }
            let Some(d_blk) = derived.get(*blocker) else {
                continue;
            };
            let Some(toughness) = d_blk.toughness else {
                continue;
            };
            if d_blk.prevent_combat_damage || d_att.prevent_combat_damage {
                continue;
            }
            let already_marked = state.perm(*blocker)?.damage_marked;
            let lethal = if d_att.keywords.contains(&Keyword::Deathtouch) {
                1
            } else {
                (toughness - already_marked).max(0)
            };
            let assign = remaining.min(lethal);
            if assign > 0 {
                events.push(DamageEvent {
                    source: attacker,
                    target: DamageTarget::Creature(*blocker),
                    amount: assign,
                });
                if d_att.keywords.contains(&Keyword::Deathtouch) {
                    deathtouch_marked.push(*blocker);
                }
            }
            remaining -= assign;
        }
        if remaining > 0 && d_att.keywords.contains(&Keyword::Trample) && !d_att.prevent_combat_damage
        {
            events.push(DamageEvent {
                source: attacker,
                target: DamageTarget::Player(defender),
                amount: remaining,
            });
        }
    }

    // Blockers strike their attacker
    for (&attacker, blockers) in state.combat.blockers.clone().iter() {
        if !state.battlefield.contains_key(&attacker) {
            continue;
        }
        let Some(d_att) = derived.get(attacker) else {
            continue;
        };
        for blocker in blockers {
            if !state.battlefield.contains_key(blocker) {
                continue;
            }
            let Some(d_blk) = derived.get(*blocker) else {
                continue;
            };
            let Some(power) = d_blk.power else { continue };
            if first_strike && !deals_in_first_strike_pass(d_blk) {
                continue;
            }
            if !first_strike && !deals_in_normal_pass(d_blk) {
                continue;
            }
            if d_blk.prevent_combat_damage || d_att.prevent_combat_damage || power <= 0 {
                continue;
            }
            events.push(DamageEvent {
                source: *blocker,
                target: DamageTarget::Creature(attacker),
                amount: power,
            });
            if d_blk.keywords.contains(&crate::core::Keyword::Deathtouch) {
                deathtouch_marked.push(attacker);
            }
        }
    }

    // Apply all assignments of this pass, then run state-based actions
    for event in events {
        match event.target {
            DamageTarget::Player(player) => {
                crate::game::resolve::damage_player(state, player, event.amount, Some(event.source))?;
                crate::game::triggers::on_combat_damage_to_player(state, event.source, player);
            }
            DamageTarget::Creature(creature) => {
                crate::game::resolve::damage_permanent(
                    state,
                    creature,
                    event.amount,
                    Some(event.source),
                )?;
            }
        }
    }

    crate::game::sba::apply_with_deathtouch(state, &deathtouch_marked)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::EntityId;

    #[test]
    fn test_declare_attackers() {
        let mut combat = CombatState::new();
        let a1 = EntityId::new(1);
        let a2 = EntityId::new(2);
        let defender = PlayerId::new(1);

        combat.declare_attackers(vec![a1, a2], defender);

        assert!(combat.attackers_declared);
        assert!(combat.is_attacking(a1));
        assert_eq!(combat.defending_player, Some(defender));
        assert!(!combat.is_blocked(a1));
    }

    #[test]
    fn test_declare_blockers_preserves_order() {
        let mut combat = CombatState::new();
        let attacker = EntityId::new(1);
        let b1 = EntityId::new(3);
        let b2 = EntityId::new(2);
        combat.declare_attackers(vec![attacker], PlayerId::new(1));

        let mut mapping = BTreeMap::new();
        let mut blockers: SmallVec<[InstanceId; 2]> = SmallVec::new();
        blockers.push(b1);
        blockers.push(b2);
        mapping.insert(attacker, blockers);
        combat.declare_blockers(mapping);

        // Declaration order, not id order
        assert_eq!(combat.blockers_of(attacker), &[b1, b2]);
        assert!(combat.is_blocked(attacker));
    }

    #[test]
    fn test_clear() {
        let mut combat = CombatState::new();
        combat.declare_attackers(vec![EntityId::new(1)], PlayerId::new(1));
        combat.clear();
        assert!(combat.attackers.is_empty());
        assert!(!combat.attackers_declared);
        assert_eq!(combat.defending_player, None);
    }
}
