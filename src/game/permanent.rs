//! Battlefield-only wrapper around a card instance
//!
//! Mutable state a card only has while it is a permanent. Destroyed when
//! the card leaves the battlefield.

use crate::core::{CardInstance, CounterKind, InstanceId, PlayerId};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::collections::BTreeMap;

/// A card or token on the battlefield with mutable state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Permanent {
    pub instance: CardInstance,
    pub controller: PlayerId,

    pub tapped: bool,
    pub summoning_sick: bool,
    pub damage_marked: i32,
    pub counters: BTreeMap<CounterKind, u32>,

    /// Host this aura/equipment is attached to
    pub attached_to: Option<InstanceId>,

    /// Player who goaded this creature, and the turn the goad wears off
    pub goaded_by: Option<PlayerId>,
    pub goaded_until_turn: Option<u32>,

    /// "Whenever that creature attacks, you draw a card" rider from goad
    /// effects; the drawing player and expiry turn
    pub draw_on_attack_by: Option<PlayerId>,
    pub draw_on_attack_until_turn: Option<u32>,

    pub entered_this_turn: bool,

    /// Set while this creature is declared attacking (the defender)
    pub attacker_assignment: Option<PlayerId>,

    /// Attackers this creature is blocking (phase-1: at most one)
    pub blocking: SmallVec<[InstanceId; 1]>,
}

impl Permanent {
    pub fn new(instance: CardInstance, controller: PlayerId) -> Self {
        Permanent {
            instance,
            controller,
            tapped: false,
            summoning_sick: true,
            damage_marked: 0,
            counters: BTreeMap::new(),
            attached_to: None,
            goaded_by: None,
            goaded_until_turn: None,
            draw_on_attack_by: None,
            draw_on_attack_until_turn: None,
            entered_this_turn: true,
            attacker_assignment: None,
            blocking: SmallVec::new(),
        }
    }

    pub fn id(&self) -> InstanceId {
        self.instance.id
    }

    pub fn tap(&mut self) {
        self.tapped = true;
    }

    pub fn untap(&mut self) {
        self.tapped = false;
    }

    pub fn add_counters(&mut self, kind: CounterKind, amount: u32) {
        *self.counters.entry(kind).or_insert(0) += amount;
    }

    pub fn get_counters(&self, kind: CounterKind) -> u32 {
        self.counters.get(&kind).copied().unwrap_or(0)
    }

    /// Net P/T delta from counters
    pub fn counter_delta(&self) -> i32 {
        self.get_counters(CounterKind::PlusOnePlusOne) as i32
            - self.get_counters(CounterKind::MinusOneMinusOne) as i32
    }

    pub fn is_goaded(&self, current_turn: u32) -> bool {
        match (self.goaded_by, self.goaded_until_turn) {
            (Some(_), Some(until)) => current_turn <= until,
            _ => false,
        }
    }

    pub fn is_attacking(&self) -> bool {
        self.attacker_assignment.is_some()
    }

    pub fn is_blocking(&self) -> bool {
        !self.blocking.is_empty()
    }

    /// Reset combat assignments (end of combat / end of turn)
    pub fn clear_combat(&mut self) {
        self.attacker_assignment = None;
        self.blocking.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::EntityId;

    fn permanent() -> Permanent {
        let owner = PlayerId::new(0);
        let inst = CardInstance::new(EntityId::new(5), "grizzly_bears", owner);
        Permanent::new(inst, owner)
    }

    #[test]
    fn test_new_permanent_is_sick_and_untapped() {
        let perm = permanent();
        assert!(perm.summoning_sick);
        assert!(!perm.tapped);
        assert!(perm.entered_this_turn);
        assert_eq!(perm.damage_marked, 0);
    }

    #[test]
    fn test_counters() {
        let mut perm = permanent();
        perm.add_counters(CounterKind::PlusOnePlusOne, 2);
        perm.add_counters(CounterKind::MinusOneMinusOne, 1);
        assert_eq!(perm.counter_delta(), 1);
        assert_eq!(perm.get_counters(CounterKind::PlusOnePlusOne), 2);
    }

    #[test]
    fn test_goad_expiry() {
        let mut perm = permanent();
        perm.goaded_by = Some(PlayerId::new(1));
        perm.goaded_until_turn = Some(4);
        assert!(perm.is_goaded(3));
        assert!(perm.is_goaded(4));
        assert!(!perm.is_goaded(5));
    }

    #[test]
    fn test_combat_assignment() {
        let mut perm = permanent();
        assert!(!perm.is_attacking());
        perm.attacker_assignment = Some(PlayerId::new(1));
        assert!(perm.is_attacking());
        perm.blocking.push(EntityId::new(9));
        assert!(perm.is_blocking());
        perm.clear_combat();
        assert!(!perm.is_attacking());
        assert!(!perm.is_blocking());
    }
}
