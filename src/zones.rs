//! Game zones (Library, Hand, Graveyard, Battlefield, etc.)

use crate::core::{InstanceId, PlayerId};
use serde::{Deserialize, Serialize};

/// Different zones where cards can exist
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Zone {
    Library,
    Hand,
    Battlefield,
    Graveyard,
    Exile,
    Stack,
}

/// An ordered list of card instances owned by one player
///
/// Order matters for Library and Graveyard (top = last). Hand is
/// semantically unordered but kept in insertion order so that iteration is
/// deterministic across replays.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CardZone {
    pub zone_type: Zone,
    pub owner: PlayerId,
    pub cards: Vec<InstanceId>,
}

impl CardZone {
    pub fn new(zone_type: Zone, owner: PlayerId) -> Self {
        CardZone {
            zone_type,
            owner,
            cards: Vec::new(),
        }
    }

    pub fn add(&mut self, id: InstanceId) {
        self.cards.push(id);
    }

    pub fn remove(&mut self, id: InstanceId) -> bool {
        if let Some(pos) = self.cards.iter().position(|&c| c == id) {
            // remove() instead of swap_remove(): iteration order is part of
            // replay determinism.
            self.cards.remove(pos);
            true
        } else {
            false
        }
    }

    pub fn contains(&self, id: InstanceId) -> bool {
        self.cards.contains(&id)
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    /// Draw from top (for Library)
    pub fn draw_top(&mut self) -> Option<InstanceId> {
        self.cards.pop()
    }

    /// Look at top card without removing it
    pub fn peek_top(&self) -> Option<InstanceId> {
        self.cards.last().copied()
    }

    /// Top N cards, topmost first
    pub fn peek_top_n(&self, n: usize) -> Vec<InstanceId> {
        self.cards.iter().rev().take(n).copied().collect()
    }

    /// Add to bottom (for Library)
    pub fn add_to_bottom(&mut self, id: InstanceId) {
        self.cards.insert(0, id);
    }

    /// Shuffle the zone (for Library)
    pub fn shuffle(&mut self, rng: &mut impl rand::Rng) {
        use rand::seq::SliceRandom;
        self.cards.shuffle(rng);
    }

    pub fn clear(&mut self) {
        self.cards.clear();
    }
}

/// Collection of the per-player hidden/ordered zones
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerZones {
    pub library: CardZone,
    pub hand: CardZone,
    pub graveyard: CardZone,
}

impl PlayerZones {
    pub fn new(player_id: PlayerId) -> Self {
        PlayerZones {
            library: CardZone::new(Zone::Library, player_id),
            hand: CardZone::new(Zone::Hand, player_id),
            graveyard: CardZone::new(Zone::Graveyard, player_id),
        }
    }

    pub fn get_zone(&self, zone: Zone) -> Option<&CardZone> {
        match zone {
            Zone::Library => Some(&self.library),
            Zone::Hand => Some(&self.hand),
            Zone::Graveyard => Some(&self.graveyard),
            _ => None,
        }
    }

    pub fn get_zone_mut(&mut self, zone: Zone) -> Option<&mut CardZone> {
        match zone {
            Zone::Library => Some(&mut self.library),
            Zone::Hand => Some(&mut self.hand),
            Zone::Graveyard => Some(&mut self.graveyard),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::EntityId;

    #[test]
    fn test_card_zone() {
        let player_id = PlayerId::new(1);
        let mut zone = CardZone::new(Zone::Hand, player_id);

        assert_eq!(zone.len(), 0);
        assert!(zone.is_empty());

        let card1 = EntityId::new(10);
        let card2 = EntityId::new(11);

        zone.add(card1);
        zone.add(card2);

        assert_eq!(zone.len(), 2);
        assert!(zone.contains(card1));
        assert!(zone.contains(card2));

        assert!(zone.remove(card1));
        assert_eq!(zone.len(), 1);
        assert!(!zone.contains(card1));
    }

    #[test]
    fn test_library_operations() {
        let player_id = PlayerId::new(1);
        let mut library = CardZone::new(Zone::Library, player_id);

        let card1 = EntityId::new(10);
        let card2 = EntityId::new(11);
        let card3 = EntityId::new(12);

        library.add(card1); // Bottom
        library.add(card2);
        library.add(card3); // Top

        assert_eq!(library.peek_top(), Some(card3));
        assert_eq!(library.peek_top_n(2), vec![card3, card2]);
        assert_eq!(library.draw_top(), Some(card3));
        assert_eq!(library.len(), 2);

        library.add_to_bottom(card3);
        assert_eq!(library.cards[0], card3);
    }

    #[test]
    fn test_player_zones() {
        let player_id = PlayerId::new(1);
        let zones = PlayerZones::new(player_id);

        assert_eq!(zones.library.zone_type, Zone::Library);
        assert_eq!(zones.hand.zone_type, Zone::Hand);
        assert_eq!(zones.graveyard.zone_type, Zone::Graveyard);
    }
}
