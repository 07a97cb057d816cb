//! Card types and definitions
//!
//! `CardDef` is the immutable per-card descriptor loaded once from the
//! card database and referenced by id. `CardInstance` is a physical card
//! in a game; it lives in exactly one zone at a time.

use crate::core::{
    ActivatedAbility, AlternateCost, CardId, CardName, Color, Cost, Effect, KeywordSet, ManaCost,
    PlayerId, StaticAbility, Subtype, TargetSpec, TriggeredAbility,
};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::collections::BTreeSet;

/// Card types in MTG (phase-1 pool)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CardType {
    Creature,
    Instant,
    Sorcery,
    Enchantment,
    Artifact,
    Land,
}

/// Base stats for creature cards
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatureStats {
    pub base_power: i32,
    pub base_toughness: i32,
}

/// Mana a land produces when tapped
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LandStats {
    pub produces: SmallVec<[(Color, u8); 1]>,
}

/// Equipment-only data; an Equip activated ability is synthesized from
/// `equip_cost` at database load
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EquipmentStats {
    pub equip_cost: ManaCost,
}

/// Aura-only data
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuraStats {
    pub enchant: TargetSpec,
}

/// Oracle-derived rules content of a card
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RulesBlock {
    pub keywords: KeywordSet,
    /// Spell effects, resolved in declared order
    pub effects: Vec<Effect>,
    pub static_abilities: Vec<StaticAbility>,
    pub triggered_abilities: Vec<TriggeredAbility>,
    pub activated_abilities: Vec<ActivatedAbility>,
    pub additional_costs: Vec<Cost>,
    pub alternate_costs: Vec<AlternateCost>,
    pub flashback_cost: Option<ManaCost>,
}

/// Immutable per-card descriptor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardDef {
    pub id: CardId,
    pub name: CardName,
    pub mana_cost: ManaCost,
    pub types: BTreeSet<CardType>,
    pub subtypes: BTreeSet<Subtype>,
    pub colors: SmallVec<[Color; 2]>,
    pub rules: RulesBlock,
    pub creature_stats: Option<CreatureStats>,
    pub land_stats: Option<LandStats>,
    pub equipment_stats: Option<EquipmentStats>,
    pub aura_stats: Option<AuraStats>,
}

impl CardDef {
    /// Minimal definition; callers fill in type-specific stats
    pub fn new(id: impl Into<CardId>, name: impl Into<CardName>) -> Self {
        CardDef {
            id: id.into(),
            name: name.into(),
            mana_cost: ManaCost::new(),
            types: BTreeSet::new(),
            subtypes: BTreeSet::new(),
            colors: SmallVec::new(),
            rules: RulesBlock::default(),
            creature_stats: None,
            land_stats: None,
            equipment_stats: None,
            aura_stats: None,
        }
    }

    pub fn is_type(&self, t: CardType) -> bool {
        self.types.contains(&t)
    }

    pub fn is_creature(&self) -> bool {
        self.is_type(CardType::Creature)
    }

    pub fn is_land(&self) -> bool {
        self.is_type(CardType::Land)
    }

    pub fn is_instant(&self) -> bool {
        self.is_type(CardType::Instant)
    }

    pub fn is_sorcery(&self) -> bool {
        self.is_type(CardType::Sorcery)
    }

    pub fn is_aura(&self) -> bool {
        self.aura_stats.is_some()
    }

    pub fn is_equipment(&self) -> bool {
        self.equipment_stats.is_some()
    }

    /// Permanent card types enter the battlefield on resolution
    pub fn is_permanent_type(&self) -> bool {
        self.is_type(CardType::Creature)
            || self.is_type(CardType::Artifact)
            || self.is_type(CardType::Enchantment)
            || self.is_type(CardType::Land)
    }

    pub fn has_subtype(&self, subtype: &Subtype) -> bool {
        self.subtypes.contains(subtype)
    }

    pub fn has_color(&self, color: Color) -> bool {
        self.colors.contains(&color)
    }
}

/// A physical card in a game
///
/// Instance ids are unique per game and stable while the card stays in
/// public zones; a permanent leaving the battlefield (or a spell leaving
/// the stack for a hidden zone) is re-issued a fresh id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardInstance {
    pub id: crate::core::InstanceId,
    pub card_id: CardId,
    pub owner: PlayerId,
    pub is_token: bool,
}

impl CardInstance {
    pub fn new(id: crate::core::InstanceId, card_id: impl Into<CardId>, owner: PlayerId) -> Self {
        CardInstance {
            id,
            card_id: card_id.into(),
            owner,
            is_token: false,
        }
    }

    pub fn token(id: crate::core::InstanceId, card_id: impl Into<CardId>, owner: PlayerId) -> Self {
        CardInstance {
            id,
            card_id: card_id.into(),
            owner,
            is_token: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::EntityId;

    #[test]
    fn test_card_def_types() {
        let mut def = CardDef::new("grizzly_bears", "Grizzly Bears");
        def.types.insert(CardType::Creature);
        def.creature_stats = Some(CreatureStats {
            base_power: 2,
            base_toughness: 2,
        });

        assert!(def.is_creature());
        assert!(def.is_permanent_type());
        assert!(!def.is_land());
        assert!(!def.is_instant());
    }

    #[test]
    fn test_card_instance() {
        let owner = PlayerId::new(0);
        let inst = CardInstance::new(EntityId::new(10), "basic_forest", owner);
        assert_eq!(inst.card_id.as_str(), "basic_forest");
        assert!(!inst.is_token);

        let tok = CardInstance::token(EntityId::new(11), "token_zombie", owner);
        assert!(tok.is_token);
    }

    #[test]
    fn test_subtype_lookup() {
        let mut def = CardDef::new("llanowar_elves", "Llanowar Elves");
        def.subtypes.insert(Subtype::new("Elf"));
        def.subtypes.insert(Subtype::new("Druid"));
        assert!(def.has_subtype(&Subtype::new("Elf")));
        assert!(!def.has_subtype(&Subtype::new("Zombie")));
    }
}
