//! Card database registry
//!
//! The engine consumes a read-only mapping from card id to `CardDef`.
//! Parsing card files from disk is a collaborator's job; this module owns
//! the in-memory registry: definition validation, basic-land alias
//! canonicalization, equip-ability synthesis, and the synthesized token
//! definitions. A definition that cannot be validated is rejected at load
//! time, never tolerated.

use crate::core::{
    ActivatedAbility, CardDef, CardId, CardType, Color, Cost, CreatureStats, Effect,
    EquipmentStats, Keyword, LandStats, ManaCost, Selector, Subtype, TargetSpec, TargetZone,
    TimingRestriction, TokenKind,
};
use crate::{EngineError, Result};
use serde::{Deserialize, Serialize};
use smallvec::smallvec;
use std::collections::BTreeMap;

/// Read-only card registry keyed by card id
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CardDb {
    cards: BTreeMap<CardId, CardDef>,
}

impl CardDb {
    pub fn new() -> Self {
        CardDb::default()
    }

    /// Registry pre-loaded with the five basic lands and all token
    /// definitions the phase-1 effect pool can create
    pub fn with_basics() -> Self {
        let mut db = CardDb::new();
        for (id, name, color, land_type) in [
            ("basic_plains", "Plains", Color::White, "Plains"),
            ("basic_island", "Island", Color::Blue, "Island"),
            ("basic_swamp", "Swamp", Color::Black, "Swamp"),
            ("basic_mountain", "Mountain", Color::Red, "Mountain"),
            ("basic_forest", "Forest", Color::Green, "Forest"),
        ] {
            let mut def = CardDef::new(id, name);
            def.types.insert(CardType::Land);
            def.subtypes.insert(Subtype::new(land_type));
            def.land_stats = Some(LandStats {
                produces: smallvec![(color, 1)],
            });
            db.insert(def).expect("basic land definitions are valid");
        }
        for token in [
            TokenKind::Treasure,
            TokenKind::BirdIllusion,
            TokenKind::ElfWarrior,
            TokenKind::Soldier,
            TokenKind::HumanSoldier,
            TokenKind::Zombie,
            TokenKind::Drake,
            TokenKind::Angel,
            TokenKind::Demon,
            TokenKind::FirebreathDragon,
        ] {
            db.insert(token_def(token))
                .expect("token definitions are valid");
        }
        db
    }

    /// Canonicalize basic-land aliases ("forest" -> "basic_forest")
    pub fn canonical_id(raw: &str) -> CardId {
        match raw.to_ascii_lowercase().as_str() {
            "plains" => CardId::new("basic_plains"),
            "island" => CardId::new("basic_island"),
            "swamp" => CardId::new("basic_swamp"),
            "mountain" => CardId::new("basic_mountain"),
            "forest" => CardId::new("basic_forest"),
            _ => CardId::new(raw),
        }
    }

    /// Validate and register a definition. Equipment gets its Equip
    /// ability synthesized here.
    pub fn insert(&mut self, mut def: CardDef) -> Result<()> {
        validate_def(&def)?;

        if let Some(eq) = &def.equipment_stats {
            def.rules.activated_abilities.push(equip_ability(&eq.equip_cost));
        }

        self.cards.insert(def.id.clone(), def);
        Ok(())
    }

    pub fn get(&self, id: &CardId) -> Option<&CardDef> {
        self.cards.get(id)
    }

    pub fn contains(&self, id: &CardId) -> bool {
        self.cards.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&CardId, &CardDef)> {
        self.cards.iter()
    }
}

fn validate_def(def: &CardDef) -> Result<()> {
    if def.id.as_str().is_empty() {
        return Err(EngineError::InvalidCardDefinition("empty card id".into()));
    }
    if def.types.is_empty() {
        return Err(EngineError::InvalidCardDefinition(format!(
            "{}: no card types",
            def.id
        )));
    }
    if def.is_creature() && def.creature_stats.is_none() {
        return Err(EngineError::InvalidCardDefinition(format!(
            "{}: creature without stats",
            def.id
        )));
    }
    if def.is_land() && def.land_stats.is_none() {
        return Err(EngineError::InvalidCardDefinition(format!(
            "{}: land without land stats",
            def.id
        )));
    }
    if def.aura_stats.is_some() && !def.is_type(CardType::Enchantment) {
        return Err(EngineError::InvalidCardDefinition(format!(
            "{}: aura stats on a non-enchantment",
            def.id
        )));
    }
    if def.equipment_stats.is_some() && !def.is_type(CardType::Artifact) {
        return Err(EngineError::InvalidCardDefinition(format!(
            "{}: equipment stats on a non-artifact",
            def.id
        )));
    }
    if def.rules.flashback_cost.is_some() && !(def.is_instant() || def.is_sorcery()) {
        return Err(EngineError::InvalidCardDefinition(format!(
            "{}: flashback on a non-instant/sorcery",
            def.id
        )));
    }
    Ok(())
}

/// "Equip {cost}" - sorcery speed, attach to target creature you control
fn equip_ability(cost: &ManaCost) -> ActivatedAbility {
    ActivatedAbility {
        costs: vec![Cost::Mana(*cost)],
        effects: vec![Effect::AttachEquipment {
            target: TargetSpec::single(TargetZone::Battlefield, Selector::FriendlyCreature),
        }],
        timing: TimingRestriction::SorcerySpeed,
        zone: Default::default(),
    }
}

impl TokenKind {
    /// Database id of the synthesized token definition
    pub fn card_id(&self) -> CardId {
        let id = match self {
            TokenKind::Treasure => "token_treasure",
            TokenKind::BirdIllusion => "token_bird_illusion",
            TokenKind::ElfWarrior => "token_elf_warrior",
            TokenKind::Soldier => "token_soldier",
            TokenKind::HumanSoldier => "token_human_soldier",
            TokenKind::Zombie => "token_zombie",
            TokenKind::Drake => "token_drake",
            TokenKind::Angel => "token_angel",
            TokenKind::Demon => "token_demon",
            TokenKind::FirebreathDragon => "token_firebreath_dragon",
        };
        CardId::new(id)
    }
}

fn creature_token(
    kind: TokenKind,
    name: &str,
    color: Color,
    power: i32,
    toughness: i32,
    subtypes: &[&str],
    keywords: &[Keyword],
) -> CardDef {
    let mut def = CardDef::new(kind.card_id(), name);
    def.types.insert(CardType::Creature);
    def.colors.push(color);
    def.creature_stats = Some(CreatureStats {
        base_power: power,
        base_toughness: toughness,
    });
    for s in subtypes {
        def.subtypes.insert(Subtype::new(*s));
    }
    for k in keywords {
        def.rules.keywords.insert(*k);
    }
    def
}

fn token_def(kind: TokenKind) -> CardDef {
    match kind {
        TokenKind::Treasure => {
            let mut def = CardDef::new(kind.card_id(), "Treasure");
            def.types.insert(CardType::Artifact);
            def.subtypes.insert(Subtype::new("Treasure"));
            def.rules.activated_abilities.push(ActivatedAbility::new(
                vec![Cost::Tap, Cost::SacrificeSelf],
                vec![Effect::AddManaAnyColor { amount: 1 }],
            ));
            def
        }
        TokenKind::BirdIllusion => creature_token(
            kind,
            "Bird Illusion",
            Color::Blue,
            1,
            1,
            &["Bird", "Illusion"],
            &[Keyword::Flying],
        ),
        TokenKind::ElfWarrior => {
            creature_token(kind, "Elf Warrior", Color::Green, 1, 1, &["Elf", "Warrior"], &[])
        }
        TokenKind::Soldier => {
            creature_token(kind, "Soldier", Color::White, 1, 1, &["Soldier"], &[])
        }
        TokenKind::HumanSoldier => creature_token(
            kind,
            "Human Soldier",
            Color::White,
            1,
            1,
            &["Human", "Soldier"],
            &[],
        ),
        TokenKind::Zombie => creature_token(kind, "Zombie", Color::Black, 2, 2, &["Zombie"], &[]),
        TokenKind::Drake => creature_token(
            kind,
            "Drake",
            Color::Blue,
            2,
            2,
            &["Drake"],
            &[Keyword::Flying],
        ),
        TokenKind::Angel => creature_token(
            kind,
            "Angel",
            Color::White,
            4,
            4,
            &["Angel"],
            &[Keyword::Flying],
        ),
        TokenKind::Demon => creature_token(
            kind,
            "Demon",
            Color::Black,
            5,
            5,
            &["Demon"],
            &[Keyword::Flying],
        ),
        TokenKind::FirebreathDragon => {
            let mut def = creature_token(
                kind,
                "Dragon",
                Color::Red,
                2,
                2,
                &["Dragon"],
                &[Keyword::Flying],
            );
            // {R}: this token gets +1/+0 until end of turn
            def.rules.activated_abilities.push(ActivatedAbility::new(
                vec![Cost::Mana(ManaCost::from_string("R"))],
                vec![Effect::ModifyPt {
                    power: 1,
                    toughness: 0,
                    target: crate::core::ContinuousTarget::Source,
                    duration: crate::core::Duration::EndOfTurn,
                }],
            ));
            def
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basics_registered() {
        let db = CardDb::with_basics();
        assert!(db.contains(&CardId::new("basic_forest")));
        assert!(db.contains(&CardId::new("basic_plains")));
        let forest = db.get(&CardId::new("basic_forest")).unwrap();
        assert!(forest.is_land());
        assert_eq!(
            forest.land_stats.as_ref().unwrap().produces[0],
            (Color::Green, 1)
        );
    }

    #[test]
    fn test_alias_canonicalization() {
        assert_eq!(CardDb::canonical_id("Forest").as_str(), "basic_forest");
        assert_eq!(CardDb::canonical_id("ISLAND").as_str(), "basic_island");
        assert_eq!(
            CardDb::canonical_id("lightning_bolt").as_str(),
            "lightning_bolt"
        );
    }

    #[test]
    fn test_creature_without_stats_rejected() {
        let mut db = CardDb::new();
        let mut def = CardDef::new("bad_creature", "Bad Creature");
        def.types.insert(CardType::Creature);
        assert!(matches!(
            db.insert(def),
            Err(EngineError::InvalidCardDefinition(_))
        ));
    }

    #[test]
    fn test_equip_ability_synthesized() {
        let mut db = CardDb::new();
        let mut def = CardDef::new("shortsword", "Shortsword");
        def.types.insert(CardType::Artifact);
        def.subtypes.insert(Subtype::new("Equipment"));
        def.equipment_stats = Some(EquipmentStats {
            equip_cost: ManaCost::from_string("1"),
        });
        db.insert(def).unwrap();

        let stored = db.get(&CardId::new("shortsword")).unwrap();
        assert_eq!(stored.rules.activated_abilities.len(), 1);
        let equip = &stored.rules.activated_abilities[0];
        assert_eq!(equip.timing, TimingRestriction::SorcerySpeed);
        assert!(matches!(
            equip.effects[0],
            Effect::AttachEquipment { .. }
        ));
    }

    #[test]
    fn test_treasure_token_is_mana_source() {
        let db = CardDb::with_basics();
        let treasure = db.get(&TokenKind::Treasure.card_id()).unwrap();
        assert!(treasure.rules.activated_abilities[0].is_mana_ability());
    }
}
