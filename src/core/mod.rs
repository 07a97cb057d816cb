//! Core game types and entities

pub mod card;
pub mod costs;
pub mod effects;
pub mod entity;
pub mod mana;
pub mod player;
pub mod types;

pub use card::{
    AuraStats, CardDef, CardInstance, CardType, CreatureStats, EquipmentStats, LandStats,
    RulesBlock,
};
pub use costs::{AlternateCost, Cost};
pub use effects::{
    ActivatedAbility, AbilityZone, Amount, ContinuousTarget, ControllerScope, Duration, Effect,
    EffectCondition, Keyword, KeywordSet, ManaCountSpec, Selector, SpellFilter, SpellTag,
    SpellTypeFilter, StaticAbility, TargetSpec, TargetZone, TimingRestriction, TokenKind,
    TriggerCondition, TriggerKind, TriggeredAbility,
};
pub use entity::{EntityId, EntityStore};
pub use mana::{Color, ManaCost, ManaPool};
pub use player::{LossReason, Player};
pub use types::{CardId, CardName, CounterKind, PlayerName, Subtype};

// Type aliases for strongly-typed entity IDs
/// Strongly-typed ID for Player entities
pub type PlayerId = EntityId<Player>;

/// Strongly-typed ID for card instances
pub type InstanceId = EntityId<CardInstance>;
