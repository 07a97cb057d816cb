//! Card effects, targeting specs, and the ability system
//!
//! Effects are a closed tagged enum with one case per effect kind in the
//! phase-1 card pool, dispatched exhaustively by the executor. A card
//! database entry that cannot be expressed in this enum is rejected at
//! load time rather than tolerated.

use crate::core::{Color, Cost, CounterKind, ManaCost, Subtype};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::collections::BTreeSet;
use std::fmt;

/// Keyword abilities in the phase-1 pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Keyword {
    Flying,
    FirstStrike,
    DoubleStrike,
    Deathtouch,
    Haste,
    Hexproof,
    Indestructible,
    Lifelink,
    Menace,
    Reach,
    Trample,
    Vigilance,
    Defender,
    Flash,
    /// "When this creature dies, return it to the battlefield tapped."
    /// Granted until end of turn by a pump spell in the pool.
    UndeadReturn,
}

/// Set of keywords. BTreeSet keeps iteration deterministic.
pub type KeywordSet = BTreeSet<Keyword>;

/// Zone a target is selected from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TargetZone {
    Battlefield,
    Player,
    Stack,
    Graveyard,
    /// Battlefield creature or player ("any target")
    Any,
}

/// Selector predicate for a target group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Selector {
    /// Creature or player
    AnyTarget,
    Creature,
    FriendlyCreature,
    OpponentCreature,
    NonBlackCreature,
    FlyingCreature,
    Artifact,
    Enchantment,
    Permanent,
    Spell,
    Player,
    OpponentPlayer,
    GraveyardCard,
    GraveyardCreatureCard,
    AttackingCreature,
}

/// A target group declaration: zone + selector + count bounds
///
/// Multi-target groups require distinct objects; `distinct_controllers`
/// additionally requires the chosen permanents to have different
/// controllers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetSpec {
    pub zone: TargetZone,
    pub selector: Selector,
    pub min: u8,
    pub max: u8,
    /// Extra toughness floor ("destroy target creature with toughness 4
    /// or greater")
    pub min_toughness: Option<i32>,
    pub distinct_controllers: bool,
}

impl TargetSpec {
    /// Single mandatory target
    pub fn single(zone: TargetZone, selector: Selector) -> Self {
        TargetSpec {
            zone,
            selector,
            min: 1,
            max: 1,
            min_toughness: None,
            distinct_controllers: false,
        }
    }

    pub fn any_target() -> Self {
        TargetSpec::single(TargetZone::Any, Selector::AnyTarget)
    }

    pub fn creature() -> Self {
        TargetSpec::single(TargetZone::Battlefield, Selector::Creature)
    }

    pub fn spell() -> Self {
        TargetSpec::single(TargetZone::Stack, Selector::Spell)
    }

    pub fn player() -> Self {
        TargetSpec::single(TargetZone::Player, Selector::Player)
    }

    pub fn with_count(mut self, min: u8, max: u8) -> Self {
        self.min = min;
        self.max = max;
        self
    }

    pub fn with_min_toughness(mut self, t: i32) -> Self {
        self.min_toughness = Some(t);
        self
    }

    pub fn distinct_controllers(mut self) -> Self {
        self.distinct_controllers = true;
        self
    }
}

/// A quantity that may be literal or computed at resolution time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Amount {
    Fixed(i32),
    /// The X value locked when the spell was cast
    X,
    /// Number of permanents with a subtype (optionally only yours)
    CountSubtype { subtype: Subtype, yours_only: bool },
    /// +1/+1 counters on the ability's source
    CountersOnSelf,
    /// Toughness of the creature sacrificed while paying the cost
    SacrificedToughness,
    /// Damage dealt to the targeted player this turn
    DamageDealtToPlayer,
    /// Damage amount from the triggering event (DEALT_DAMAGE triggers)
    TriggerDamage,
    /// Life lost in the triggering event (YOU_LOSE_LIFE triggers)
    TriggerLifeLost,
}

impl Amount {
    pub fn fixed(n: i32) -> Self {
        Amount::Fixed(n)
    }
}

/// Token kinds the pool can create. Definitions are synthesized by the
/// card database at load time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TokenKind {
    Treasure,
    BirdIllusion,
    ElfWarrior,
    Soldier,
    HumanSoldier,
    Zombie,
    Drake,
    Angel,
    Demon,
    FirebreathDragon,
}

/// How long a temporary continuous modifier lasts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Duration {
    EndOfTurn,
    EndOfCombat,
    /// Until the effect controller's next untap step
    UntilNextUntap,
    Permanent,
}

/// What a continuous modifier applies to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContinuousTarget {
    /// The effect's source permanent
    Source,
    /// The permanent the source is attached to (equipped/enchanted creature)
    Attached,
    /// Declared by a TargetSpec; bound to concrete permanents when the
    /// spell or ability resolves
    Spec(TargetSpec),
    /// A concrete permanent, bound at resolution (stored in temp effects)
    Bound(u32),
}

/// Condition gating a continuous or one-shot sub-effect
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EffectCondition {
    DuringYourTurn,
    ControlSubtype(Subtype),
    /// Control a permanent of this subtype other than the source
    ControlAnotherSubtype(Subtype),
    ControlEquipment,
    TargetIsColor(Color),
}

/// Filter for cost-reduction statics
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SpellFilter {
    pub subtype: Option<Subtype>,
    pub tags: SmallVec<[SpellTag; 2]>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SpellTag {
    Aura,
    Equipment,
    Artifact,
    Enchantment,
}

/// Which players a scope-style effect applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ControllerScope {
    You,
    Opponents,
}

/// How an add-mana-per-count effect counts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ManaCountSpec {
    /// Permanents of a subtype you control
    ControlledSubtype(Subtype),
    /// Tapped lands your opponents control
    OpponentTappedLands,
}

/// A tagged effect. One case per effect kind in the pool; the executor
/// dispatches exhaustively and the database rejects anything else.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Effect {
    // ---- one-shot ----
    DealDamage {
        amount: Amount,
        target: TargetSpec,
    },
    DestroyPermanent {
        target: TargetSpec,
    },
    ExilePermanent {
        target: TargetSpec,
        /// "its controller gains life equal to its power"
        controller_gains_power_life: bool,
    },
    /// Exile until the source permanent leaves the battlefield
    ExileUntilSourceLeaves {
        target: TargetSpec,
    },
    ReturnToHand {
        target: TargetSpec,
    },
    /// `target: None` means the ability's own card (graveyard-zone ability)
    ReturnFromGraveyardToHand {
        target: Option<TargetSpec>,
    },
    ReturnFromGraveyardToBattlefieldTapped {
        target: Option<TargetSpec>,
    },
    CounterSpell {
        target: TargetSpec,
        unless_pay: Option<ManaCost>,
    },
    CopySpell {
        target: TargetSpec,
    },
    /// `target: None` draws for the effect controller
    DrawCards {
        amount: Amount,
        target: Option<TargetSpec>,
    },
    DrawThenDiscard {
        draw: Amount,
        discard: u8,
    },
    DiscardCards {
        amount: u8,
        target: Option<TargetSpec>,
    },
    DiscardHandThenDraw {
        draw: Amount,
    },
    GainLife {
        amount: Amount,
    },
    LoseLife {
        amount: Amount,
        target: Option<TargetSpec>,
    },
    AddMana {
        color: Color,
        amount: u8,
    },
    AddManaAnyColor {
        amount: u8,
    },
    AddManaForEach {
        color: Color,
        count: ManaCountSpec,
    },
    CreateToken {
        token: TokenKind,
        count: Amount,
        /// "then attach this equipment to it"
        attach_source: bool,
        condition: Option<EffectCondition>,
    },
    /// Optionally exiles a target creature first ("Exile target creature.
    /// Its controller may search their library for a basic land...")
    SearchBasicLandToBattlefieldTapped {
        exile_target: Option<TargetSpec>,
    },
    SearchBasicPlainsToHand,
    LookAtTopPutOneInHand {
        count: u8,
    },
    LookAtTopPutLandOnBattlefieldTapped {
        count: u8,
    },
    RevealTopPutSubtypeToHand {
        count: u8,
        subtype: Subtype,
    },
    FactOrFiction {
        count: u8,
    },
    Scry {
        count: u8,
        then_draw: u8,
    },
    GrantExtraTurn,
    Goad {
        target: TargetSpec,
        /// "Whenever that creature attacks, you draw a card"
        draw_on_attack: bool,
    },
    /// `target: None` puts counters on the source
    PutCounters {
        counter: CounterKind,
        amount: Amount,
        target: Option<TargetSpec>,
        condition: Option<EffectCondition>,
    },
    EachPlayerSacrificesCreature,
    EachPlayerDraws {
        amount: u8,
    },
    /// "Target creature you control deals damage equal to its power to
    /// target creature you don't control." With `trample_excess`, excess
    /// damage hits the defending creature's controller.
    CreatureDealsDamageToCreature {
        source: TargetSpec,
        target: TargetSpec,
        trample_excess: bool,
    },
    DiscardHandDrawEqualDamage {
        target: TargetSpec,
    },
    AttachEquipment {
        target: TargetSpec,
    },
    /// "You may attach any number of auras and equipment you control to it"
    AttachAllYouControlToSource,

    // ---- continuous ----
    ModifyPt {
        power: i32,
        toughness: i32,
        target: ContinuousTarget,
        duration: Duration,
    },
    ModifyPtForEach {
        amount: Amount,
        target: ContinuousTarget,
        duration: Duration,
    },
    SetBasePt {
        power: i32,
        toughness: i32,
        target: ContinuousTarget,
    },
    AddKeyword {
        keyword: Keyword,
        target: ContinuousTarget,
        duration: Duration,
        condition: Option<EffectCondition>,
    },
    RemoveKeyword {
        keyword: Keyword,
        target: ContinuousTarget,
    },
    AddSubtype {
        subtype: Subtype,
        target: ContinuousTarget,
    },
    /// Target can't attack the effect's controller
    CantAttackController {
        target: ContinuousTarget,
    },
    RequireAttack {
        scope: ControllerScope,
    },
    /// All creatures able to block the source must do so
    RequireBlockAll,
    PreventCombatDamage {
        target: ContinuousTarget,
    },
    AssignDamageAsUnblocked,
    /// "Creatures can't attack you unless their controller pays {N} for
    /// each of those creatures" (until your next turn)
    AttackTax {
        amount: u8,
    },
    CostReduction {
        amount: u8,
        filter: SpellFilter,
    },
    /// "[Other] <subtype> creatures you control get +P/+T [and have ...]"
    Lord {
        subtype: Option<Subtype>,
        power: i32,
        toughness: i32,
        keywords: SmallVec<[Keyword; 2]>,
        include_self: bool,
    },
    /// "Other creatures you control get +P/+T for each aura and equipment
    /// attached to this creature"
    BuffPerAttachment {
        power: i32,
        toughness: i32,
    },
    /// One-shot that installs a team-wide temporary modifier
    TeamBuff {
        power: i32,
        toughness: i32,
        keywords: SmallVec<[Keyword; 2]>,
        subtype: Option<Subtype>,
        exclude_source: bool,
        duration: Duration,
    },
    /// Sub-effects that only apply while the source is equipped
    WhileEquipped {
        effects: Vec<Effect>,
    },
}

impl Effect {
    /// The target group this effect contributes to the spell's target
    /// schema, if any.
    pub fn target_spec(&self) -> Option<&TargetSpec> {
        match self {
            Effect::DealDamage { target, .. }
            | Effect::DestroyPermanent { target }
            | Effect::ExilePermanent { target, .. }
            | Effect::ExileUntilSourceLeaves { target }
            | Effect::ReturnToHand { target }
            | Effect::CounterSpell { target, .. }
            | Effect::CopySpell { target }
            | Effect::Goad { target, .. }
            | Effect::DiscardHandDrawEqualDamage { target }
            | Effect::AttachEquipment { target } => Some(target),
            Effect::SearchBasicLandToBattlefieldTapped { exile_target } => exile_target.as_ref(),
            Effect::ReturnFromGraveyardToHand { target }
            | Effect::ReturnFromGraveyardToBattlefieldTapped { target }
            | Effect::DrawCards { target, .. }
            | Effect::DiscardCards { target, .. }
            | Effect::LoseLife { target, .. } => target.as_ref(),
            Effect::PutCounters { target, .. } => target.as_ref(),
            Effect::ModifyPt {
                target: ContinuousTarget::Spec(spec),
                ..
            }
            | Effect::ModifyPtForEach {
                target: ContinuousTarget::Spec(spec),
                ..
            }
            | Effect::AddKeyword {
                target: ContinuousTarget::Spec(spec),
                ..
            }
            | Effect::RemoveKeyword {
                target: ContinuousTarget::Spec(spec),
                ..
            } => Some(spec),
            _ => None,
        }
    }

    /// The secondary target group (fight-style effects name two groups)
    pub fn secondary_target_spec(&self) -> Option<&TargetSpec> {
        match self {
            Effect::CreatureDealsDamageToCreature { target, .. } => Some(target),
            _ => None,
        }
    }

    /// The primary group of a two-group effect
    pub fn primary_of_pair(&self) -> Option<&TargetSpec> {
        match self {
            Effect::CreatureDealsDamageToCreature { source, .. } => Some(source),
            _ => None,
        }
    }

    /// Continuous effects modify the derived battlefield rather than
    /// resolving once.
    pub fn is_continuous(&self) -> bool {
        matches!(
            self,
            Effect::ModifyPt { .. }
                | Effect::ModifyPtForEach { .. }
                | Effect::SetBasePt { .. }
                | Effect::AddKeyword { .. }
                | Effect::RemoveKeyword { .. }
                | Effect::AddSubtype { .. }
                | Effect::CantAttackController { .. }
                | Effect::RequireAttack { .. }
                | Effect::RequireBlockAll
                | Effect::PreventCombatDamage { .. }
                | Effect::AssignDamageAsUnblocked
                | Effect::AttackTax { .. }
                | Effect::CostReduction { .. }
                | Effect::Lord { .. }
                | Effect::BuffPerAttachment { .. }
                | Effect::WhileEquipped { .. }
        )
    }

    /// Mana-producing effects resolve immediately without the stack when
    /// activated (mana abilities never target).
    pub fn is_mana_effect(&self) -> bool {
        matches!(
            self,
            Effect::AddMana { .. } | Effect::AddManaAnyColor { .. } | Effect::AddManaForEach { .. }
        )
    }
}

/// Timing restriction on an activated ability
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TimingRestriction {
    #[default]
    Anytime,
    SorcerySpeed,
    OnlyWhenAttacking,
}

/// Zone an activated ability can be used from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AbilityZone {
    #[default]
    Battlefield,
    Graveyard,
}

/// A continuously applied modifier expressed by a permanent's rules block
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaticAbility {
    pub effects: Vec<Effect>,
}

/// Game events triggers can fire on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TriggerKind {
    Etb,
    Dies,
    Attacks,
    AttacksOrBlocks,
    EquippedCreatureAttacks,
    CombatDamageToPlayer,
    DealtDamage,
    BecomesTarget,
    Upkeep,
    EndStep,
    YouLoseLife,
    CastSpell,
    CreatureEnters,
    OtherFriendlyDies,
    OtherDiesDuringYourTurn,
}

/// Spell-type filter for CastSpell trigger conditions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SpellTypeFilter {
    Creature,
    InstantOrSorcery,
}

/// Combinable conditions evaluated against the triggering event
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TriggerCondition {
    /// YOU: the event's subject is controlled by the trigger's controller;
    /// OPPONENT: the event originated from an opponent
    pub controller: Option<ControllerScope>,
    pub during_opponent_turn: bool,
    pub has_keyword: Option<Keyword>,
    pub subtype: Option<Subtype>,
    pub spell_type: Option<SpellTypeFilter>,
    /// (subtype, minimum count you control)
    pub control_subtype_count: Option<(Subtype, u8)>,
}

impl TriggerCondition {
    pub fn none() -> Self {
        TriggerCondition::default()
    }

    pub fn is_empty(&self) -> bool {
        self == &TriggerCondition::default()
    }
}

/// An ability whose condition fires on a game event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggeredAbility {
    pub trigger: TriggerKind,
    pub effects: Vec<Effect>,
    pub condition: TriggerCondition,
}

impl TriggeredAbility {
    pub fn new(trigger: TriggerKind, effects: Vec<Effect>) -> Self {
        TriggeredAbility {
            trigger,
            effects,
            condition: TriggerCondition::none(),
        }
    }
}

/// An ability a player pays a cost to put on the stack (or resolve
/// immediately, for mana abilities)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivatedAbility {
    pub costs: Vec<Cost>,
    pub effects: Vec<Effect>,
    pub timing: TimingRestriction,
    pub zone: AbilityZone,
}

impl ActivatedAbility {
    pub fn new(costs: Vec<Cost>, effects: Vec<Effect>) -> Self {
        ActivatedAbility {
            costs,
            effects,
            timing: TimingRestriction::Anytime,
            zone: AbilityZone::Battlefield,
        }
    }

    /// Mana abilities have no targets and only produce mana; they resolve
    /// without using the stack.
    pub fn is_mana_ability(&self) -> bool {
        !self.effects.is_empty()
            && self
                .effects
                .iter()
                .all(|e| e.is_mana_effect() && e.target_spec().is_none())
    }
}

impl fmt::Display for Keyword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Keyword::Flying => "flying",
            Keyword::FirstStrike => "first strike",
            Keyword::DoubleStrike => "double strike",
            Keyword::Deathtouch => "deathtouch",
            Keyword::Haste => "haste",
            Keyword::Hexproof => "hexproof",
            Keyword::Indestructible => "indestructible",
            Keyword::Lifelink => "lifelink",
            Keyword::Menace => "menace",
            Keyword::Reach => "reach",
            Keyword::Trample => "trample",
            Keyword::Vigilance => "vigilance",
            Keyword::Defender => "defender",
            Keyword::Flash => "flash",
            Keyword::UndeadReturn => "undead return",
        };
        write!(f, "{}", s)
    }
}
