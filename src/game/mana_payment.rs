//! Mana affordability and payment
//!
//! Centralizes how spell costs are computed (cost-reduction statics, X,
//! alternative/flashback overrides) and paid from pools. Validation and
//! resolution share these helpers so "can pay" and "pay" can never
//! disagree.

use crate::core::{CardDef, Effect, ManaCost, PlayerId, SpellTag};
use crate::game::state::GameState;
use crate::Result;

/// Total generic reduction battlefield statics give `player` on this spell
pub fn cost_reduction_for(state: &GameState, def: &CardDef, player: PlayerId) -> u8 {
    let mut reduction: u8 = 0;
    for perm in state.battlefield.values() {
        if perm.controller != player {
            continue;
        }
        let Ok(source_def) = state.def_of(perm.id()) else {
            continue;
        };
        for sa in &source_def.rules.static_abilities {
            for eff in &sa.effects {
                if let Effect::CostReduction { amount, filter } = eff {
                    let mut applies = false;
                    if let Some(subtype) = &filter.subtype {
                        applies |= def.has_subtype(subtype);
                    }
                    for tag in &filter.tags {
                        applies |= match tag {
                            SpellTag::Aura => def.is_aura(),
                            SpellTag::Equipment => def.is_equipment(),
                            SpellTag::Artifact => def.is_type(crate::core::CardType::Artifact),
                            SpellTag::Enchantment => {
                                def.is_type(crate::core::CardType::Enchantment)
                            }
                        };
                    }
                    if applies {
                        reduction = reduction.saturating_add(*amount);
                    }
                }
            }
        }
    }
    reduction
}

/// The cost actually charged for a cast: printed cost (or flashback
/// override), minus reductions, with X folded in
pub fn effective_spell_cost(
    state: &GameState,
    def: &CardDef,
    player: PlayerId,
    x_value: u8,
    cost_override: Option<&ManaCost>,
) -> ManaCost {
    let reduction = cost_reduction_for(state, def, player);
    cost_override
        .unwrap_or(&def.mana_cost)
        .effective(reduction, x_value)
}

pub fn can_pay_spell_cost(
    state: &GameState,
    def: &CardDef,
    player: PlayerId,
    x_value: u8,
    cost_override: Option<&ManaCost>,
) -> Result<bool> {
    let cost = effective_spell_cost(state, def, player, x_value, cost_override);
    Ok(state.player(player)?.mana_pool.can_pay(&cost))
}

pub fn pay_spell_cost(
    state: &mut GameState,
    def: &CardDef,
    player: PlayerId,
    x_value: u8,
    cost_override: Option<&ManaCost>,
) -> Result<()> {
    let cost = effective_spell_cost(state, def, player, x_value, cost_override);
    state.player_mut(player)?.mana_pool.pay(&cost);
    Ok(())
}

/// Can a plain (already effective) cost be paid right now?
pub fn can_pay_mana(state: &GameState, player: PlayerId, cost: &ManaCost) -> Result<bool> {
    Ok(state.player(player)?.mana_pool.can_pay(cost))
}

pub fn pay_mana(state: &mut GameState, player: PlayerId, cost: &ManaCost) -> Result<()> {
    state.player_mut(player)?.mana_pool.pay(cost);
    Ok(())
}

/// Per-attacker tax from active "attack tax" temporary effects controlled
/// by the defending player
pub fn attack_tax_amount(state: &GameState, defender: PlayerId) -> u32 {
    state
        .temporary_effects
        .iter()
        .filter(|t| t.is_active(&state.turn))
        .filter(|t| t.controller == Some(defender))
        .filter_map(|t| match &t.effect {
            Effect::AttackTax { amount } => Some(*amount as u32),
            _ => None,
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{
        CardDef, CardType, Color, CreatureStats, SpellFilter, StaticAbility, Subtype,
    };
    use crate::game::permanent::Permanent;
    use crate::loader::CardDb;

    fn dragon_def() -> CardDef {
        let mut def = CardDef::new("young_dragon", "Young Dragon");
        def.types.insert(CardType::Creature);
        def.subtypes.insert(Subtype::new("Dragon"));
        def.mana_cost = ManaCost::from_string("3RR");
        def.creature_stats = Some(CreatureStats {
            base_power: 3,
            base_toughness: 3,
        });
        def
    }

    fn reducer_def() -> CardDef {
        let mut def = CardDef::new("dragon_caller", "Dragon Caller");
        def.types.insert(CardType::Creature);
        def.creature_stats = Some(CreatureStats {
            base_power: 1,
            base_toughness: 3,
        });
        def.rules.static_abilities.push(StaticAbility {
            effects: vec![Effect::CostReduction {
                amount: 2,
                filter: SpellFilter {
                    subtype: Some(Subtype::new("Dragon")),
                    tags: Default::default(),
                },
            }],
        });
        def
    }

    #[test]
    fn test_cost_reduction_applies() {
        let mut db = CardDb::with_basics();
        db.insert(dragon_def()).unwrap();
        db.insert(reducer_def()).unwrap();
        let mut state = GameState::new_two_player(db, "A", "B", 20, 1);
        let p1 = PlayerId::new(0);

        let reducer = state.alloc_instance("dragon_caller", p1, false);
        let inst = state.instance(reducer).unwrap().clone();
        state.battlefield.insert(reducer, Permanent::new(inst, p1));

        let dragon = state.def(&"young_dragon".into()).unwrap().clone();
        let cost = effective_spell_cost(&state, &dragon, p1, 0, None);
        assert_eq!(cost.generic, 1);
        assert_eq!(cost.red, 2);

        // Reduction belongs to the controller only
        let p2 = PlayerId::new(1);
        let cost2 = effective_spell_cost(&state, &dragon, p2, 0, None);
        assert_eq!(cost2.generic, 3);
    }

    #[test]
    fn test_pay_spell_cost_drains_pool() {
        let mut db = CardDb::with_basics();
        db.insert(dragon_def()).unwrap();
        let mut state = GameState::new_two_player(db, "A", "B", 20, 1);
        let p1 = PlayerId::new(0);
        {
            let pool = &mut state.player_mut(p1).unwrap().mana_pool;
            pool.add(Color::Red, 2);
            pool.add(Color::Green, 3);
        }

        let dragon = state.def(&"young_dragon".into()).unwrap().clone();
        assert!(can_pay_spell_cost(&state, &dragon, p1, 0, None).unwrap());
        pay_spell_cost(&mut state, &dragon, p1, 0, None).unwrap();
        assert!(state.player(p1).unwrap().mana_pool.is_empty());
    }

    #[test]
    fn test_attack_tax_sums_per_defender() {
        let db = CardDb::with_basics();
        let mut state = GameState::new_two_player(db, "A", "B", 20, 1);
        let p2 = PlayerId::new(1);
        state.add_temporary_effect(
            Effect::AttackTax { amount: 2 },
            None,
            Some(p2),
            state.turn.turn_number,
            None,
        );
        assert_eq!(attack_tax_amount(&state, p2), 2);
        assert_eq!(attack_tax_amount(&state, PlayerId::new(0)), 0);
    }
}
