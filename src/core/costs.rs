//! Cost system for spells and activated abilities
//!
//! Represents the non-mana and mana costs players pay to cast spells or
//! activate abilities: tapping, sacrificing permanents, discarding,
//! paying life. Alternative costs are card-declared; the action payload
//! picks which alternative was used.

use crate::core::{ManaCost, Subtype};
use serde::{Deserialize, Serialize};

/// A cost that must be paid to activate an ability or as an additional
/// cost on a spell
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Cost {
    /// Tap the source permanent (T)
    Tap,

    /// Pay mana
    Mana(ManaCost),

    /// Sacrifice the source permanent itself
    SacrificeSelf,

    /// Sacrifice creatures you control. `other_only` excludes the source.
    SacrificeCreatures { count: u8, other_only: bool },

    /// Discard cards from hand
    Discard { count: u8 },

    /// Pay life
    PayLife { amount: u8 },
}

impl Cost {
    /// Check if this cost taps the source
    pub fn includes_tap(&self) -> bool {
        matches!(self, Cost::Tap)
    }

    /// Get the mana component if present
    pub fn mana_cost(&self) -> Option<&ManaCost> {
        match self {
            Cost::Mana(mana) => Some(mana),
            _ => None,
        }
    }

    /// Does paying this cost require an explicit choice in the action
    /// payload (which cards to discard, which creatures to sacrifice)?
    pub fn needs_payload_choice(&self) -> bool {
        matches!(
            self,
            Cost::SacrificeCreatures { .. } | Cost::Discard { .. }
        )
    }
}

/// A card-declared alternative to the printed mana cost
///
/// The action payload names the alternative by `id()`; validation then
/// checks the alternative's own requirements.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AlternateCost {
    /// "If you control a <subtype>, you may pay N life rather than pay
    /// this spell's mana cost."
    ControlSubtypePayLife { subtype: Subtype, life: u8 },
}

impl AlternateCost {
    /// Stable identifier used in action payloads
    pub fn id(&self) -> String {
        match self {
            AlternateCost::ControlSubtypePayLife { subtype, life } => {
                format!("control_{}_pay_{}_life", subtype.as_str().to_lowercase(), life)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tap_cost() {
        let cost = Cost::Tap;
        assert!(cost.includes_tap());
        assert!(cost.mana_cost().is_none());
        assert!(!cost.needs_payload_choice());
    }

    #[test]
    fn test_mana_cost_component() {
        let cost = Cost::Mana(ManaCost::from_string("2"));
        assert!(!cost.includes_tap());
        assert_eq!(cost.mana_cost().unwrap().generic, 2);
    }

    #[test]
    fn test_payload_choice_costs() {
        assert!(Cost::Discard { count: 1 }.needs_payload_choice());
        assert!(Cost::SacrificeCreatures {
            count: 1,
            other_only: true
        }
        .needs_payload_choice());
        assert!(!Cost::PayLife { amount: 2 }.needs_payload_choice());
    }

    #[test]
    fn test_alternate_cost_id() {
        let alt = AlternateCost::ControlSubtypePayLife {
            subtype: Subtype::new("Forest"),
            life: 3,
        };
        assert_eq!(alt.id(), "control_forest_pay_3_life");
    }
}
