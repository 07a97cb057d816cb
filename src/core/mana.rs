//! Mana system for casting spells
//!
//! Costs distinguish generic, colored, and X components. Pools additionally
//! track "any color" mana (from treasure tokens), which satisfies any
//! colored requirement. All payment orders are fixed so that identical
//! action sequences always drain pools identically.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Mana colors in the phase-1 pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Color {
    White,
    Blue,
    Black,
    Red,
    Green,
}

impl Color {
    /// All colors in canonical WUBRG order
    pub const ALL: [Color; 5] = [
        Color::White,
        Color::Blue,
        Color::Black,
        Color::Red,
        Color::Green,
    ];

    pub fn from_symbol(c: char) -> Option<Color> {
        match c.to_ascii_uppercase() {
            'W' => Some(Color::White),
            'U' => Some(Color::Blue),
            'B' => Some(Color::Black),
            'R' => Some(Color::Red),
            'G' => Some(Color::Green),
            _ => None,
        }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Color::White => write!(f, "W"),
            Color::Blue => write!(f, "U"),
            Color::Black => write!(f, "B"),
            Color::Red => write!(f, "R"),
            Color::Green => write!(f, "G"),
        }
    }
}

/// Represents a mana cost (e.g. "2RR" = 2 generic + 2 red; "XR" = X + red)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ManaCost {
    pub generic: u8,
    pub white: u8,
    pub blue: u8,
    pub black: u8,
    pub red: u8,
    pub green: u8,
    /// Number of X symbols in the cost
    pub x: u8,
}

impl ManaCost {
    pub fn new() -> Self {
        ManaCost::default()
    }

    /// Parse a compact mana cost string like "2RR", "XR", or "1UB"
    pub fn from_string(s: &str) -> Self {
        let mut cost = ManaCost::new();
        let mut generic_str = String::new();

        for c in s.chars() {
            match c {
                'W' => cost.white += 1,
                'U' => cost.blue += 1,
                'B' => cost.black += 1,
                'R' => cost.red += 1,
                'G' => cost.green += 1,
                'X' | 'x' => cost.x += 1,
                '0'..='9' => generic_str.push(c),
                _ => {} // Ignore other characters
            }
        }

        if !generic_str.is_empty() {
            cost.generic = generic_str.parse().unwrap_or(0);
        }

        cost
    }

    pub fn colored(&self, color: Color) -> u8 {
        match color {
            Color::White => self.white,
            Color::Blue => self.blue,
            Color::Black => self.black,
            Color::Red => self.red,
            Color::Green => self.green,
        }
    }

    /// Total converted mana cost, with X counted as zero
    pub fn cmc(&self) -> u32 {
        self.generic as u32
            + self.white as u32
            + self.blue as u32
            + self.black as u32
            + self.red as u32
            + self.green as u32
    }

    pub fn has_x(&self) -> bool {
        self.x > 0
    }

    /// This cost with `reduction` removed from the generic component and
    /// `x_value` generic added per X symbol. X is locked at cast time.
    pub fn effective(&self, reduction: u8, x_value: u8) -> ManaCost {
        let mut out = *self;
        out.generic = out.generic.saturating_sub(reduction) + x_value * self.x;
        out.x = 0;
        out
    }
}

impl fmt::Display for ManaCost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for _ in 0..self.x {
            write!(f, "X")?;
        }
        if self.generic > 0 {
            write!(f, "{}", self.generic)?;
        }
        for _ in 0..self.white {
            write!(f, "W")?;
        }
        for _ in 0..self.blue {
            write!(f, "U")?;
        }
        for _ in 0..self.black {
            write!(f, "B")?;
        }
        for _ in 0..self.red {
            write!(f, "R")?;
        }
        for _ in 0..self.green {
            write!(f, "G")?;
        }
        if self.cmc() == 0 && self.x == 0 {
            write!(f, "0")?;
        }
        Ok(())
    }
}

/// Mana pool for a player
///
/// `any` mana (from treasures) can stand in for any colored or generic
/// requirement. Pools empty at every step/phase boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ManaPool {
    pub white: u8,
    pub blue: u8,
    pub black: u8,
    pub red: u8,
    pub green: u8,
    /// "One mana of any color" (treasure output)
    pub any: u8,
}

impl ManaPool {
    pub fn new() -> Self {
        ManaPool::default()
    }

    pub fn add(&mut self, color: Color, amount: u8) {
        match color {
            Color::White => self.white += amount,
            Color::Blue => self.blue += amount,
            Color::Black => self.black += amount,
            Color::Red => self.red += amount,
            Color::Green => self.green += amount,
        }
    }

    pub fn add_any(&mut self, amount: u8) {
        self.any += amount;
    }

    pub fn get(&self, color: Color) -> u8 {
        match color {
            Color::White => self.white,
            Color::Blue => self.blue,
            Color::Black => self.black,
            Color::Red => self.red,
            Color::Green => self.green,
        }
    }

    fn get_mut(&mut self, color: Color) -> &mut u8 {
        match color {
            Color::White => &mut self.white,
            Color::Blue => &mut self.blue,
            Color::Black => &mut self.black,
            Color::Red => &mut self.red,
            Color::Green => &mut self.green,
        }
    }

    pub fn clear(&mut self) {
        *self = ManaPool::new();
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }

    pub fn total(&self) -> u32 {
        self.white as u32
            + self.blue as u32
            + self.black as u32
            + self.red as u32
            + self.green as u32
            + self.any as u32
    }

    /// Check whether an already-effective cost (X folded in, reductions
    /// applied) can be paid from this pool.
    pub fn can_pay(&self, cost: &ManaCost) -> bool {
        let mut scratch = *self;
        for color in Color::ALL {
            let need = cost.colored(color);
            let have = scratch.get(color);
            let use_colored = need.min(have);
            *scratch.get_mut(color) = have - use_colored;
            let short = need - use_colored;
            if short > scratch.any {
                return false;
            }
            scratch.any -= short;
        }
        scratch.total() >= cost.generic as u32
    }

    /// Pay an effective cost from this pool.
    ///
    /// Colored requirements drain the matching color first, then `any`.
    /// Generic drains WUBRG in order, then `any`. The order is fixed for
    /// replay determinism. Callers must check `can_pay` first.
    pub fn pay(&mut self, cost: &ManaCost) {
        for color in Color::ALL {
            let need = cost.colored(color);
            let have = self.get(color);
            let use_colored = need.min(have);
            *self.get_mut(color) = have - use_colored;
            self.any -= need - use_colored;
        }
        self.pay_generic(cost.generic as u32);
    }

    /// Pay a purely generic amount (e.g. attack tax), WUBRG then `any`.
    pub fn pay_generic(&mut self, amount: u32) {
        let mut remaining = amount;
        for color in Color::ALL {
            if remaining == 0 {
                break;
            }
            let have = self.get(color) as u32;
            let spend = have.min(remaining);
            *self.get_mut(color) = (have - spend) as u8;
            remaining -= spend;
        }
        let spend = (self.any as u32).min(remaining);
        self.any -= spend as u8;
    }
}

impl fmt::Display for ManaPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{{W:{} U:{} B:{} R:{} G:{} any:{}}}",
            self.white, self.blue, self.black, self.red, self.green, self.any
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mana_cost_parsing() {
        let cost = ManaCost::from_string("2RR");
        assert_eq!(cost.generic, 2);
        assert_eq!(cost.red, 2);
        assert_eq!(cost.cmc(), 4);

        let cost2 = ManaCost::from_string("XR");
        assert_eq!(cost2.x, 1);
        assert_eq!(cost2.red, 1);
        assert_eq!(cost2.cmc(), 1);
    }

    #[test]
    fn test_effective_cost_with_x() {
        let cost = ManaCost::from_string("XR");
        let eff = cost.effective(0, 4);
        assert_eq!(eff.generic, 4);
        assert_eq!(eff.red, 1);
        assert_eq!(eff.x, 0);
    }

    #[test]
    fn test_effective_cost_reduction_floors_at_zero() {
        let cost = ManaCost::from_string("1R");
        let eff = cost.effective(3, 0);
        assert_eq!(eff.generic, 0);
        assert_eq!(eff.red, 1);
    }

    #[test]
    fn test_mana_pool_can_pay() {
        let mut pool = ManaPool::new();
        pool.add(Color::Red, 2);
        pool.add(Color::Blue, 1);

        assert!(pool.can_pay(&ManaCost::from_string("1R")));
        assert!(pool.can_pay(&ManaCost::from_string("2R")));
        assert!(!pool.can_pay(&ManaCost::from_string("3R")));
        assert!(!pool.can_pay(&ManaCost::from_string("RRR")));
    }

    #[test]
    fn test_any_mana_fills_colored_shortfall() {
        let mut pool = ManaPool::new();
        pool.add_any(2);
        assert!(pool.can_pay(&ManaCost::from_string("RR")));
        pool.pay(&ManaCost::from_string("RR"));
        assert!(pool.is_empty());
    }

    #[test]
    fn test_pay_generic_order() {
        let mut pool = ManaPool::new();
        pool.add(Color::White, 1);
        pool.add(Color::Green, 1);
        pool.add_any(1);
        pool.pay_generic(2);
        // White drains before green; any is last
        assert_eq!(pool.white, 0);
        assert_eq!(pool.green, 0);
        assert_eq!(pool.any, 1);
    }

    #[test]
    fn test_pay_prefers_exact_color() {
        let mut pool = ManaPool::new();
        pool.add(Color::Red, 1);
        pool.add_any(1);
        pool.pay(&ManaCost::from_string("R"));
        assert_eq!(pool.red, 0);
        assert_eq!(pool.any, 1);
    }
}
