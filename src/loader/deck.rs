//! Deck lists

use crate::core::CardId;
use crate::loader::CardDb;
use crate::{EngineError, Result};
use serde::{Deserialize, Serialize};

/// One line of a deck list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeckEntry {
    pub card_id: CardId,
    pub count: u32,
}

impl DeckEntry {
    pub fn new(card_id: impl Into<CardId>, count: u32) -> Self {
        DeckEntry {
            card_id: card_id.into(),
            count,
        }
    }
}

/// A named list of (card, count) pairs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeckList {
    pub name: String,
    pub entries: Vec<DeckEntry>,
}

impl DeckList {
    pub fn new(name: impl Into<String>) -> Self {
        DeckList {
            name: name.into(),
            entries: Vec::new(),
        }
    }

    /// Add a card by raw id or basic-land alias
    pub fn add(mut self, raw_id: &str, count: u32) -> Self {
        self.entries
            .push(DeckEntry::new(CardDb::canonical_id(raw_id), count));
        self
    }

    pub fn card_count(&self) -> u32 {
        self.entries.iter().map(|e| e.count).sum()
    }

    /// Every entry must resolve in the database
    pub fn validate(&self, db: &CardDb) -> Result<()> {
        if self.entries.is_empty() {
            return Err(EngineError::InvalidDeck(format!("{}: empty deck", self.name)));
        }
        for entry in &self.entries {
            if entry.count == 0 {
                return Err(EngineError::InvalidDeck(format!(
                    "{}: zero copies of {}",
                    self.name, entry.card_id
                )));
            }
            if !db.contains(&entry.card_id) {
                return Err(EngineError::InvalidDeck(format!(
                    "{}: unknown card {}",
                    self.name, entry.card_id
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deck_building() {
        let deck = DeckList::new("mono green").add("Forest", 10).add("forest", 2);
        assert_eq!(deck.card_count(), 12);
        assert_eq!(deck.entries[0].card_id.as_str(), "basic_forest");
    }

    #[test]
    fn test_deck_validation() {
        let db = CardDb::with_basics();
        let good = DeckList::new("lands").add("Forest", 8);
        assert!(good.validate(&db).is_ok());

        let bad = DeckList::new("bad").add("not_a_card", 4);
        assert!(matches!(bad.validate(&db), Err(EngineError::InvalidDeck(_))));

        let empty = DeckList::new("empty");
        assert!(empty.validate(&db).is_err());
    }
}
