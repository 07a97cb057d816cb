//! Card database and game setup

pub mod database;
pub mod deck;
pub mod game_init;

pub use database::CardDb;
pub use deck::{DeckEntry, DeckList};
pub use game_init::{GameInitializer, OPENING_HAND_SIZE, STARTING_LIFE};
