//! Game initialization from decks
//!
//! Builds the post-mulligan starting state: libraries instantiated and
//! shuffled with the game's single RNG stream, seven-card opening hands
//! drawn. Mulligans are a pregame collaborator's concern; the engine only
//! exposes this entry point.

use crate::game::GameState;
use crate::loader::{CardDb, DeckList};
use crate::Result;

pub const STARTING_LIFE: i32 = 20;
pub const OPENING_HAND_SIZE: u32 = 7;

/// Game builder for initializing games from decks
pub struct GameInitializer<'a> {
    card_db: &'a CardDb,
}

impl<'a> GameInitializer<'a> {
    pub fn new(card_db: &'a CardDb) -> Self {
        GameInitializer { card_db }
    }

    /// Initialize a two-player game. Player 1 is on the play.
    pub fn init_game(
        &self,
        player1_name: &str,
        player1_deck: &DeckList,
        player2_name: &str,
        player2_deck: &DeckList,
        seed: u64,
    ) -> Result<GameState> {
        player1_deck.validate(self.card_db)?;
        player2_deck.validate(self.card_db)?;

        let mut game = GameState::new_two_player(
            self.card_db.clone(),
            player1_name,
            player2_name,
            STARTING_LIFE,
            seed,
        );

        let [p1, p2] = game.player_ids();
        for (player, deck) in [(p1, player1_deck), (p2, player2_deck)] {
            for entry in &deck.entries {
                for _ in 0..entry.count {
                    let id = game.alloc_instance(entry.card_id.clone(), player, false);
                    game.zones_mut(player)?.library.add(id);
                }
            }
        }

        // Shuffle both libraries from the single seeded stream, in player
        // order, so replays are byte-identical.
        for player in [p1, p2] {
            let mut rng = game.rng.clone();
            game.zones_mut(player)?.library.shuffle(&mut rng);
            game.rng = rng;
        }

        for player in [p1, p2] {
            game.draw_cards(player, OPENING_HAND_SIZE)?;
        }

        game.log(format!(
            "Game initialized: {} vs {} (seed {})",
            player1_name, player2_name, seed
        ));
        Ok(game)
    }
}
